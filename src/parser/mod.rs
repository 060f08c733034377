//! Email decoding: header unfolding, encoded-words, transfer encodings, and the message decoder.

pub mod header;
pub mod message;
pub mod transfer;
