//! `mailfwd` decodes raw inbound emails and forwards them as readable messages.
//!
//! The crate provides the decoding pipeline (header unfolding, RFC 2047
//! encoded words, quoted-printable and base64 bodies), the forward composer,
//! and the adapters around it: trigger events, blob stores and the SMTP relay.

pub mod compose;
pub mod config;
pub mod error;
pub mod i18n;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod relay;
pub mod store;
