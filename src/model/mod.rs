//! Core data model types: messages, headers, addresses, and trigger events.

pub mod address;
pub mod event;
pub mod mail;
