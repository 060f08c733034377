//! Outbound relay boundary and the delivery adapter.
//!
//! Delivery problems are never fatal: [`deliver`] always produces a
//! [`ForwardResult`], because surfacing a failure to the inbound receiver
//! would make it bounce or retry a message that was already stored safely.

pub mod smtp;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::i18n::Lang;
use crate::model::event::ForwardResult;
use crate::model::mail::ForwardRequest;

pub use smtp::SmtpRelay;

/// Errors reported by a relay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// An address in the request could not be parsed.
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The outbound message could not be assembled.
    #[error("Failed to build message: {0}")]
    Build(String),

    /// The relay answered but refused the message.
    #[error("Relay rejected message: {0}")]
    Rejected(String),

    /// The relay could not be reached.
    #[error("Relay unreachable: {0}")]
    Unreachable(String),
}

/// What the relay receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub reply_to: Vec<String>,
}

impl From<&ForwardRequest> for SendRequest {
    fn from(request: &ForwardRequest) -> Self {
        Self {
            from: request.source_address.clone(),
            to: vec![request.destination_address.clone()],
            subject: request.subject.clone(),
            html_body: request.html_body.clone(),
            text_body: request.text_body.clone(),
            reply_to: vec![request.reply_to.clone()],
        }
    }
}

/// Something that can deliver a composed message.
pub trait Relay {
    /// Send the message and return the relay's message id.
    fn send(&self, request: &SendRequest) -> Result<String, RelayError>;
}

impl<R: Relay + ?Sized> Relay for &R {
    fn send(&self, request: &SendRequest) -> Result<String, RelayError> {
        (**self).send(request)
    }
}

impl<R: Relay + ?Sized> Relay for Box<R> {
    fn send(&self, request: &SendRequest) -> Result<String, RelayError> {
        (**self).send(request)
    }
}

/// Send `request` and fold the outcome into a [`ForwardResult`].
pub fn deliver<R: Relay + ?Sized>(
    relay: &R,
    request: &ForwardRequest,
    original_message_id: &str,
    lang: Lang,
) -> ForwardResult {
    match relay.send(&SendRequest::from(request)) {
        Ok(relay_id) => {
            info!(
                relay_message_id = %relay_id,
                to = %request.destination_address,
                "Message forwarded"
            );
            ForwardResult::delivered(original_message_id, relay_id, &request.destination_address)
        }
        Err(e) => {
            error!(error = %e, to = %request.destination_address, "Forwarding failed");
            ForwardResult::failed(
                original_message_id,
                e.to_string(),
                Some(lang.note_preserved().to_string()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(std::result::Result<&'static str, &'static str>);

    impl Relay for Fixed {
        fn send(&self, _request: &SendRequest) -> Result<String, RelayError> {
            self.0
                .map(str::to_string)
                .map_err(|e| RelayError::Unreachable(e.to_string()))
        }
    }

    fn request() -> ForwardRequest {
        ForwardRequest {
            source_address: "mail@example.ch".into(),
            destination_address: "owner@example.de".into(),
            reply_to: "anna@example.ch".into(),
            subject: "[Forwarded] Hi".into(),
            html_body: "<p>Hi</p>".into(),
            text_body: "Hi".into(),
        }
    }

    #[test]
    fn test_send_request_shape() {
        let send = SendRequest::from(&request());
        assert_eq!(send.to, vec!["owner@example.de".to_string()]);
        assert_eq!(send.reply_to, vec!["anna@example.ch".to_string()]);
        let json = serde_json::to_value(&send).unwrap();
        assert_eq!(json["htmlBody"], "<p>Hi</p>");
        assert_eq!(json["replyTo"][0], "anna@example.ch");
    }

    #[test]
    fn test_deliver_success() {
        let result = deliver(&Fixed(Ok("relay-1")), &request(), "orig-1", Lang::En);
        assert!(result.success);
        assert_eq!(result.relay_message_id.as_deref(), Some("relay-1"));
        assert_eq!(result.forwarded_to.as_deref(), Some("owner@example.de"));
        assert_eq!(result.original_message_id, "orig-1");
    }

    #[test]
    fn test_deliver_failure_is_not_fatal() {
        let result = deliver(&Fixed(Err("connection refused")), &request(), "orig-2", Lang::De);
        assert!(!result.success);
        assert_eq!(result.original_message_id, "orig-2");
        assert!(result.error.as_deref().unwrap().contains("connection refused"));
        assert!(result.note.is_some());
        assert_eq!(result.relay_message_id, None);
    }
}
