//! SMTP relay built on `lettre`.

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::debug;
use uuid::Uuid;

use crate::config::{RelayConfig, RelaySecurity};

use super::{Relay, RelayError, SendRequest};

/// Sends forwarded messages through an SMTP server.
pub struct SmtpRelay {
    transport: SmtpTransport,
}

impl SmtpRelay {
    /// Build the transport described by `config`. No connection is made yet.
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let builder = match config.security {
            RelaySecurity::Tls => SmtpTransport::relay(&config.host),
            RelaySecurity::Starttls => SmtpTransport::starttls_relay(&config.host),
            RelaySecurity::None => Ok(SmtpTransport::builder_dangerous(&config.host)),
        }
        .map_err(|e| RelayError::Build(format!("SMTP relay error: {e}")))?
        .port(config.port);

        let builder = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => {
                builder.credentials(Credentials::new(user.clone(), pass.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
        })
    }
}

impl Relay for SmtpRelay {
    fn send(&self, request: &SendRequest) -> Result<String, RelayError> {
        let message_id = new_message_id(&request.from);
        let email = build_message(request, &message_id)?;

        debug!(message_id = %message_id, "Submitting message to SMTP relay");
        self.transport.send(&email).map_err(|e| {
            if e.is_permanent() {
                RelayError::Rejected(e.to_string())
            } else {
                RelayError::Unreachable(e.to_string())
            }
        })?;

        Ok(message_id)
    }
}

/// `<uuid@domain>` using the sender's domain.
fn new_message_id(from: &str) -> String {
    let domain = from
        .rsplit_once('@')
        .map(|(_, d)| d.trim_end_matches('>').trim())
        .filter(|d| !d.is_empty())
        .unwrap_or("localhost");
    format!("<{}@{domain}>", Uuid::new_v4())
}

fn mailbox(address: &str) -> Result<Mailbox, RelayError> {
    address
        .trim()
        .parse()
        .map_err(|e: lettre::address::AddressError| RelayError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

/// Assemble the multipart/alternative message for `request`.
pub fn build_message(request: &SendRequest, message_id: &str) -> Result<Message, RelayError> {
    let mut builder = Message::builder()
        .from(mailbox(&request.from)?)
        .subject(request.subject.as_str())
        .message_id(Some(message_id.to_string()));
    for to in &request.to {
        builder = builder.to(mailbox(to)?);
    }
    // An unusable reply address is dropped rather than failing the send.
    for reply_to in &request.reply_to {
        match mailbox(reply_to) {
            Ok(mb) => builder = builder.reply_to(mb),
            Err(e) => debug!(error = %e, "Skipping Reply-To"),
        }
    }

    builder
        .multipart(MultiPart::alternative_plain_html(
            request.text_body.clone(),
            request.html_body.clone(),
        ))
        .map_err(|e| RelayError::Build(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SendRequest {
        SendRequest {
            from: "mail@example.ch".into(),
            to: vec!["owner@example.de".into()],
            subject: "[Forwarded] Hallo".into(),
            html_body: "<p>Hallo</p>".into(),
            text_body: "Hallo".into(),
            reply_to: vec!["anna@example.ch".into()],
        }
    }

    #[test]
    fn test_build_message_headers() {
        let email = build_message(&request(), "<abc@example.ch>").unwrap();
        let formatted = String::from_utf8(email.formatted()).unwrap();
        assert!(formatted.contains("From: mail@example.ch"));
        assert!(formatted.contains("To: owner@example.de"));
        assert!(formatted.contains("Reply-To: anna@example.ch"));
        assert!(formatted.contains("Message-ID: <abc@example.ch>"));
        assert!(formatted.contains("multipart/alternative"));
        assert!(formatted.contains("text/html"));
    }

    #[test]
    fn test_invalid_reply_to_is_skipped() {
        let mut req = request();
        req.reply_to = vec!["not an address".into()];
        let email = build_message(&req, "<abc@example.ch>").unwrap();
        let formatted = String::from_utf8(email.formatted()).unwrap();
        assert!(!formatted.contains("Reply-To"));
    }

    #[test]
    fn test_invalid_recipient_fails() {
        let mut req = request();
        req.to = vec!["nobody".into()];
        assert!(matches!(
            build_message(&req, "<abc@example.ch>"),
            Err(RelayError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_message_id_uses_sender_domain() {
        let id = new_message_id("Mail <mail@example.ch>");
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@example.ch>"));
        assert!(new_message_id("broken").ends_with("@localhost>"));
    }

    #[test]
    fn test_relay_builds_without_connecting() {
        let config = RelayConfig {
            security: RelaySecurity::None,
            port: 2525,
            ..RelayConfig::default()
        };
        assert!(SmtpRelay::new(&config).is_ok());
    }
}
