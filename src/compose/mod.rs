//! Forward composer: turns a decoded message into the request sent through the relay.

pub mod html;
pub mod text;

use std::borrow::Cow;

use chrono::{DateTime, Utc};

use crate::i18n::Lang;
use crate::model::address::EmailAddress;
use crate::model::event::TriggerEvent;
use crate::model::mail::{DecodedMessage, ForwardRequest, RawMessage};

pub use html::escape_html;

/// Who sends the forwarded copy, where it goes, and how it is labelled.
#[derive(Debug, Clone)]
pub struct ForwardSettings {
    /// Verified sender address the relay sends as.
    pub from_address: String,
    /// Mailbox receiving the forwarded copy.
    pub forward_to: String,
    pub lang: Lang,
    /// Overrides the localized subject marker (e.g. `"[Fwd]"`).
    pub subject_marker: Option<String>,
}

impl ForwardSettings {
    fn marker(&self) -> &str {
        self.subject_marker
            .as_deref()
            .unwrap_or_else(|| self.lang.forwarded_marker())
    }
}

/// Envelope data reported by the inbound receiver.
#[derive(Debug, Clone, Default)]
pub struct Envelope<'a> {
    pub source: &'a str,
    pub destination: &'a str,
    pub received_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a TriggerEvent> for Envelope<'a> {
    fn from(event: &'a TriggerEvent) -> Self {
        Self {
            source: event.source_address(),
            destination: event.destination_address(),
            received_at: event.received_at(),
        }
    }
}

/// Display values shared by the HTML and text renderings, placeholders applied.
pub(crate) struct ForwardView<'a> {
    pub(crate) lang: Lang,
    pub(crate) from: String,
    pub(crate) to: String,
    pub(crate) date: String,
    pub(crate) subject: String,
    pub(crate) body: &'a str,
    pub(crate) raw: Cow<'a, str>,
}

impl<'a> ForwardView<'a> {
    fn new(
        message: &'a DecodedMessage,
        raw: &'a RawMessage,
        envelope: &Envelope<'_>,
        lang: Lang,
    ) -> Self {
        let or = |value: &str, fallback: &str| {
            if value.trim().is_empty() {
                fallback.to_string()
            } else {
                value.to_string()
            }
        };
        let date = if message.date.trim().is_empty() {
            envelope.received_at.unwrap_or_else(Utc::now).to_rfc2822()
        } else {
            message.date.clone()
        };

        Self {
            lang,
            from: or(&message.from, lang.unknown_sender()),
            to: or(&message.to, envelope.destination),
            date,
            subject: or(&message.subject, lang.no_subject()),
            body: &message.body_text,
            raw: String::from_utf8_lossy(&raw.bytes),
        }
    }
}

/// Build the outbound request for one decoded message.
pub fn compose(
    message: &DecodedMessage,
    raw: &RawMessage,
    envelope: &Envelope<'_>,
    settings: &ForwardSettings,
) -> ForwardRequest {
    let view = ForwardView::new(message, raw, envelope, settings.lang);

    ForwardRequest {
        source_address: settings.from_address.clone(),
        destination_address: settings.forward_to.clone(),
        reply_to: reply_to(message, envelope),
        subject: forwarded_subject(message, settings),
        html_body: html::render(&view),
        text_body: text::render(&view),
    }
}

/// `"{marker} {subject}"`, or `"{marker} Email from {from}"` without a subject.
pub fn forwarded_subject(message: &DecodedMessage, settings: &ForwardSettings) -> String {
    let marker = settings.marker();
    let subject = message.subject.trim();
    if subject.is_empty() {
        let from = if message.from.is_empty() {
            settings.lang.unknown_sender()
        } else {
            message.from.as_str()
        };
        format!("{marker} {} {from}", settings.lang.message_from())
    } else {
        format!("{marker} {subject}")
    }
}

/// The decoded sender when it is a usable address, else the envelope source.
pub fn reply_to(message: &DecodedMessage, envelope: &Envelope<'_>) -> String {
    if EmailAddress::parse(&message.from).is_routable() {
        message.from.clone()
    } else {
        envelope.source.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(lang: Lang) -> ForwardSettings {
        ForwardSettings {
            from_address: "mail@example.ch".into(),
            forward_to: "owner@example.de".into(),
            lang,
            subject_marker: None,
        }
    }

    fn envelope() -> Envelope<'static> {
        Envelope {
            source: "bounce@sender.example",
            destination: "mail@example.ch",
            received_at: None,
        }
    }

    fn message() -> DecodedMessage {
        DecodedMessage {
            subject: "Grüße aus Zürich".into(),
            from: "anna@example.ch".into(),
            to: "mail@example.ch".into(),
            date: "Thu, 2 May 2024 10:00:00 +0200".into(),
            body_text: "Hallo <Team> & Co.\n\nVG Anna".into(),
        }
    }

    #[test]
    fn test_subject_is_prefixed() {
        assert_eq!(
            forwarded_subject(&message(), &settings(Lang::De)),
            "[Weitergeleitet] Grüße aus Zürich"
        );
    }

    #[test]
    fn test_empty_subject_uses_sender() {
        let msg = DecodedMessage {
            subject: "  ".into(),
            ..message()
        };
        assert_eq!(
            forwarded_subject(&msg, &settings(Lang::En)),
            "[Forwarded] Email from anna@example.ch"
        );
    }

    #[test]
    fn test_custom_marker() {
        let mut s = settings(Lang::En);
        s.subject_marker = Some("[Fwd]".into());
        assert_eq!(forwarded_subject(&message(), &s), "[Fwd] Grüße aus Zürich");
    }

    #[test]
    fn test_reply_to_falls_back_to_envelope() {
        let env = envelope();
        assert_eq!(reply_to(&message(), &env), "anna@example.ch");
        let anonymous = DecodedMessage {
            from: String::new(),
            ..message()
        };
        assert_eq!(reply_to(&anonymous, &env), "bounce@sender.example");
        let broken = DecodedMessage {
            from: "undisclosed".into(),
            ..message()
        };
        assert_eq!(reply_to(&broken, &env), "bounce@sender.example");
    }

    #[test]
    fn test_compose_renders_both_bodies() {
        let raw = RawMessage::new("m1", "Subject: x\n\nHallo <Team> & Co.");
        let request = compose(&message(), &raw, &envelope(), &settings(Lang::En));

        assert_eq!(request.source_address, "mail@example.ch");
        assert_eq!(request.destination_address, "owner@example.de");

        assert!(request.html_body.contains("Hallo &lt;Team&gt; &amp; Co."));
        assert!(request.html_body.contains("<details class=\"technical-details\">"));
        assert!(request.html_body.contains("Subject: x"));
        assert!(!request.html_body.contains("<Team>"));

        assert!(request.text_body.contains("FORWARDED EMAIL"));
        assert!(request.text_body.contains("From:    anna@example.ch"));
        assert!(request.text_body.contains("Hallo <Team> & Co.\n\nVG Anna"));
    }

    #[test]
    fn test_placeholders_for_missing_headers() {
        let raw = RawMessage::new("m2", "\nbody");
        let msg = DecodedMessage {
            body_text: "body".into(),
            ..DecodedMessage::default()
        };
        let env = Envelope {
            received_at: DateTime::parse_from_rfc3339("2024-05-02T08:15:00Z")
                .ok()
                .map(|d| d.with_timezone(&Utc)),
            ..envelope()
        };
        let request = compose(&msg, &raw, &env, &settings(Lang::De));

        assert!(request.text_body.contains("Von:     unbekannt"));
        assert!(request.text_body.contains("An:      mail@example.ch"));
        assert!(request.text_body.contains("2 May 2024 08:15:00 +0000"));
        assert!(request.text_body.contains("Betreff: (Kein Betreff)"));
        assert_eq!(request.subject, "[Weitergeleitet] E-Mail von unbekannt");
        assert_eq!(request.reply_to, "bounce@sender.example");
    }
}
