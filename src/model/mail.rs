//! Core message types, from the stored bytes to the outbound forward request.

use std::collections::BTreeMap;

use serde::Serialize;

/// A message exactly as the inbound receiver stored it.
///
/// Owned by a single invocation and never written back anywhere.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Identifier assigned by the inbound receiver.
    pub id: String,
    /// Wire-format bytes (headers, blank line, body).
    pub bytes: Vec<u8>,
}

impl RawMessage {
    pub fn new(id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            bytes: bytes.into(),
        }
    }
}

/// The header fields the extractor keeps. Everything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeaderName {
    Subject,
    From,
    To,
    Date,
    ContentType,
    ContentTransferEncoding,
}

impl HeaderName {
    pub const ALL: [HeaderName; 6] = [
        Self::Subject,
        Self::From,
        Self::To,
        Self::Date,
        Self::ContentType,
        Self::ContentTransferEncoding,
    ];

    /// Match a field name case-insensitively.
    pub fn recognize(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|h| h.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Lowercase canonical field name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::From => "from",
            Self::To => "to",
            Self::Date => "date",
            Self::ContentType => "content-type",
            Self::ContentTransferEncoding => "content-transfer-encoding",
        }
    }
}

/// One logical header field after unfolding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    /// Field name as written in the message.
    pub name: String,
    /// Value with continuation lines merged. Never contains a line break.
    pub raw_value: String,
    /// Value with RFC 2047 encoded-words resolved. Equal to `raw_value`
    /// until the extractor decodes it.
    pub value: String,
}

impl HeaderField {
    pub fn new(name: impl Into<String>, raw_value: impl Into<String>) -> Self {
        let raw_value = raw_value.into();
        Self {
            name: name.into(),
            value: raw_value.clone(),
            raw_value,
        }
    }
}

/// Recognized headers of one message, first occurrence of each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedHeaders {
    fields: BTreeMap<HeaderName, HeaderField>,
}

impl ParsedHeaders {
    /// Fold a sequence of unfolded fields, keeping only recognized names.
    pub fn from_fields(fields: impl IntoIterator<Item = HeaderField>) -> Self {
        fields.into_iter().fold(Self::default(), |mut acc, field| {
            if let Some(name) = HeaderName::recognize(&field.name) {
                acc.fields.entry(name).or_insert(field);
            }
            acc
        })
    }

    pub fn field(&self, name: HeaderName) -> Option<&HeaderField> {
        self.fields.get(&name)
    }

    /// Decoded value of a recognized header.
    pub fn get(&self, name: HeaderName) -> Option<&str> {
        self.field(name).map(|f| f.value.as_str())
    }

    pub(crate) fn field_mut(&mut self, name: HeaderName) -> Option<&mut HeaderField> {
        self.fields.get_mut(&name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A message with every header and the body fully decoded to Unicode.
///
/// Missing headers are empty strings; placeholders are added at render time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodedMessage {
    pub subject: String,
    /// Bare sender address extracted from `From:`.
    pub from: String,
    pub to: String,
    pub date: String,
    pub body_text: String,
}

/// The outbound message handed to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRequest {
    /// Verified sender the relay sends as.
    pub source_address: String,
    /// Where the forwarded copy goes.
    pub destination_address: String,
    pub reply_to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognize_is_case_insensitive() {
        assert_eq!(HeaderName::recognize("SUBJECT"), Some(HeaderName::Subject));
        assert_eq!(
            HeaderName::recognize("Content-Transfer-Encoding"),
            Some(HeaderName::ContentTransferEncoding)
        );
        assert_eq!(HeaderName::recognize("X-Mailer"), None);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let headers = ParsedHeaders::from_fields([
            HeaderField::new("Subject", "first"),
            HeaderField::new("X-Spam", "ignored"),
            HeaderField::new("subject", "second"),
        ]);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get(HeaderName::Subject), Some("first"));
    }
}
