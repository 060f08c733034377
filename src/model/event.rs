//! Trigger events consumed from the inbound receiver and the result emitted per invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ForwardError, Result};

use super::address::Address;

/// Where the raw message bytes live in object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// One inbound message notification, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub message_id: String,
    /// Envelope sender, collapsed to its primary address.
    pub source: Address,
    /// Envelope recipient, collapsed to its primary address.
    pub destination: Address,
    /// Raw timestamp as sent by the receiver.
    pub timestamp: Option<String>,
    /// Explicit storage location, when the receiver reported one.
    pub location: Option<ObjectLocation>,
}

impl TriggerEvent {
    pub fn source_address(&self) -> &str {
        self.source.primary()
    }

    pub fn destination_address(&self) -> &str {
        self.destination.primary()
    }

    /// The receive time, if the timestamp is RFC 3339.
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        let ts = self.timestamp.as_deref()?;
        DateTime::parse_from_rfc3339(ts.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Resolve the object location, deriving `{prefix}{message_id}` in the
    /// default bucket when the receiver did not report one.
    pub fn object_location(&self, default_bucket: &str, key_prefix: &str) -> ObjectLocation {
        self.location.clone().unwrap_or_else(|| ObjectLocation {
            bucket: default_bucket.to_string(),
            key: format!("{key_prefix}{}", self.message_id),
        })
    }
}

// ── Wire formats ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SesNotification {
    #[serde(rename = "Records", default)]
    records: Vec<SesRecord>,
}

#[derive(Debug, Deserialize)]
struct SesRecord {
    ses: Option<SesPayload>,
}

#[derive(Debug, Deserialize)]
struct SesPayload {
    mail: SesMail,
    #[serde(default)]
    receipt: SesReceipt,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SesMail {
    message_id: String,
    #[serde(default)]
    source: Address,
    #[serde(default)]
    destination: Address,
    timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SesReceipt {
    action: Option<SesAction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SesAction {
    #[serde(rename = "type")]
    kind: String,
    bucket_name: Option<String>,
    object_key: Option<String>,
    s3_action: Option<S3Action>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S3Action {
    bucket_name: String,
    object_key: String,
}

impl SesAction {
    fn location(self) -> Option<ObjectLocation> {
        if !self.kind.eq_ignore_ascii_case("s3") {
            return None;
        }
        if let Some(s3) = self.s3_action {
            return Some(ObjectLocation {
                bucket: s3.bucket_name,
                key: s3.object_key,
            });
        }
        match (self.bucket_name, self.object_key) {
            (Some(bucket), Some(key)) => Some(ObjectLocation { bucket, key }),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatTrigger {
    message_id: String,
    #[serde(default, alias = "source")]
    source_address: Address,
    #[serde(default, alias = "destination")]
    destination_address: Address,
    timestamp: Option<String>,
    bucket: Option<String>,
    key: Option<String>,
}

/// Parse a trigger notification.
///
/// Accepts an SES-style `{"Records": [{"ses": ...}]}` envelope or a flat
/// `{"messageId", "source", "destination", "timestamp"}` object. Returns
/// `Ok(None)` when the envelope carries no mail record.
pub fn parse_event(json: &str) -> Result<Option<TriggerEvent>> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| ForwardError::InvalidEvent(e.to_string()))?;

    if value.get("Records").is_some() {
        let notification: SesNotification = serde_json::from_value(value)
            .map_err(|e| ForwardError::InvalidEvent(e.to_string()))?;
        let Some(payload) = notification.records.into_iter().find_map(|r| r.ses) else {
            return Ok(None);
        };
        let location = payload.receipt.action.and_then(SesAction::location);
        return Ok(Some(TriggerEvent {
            message_id: payload.mail.message_id,
            source: payload.mail.source.into_single(),
            destination: payload.mail.destination.into_single(),
            timestamp: payload.mail.timestamp,
            location,
        }));
    }

    let flat: FlatTrigger =
        serde_json::from_value(value).map_err(|e| ForwardError::InvalidEvent(e.to_string()))?;
    let location = match (flat.bucket, flat.key) {
        (Some(bucket), Some(key)) => Some(ObjectLocation { bucket, key }),
        _ => None,
    };
    Ok(Some(TriggerEvent {
        message_id: flat.message_id,
        source: flat.source_address.into_single(),
        destination: flat.destination_address.into_single(),
        timestamp: flat.timestamp,
        location,
    }))
}

/// Outcome of one invocation, emitted for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_message_id: Option<String>,
    pub original_message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forwarded_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ForwardResult {
    pub fn delivered(
        original_message_id: impl Into<String>,
        relay_message_id: impl Into<String>,
        forwarded_to: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            relay_message_id: Some(relay_message_id.into()),
            original_message_id: original_message_id.into(),
            forwarded_to: Some(forwarded_to.into()),
            error: None,
            note: None,
        }
    }

    pub fn failed(
        original_message_id: impl Into<String>,
        error: impl Into<String>,
        note: Option<String>,
    ) -> Self {
        Self {
            success: false,
            relay_message_id: None,
            original_message_id: original_message_id.into(),
            forwarded_to: None,
            error: Some(error.into()),
            note,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SES_EVENT: &str = r#"{
        "Records": [{
            "eventSource": "aws:ses",
            "ses": {
                "mail": {
                    "messageId": "o3vrnil0e2ic28trm7dfhrc2v0clambda4nbp0g1",
                    "source": "anna@example.de",
                    "destination": ["mail@example.ch", "other@example.ch"],
                    "timestamp": "2024-05-02T08:15:00.000Z"
                },
                "receipt": {
                    "action": {
                        "type": "S3",
                        "s3Action": { "bucketName": "inbound-mail", "objectKey": "emails/o3vr" }
                    }
                }
            }
        }]
    }"#;

    #[test]
    fn test_parse_ses_event() {
        let event = parse_event(SES_EVENT).unwrap().unwrap();
        assert_eq!(event.message_id, "o3vrnil0e2ic28trm7dfhrc2v0clambda4nbp0g1");
        assert_eq!(event.source_address(), "anna@example.de");
        assert_eq!(event.destination_address(), "mail@example.ch");
        assert_eq!(event.destination, Address::Single("mail@example.ch".into()));
        assert_eq!(
            event.location,
            Some(ObjectLocation {
                bucket: "inbound-mail".into(),
                key: "emails/o3vr".into()
            })
        );
        assert!(event.received_at().is_some());
    }

    #[test]
    fn test_flat_s3_action_fields() {
        let json = r#"{"Records":[{"ses":{"mail":{"messageId":"m1","source":"a@b.ch","destination":"c@d.ch"},
            "receipt":{"action":{"type":"S3","bucketName":"bk","objectKey":"in/m1"}}}}]}"#;
        let event = parse_event(json).unwrap().unwrap();
        assert_eq!(event.location.unwrap().key, "in/m1");
    }

    #[test]
    fn test_lambda_action_derives_location() {
        let json = r#"{"Records":[{"ses":{"mail":{"messageId":"m2","source":"a@b.ch","destination":"c@d.ch"},
            "receipt":{"action":{"type":"Lambda"}}}}]}"#;
        let event = parse_event(json).unwrap().unwrap();
        assert_eq!(event.location, None);
        let loc = event.object_location("mail-store", "emails/");
        assert_eq!(loc.bucket, "mail-store");
        assert_eq!(loc.key, "emails/m2");
    }

    #[test]
    fn test_records_without_ses_are_ignored() {
        assert_eq!(parse_event(r#"{"Records": []}"#).unwrap(), None);
        assert_eq!(parse_event(r#"{"Records": [{"s3": {}}]}"#).unwrap(), None);
    }

    #[test]
    fn test_parse_flat_trigger() {
        let json = r#"{"messageId":"abc","sourceAddress":["x@y.ch"],"destinationAddress":"z@y.ch","timestamp":"not a date"}"#;
        let event = parse_event(json).unwrap().unwrap();
        assert_eq!(event.source_address(), "x@y.ch");
        assert_eq!(event.received_at(), None);
    }

    #[test]
    fn test_invalid_event_is_an_error() {
        assert!(matches!(
            parse_event("{not json"),
            Err(ForwardError::InvalidEvent(_))
        ));
        assert!(matches!(
            parse_event(r#"{"source": "a@b.ch"}"#),
            Err(ForwardError::InvalidEvent(_))
        ));
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = ForwardResult::failed("m1", "relay down", None);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["originalMessageId"], "m1");
        assert_eq!(json["error"], "relay down");
        assert!(json.get("relayMessageId").is_none());
    }
}
