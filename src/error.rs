//! Centralized error types for mailfwd.
//!
//! Two families live here: [`ForwardError`] terminates an invocation, while
//! [`Anomaly`] is recovered locally and only reported alongside the
//! best-effort value (see [`Decoded`]).

use std::fmt;

use thiserror::Error;

/// All errors that end a forwarding invocation early.
#[derive(Error, Debug)]
pub enum ForwardError {
    /// The stored message does not exist.
    #[error("Message not found in storage: {bucket}/{key}")]
    BlobNotFound { bucket: String, key: String },

    /// The stored message exists but could not be read.
    #[error("Could not fetch {bucket}/{key}: {reason}")]
    BlobFetch {
        bucket: String,
        key: String,
        reason: String,
    },

    /// The trigger event could not be understood.
    #[error("Invalid trigger event: {0}")]
    InvalidEvent(String),

    /// The object key cannot be resolved to a readable location.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Convenience alias for `Result<T, ForwardError>`.
pub type Result<T> = std::result::Result<T, ForwardError>;

impl ForwardError {
    /// Whether this error came from the blob store.
    pub fn is_blob_fetch(&self) -> bool {
        matches!(
            self,
            Self::BlobNotFound { .. } | Self::BlobFetch { .. } | Self::InvalidPath(_)
        )
    }
}

/// Why a piece of encoded text could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailure {
    InvalidBase64,
    InvalidHex,
    InvalidUtf8,
    /// Bytes were not valid in the declared (non-UTF-8) charset.
    InvalidCharset,
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidBase64 => "invalid base64",
            Self::InvalidHex => "invalid hex escape",
            Self::InvalidUtf8 => "invalid UTF-8",
            Self::InvalidCharset => "malformed charset bytes",
        })
    }
}

/// A non-fatal problem found while decoding a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// A header line was skipped.
    #[error("Skipped malformed header line: {line:?}")]
    HeaderParse { line: String },

    /// Encoded text was kept literal (or decoded lossily).
    #[error("{kind} in {input:?}, kept best-effort text")]
    EncodingDecode { kind: DecodeFailure, input: String },
}

impl Anomaly {
    pub(crate) fn header(line: &str) -> Self {
        Self::HeaderParse {
            line: line.to_string(),
        }
    }

    pub(crate) fn encoding(kind: DecodeFailure, input: &str) -> Self {
        // Keep log lines readable for large bodies
        let input: String = input.chars().take(80).collect();
        Self::EncodingDecode { kind, input }
    }
}

/// A best-effort decoded value together with the anomalies hit on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<T> {
    pub value: T,
    pub anomalies: Vec<Anomaly>,
}

impl<T> Decoded<T> {
    /// A value decoded without any anomaly.
    pub fn clean(value: T) -> Self {
        Self {
            value,
            anomalies: Vec::new(),
        }
    }

    pub fn with_anomalies(value: T, anomalies: Vec<Anomaly>) -> Self {
        Self { value, anomalies }
    }

    /// Move this value's anomalies into `sink` and return the bare value.
    pub fn collect_into(self, sink: &mut Vec<Anomaly>) -> T {
        sink.extend(self.anomalies);
        self.value
    }

    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anomaly_input_is_truncated() {
        let long = "x".repeat(500);
        match Anomaly::encoding(DecodeFailure::InvalidHex, &long) {
            Anomaly::EncodingDecode { input, .. } => assert_eq!(input.len(), 80),
            other => panic!("unexpected anomaly: {other:?}"),
        }
    }

    #[test]
    fn test_collect_into_moves_anomalies() {
        let decoded = Decoded::with_anomalies(7, vec![Anomaly::header("bogus")]);
        let mut sink = Vec::new();
        assert_eq!(decoded.collect_into(&mut sink), 7);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_blob_errors_are_classified() {
        let err = ForwardError::BlobNotFound {
            bucket: "b".into(),
            key: "k".into(),
        };
        assert!(err.is_blob_fetch());
        assert!(ForwardError::InvalidPath("inbound/../secret".into()).is_blob_fetch());
        assert!(!ForwardError::InvalidEvent("x".into()).is_blob_fetch());
    }
}
