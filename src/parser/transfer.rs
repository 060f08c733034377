//! Body transfer decoding: quoted-printable, base64, and charset conversion.
//!
//! Every decoder here works in two phases: collect raw bytes first, then
//! turn the whole byte sequence into text once. Mail clients happily split
//! a multi-byte UTF-8 character across two `=XX` escapes (or two base64
//! quads), so decoding escape-by-escape would corrupt it.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::error::{Anomaly, DecodeFailure, Decoded};

/// Standard alphabet, padding optional. Real-world senders drop `=` padding
/// in encoded-words often enough that strict decoding loses text.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Transfer encodings the decoder dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    QuotedPrintable,
    Base64,
    /// `7bit`, `8bit`, `binary`, or anything unknown.
    Identity,
}

impl TransferEncoding {
    /// Classify a `Content-Transfer-Encoding` value (case-insensitive, substring match).
    pub fn from_header(value: &str) -> Self {
        let lower = value.to_ascii_lowercase();
        if lower.contains("quoted-printable") {
            Self::QuotedPrintable
        } else if lower.contains("base64") {
            Self::Base64
        } else {
            Self::Identity
        }
    }
}

/// Decode a message body according to its transfer encoding and charset.
///
/// Works on the body's own bytes, so 8bit text and escapes reach the
/// charset decoder untouched. Never fails: undecodable input degrades to
/// literal or lossy text and is reported as an anomaly.
pub fn decode_body(body: &[u8], encoding: TransferEncoding, charset: Option<&str>) -> Decoded<String> {
    match encoding {
        TransferEncoding::QuotedPrintable => decode_quoted_printable_bytes(body, charset),
        TransferEncoding::Base64 => decode_base64_body(body, charset),
        TransferEncoding::Identity => decode_identity_body(body, charset),
    }
}

/// Decode quoted-printable text whose payload is UTF-8.
///
/// `"Stra=C3=9Fe"` → `"Straße"`. Soft line breaks (`=` at end of line)
/// vanish. If the collected bytes are not valid UTF-8, each `=XX` is
/// replaced by the code point `U+00XX` instead.
pub fn decode_quoted_printable(input: &str) -> Decoded<String> {
    decode_quoted_printable_bytes(input.as_bytes(), None)
}

fn decode_quoted_printable_bytes(input: &[u8], charset: Option<&str>) -> Decoded<String> {
    let mut anomalies = Vec::new();
    let unwrapped = strip_soft_breaks(input);
    let (bytes, invalid_escape) = collect_qp_bytes(&unwrapped);
    if let Some(at) = invalid_escape {
        anomalies.push(Anomaly::encoding(
            DecodeFailure::InvalidHex,
            &String::from_utf8_lossy(&unwrapped[at..]),
        ));
    }

    match decode_charset(charset, &bytes) {
        Ok(text) => Decoded::with_anomalies(text, anomalies),
        Err(kind) => {
            let literal = String::from_utf8_lossy(&unwrapped);
            anomalies.push(Anomaly::encoding(kind, &literal));
            Decoded::with_anomalies(substitute_escapes(&literal), anomalies)
        }
    }
}

fn decode_identity_body(body: &[u8], charset: Option<&str>) -> Decoded<String> {
    match decode_charset(charset, body) {
        Ok(text) => Decoded::clean(text),
        Err(kind) => {
            let text = decode_lossy(charset, body);
            let anomaly = Anomaly::encoding(kind, &text);
            Decoded::with_anomalies(text, vec![anomaly])
        }
    }
}

/// Remove quoted-printable soft line breaks (`=` directly before LF or CRLF).
fn strip_soft_breaks(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'=' {
            let rest = &input[i + 1..];
            if rest.starts_with(b"\n") {
                i += 2;
                continue;
            }
            if rest.starts_with(b"\r\n") {
                i += 3;
                continue;
            }
        }
        out.push(input[i]);
        i += 1;
    }
    out
}

/// Walk the input collecting bytes: `=XX` becomes one byte, anything else
/// is copied as is. A stray `=` is kept literally; the offset of
/// the first one is returned.
fn collect_qp_bytes(bytes: &[u8]) -> (Vec<u8>, Option<usize>) {
    let mut out = Vec::with_capacity(bytes.len());
    let mut first_invalid = None;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'=' {
            if let Some(byte) = hex_escape(bytes, i) {
                out.push(byte);
                i += 3;
                continue;
            }
            first_invalid.get_or_insert(i);
        }
        out.push(bytes[i]);
        i += 1;
    }
    (out, first_invalid)
}

/// Strict variant used by RFC 2047 Q-words: a stray `=` fails the word.
pub(crate) fn qp_bytes_strict(input: &str) -> Result<Vec<u8>, DecodeFailure> {
    match collect_qp_bytes(input.as_bytes()) {
        (bytes, None) => Ok(bytes),
        (_, Some(_)) => Err(DecodeFailure::InvalidHex),
    }
}

/// Lossy fallback: replace each `=XX` with the code point `U+00XX`.
fn substitute_escapes(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    let mut offset = 0;
    while let Some(pos) = rest.find('=') {
        out.push_str(&rest[..pos]);
        let at = offset + pos;
        match hex_escape(bytes, at) {
            Some(byte) => {
                out.push(char::from(byte));
                rest = &rest[pos + 3..];
                offset = at + 3;
            }
            None => {
                out.push('=');
                rest = &rest[pos + 1..];
                offset = at + 1;
            }
        }
    }
    out.push_str(rest);
    out
}

/// The byte encoded by `=XX` at `bytes[at]`, if both digits are hex.
fn hex_escape(bytes: &[u8], at: usize) -> Option<u8> {
    let hi = hex_value(*bytes.get(at + 1)?)?;
    let lo = hex_value(*bytes.get(at + 2)?)?;
    Some(hi << 4 | lo)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Decode base64, ignoring embedded whitespace and missing padding.
pub fn decode_base64(input: &str) -> Result<Vec<u8>, DecodeFailure> {
    let compact: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    LENIENT_BASE64
        .decode(compact.as_bytes())
        .map_err(|_| DecodeFailure::InvalidBase64)
}

fn decode_base64_body(body: &[u8], charset: Option<&str>) -> Decoded<String> {
    let text = String::from_utf8_lossy(body);
    let bytes = match decode_base64(&text) {
        Ok(bytes) => bytes,
        Err(kind) => {
            let anomaly = Anomaly::encoding(kind, &text);
            return Decoded::with_anomalies(text.into_owned(), vec![anomaly]);
        }
    };
    match decode_charset(charset, &bytes) {
        Ok(decoded) => Decoded::clean(decoded),
        Err(kind) => Decoded::with_anomalies(
            decode_lossy(charset, &bytes),
            vec![Anomaly::encoding(kind, &text)],
        ),
    }
}

/// Turn bytes into text using a named charset (UTF-8 when absent or unknown).
///
/// Malformed input is an error, never replacement characters, so callers
/// can pick their own fallback.
pub fn decode_charset(charset: Option<&str>, bytes: &[u8]) -> Result<String, DecodeFailure> {
    let encoding = lookup_encoding(charset);
    if encoding == encoding_rs::UTF_8 {
        return String::from_utf8(bytes.to_vec()).map_err(|_| DecodeFailure::InvalidUtf8);
    }
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or(DecodeFailure::InvalidCharset)
}

/// Like [`decode_charset`], but malformed sequences become U+FFFD.
pub fn decode_lossy(charset: Option<&str>, bytes: &[u8]) -> String {
    let (text, _) = lookup_encoding(charset).decode_without_bom_handling(bytes);
    text.into_owned()
}

/// The decoder for a charset label; UTF-8 when absent or unknown.
fn lookup_encoding(charset: Option<&str>) -> &'static encoding_rs::Encoding {
    let label = charset
        .map(|c| c.trim().trim_matches('"'))
        // RFC 2231 language suffix: "UTF-8*de"
        .map(|c| c.split('*').next().unwrap_or(c))
        .unwrap_or("utf-8");

    if label.eq_ignore_ascii_case("utf-8")
        || label.eq_ignore_ascii_case("utf8")
        || label.eq_ignore_ascii_case("us-ascii")
    {
        return encoding_rs::UTF_8;
    }

    encoding_rs::Encoding::for_label(label.as_bytes()).unwrap_or_else(|| {
        tracing::debug!(charset = label, "Unknown charset, trying UTF-8");
        encoding_rs::UTF_8
    })
}

/// Extract the `charset` parameter from a `Content-Type` value.
pub fn content_type_charset(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
            .filter(|v| !v.is_empty())
    })
}
