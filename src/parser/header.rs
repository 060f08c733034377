//! RFC 5322 header parsing: folding, encoded-words (RFC 2047), and field extraction.

use crate::error::{Anomaly, DecodeFailure, Decoded};
use crate::model::address::EmailAddress;
use crate::model::mail::{HeaderField, HeaderName, ParsedHeaders};

use super::transfer;

/// A message split at its first blank line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unfolded {
    /// Every well-formed header field, in order, continuation lines merged.
    pub fields: Vec<HeaderField>,
    /// Everything after the blank line, LF-separated.
    pub body: String,
}

const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Split raw message bytes at the first blank line into the header block
/// and the body. A message without a blank line is all header.
pub fn split_message(bytes: &[u8]) -> (&[u8], &[u8]) {
    let mut start = 0;
    while start < bytes.len() {
        let end = bytes[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(bytes.len(), |i| start + i);
        if bytes[start..end].iter().all(u8::is_ascii_whitespace) {
            let body_start = (end + 1).min(bytes.len());
            return (&bytes[..start], &bytes[body_start..]);
        }
        start = end + 1;
    }
    (bytes, &[])
}

/// Decode one run of header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every
/// byte) and reports the fallback.
pub fn decode_text_bytes(bytes: &[u8]) -> Decoded<String> {
    let bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => Decoded::clean(s.to_string()),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            let text = decoded.into_owned();
            let anomaly = Anomaly::encoding(DecodeFailure::InvalidUtf8, &text);
            Decoded::with_anomalies(text, vec![anomaly])
        }
    }
}

/// Decode a header block line by line, so one stray byte only affects
/// the line it sits on.
pub fn decode_header_block(bytes: &[u8]) -> Decoded<String> {
    let bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
    let mut anomalies = Vec::new();
    let lines: Vec<String> = bytes
        .split(|&b| b == b'\n')
        .map(|line| decode_text_bytes(line).collect_into(&mut anomalies))
        .collect();
    Decoded::with_anomalies(lines.join("\n"), anomalies)
}

/// Split a message into header fields and body, joining continuation lines
/// (starting with space or tab) onto the previous field with one space.
///
/// A message without a blank line is all headers. Lines that are neither a
/// field nor a continuation are skipped and reported.
pub fn unfold(text: &str) -> Decoded<Unfolded> {
    let mut fields: Vec<(String, String)> = Vec::new();
    let mut anomalies = Vec::new();
    let mut lines = text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

    for line in lines.by_ref() {
        if line.trim().is_empty() {
            break;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            match fields.last_mut() {
                Some((_, value)) => {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(line.trim());
                }
                None => anomalies.push(Anomaly::header(line)),
            }
        } else if let Some((name, value)) = split_field(line) {
            fields.push((name.to_string(), value.trim().to_string()));
        } else {
            anomalies.push(Anomaly::header(line));
        }
    }

    let body = lines.collect::<Vec<_>>().join("\n");
    let fields = fields
        .into_iter()
        .map(|(name, value)| HeaderField::new(name, value))
        .collect();

    Decoded::with_anomalies(Unfolded { fields, body }, anomalies)
}

/// Split `Name: value`, requiring a valid RFC 5322 field name
/// (printable ASCII, no spaces, no colon).
fn split_field(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    // Obsolete syntax allows whitespace before the colon
    let name = name.trim_end();
    let valid = !name.is_empty() && name.bytes().all(|b| (33..=126).contains(&b));
    valid.then_some((name, value))
}

/// Unfold a header block and decode the recognized fields.
pub fn extract_headers(text: &str) -> Decoded<ParsedHeaders> {
    let mut anomalies = Vec::new();
    let unfolded = unfold(text).collect_into(&mut anomalies);
    let headers = decode_fields(unfolded.fields).collect_into(&mut anomalies);
    Decoded::with_anomalies(headers, anomalies)
}

/// Keep the first occurrence of each recognized field and resolve its
/// encoded-words.
pub fn decode_fields(fields: Vec<HeaderField>) -> Decoded<ParsedHeaders> {
    let mut headers = ParsedHeaders::from_fields(fields);
    let mut anomalies = Vec::new();

    for name in HeaderName::ALL {
        if let Some(field) = headers.field_mut(name) {
            field.value = decode_encoded_words(&field.raw_value).collect_into(&mut anomalies);
        }
    }

    Decoded::with_anomalies(headers, anomalies)
}

/// The bare sender address from a decoded `From:` value.
///
/// `"Anna Muster <anna@example.ch>"` → `"anna@example.ch"`. Values without
/// angle brackets are returned trimmed.
pub fn sender_address(headers: &ParsedHeaders) -> String {
    headers
        .get(HeaderName::From)
        .map(|from| EmailAddress::parse(from).address)
        .unwrap_or_default()
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Whitespace between two adjacent encoded-words is dropped (RFC 2047 §6.2).
/// A word that fails to decode is kept verbatim and reported; the rest of
/// the value still decodes.
pub fn decode_encoded_words(input: &str) -> Decoded<String> {
    let mut result = String::with_capacity(input.len());
    let mut anomalies = Vec::new();
    let mut run = WordRun::default();
    let mut remaining = input;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        let after_start = &remaining[start + 2..];

        let Some(word) = EncodedWord::parse(after_start) else {
            run.flush(&mut result, &mut anomalies);
            result.push_str(before);
            result.push_str("=?");
            remaining = after_start;
            continue;
        };

        let token = &remaining[start..start + 2 + word.consumed];
        if run.is_empty() || !before.trim().is_empty() {
            run.flush(&mut result, &mut anomalies);
            result.push_str(before);
        }
        remaining = &remaining[start + 2 + word.consumed..];
        run.push(before, token, word);
    }

    run.flush(&mut result, &mut anomalies);
    result.push_str(remaining);
    Decoded::with_anomalies(result, anomalies)
}

/// Encoded-words separated only by whitespace, waiting to be decoded together.
///
/// Senders sometimes split one multi-byte character across two words, so
/// the run's bytes are joined before charset decoding when all words share
/// a charset.
#[derive(Default)]
struct WordRun<'a> {
    parts: Vec<RunPart<'a>>,
}

struct RunPart<'a> {
    /// Whitespace preceding this word (ignored for the first word).
    gap: &'a str,
    token: &'a str,
    word: EncodedWord<'a>,
}

impl<'a> WordRun<'a> {
    fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn push(&mut self, gap: &'a str, token: &'a str, word: EncodedWord<'a>) {
        self.parts.push(RunPart { gap, token, word });
    }

    fn flush(&mut self, out: &mut String, anomalies: &mut Vec<Anomaly>) {
        if self.parts.len() > 1 {
            if let Some(text) = self.decode_joined() {
                out.push_str(&text);
                self.parts.clear();
                return;
            }
        }

        let mut prev_ok = false;
        for (i, part) in self.parts.drain(..).enumerate() {
            let decoded = part.word.decode();
            if i > 0 && !(prev_ok && decoded.is_ok()) {
                out.push_str(part.gap);
            }
            match decoded {
                Ok(text) => {
                    out.push_str(&text);
                    prev_ok = true;
                }
                Err(kind) => {
                    anomalies.push(Anomaly::encoding(kind, part.token));
                    out.push_str(part.token);
                    prev_ok = false;
                }
            }
        }
    }

    fn decode_joined(&self) -> Option<String> {
        let charset = self.parts.first()?.word.charset;
        let mut bytes = Vec::new();
        for part in &self.parts {
            if !part.word.charset.eq_ignore_ascii_case(charset) {
                return None;
            }
            bytes.extend(part.word.bytes().ok()?);
        }
        transfer::decode_charset(Some(charset), &bytes).ok()
    }
}

struct EncodedWord<'a> {
    charset: &'a str,
    encoding: &'a str,
    text: &'a str,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

impl<'a> EncodedWord<'a> {
    /// Parse `charset?encoding?encoded_text?=`.
    fn parse(s: &'a str) -> Option<Self> {
        let first_q = s.find('?')?;
        let charset = &s[..first_q];
        if charset.is_empty() || charset.contains(char::is_whitespace) {
            return None;
        }

        let rest = &s[first_q + 1..];
        let second_q = rest.find('?')?;
        let encoding = &rest[..second_q];
        if !encoding.eq_ignore_ascii_case("b") && !encoding.eq_ignore_ascii_case("q") {
            return None;
        }

        let rest2 = &rest[second_q + 1..];
        let end = rest2.find("?=")?;

        Some(Self {
            charset,
            encoding,
            text: &rest2[..end],
            consumed: first_q + 1 + second_q + 1 + end + 2,
        })
    }

    /// Transfer-decode the payload. Q-encoding maps `_` to space first.
    fn bytes(&self) -> Result<Vec<u8>, DecodeFailure> {
        if self.encoding.eq_ignore_ascii_case("b") {
            transfer::decode_base64(self.text)
        } else {
            transfer::qp_bytes_strict(&self.text.replace('_', " "))
        }
    }

    fn decode(&self) -> Result<String, DecodeFailure> {
        transfer::decode_charset(Some(self.charset), &self.bytes()?)
    }
}
