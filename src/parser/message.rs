//! Message decoder: raw stored bytes to a fully decoded message.

use tracing::debug;

use crate::error::Decoded;
use crate::model::mail::{DecodedMessage, HeaderName, RawMessage};

use super::header;
use super::transfer::{self, TransferEncoding};

/// Decode a stored message into readable headers and body text.
///
/// Never fails. Anything that cannot be decoded is kept as literal (or
/// lossy) text and listed in the returned anomalies.
pub fn decode_message(raw: &RawMessage) -> Decoded<DecodedMessage> {
    let mut anomalies = Vec::new();

    let (head, body) = header::split_message(&raw.bytes);
    let head = header::decode_header_block(head).collect_into(&mut anomalies);
    let unfolded = header::unfold(&head).collect_into(&mut anomalies);
    let headers = header::decode_fields(unfolded.fields).collect_into(&mut anomalies);

    let encoding = headers
        .get(HeaderName::ContentTransferEncoding)
        .map(TransferEncoding::from_header)
        .unwrap_or(TransferEncoding::Identity);
    let charset = headers
        .get(HeaderName::ContentType)
        .and_then(transfer::content_type_charset);

    debug!(
        id = %raw.id,
        ?encoding,
        charset = charset.as_deref().unwrap_or("utf-8"),
        "Decoding message body"
    );

    let body = transfer::decode_body(&normalize_newlines(body), encoding, charset.as_deref())
        .collect_into(&mut anomalies);

    let field = |name| headers.get(name).unwrap_or_default().to_string();
    let message = DecodedMessage {
        subject: field(HeaderName::Subject),
        from: header::sender_address(&headers),
        to: field(HeaderName::To),
        date: field(HeaderName::Date),
        body_text: body.trim().to_string(),
    };

    Decoded::with_anomalies(message, anomalies)
}

/// CRLF to LF.
fn normalize_newlines(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    for (i, &b) in body.iter().enumerate() {
        if b == b'\r' && body.get(i + 1) == Some(&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: &str) -> Decoded<DecodedMessage> {
        decode_message(&RawMessage::new("test", raw))
    }

    #[test]
    fn test_quoted_printable_message() {
        let raw = "Subject: =?UTF-8?Q?Gru=C3=9F?=\r\n\
                   Content-Transfer-Encoding: quoted-printable\r\n\
                   \r\n\
                   Hallo=0A=0AVG\r\n";
        let decoded = decode(raw);
        assert!(decoded.is_clean(), "{:?}", decoded.anomalies);
        assert_eq!(decoded.value.subject, "Gruß");
        assert_eq!(decoded.value.body_text, "Hallo\n\nVG");
    }

    #[test]
    fn test_base64_message_with_charset() {
        // "Grüezi" in ISO-8859-1
        let raw = "Content-Type: text/plain; charset=iso-8859-1\n\
                   Content-Transfer-Encoding: BASE64\n\n\
                   R3L8ZXpp\n";
        assert_eq!(decode(raw).value.body_text, "Grüezi");
    }

    #[test]
    fn test_missing_encoding_is_identity() {
        let raw = "From: Anna <anna@example.ch>\nTo: info@example.ch\nDate: Thu, 2 May 2024 10:00:00 +0200\n\n  Hi =C3=9F  \n";
        let msg = decode(raw).value;
        assert_eq!(msg.from, "anna@example.ch");
        assert_eq!(msg.to, "info@example.ch");
        assert_eq!(msg.date, "Thu, 2 May 2024 10:00:00 +0200");
        assert_eq!(msg.body_text, "Hi =C3=9F");
    }

    #[test]
    fn test_missing_headers_are_empty() {
        let msg = decode("\nbody only").value;
        assert_eq!(msg.subject, "");
        assert_eq!(msg.from, "");
        assert_eq!(msg.body_text, "body only");
    }

    #[test]
    fn test_header_only_message() {
        let msg = decode("Subject: no body").value;
        assert_eq!(msg.subject, "no body");
        assert_eq!(msg.body_text, "");
    }

    #[test]
    fn test_anomalies_are_collected_from_every_stage() {
        let raw = "garbage line\nSubject: =?UTF-8?B?***?=\nContent-Transfer-Encoding: quoted-printable\n\nbad =G1 escape";
        let decoded = decode(raw);
        assert_eq!(decoded.anomalies.len(), 3);
        assert_eq!(decoded.value.body_text, "bad =G1 escape");
    }

    #[test]
    fn test_stray_header_byte_leaves_utf8_text_intact() {
        let raw: &[u8] = b"Subject: Gr\xC3\xBC\xC3\x9Fe\r\n\
                           X-Junk: \xFF\r\n\
                           Content-Transfer-Encoding: 8bit\r\n\
                           \r\n\
                           Stra\xC3\x9Fe \xC3\xBCber Br\xC3\xBCcke\r\n";
        let decoded = decode_message(&RawMessage::new("junk", raw));
        assert_eq!(decoded.value.subject, "Grüße");
        assert_eq!(decoded.value.body_text, "Straße über Brücke");
        assert!(matches!(
            decoded.anomalies[..],
            [crate::error::Anomaly::EncodingDecode { .. }]
        ));
    }

    #[test]
    fn test_qp_body_with_crlf_lines() {
        let raw = "Content-Transfer-Encoding: quoted-printable\r\n\r\nZeile eins =\r\nweiter\r\nZeile zwei";
        assert_eq!(decode(raw).value.body_text, "Zeile eins weiter\nZeile zwei");
    }
}
