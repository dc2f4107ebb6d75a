//! Raw message decoding into subject + typed header collection.

use mail_parser::MessageParser;

use crate::error::ParseError;
use crate::mail::headers::HeaderMap;

/// A decoded probe message: the subject line and every header, in order.
#[derive(Debug, Clone)]
pub struct ParsedProbe {
    pub subject: String,
    pub headers: HeaderMap,
}

/// Decode a raw RFC 822 message.
///
/// Header values are sliced out of the raw bytes by offset rather than
/// taken from mail-parser's structured forms, so `Received` entries keep
/// their unmodified wire text (folding collapsed to single spaces).
/// A missing subject becomes the literal `"No Subject"`.
pub fn parse_message(raw: &[u8]) -> Result<ParsedProbe, ParseError> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or(ParseError::Malformed { size: raw.len() })?;

    let subject = message.subject().unwrap_or("No Subject").to_string();

    let raw_bytes = message.raw_message();
    let mut headers = HeaderMap::new();
    for header in message.headers() {
        let value = raw_bytes
            .get(header.offset_start as usize..header.offset_end as usize)
            .map(|bytes| unfold(&String::from_utf8_lossy(bytes)))
            .unwrap_or_default();
        headers.insert(header.name.as_str(), value);
    }

    Ok(ParsedProbe { subject, headers })
}

/// Collapse folded header continuation lines into a single line.
fn unfold(value: &str) -> String {
    value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
