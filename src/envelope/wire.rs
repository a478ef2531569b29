//! Serialized forms of an [`Envelope`].
//!
//! Each host format carries envelopes in the syntax its container tolerates:
//! delimited text markers (OOXML, ODF metadata, PNG, PDF), a tagged JSON
//! comment (JPEG), a standalone XML element (ODF auxiliary part) and an RTF
//! destination group. Delimited markers written by older encoders may also
//! hold an unencrypted two-field payload, surfaced as [`Payload::Legacy`].

use std::ops::Range;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use memchr::memmem;
use serde::{Deserialize, Serialize};

use super::base64::decode_lenient;
use super::checksum::CHECKSUM_HEX_LEN;
use super::{Envelope, Timestamp};
use crate::common::error::{Result, WatermarkError};

/// Field separator inside delimited markers.
pub const FIELD_SEPARATOR: char = '|';

/// Begin/end literals wrapped around a delimited envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    pub begin: &'static str,
    pub end: &'static str,
}

/// Markers used inside OOXML and ODF metadata.
pub const OFFICE_DELIMITERS: Delimiters = Delimiters {
    begin: "WATERMARK_BEGIN:",
    end: ":WATERMARK_END",
};

/// Markers written as a PDF comment line.
pub const PDF_DELIMITERS: Delimiters = Delimiters {
    begin: "%WATERMARK_BEGIN:",
    end: ":WATERMARK_END%",
};

/// Markers appended after the PNG IEND chunk.
pub const PNG_DELIMITERS: Delimiters = Delimiters {
    begin: "<!--WATERMARK_BEGIN:",
    end: ":WATERMARK_END-->",
};

/// Location of one delimited envelope inside a host buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSpan {
    /// Whole marker, delimiters included
    pub outer: Range<usize>,
    /// Field text between the delimiters
    pub inner: Range<usize>,
}

impl Delimiters {
    /// Wrap an envelope in these delimiters.
    pub fn wrap(&self, envelope: &Envelope) -> String {
        format!("{}{}{}", self.begin, to_fields(envelope), self.end)
    }

    /// Every complete marker in `haystack`, in document order.
    pub fn find_all(&self, haystack: &[u8]) -> Vec<MarkerSpan> {
        let begin = self.begin.as_bytes();
        let end = self.end.as_bytes();
        let mut spans = Vec::new();
        let mut from = 0;

        while let Some(rel) = memmem::find(&haystack[from..], begin) {
            let start = from + rel;
            let inner_start = start + begin.len();
            let Some(rel_end) = memmem::find(&haystack[inner_start..], end) else {
                break;
            };
            let inner_end = inner_start + rel_end;
            let outer_end = inner_end + end.len();
            spans.push(MarkerSpan {
                outer: start..outer_end,
                inner: inner_start..inner_end,
            });
            from = outer_end;
        }
        spans
    }

    /// First complete marker in `haystack`.
    pub fn find_first(&self, haystack: &[u8]) -> Option<MarkerSpan> {
        let begin = self.begin.as_bytes();
        let start = memmem::find(haystack, begin)?;
        let inner_start = start + begin.len();
        let inner_end = inner_start + memmem::find(&haystack[inner_start..], self.end.as_bytes())?;
        Some(MarkerSpan {
            outer: start..inner_end + self.end.len(),
            inner: inner_start..inner_end,
        })
    }

    /// Last complete marker in `haystack`.
    pub fn find_last(&self, haystack: &[u8]) -> Option<MarkerSpan> {
        self.find_all(haystack).pop()
    }

    /// Remove every complete marker from `text`.
    pub fn strip_all(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for span in self.find_all(text.as_bytes()) {
            out.push_str(&text[last..span.outer.start]);
            last = span.outer.end;
        }
        out.push_str(&text[last..]);
        out
    }
}

/// `ciphertext|timestamp|checksum`
pub fn to_fields(envelope: &Envelope) -> String {
    format!(
        "{}{sep}{}{sep}{}",
        envelope.ciphertext,
        envelope.timestamp.as_str(),
        envelope.checksum,
        sep = FIELD_SEPARATOR
    )
}

/// Plaintext recovered from an unencrypted legacy payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyText {
    pub text: String,
    pub timestamp: Option<Timestamp>,
}

/// Content of a delimited marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Sealed(Envelope),
    Legacy(LegacyText),
}

/// Parse the field text between delimiters.
///
/// Three fields are a sealed envelope. Two fields are the legacy
/// `base64(text)|timestamp` form.
pub fn parse_fields(fields: &str) -> Result<Payload> {
    let parts: Vec<&str> = fields.trim().split(FIELD_SEPARATOR).collect();
    match parts.as_slice() {
        [ciphertext, timestamp, checksum] => {
            let checksum = checksum.trim();
            validate_checksum(checksum)?;
            if ciphertext.trim().is_empty() {
                return Err(WatermarkError::Decryption("empty ciphertext field".into()));
            }
            Ok(Payload::Sealed(Envelope {
                ciphertext: ciphertext.trim().to_string(),
                timestamp: Timestamp::parse(timestamp)?,
                checksum: checksum.to_string(),
            }))
        },
        [encoded_text, timestamp] => {
            let text = String::from_utf8(decode_lenient(encoded_text.trim())?)?;
            Ok(Payload::Legacy(LegacyText {
                text,
                timestamp: Timestamp::parse(timestamp).ok(),
            }))
        },
        _ => Err(WatermarkError::Decryption(format!(
            "expected 3 envelope fields, found {}",
            parts.len()
        ))),
    }
}

fn validate_checksum(checksum: &str) -> Result<()> {
    if checksum.len() == CHECKSUM_HEX_LEN && checksum.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(WatermarkError::Decryption(format!(
            "malformed checksum field {:?}",
            checksum
        )))
    }
}

/// Tag that opens a JPEG comment payload.
pub const JSON_TAG: &[u8] = b"WATERMARK:";

#[derive(Debug, Serialize, Deserialize)]
struct JsonPayload {
    timestamp: i64,
    checksum: String,
    content: String,
}

/// `WATERMARK:` followed by base64 of the JSON payload.
pub fn to_json_tag(envelope: &Envelope) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(&JsonPayload {
        timestamp: envelope.timestamp.unix(),
        checksum: envelope.checksum.clone(),
        content: envelope.ciphertext.clone(),
    })?;
    let mut out = JSON_TAG.to_vec();
    out.extend_from_slice(STANDARD.encode(json).as_bytes());
    Ok(out)
}

/// Whether a comment payload carries the JSON tag.
#[inline]
pub fn is_json_tagged(payload: &[u8]) -> bool {
    payload.starts_with(JSON_TAG)
}

/// Parse a tagged JSON comment payload.
pub fn parse_json_tag(payload: &[u8]) -> Result<Envelope> {
    let body = payload
        .strip_prefix(JSON_TAG)
        .ok_or_else(|| WatermarkError::Decryption("missing WATERMARK: tag".into()))?;
    let body = std::str::from_utf8(body)
        .map_err(|e| WatermarkError::Decryption(format!("comment payload is not UTF-8: {e}")))?;
    let json = decode_lenient(body.trim_matches(|c: char| c.is_ascii_whitespace() || c == '\0'))?;
    let parsed: JsonPayload = serde_json::from_slice(&json)?;
    validate_checksum(&parsed.checksum)?;
    Ok(Envelope {
        ciphertext: parsed.content,
        timestamp: Timestamp::from_unix(parsed.timestamp)?,
        checksum: parsed.checksum,
    })
}

/// Standalone `<watermark>` element stored in an ODF auxiliary part.
#[cfg(feature = "odf")]
pub fn to_xml_element(envelope: &Envelope) -> String {
    use crate::common::xml::escape_xml;
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<watermark timestamp=\"{}\" checksum=\"{}\">{}</watermark>",
        envelope.timestamp.unix(),
        escape_xml(&envelope.checksum),
        escape_xml(&envelope.ciphertext)
    )
}

/// Parse a standalone `<watermark>` element.
#[cfg(feature = "odf")]
pub fn parse_xml_element(xml: &[u8]) -> Result<Envelope> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut timestamp = None;
    let mut checksum = None;
    let mut content = String::new();
    let mut inside = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"watermark" => {
                inside = true;
                for attr in e.attributes().flatten() {
                    let value = std::str::from_utf8(&attr.value)
                        .map(crate::common::xml::unescape_xml)
                        .map_err(|e| WatermarkError::Decryption(format!("bad attribute: {e}")))?;
                    match attr.key.local_name().as_ref() {
                        b"timestamp" => timestamp = Some(value),
                        b"checksum" => checksum = Some(value),
                        _ => {},
                    }
                }
            },
            Ok(Event::Text(t)) if inside => {
                let text = std::str::from_utf8(t.as_ref())
                    .map_err(|e| WatermarkError::Decryption(format!("bad element text: {e}")))?;
                content.push_str(&crate::common::xml::unescape_xml(text));
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"watermark" => break,
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(WatermarkError::Decryption(format!(
                    "malformed watermark element: {e}"
                )));
            },
            _ => {},
        }
        buf.clear();
    }

    let (Some(timestamp), Some(checksum)) = (timestamp, checksum) else {
        return Err(WatermarkError::Decryption(
            "watermark element lacks timestamp or checksum".into(),
        ));
    };
    validate_checksum(&checksum)?;
    let content = content.trim();
    if content.is_empty() {
        return Err(WatermarkError::Decryption("empty watermark element".into()));
    }
    Ok(Envelope {
        ciphertext: content.to_string(),
        timestamp: Timestamp::parse(&timestamp)?,
        checksum,
    })
}

/// Opening of an RTF watermark destination group.
pub const RTF_GROUP_OPEN: &str = "{\\*\\watermark-data";
const RTF_CONTENT_WORD: &str = "\\watermark-content";
const RTF_END_WORD: &str = "\\watermark-end";

/// `{\*\watermark-data timestamp=".." checksum=".."\watermark-content ..\watermark-end}`
pub fn to_rtf_group(envelope: &Envelope) -> String {
    format!(
        "{} timestamp=\"{}\" checksum=\"{}\"{} {}{}}}",
        RTF_GROUP_OPEN,
        envelope.timestamp.unix(),
        envelope.checksum,
        RTF_CONTENT_WORD,
        envelope.ciphertext,
        RTF_END_WORD
    )
}

/// Parse the text of one RTF watermark group, braces included.
pub fn parse_rtf_group(group: &str) -> Result<Envelope> {
    let body = group
        .strip_prefix(RTF_GROUP_OPEN)
        .ok_or_else(|| WatermarkError::Decryption("not a watermark group".into()))?;
    let (header, rest) = body
        .split_once(RTF_CONTENT_WORD)
        .ok_or_else(|| WatermarkError::Decryption("watermark group lacks content".into()))?;
    let (content, _) = rest
        .split_once(RTF_END_WORD)
        .ok_or_else(|| WatermarkError::Decryption("watermark group lacks end word".into()))?;

    let timestamp = quoted_attr(header, "timestamp")
        .ok_or_else(|| WatermarkError::Decryption("watermark group lacks timestamp".into()))?;
    let checksum = quoted_attr(header, "checksum")
        .ok_or_else(|| WatermarkError::Decryption("watermark group lacks checksum".into()))?;
    validate_checksum(checksum)?;

    let ciphertext: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if ciphertext.is_empty() {
        return Err(WatermarkError::Decryption("empty watermark content".into()));
    }
    Ok(Envelope {
        ciphertext,
        timestamp: Timestamp::parse(timestamp)?,
        checksum: checksum.to_string(),
    })
}

fn quoted_attr<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    let key = format!("{}=\"", name);
    let start = header.find(&key)? + key.len();
    let len = header[start..].find('"')?;
    Some(&header[start..start + len])
}
