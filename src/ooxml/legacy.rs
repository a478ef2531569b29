//! Envelope locations used by earlier encoders.
//!
//! Two kinds of leftovers are recognized. Sealed envelopes in the usual
//! delimited form may sit in parts that are no longer written (extended
//! properties, workbook attributes, shared strings). Older still, plaintext
//! `Watermark:` tokens and `<!-- Watermark: ... -->` comments carry the text
//! without any envelope and are always reported unverified.

use crate::common::package::PackageEditor;
use crate::envelope::wire::{LegacyText, OFFICE_DELIMITERS, Payload, parse_fields};
use crate::envelope::Timestamp;

const PLAIN_TOKEN: &str = "Watermark:";
const PLAIN_TIMESTAMP: &str = "TimeStamp:";
const COMMENT_TOKEN: &str = "<!-- Watermark: ";
const COMMENT_TIMESTAMP: &str = "<!-- TimeStamp: ";
/// Longest plaintext token read, in characters.
const MAX_TOKEN_CHARS: usize = 100;

/// A payload found outside the primary anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyHit {
    pub payload: Payload,
    pub location: String,
}

/// Remove plaintext `Watermark:` and `TimeStamp:` tokens from a keyword list.
pub fn strip_plain_tokens(keywords: &str) -> String {
    keywords
        .split(' ')
        .filter(|word| !word.starts_with(PLAIN_TOKEN) && !word.starts_with(PLAIN_TIMESTAMP))
        .collect::<Vec<_>>()
        .join(" ")
}

/// First structurally valid delimited envelope in any of `parts`.
pub fn scan_sealed(pkg: &mut PackageEditor, parts: &[String]) -> Option<LegacyHit> {
    for name in parts {
        let Ok(Some(xml)) = pkg.read_string(name) else {
            continue;
        };
        for span in OFFICE_DELIMITERS.find_all(xml.as_bytes()) {
            match parse_fields(&xml[span.inner]) {
                Ok(payload) => {
                    return Some(LegacyHit {
                        payload,
                        location: name.clone(),
                    });
                },
                Err(e) => tracing::debug!(part = %name, error = %e, "skipping malformed envelope"),
            }
        }
    }
    None
}

/// Plaintext `Watermark:<text>` token in the core properties part.
pub fn scan_plain_token(pkg: &mut PackageEditor, core_part: &str) -> Option<LegacyHit> {
    let Ok(Some(core)) = pkg.read_string(core_part) else {
        return None;
    };
    let text = token_after(&core, PLAIN_TOKEN, |c| c == '<' || c == ' ')?;
    let timestamp = token_after(&core, PLAIN_TIMESTAMP, |c| c == '<' || c == ' ')
        .and_then(|ts| Timestamp::parse(&ts).ok());
    Some(LegacyHit {
        payload: Payload::Legacy(LegacyText { text, timestamp }),
        location: format!("{} (plaintext)", core_part),
    })
}

/// Plaintext `<!-- Watermark: <text> -->` comment in any of `parts`.
pub fn scan_comments(pkg: &mut PackageEditor, parts: &[String]) -> Option<LegacyHit> {
    for name in parts {
        let Ok(Some(xml)) = pkg.read_string(name) else {
            continue;
        };
        let Some(text) = comment_after(&xml, COMMENT_TOKEN) else {
            continue;
        };
        let timestamp =
            comment_after(&xml, COMMENT_TIMESTAMP).and_then(|ts| Timestamp::parse(&ts).ok());
        return Some(LegacyHit {
            payload: Payload::Legacy(LegacyText { text, timestamp }),
            location: format!("{} (comment)", name),
        });
    }
    None
}

fn token_after(haystack: &str, prefix: &str, stop: impl Fn(char) -> bool) -> Option<String> {
    let start = haystack.find(prefix)? + prefix.len();
    let token: String = haystack[start..]
        .chars()
        .take(MAX_TOKEN_CHARS)
        .take_while(|&c| !stop(c))
        .collect();
    (!token.is_empty()).then_some(token)
}

fn comment_after(haystack: &str, prefix: &str) -> Option<String> {
    let start = haystack.find(prefix)? + prefix.len();
    let len = haystack[start..].find("-->")?;
    let text = haystack[start..start + len].trim();
    (!text.is_empty()).then(|| text.to_string())
}
