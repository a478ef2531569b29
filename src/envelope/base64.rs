//! Base64 encoding with a fixed legacy decode chain.
//!
//! Envelopes written by older encoders used several base64 alphabets, with
//! and without padding, and some were mangled by editors that turned `+`
//! into spaces. Decoding tries each flavor in a fixed order and records why
//! each attempt failed.

use base64::Engine as _;
use base64::engine::GeneralPurpose;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::common::error::{Result, WatermarkError};

/// Output alphabet used when sealing an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Base64Flavor {
    /// RFC 4648 standard alphabet, padded
    Standard,
    /// URL-safe alphabet without padding
    RawUrlSafe,
}

impl Base64Flavor {
    fn engine(self) -> &'static GeneralPurpose {
        match self {
            Base64Flavor::Standard => &STANDARD,
            Base64Flavor::RawUrlSafe => &URL_SAFE_NO_PAD,
        }
    }

    /// Encode `data` with this flavor.
    #[inline]
    pub fn encode(self, data: &[u8]) -> String {
        self.engine().encode(data)
    }
}

/// Decode attempts in the order they are tried.
const DECODE_CHAIN: [(&str, &GeneralPurpose); 4] = [
    ("url-safe unpadded", &URL_SAFE_NO_PAD),
    ("url-safe", &URL_SAFE),
    ("standard", &STANDARD),
    ("standard unpadded", &STANDARD_NO_PAD),
];

/// Decode `encoded`, trying every known flavor before giving up.
///
/// The last resort repairs common damage (surrounding whitespace, spaces
/// where `+` was, URL-safe characters, missing padding) and decodes as
/// standard base64.
///
/// # Examples
///
/// ```
/// use docmark::envelope::decode_lenient;
/// assert_eq!(decode_lenient("aGk_").unwrap(), vec![0x68, 0x69, 0x3f]);
/// assert_eq!(decode_lenient("aGk/").unwrap(), vec![0x68, 0x69, 0x3f]);
/// assert_eq!(decode_lenient(" aGk ").unwrap(), b"hi");
/// ```
pub fn decode_lenient(encoded: &str) -> Result<Vec<u8>> {
    let mut failures = Vec::with_capacity(DECODE_CHAIN.len() + 1);

    for (name, engine) in DECODE_CHAIN {
        match engine.decode(encoded) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => failures.push(format!("{}: {}", name, e)),
        }
    }

    let repaired = repair(encoded);
    match STANDARD.decode(&repaired) {
        Ok(bytes) => {
            tracing::debug!("base64 payload decoded after repair");
            Ok(bytes)
        },
        Err(e) => {
            failures.push(format!("repaired standard: {}", e));
            Err(WatermarkError::Decryption(format!(
                "all base64 decodings failed ({})",
                failures.join("; ")
            )))
        },
    }
}

fn repair(encoded: &str) -> String {
    let mut fixed: String = encoded
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let rem = fixed.len() % 4;
    if rem > 0 {
        fixed.extend(std::iter::repeat_n('=', 4 - rem));
    }
    fixed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_flavor_decodes() {
        let data: Vec<u8> = (0u8..=255).collect();
        for engine in [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD] {
            assert_eq!(decode_lenient(&engine.encode(&data)).unwrap(), data);
        }
    }

    #[test]
    fn test_space_mangled_plus_is_repaired() {
        let encoded = STANDARD.encode([0x03, 0xef, 0x80]);
        assert_eq!(encoded, "A++A");
        let mangled = encoded.replace('+', " ");
        assert_eq!(decode_lenient(&mangled).unwrap(), vec![0x03, 0xef, 0x80]);
    }

    #[test]
    fn test_exhausted_chain_lists_attempts() {
        let err = decode_lenient("!!!not base64!!!").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("url-safe unpadded"));
        assert!(msg.contains("repaired standard"));
        assert!(matches!(err, WatermarkError::Decryption(_)));
    }

    #[test]
    fn test_flavor_encode() {
        assert_eq!(Base64Flavor::Standard.encode(&[0xfb, 0xff]), "+/8=");
        assert_eq!(Base64Flavor::RawUrlSafe.encode(&[0xfb, 0xff]), "-_8");
    }
}
