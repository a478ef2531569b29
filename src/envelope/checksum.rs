//! Envelope checksums.
//!
//! The checksum is a corruption and tamper signal only. It is stored in
//! cleartext next to the ciphertext and, under
//! [`KeyPolicy::ChecksumPrefix`](super::KeyPolicy::ChecksumPrefix), doubles as
//! key material, so it carries no secrecy.

use md5::{Digest, Md5};

/// Length of a checksum in hex characters.
pub const CHECKSUM_HEX_LEN: usize = 32;

/// Compute the lowercase hex MD5 digest of `text`, optionally salted with the
/// timestamp string exactly as it is stored in the envelope.
///
/// # Examples
///
/// ```
/// use docmark::envelope::checksum;
/// assert_eq!(checksum("abc", None), "900150983cd24fb0d6963f7d28e17f72");
/// assert_ne!(checksum("abc", Some("2024-01-01T00:00:00Z")), checksum("abc", None));
/// ```
pub fn checksum(text: &str, timestamp: Option<&str>) -> String {
    let mut hasher = Md5::new();
    hasher.update(text.as_bytes());
    if let Some(ts) = timestamp {
        hasher.update(ts.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Compare two checksums, ignoring hex letter case.
#[inline]
pub fn checksums_match(stored: &str, computed: &str) -> bool {
    stored.eq_ignore_ascii_case(computed)
}
