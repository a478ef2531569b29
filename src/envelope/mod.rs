//! Envelope codec shared by every format strategy.
//!
//! An [`Envelope`] wraps the watermark text as ciphertext, a seal timestamp
//! and an MD5 checksum. [`EnvelopeCodec`] seals and opens envelopes under an
//! [`EnvelopeProfile`], which fixes the cipher mode, key source, checksum
//! input, output alphabet and mismatch handling for one format.
//!
//! # Examples
//!
//! ```
//! use docmark::envelope::{EnvelopeCodec, EnvelopeProfile, Integrity};
//! use docmark::strategy::FormatKind;
//!
//! let codec = EnvelopeCodec::new(EnvelopeProfile::for_format(FormatKind::Png), "secret");
//! let envelope = codec.seal("CONFIDENTIAL")?;
//! let opened = codec.open(&envelope)?;
//! assert_eq!(opened.text, "CONFIDENTIAL");
//! assert_eq!(opened.integrity, Integrity::Verified);
//! # Ok::<(), docmark::WatermarkError>(())
//! ```

pub mod base64;
pub mod checksum;
pub mod cipher;
pub mod profile;
pub mod wire;

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

pub use self::base64::{Base64Flavor, decode_lenient};
pub use checksum::{checksum, checksums_match};
pub use cipher::{CipherMode, SymmetricKey};
pub use profile::{ChecksumInput, EnvelopeProfile, KeyPolicy, MismatchPolicy, TimestampStyle};
pub use wire::{Delimiters, LegacyText, Payload};

use crate::common::error::{Result, WatermarkError};

/// Default shared secret for [`KeyPolicy::SharedSecret`].
pub const DEFAULT_SHARED_SECRET: &str = "watermark-security-key-for-encryption";

/// Seal time of an envelope.
///
/// Keeps the text exactly as stored so checksums salted with the timestamp
/// verify against envelopes written with any UTC offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    instant: DateTime<Utc>,
    text: String,
}

impl Timestamp {
    /// Current time, truncated to whole seconds.
    pub fn now(style: TimestampStyle) -> Self {
        let secs = Utc::now().timestamp();
        let instant = DateTime::from_timestamp(secs, 0).unwrap_or_default();
        Self::render(instant, style)
    }

    /// Timestamp from Unix seconds, rendered as digits.
    pub fn from_unix(secs: i64) -> Result<Self> {
        let instant = DateTime::from_timestamp(secs, 0).ok_or_else(|| {
            WatermarkError::Decryption(format!("timestamp {} out of range", secs))
        })?;
        Ok(Self::render(instant, TimestampStyle::Unix))
    }

    /// Parse either Unix seconds or an RFC 3339 string, keeping the raw text.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let digits = raw.strip_prefix('-').unwrap_or(raw);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            let secs: i64 = raw.parse().map_err(|e| {
                WatermarkError::Decryption(format!("invalid timestamp {:?}: {}", raw, e))
            })?;
            return Self::from_unix(secs).map(|mut ts| {
                ts.text = raw.to_string();
                ts
            });
        }

        let instant = DateTime::parse_from_rfc3339(raw)
            .map_err(|e| WatermarkError::Decryption(format!("invalid timestamp {:?}: {}", raw, e)))?
            .with_timezone(&Utc);
        Ok(Self {
            instant,
            text: raw.to_string(),
        })
    }

    fn render(instant: DateTime<Utc>, style: TimestampStyle) -> Self {
        let text = match style {
            TimestampStyle::Rfc3339 => instant.to_rfc3339_opts(SecondsFormat::Secs, true),
            TimestampStyle::Unix => instant.timestamp().to_string(),
        };
        Self { instant, text }
    }

    /// The timestamp text as stored.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    #[inline]
    pub fn unix(&self) -> i64 {
        self.instant.timestamp()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Outcome of checksum verification for an extracted watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Integrity {
    /// Checksum matched the decrypted text
    Verified,
    /// Checksum did not match; returned only under [`MismatchPolicy::Flag`]
    Mismatch { expected: String, actual: String },
    /// Legacy payload without a checksum
    Unverified,
}

impl Integrity {
    #[inline]
    pub fn is_verified(&self) -> bool {
        matches!(self, Integrity::Verified)
    }
}

/// Encrypted watermark text with its seal timestamp and checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub ciphertext: String,
    pub timestamp: Timestamp,
    pub checksum: String,
}

/// Text recovered from an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    pub text: String,
    pub timestamp: Timestamp,
    pub integrity: Integrity,
}

/// Seals and opens envelopes for one format.
#[derive(Clone)]
pub struct EnvelopeCodec {
    profile: EnvelopeProfile,
    secret: String,
}

impl fmt::Debug for EnvelopeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeCodec")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl EnvelopeCodec {
    pub fn new(profile: EnvelopeProfile, secret: impl Into<String>) -> Self {
        Self {
            profile,
            secret: secret.into(),
        }
    }

    #[inline]
    pub fn profile(&self) -> &EnvelopeProfile {
        &self.profile
    }

    /// Encrypt `text` into a fresh envelope stamped with the current time.
    pub fn seal(&self, text: &str) -> Result<Envelope> {
        self.seal_at(text, Timestamp::now(self.profile.timestamp))
    }

    /// Encrypt `text` into an envelope with a given timestamp.
    pub fn seal_at(&self, text: &str, timestamp: Timestamp) -> Result<Envelope> {
        if text.trim().is_empty() {
            return Err(WatermarkError::InvalidText("watermark text is empty".into()));
        }

        let checksum = self.checksum_for(text, &timestamp);
        let key = self.key_for(&checksum)?;
        let ciphertext = cipher::encrypt(
            text,
            &key,
            self.profile.cipher,
            &self.aad_for(&timestamp),
            self.profile.encoding,
        )?;

        Ok(Envelope {
            ciphertext,
            timestamp,
            checksum,
        })
    }

    /// Decrypt an envelope and verify its checksum.
    ///
    /// A mismatch is an error under [`MismatchPolicy::Reject`] and an
    /// [`Integrity::Mismatch`] flag under [`MismatchPolicy::Flag`].
    pub fn open(&self, envelope: &Envelope) -> Result<Opened> {
        let key = self.key_for(&envelope.checksum)?;
        let text = cipher::decrypt(
            &envelope.ciphertext,
            &key,
            self.profile.cipher,
            &self.aad_for(&envelope.timestamp),
        )?;

        let actual = self.checksum_for(&text, &envelope.timestamp);
        let integrity = if checksums_match(&envelope.checksum, &actual) {
            Integrity::Verified
        } else {
            match self.profile.mismatch {
                MismatchPolicy::Reject => {
                    return Err(WatermarkError::ChecksumMismatch {
                        expected: envelope.checksum.clone(),
                        actual,
                    });
                },
                MismatchPolicy::Flag => {
                    tracing::warn!(
                        expected = %envelope.checksum,
                        actual = %actual,
                        "watermark checksum mismatch, returning flagged text"
                    );
                    Integrity::Mismatch {
                        expected: envelope.checksum.clone(),
                        actual,
                    }
                },
            }
        };

        Ok(Opened {
            text,
            timestamp: envelope.timestamp.clone(),
            integrity,
        })
    }

    /// Open a delimited payload, passing legacy plaintext through unverified.
    ///
    /// Legacy payloads without a parseable timestamp are stamped with the
    /// extraction time.
    pub fn open_payload(&self, payload: &Payload) -> Result<Opened> {
        match payload {
            Payload::Sealed(envelope) => self.open(envelope),
            Payload::Legacy(legacy) => {
                tracing::warn!("legacy unencrypted watermark payload, integrity unverified");
                Ok(Opened {
                    text: legacy.text.clone(),
                    timestamp: legacy
                        .timestamp
                        .clone()
                        .unwrap_or_else(|| Timestamp::now(TimestampStyle::Rfc3339)),
                    integrity: Integrity::Unverified,
                })
            },
        }
    }

    fn checksum_for(&self, text: &str, timestamp: &Timestamp) -> String {
        match self.profile.checksum {
            ChecksumInput::Text => checksum(text, None),
            ChecksumInput::TextAndTimestamp => checksum(text, Some(timestamp.as_str())),
        }
    }

    fn key_for(&self, checksum: &str) -> Result<SymmetricKey> {
        match self.profile.key {
            KeyPolicy::SharedSecret => Ok(SymmetricKey::from_secret(&self.secret)),
            KeyPolicy::ChecksumPrefix => SymmetricKey::from_checksum_prefix(checksum),
        }
    }

    fn aad_for(&self, timestamp: &Timestamp) -> Vec<u8> {
        match self.profile.cipher {
            CipherMode::Gcm => timestamp.unix().to_string().into_bytes(),
            CipherMode::Cfb => Vec::new(),
        }
    }
}
