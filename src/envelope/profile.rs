//! Per-format envelope policies.

use serde::{Deserialize, Serialize};

use super::base64::Base64Flavor;
use super::cipher::CipherMode;
use crate::strategy::FormatKind;

/// Where the cipher key comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// SHA-256 of the configured shared secret (AES-256)
    SharedSecret,
    /// First 16 characters of the envelope checksum (AES-128)
    ChecksumPrefix,
}

/// What the checksum is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumInput {
    Text,
    TextAndTimestamp,
}

/// What to do when the decrypted text does not match its checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Fail extraction with `ChecksumMismatch`
    #[default]
    Reject,
    /// Return the text with an integrity flag
    Flag,
}

/// How the envelope timestamp is rendered in the wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampStyle {
    /// `2026-01-01T00:00:00Z`
    Rfc3339,
    /// Seconds since the Unix epoch
    Unix,
}

/// Complete set of envelope choices for one format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeProfile {
    pub cipher: CipherMode,
    pub key: KeyPolicy,
    pub checksum: ChecksumInput,
    pub encoding: Base64Flavor,
    pub mismatch: MismatchPolicy,
    pub timestamp: TimestampStyle,
}

impl EnvelopeProfile {
    /// Legacy OOXML envelopes: CFB keyed by the checksum prefix.
    pub const OFFICE_LEGACY: Self = Self {
        cipher: CipherMode::Cfb,
        key: KeyPolicy::ChecksumPrefix,
        checksum: ChecksumInput::TextAndTimestamp,
        encoding: Base64Flavor::RawUrlSafe,
        mismatch: MismatchPolicy::Flag,
        timestamp: TimestampStyle::Rfc3339,
    };

    /// Authenticated envelopes with text-only checksums and Unix timestamps.
    pub const SEALED_UNIX: Self = Self {
        cipher: CipherMode::Gcm,
        key: KeyPolicy::SharedSecret,
        checksum: ChecksumInput::Text,
        encoding: Base64Flavor::Standard,
        mismatch: MismatchPolicy::Reject,
        timestamp: TimestampStyle::Unix,
    };

    /// Authenticated envelopes carried in delimited text markers.
    pub const SEALED_DELIMITED: Self = Self {
        cipher: CipherMode::Gcm,
        key: KeyPolicy::SharedSecret,
        checksum: ChecksumInput::TextAndTimestamp,
        encoding: Base64Flavor::Standard,
        mismatch: MismatchPolicy::Flag,
        timestamp: TimestampStyle::Rfc3339,
    };

    /// Default profile for a format.
    pub fn for_format(kind: FormatKind) -> Self {
        match kind {
            FormatKind::Docx | FormatKind::Xlsx | FormatKind::Pptx => Self::OFFICE_LEGACY,
            FormatKind::Odt | FormatKind::Jpeg | FormatKind::Rtf => Self::SEALED_UNIX,
            FormatKind::Png | FormatKind::Pdf => Self::SEALED_DELIMITED,
        }
    }

    /// Replace the mismatch policy.
    pub fn with_mismatch(mut self, mismatch: MismatchPolicy) -> Self {
        self.mismatch = mismatch;
        self
    }
}
