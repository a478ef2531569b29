//! Configuration for the watermark strategies and service.
//!
//! [`WatermarkOptions`] is built with chained `with_*` calls or loaded from
//! YAML.
//!
//! # Examples
//!
//! ```rust
//! use docmark::config::WatermarkOptions;
//! use docmark::envelope::MismatchPolicy;
//! use docmark::strategy::FormatKind;
//!
//! let options = WatermarkOptions::new()
//!     .with_jpeg_quality(90)
//!     .with_redundant_writes(false)
//!     .with_mismatch_policy(FormatKind::Png, MismatchPolicy::Reject);
//!
//! let yaml = "shared_secret: s3cret\nlegacy_scan: false\n";
//! let loaded = WatermarkOptions::from_yaml_str(yaml).unwrap();
//! assert!(!loaded.legacy_scan);
//! assert_eq!(loaded.jpeg_quality, 95);
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::error::{Result, WatermarkError};
use crate::envelope::{DEFAULT_SHARED_SECRET, EnvelopeCodec, EnvelopeProfile, MismatchPolicy};
use crate::strategy::FormatKind;

/// Options shared by every strategy built from one registry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkOptions {
    /// Secret hashed into the key of shared-secret envelopes
    pub shared_secret: String,
    /// JPEG re-encode quality, 1 to 100
    pub jpeg_quality: u8,
    /// Whether extraction falls back to legacy plaintext locations
    pub legacy_scan: bool,
    /// Whether container formats write the envelope to every anchor
    pub redundant_writes: bool,
    /// Maximum watermark length in characters
    pub max_text_len: usize,
    /// Per-format override of the checksum mismatch policy
    pub mismatch_policy: BTreeMap<FormatKind, MismatchPolicy>,
    /// Wall-clock budget of one service call, in seconds
    pub timeout_secs: u64,
}

impl std::fmt::Debug for WatermarkOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkOptions")
            .field("jpeg_quality", &self.jpeg_quality)
            .field("legacy_scan", &self.legacy_scan)
            .field("redundant_writes", &self.redundant_writes)
            .field("max_text_len", &self.max_text_len)
            .field("mismatch_policy", &self.mismatch_policy)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            shared_secret: DEFAULT_SHARED_SECRET.to_string(),
            jpeg_quality: 95,
            legacy_scan: true,
            redundant_writes: true,
            max_text_len: 100,
            mismatch_policy: BTreeMap::new(),
            timeout_secs: 30,
        }
    }
}

impl WatermarkOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_shared_secret(mut self, secret: impl Into<String>) -> Self {
        self.shared_secret = secret.into();
        self
    }

    /// Set the JPEG re-encode quality. Values are clamped to 1..=100.
    #[inline]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    #[inline]
    pub fn with_legacy_scan(mut self, enabled: bool) -> Self {
        self.legacy_scan = enabled;
        self
    }

    /// Set whether container formats write every anchor or stop at the first
    /// one that accepts the envelope.
    #[inline]
    pub fn with_redundant_writes(mut self, enabled: bool) -> Self {
        self.redundant_writes = enabled;
        self
    }

    #[inline]
    pub fn with_max_text_len(mut self, len: usize) -> Self {
        self.max_text_len = len;
        self
    }

    /// Override the checksum mismatch policy of one format.
    #[inline]
    pub fn with_mismatch_policy(mut self, format: FormatKind, policy: MismatchPolicy) -> Self {
        self.mismatch_policy.insert(format, policy);
        self
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Envelope profile for `format`, with any configured override applied.
    pub fn profile_for(&self, format: FormatKind) -> EnvelopeProfile {
        let profile = EnvelopeProfile::for_format(format);
        match self.mismatch_policy.get(&format) {
            Some(policy) => profile.with_mismatch(*policy),
            None => profile,
        }
    }

    pub fn codec_for(&self, format: FormatKind) -> EnvelopeCodec {
        EnvelopeCodec::new(self.profile_for(format), self.shared_secret.clone())
    }

    /// Check watermark text: not blank and at most `max_text_len` characters.
    pub fn validate_text(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(WatermarkError::InvalidText("watermark text is empty".into()));
        }
        let len = text.chars().count();
        if len > self.max_text_len {
            return Err(WatermarkError::InvalidText(format!(
                "watermark text is {} characters, limit is {}",
                len, self.max_text_len
            )));
        }
        Ok(())
    }

    /// Reject option combinations no strategy can honor.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(WatermarkError::Config(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.max_text_len == 0 {
            return Err(WatermarkError::Config("max_text_len must be positive".into()));
        }
        if self.shared_secret.is_empty() {
            return Err(WatermarkError::Config("shared_secret must not be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(WatermarkError::Config("timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// Load options from YAML; missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let options: Self = serde_saphyr::from_str(yaml)
            .map_err(|e| WatermarkError::Config(format!("invalid YAML options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_saphyr::to_string(self)
            .map_err(|e| WatermarkError::Config(format!("failed to serialize options: {}", e)))
    }
}
