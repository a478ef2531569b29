//! The contract every format strategy implements.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub use crate::envelope::Integrity;
use crate::envelope::Opened;
use crate::common::error::Result;

/// Host formats with a built-in strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Docx,
    Xlsx,
    Pptx,
    Odt,
    Jpeg,
    Png,
    Pdf,
    Rtf,
}

impl FormatKind {
    /// Every format, in registry order.
    pub const ALL: [FormatKind; 8] = [
        FormatKind::Docx,
        FormatKind::Xlsx,
        FormatKind::Pptx,
        FormatKind::Odt,
        FormatKind::Jpeg,
        FormatKind::Png,
        FormatKind::Pdf,
        FormatKind::Rtf,
    ];

    /// Canonical lowercase name, used in errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            FormatKind::Docx => "docx",
            FormatKind::Xlsx => "xlsx",
            FormatKind::Pptx => "pptx",
            FormatKind::Odt => "odt",
            FormatKind::Jpeg => "jpeg",
            FormatKind::Png => "png",
            FormatKind::Pdf => "pdf",
            FormatKind::Rtf => "rtf",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A watermark recovered from a host file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedWatermark {
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub integrity: Integrity,
    /// Anchor the envelope was read from, e.g. `docProps/core.xml#cp:keywords`
    pub location: String,
}

impl ExtractedWatermark {
    pub(crate) fn from_opened(opened: Opened, location: impl Into<String>) -> Self {
        Self {
            text: opened.text,
            timestamp: opened.timestamp.instant(),
            integrity: opened.integrity,
            location: location.into(),
        }
    }

    /// RFC 3339 rendering of the seal time.
    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Whether the checksum verified.
    #[inline]
    pub fn is_reliable(&self) -> bool {
        self.integrity.is_verified()
    }
}

/// A per-format watermark strategy.
///
/// Implementations hold no per-call state and may be shared across threads.
/// `add` never modifies `input`; `output` is written atomically and may equal
/// `input`.
pub trait Watermarker: Send + Sync {
    /// Embed `text` into a copy of `input` written to `output`.
    fn add(&self, input: &Path, output: &Path, text: &str) -> Result<()>;

    /// Recover the watermark embedded in `input`.
    fn extract(&self, input: &Path) -> Result<ExtractedWatermark>;

    /// Lowercase extension without a leading dot.
    fn supported_extension(&self) -> &'static str;

    fn format(&self) -> FormatKind;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Timestamp, TimestampStyle};

    #[test]
    fn test_timestamp_string() {
        let opened = Opened {
            text: "t".into(),
            timestamp: Timestamp::parse("2024-05-01T08:00:00+08:00").unwrap(),
            integrity: Integrity::Verified,
        };
        let wm = ExtractedWatermark::from_opened(opened, "here");
        assert_eq!(wm.timestamp_string(), "2024-05-01T00:00:00Z");
        assert!(wm.is_reliable());
    }

    #[test]
    fn test_unverified_not_reliable() {
        let opened = Opened {
            text: "t".into(),
            timestamp: Timestamp::now(TimestampStyle::Unix),
            integrity: Integrity::Unverified,
        };
        assert!(!ExtractedWatermark::from_opened(opened, "x").is_reliable());
    }

    #[test]
    fn test_format_names() {
        for kind in FormatKind::ALL {
            assert_eq!(kind.to_string(), kind.name());
        }
    }
}
