//! Magic-number checks for host formats.
//!
//! Each strategy validates its host before touching it, reading only the
//! leading bytes. A mismatch is reported as
//! [`WatermarkError::InvalidFormatSignature`] naming the format.

use crate::common::error::{Result, WatermarkError};

// Magic number signatures
pub const ZIP_SIGNATURE: &[u8] = &[0x50, 0x4B, 0x03, 0x04];
pub const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8];
pub const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";
/// RTF files start with `{\rtf` followed optionally by version number.
pub const RTF_SIGNATURE: &[u8] = b"{\\rtf";

/// Host format families with a fixed leading signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    Zip,
    Jpeg,
    Png,
    Pdf,
    Rtf,
}

impl Signature {
    /// The leading bytes every valid file of this family carries.
    #[inline]
    pub fn magic(self) -> &'static [u8] {
        match self {
            Signature::Zip => ZIP_SIGNATURE,
            Signature::Jpeg => JPEG_SIGNATURE,
            Signature::Png => PNG_SIGNATURE,
            Signature::Pdf => PDF_SIGNATURE,
            Signature::Rtf => RTF_SIGNATURE,
        }
    }

    /// Whether `bytes` starts with this signature.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use docmark::common::signature::Signature;
    ///
    /// assert!(Signature::Rtf.matches(b"{\\rtf1\\ansi\\deff0 Hello World}"));
    /// assert!(!Signature::Rtf.matches(b"Plain text file"));
    /// ```
    #[inline]
    pub fn matches(self, bytes: &[u8]) -> bool {
        bytes.starts_with(self.magic())
    }

    /// Fail with `InvalidFormatSignature` unless `bytes` carries this signature.
    pub fn require(self, format: &'static str, bytes: &[u8]) -> Result<()> {
        if self.matches(bytes) {
            return Ok(());
        }
        let shown = bytes.len().min(self.magic().len());
        Err(WatermarkError::InvalidFormatSignature {
            format,
            detail: format!(
                "expected leading bytes {:02X?}, found {:02X?}",
                self.magic(),
                &bytes[..shown]
            ),
        })
    }
}
