//! Unified error types for docmark.
//!
//! Every strategy reports failures through [`WatermarkError`], so callers can
//! branch on the failure class (bad host file, missing envelope, tampered
//! envelope, ...) without caring which format produced it.
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for watermark operations.
#[derive(Error, Debug)]
pub enum WatermarkError {
    /// Input file does not exist
    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// Host file does not carry the expected magic bytes or structure
    #[error("Invalid {format} signature: {detail}")]
    InvalidFormatSignature {
        format: &'static str,
        detail: String,
    },

    /// No structural insertion point was usable and no fallback applied
    #[error("No usable anchor in {format} (tried: {})", .tried.join("; "))]
    AnchorNotFound {
        format: &'static str,
        tried: Vec<String>,
    },

    /// Envelope encryption failed
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Envelope decryption failed, including exhausted base64 fallbacks
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Envelope checksum does not match the decrypted text
    #[error("Checksum mismatch: stored {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Extraction found no envelope anywhere
    #[error("No watermark found in {format} (searched: {})", .searched.join(", "))]
    WatermarkNotFound {
        format: &'static str,
        searched: Vec<String>,
    },

    /// Archive or image re-encoding failed
    #[error("Repack error: {0}")]
    Repack(String),

    /// Watermark text rejected before embedding
    #[error("Invalid watermark text: {0}")]
    InvalidText(String),

    /// No strategy is registered for the extension
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Operation abandoned after exceeding its wall-clock budget
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatermarkError {
    /// Whether the error signals a damaged or tampered envelope rather than
    /// a missing or unreadable one.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            WatermarkError::ChecksumMismatch { .. } | WatermarkError::Decryption(_)
        )
    }
}

/// Result type for watermark operations.
pub type Result<T> = std::result::Result<T, WatermarkError>;
