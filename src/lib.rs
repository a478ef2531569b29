//! Docmark - tamper-evident watermarks for office documents and images
//!
//! This library embeds an encrypted, checksummed watermark text into a host
//! file without changing how the file renders, and recovers it later.
//!
//! # Features
//!
//! - **OOXML**: DOCX, XLSX and PPTX packages (core keywords, custom property,
//!   auxiliary part)
//! - **ODF**: ODT packages (meta keyword, user-defined field, auxiliary part)
//! - **Images**: JPEG comment segment, PNG trailing marker
//! - **PDF**: comment line before the trailer
//! - **RTF**: ignorable destination group
//! - **Envelope codec**: AES-GCM or legacy AES-CFB, MD5 checksum, lenient
//!   base64 decoding for files written by earlier encoders
//!
//! # Example - Watermarking by path
//!
//! ```no_run
//! use docmark::{WatermarkOptions, WatermarkService};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = WatermarkService::new(WatermarkOptions::default())?;
//! service.add_file(Path::new("report.docx"), Path::new("report-marked.docx"), "CONFIDENTIAL-42")?;
//!
//! let found = service.extract_file(Path::new("report-marked.docx"))?;
//! println!("{} sealed at {} ({:?})", found.text, found.timestamp_string(), found.integrity);
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Using a strategy directly
//!
//! ```no_run
//! use docmark::{FormatRegistry, WatermarkOptions};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = FormatRegistry::with_defaults(&WatermarkOptions::default());
//! let strategy = registry.lookup("pdf").ok_or("pdf not registered")?;
//! strategy.add(Path::new("in.pdf"), Path::new("in.pdf"), "DRAFT")?;
//! # Ok(())
//! # }
//! ```

/// Shared error type, file IO, binary readers, signatures and XML helpers
pub mod common;

/// Process-wide options and per-format profile overrides
pub mod config;

/// Envelope sealing and opening
pub mod envelope;

/// The per-format strategy contract
pub mod strategy;

/// Extension-keyed strategy lookup
pub mod registry;

/// Validation, dispatch and time-limited execution
pub mod service;

/// DOCX, XLSX and PPTX packages
#[cfg(feature = "ooxml")]
pub mod ooxml;

/// ODT packages
#[cfg(feature = "odf")]
pub mod odf;

#[cfg(feature = "images")]
pub mod jpeg;

#[cfg(feature = "images")]
pub mod png;

pub mod pdf;

pub mod rtf;

// Re-export commonly used types for convenience
pub use common::error::{Result, WatermarkError};
pub use config::WatermarkOptions;
pub use envelope::{Envelope, EnvelopeCodec, EnvelopeProfile, Integrity};
pub use registry::FormatRegistry;
pub use service::WatermarkService;
pub use strategy::{ExtractedWatermark, FormatKind, Watermarker};
