//! Office Open XML (OOXML) watermarking.
//!
//! Word (.docx), Excel (.xlsx) and PowerPoint (.pptx) packages share one
//! strategy, [`OfficeWatermarker`], parameterized by an [`OfficeVariant`].
//!
//! # Architecture
//!
//! 1. **Package layer** (`crate::common::package`): member-level ZIP rewrite
//! 2. **Part helpers** (`constants`, `content_types`, `custom_properties`):
//!    content types, package relationships and the custom property part
//! 3. **Anchors** (`anchors`, `legacy`): where envelopes are written and found
//! 4. **Variants** (`docx`, `xlsx`, `pptx`)
//!
//! # Example
//!
//! ```rust,no_run
//! use docmark::config::WatermarkOptions;
//! use docmark::ooxml::OfficeWatermarker;
//! use docmark::strategy::Watermarker;
//! use std::path::Path;
//!
//! let docx = OfficeWatermarker::docx(&WatermarkOptions::default());
//! docx.add(Path::new("report.docx"), Path::new("report.marked.docx"), "CONFIDENTIAL")?;
//! let found = docx.extract(Path::new("report.marked.docx"))?;
//! println!("{} (sealed {})", found.text, found.timestamp_string());
//! # Ok::<(), docmark::WatermarkError>(())
//! ```
pub mod anchors;
pub mod constants;
pub mod content_types;
pub mod custom_properties;
pub mod docx;
pub mod legacy;
pub mod office;
pub mod pptx;
pub mod xlsx;

pub use anchors::OfficeAnchor;
pub use custom_properties::CustomProperties;
pub use office::{OfficeVariant, OfficeWatermarker};
