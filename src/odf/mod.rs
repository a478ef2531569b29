//! OpenDocument Format (ODF) watermarking.
//!
//! Only text documents (.odt) carry a strategy. The envelope is written to
//! `meta.xml` (a keyword and a user-defined field) and to a standalone
//! `watermark-data.xml` part registered in `META-INF/manifest.xml`.

pub mod constants;
pub mod manifest;
pub mod meta;
pub mod odt;

pub use manifest::Manifest;
pub use odt::{OdtAnchor, OdtWatermarker};
