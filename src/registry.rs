//! Extension-keyed lookup of format strategies.
//!
//! A [`FormatRegistry`] is built once, usually with
//! [`FormatRegistry::with_defaults`], and then shared read-only behind an
//! `Arc`. Keys are lowercase extensions without a leading dot.
//!
//! # Examples
//!
//! ```rust
//! use docmark::config::WatermarkOptions;
//! use docmark::registry::FormatRegistry;
//!
//! let registry = FormatRegistry::with_defaults(&WatermarkOptions::default());
//! assert!(registry.lookup(".JPEG").is_some());
//! assert!(registry.lookup("bmp").is_none());
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use crate::common::error::{Result, WatermarkError};
use crate::config::WatermarkOptions;
use crate::strategy::Watermarker;

/// Maps file extensions to strategies.
#[derive(Default, Clone)]
pub struct FormatRegistry {
    strategies: BTreeMap<String, Arc<dyn Watermarker>>,
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("extensions", &self.strategies.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn normalize(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

impl FormatRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in strategy enabled at compile time.
    pub fn with_defaults(options: &WatermarkOptions) -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "ooxml")]
        {
            use crate::ooxml::OfficeWatermarker;
            registry.register(Arc::new(OfficeWatermarker::docx(options)));
            registry.register(Arc::new(OfficeWatermarker::xlsx(options)));
            registry.register(Arc::new(OfficeWatermarker::pptx(options)));
        }

        #[cfg(feature = "odf")]
        registry.register(Arc::new(crate::odf::OdtWatermarker::new(options)));

        #[cfg(feature = "images")]
        {
            let jpeg: Arc<dyn Watermarker> = Arc::new(crate::jpeg::JpegWatermarker::new(options));
            registry.register(Arc::clone(&jpeg));
            registry.register_alias("jpeg", jpeg);
            registry.register(Arc::new(crate::png::PngWatermarker::new(options)));
        }

        registry.register(Arc::new(crate::pdf::PdfWatermarker::new(options)));
        registry.register(Arc::new(crate::rtf::RtfWatermarker::new(options)));

        tracing::debug!(extensions = ?registry.all_extensions(), "format registry built");
        registry
    }

    /// Register `strategy` under its own extension, replacing any previous
    /// registration.
    pub fn register(&mut self, strategy: Arc<dyn Watermarker>) {
        let ext = strategy.supported_extension();
        self.register_alias(ext, strategy);
    }

    /// Register `strategy` under an additional extension.
    pub fn register_alias(&mut self, ext: &str, strategy: Arc<dyn Watermarker>) {
        let key = normalize(ext);
        if let Some(previous) = self.strategies.insert(key.clone(), strategy) {
            tracing::info!(
                extension = %key,
                replaced = %previous.format(),
                "strategy registration replaced"
            );
        }
    }

    pub fn lookup(&self, ext: &str) -> Option<Arc<dyn Watermarker>> {
        self.strategies.get(&normalize(ext)).cloned()
    }

    /// Strategy for `path`, chosen by its extension.
    pub fn lookup_path(&self, path: &Path) -> Result<Arc<dyn Watermarker>> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                WatermarkError::UnsupportedFormat(format!("{} has no extension", path.display()))
            })?;
        self.lookup(ext)
            .ok_or_else(|| WatermarkError::UnsupportedFormat(normalize(ext)))
    }

    /// Every registered extension, sorted.
    pub fn all_extensions(&self) -> BTreeSet<String> {
        self.strategies.keys().cloned().collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
