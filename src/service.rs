//! Calling discipline for strategies: validation, dispatch and time limits.
//!
//! [`WatermarkService`] validates watermark text, picks the strategy for a
//! path by extension and, with the `service` feature, runs calls on the
//! blocking pool under a wall-clock budget. A call that overruns is abandoned:
//! its result is discarded when it eventually finishes and the destination
//! path is never written.
//!
//! # Example
//!
//! ```rust,no_run
//! use docmark::config::WatermarkOptions;
//! use docmark::service::WatermarkService;
//! use std::path::Path;
//!
//! let service = WatermarkService::new(WatermarkOptions::default())?;
//! service.add_file(Path::new("in.pdf"), Path::new("out.pdf"), "CONFIDENTIAL")?;
//! let found = service.extract_file(Path::new("out.pdf"))?;
//! assert_eq!(found.text, "CONFIDENTIAL");
//! # Ok::<(), docmark::WatermarkError>(())
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::common::error::Result;
use crate::config::WatermarkOptions;
use crate::registry::FormatRegistry;
use crate::strategy::ExtractedWatermark;

/// Entry point for callers that work with paths.
#[derive(Debug, Clone)]
pub struct WatermarkService {
    registry: Arc<FormatRegistry>,
    options: WatermarkOptions,
    timeout: Duration,
}

impl WatermarkService {
    /// Validate `options` and build a service over the default strategies.
    pub fn new(options: WatermarkOptions) -> Result<Self> {
        options.validate()?;
        let registry = Arc::new(FormatRegistry::with_defaults(&options));
        Ok(Self::with_registry(registry, options))
    }

    /// A service over a caller-built registry.
    pub fn with_registry(registry: Arc<FormatRegistry>, options: WatermarkOptions) -> Self {
        let timeout = options.timeout();
        Self {
            registry,
            options,
            timeout,
        }
    }

    /// Override the wall-clock budget of the `*_with_timeout` calls.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[inline]
    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    #[inline]
    pub fn options(&self) -> &WatermarkOptions {
        &self.options
    }

    pub fn supported_extensions(&self) -> BTreeSet<String> {
        self.registry.all_extensions()
    }

    /// Watermark `input` into `output` on the calling thread.
    pub fn add_file(&self, input: &Path, output: &Path, text: &str) -> Result<()> {
        self.options.validate_text(text)?;
        let strategy = self.registry.lookup_path(input)?;
        strategy.add(input, output, text)?;
        tracing::info!(
            format = %strategy.format(),
            input = %input.display(),
            output = %output.display(),
            "watermark added"
        );
        Ok(())
    }

    /// Extract the watermark of `input` on the calling thread.
    pub fn extract_file(&self, input: &Path) -> Result<ExtractedWatermark> {
        let strategy = self.registry.lookup_path(input)?;
        let found = strategy.extract(input)?;
        tracing::info!(
            format = %strategy.format(),
            input = %input.display(),
            location = %found.location,
            integrity = ?found.integrity,
            "watermark extracted"
        );
        Ok(found)
    }
}

#[cfg(feature = "service")]
mod timed {
    use std::path::PathBuf;

    use super::WatermarkService;
    use crate::common::error::{Result, WatermarkError};
    use crate::common::fs::write_atomically;
    use crate::strategy::ExtractedWatermark;

    impl WatermarkService {
        /// [`add_file`](Self::add_file) on the blocking pool, bounded by the
        /// configured timeout.
        ///
        /// The strategy writes into a private staging directory; the output
        /// is copied into place only when the call finishes in time.
        pub async fn add_with_timeout(
            &self,
            input: PathBuf,
            output: PathBuf,
            text: String,
        ) -> Result<()> {
            self.options.validate_text(&text)?;
            let strategy = self.registry.lookup_path(&input)?;
            let staging = tempfile::tempdir()?;
            let staged = staging.path().join(
                output
                    .file_name()
                    .map(|n| n.to_os_string())
                    .unwrap_or_else(|| "output".into()),
            );

            let work = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
                // Dropped with the closure, so abandoned calls still clean up
                let _staging = staging;
                strategy.add(&input, &staged, &text)?;
                Ok(std::fs::read(&staged)?)
            });

            let bytes = match tokio::time::timeout(self.timeout, work).await {
                Ok(joined) => joined.map_err(|e| {
                    WatermarkError::Repack(format!("watermark task failed: {}", e))
                })??,
                Err(_) => {
                    tracing::warn!(output = %output.display(), timeout = ?self.timeout, "add abandoned");
                    return Err(WatermarkError::Timeout(self.timeout));
                },
            };

            write_atomically(&output, &bytes)?;
            tracing::info!(output = %output.display(), "watermark added");
            Ok(())
        }

        /// [`extract_file`](Self::extract_file) on the blocking pool, bounded
        /// by the configured timeout.
        pub async fn extract_with_timeout(&self, input: PathBuf) -> Result<ExtractedWatermark> {
            let strategy = self.registry.lookup_path(&input)?;
            let work = tokio::task::spawn_blocking(move || strategy.extract(&input));

            match tokio::time::timeout(self.timeout, work).await {
                Ok(joined) => joined.map_err(|e| {
                    WatermarkError::Repack(format!("watermark task failed: {}", e))
                })?,
                Err(_) => {
                    tracing::warn!(timeout = ?self.timeout, "extract abandoned");
                    Err(WatermarkError::Timeout(self.timeout))
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::WatermarkError;
    use crate::strategy::{FormatKind, Watermarker};

    const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\ntrailer\n<<>>\n%%EOF\n";

    fn service() -> WatermarkService {
        WatermarkService::new(WatermarkOptions::default()).unwrap()
    }

    #[test]
    fn test_add_and_extract_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        std::fs::write(&input, PDF).unwrap();

        service().add_file(&input, &output, "CONFIDENTIAL-42").unwrap();
        assert_eq!(std::fs::read(&input).unwrap(), PDF);
        assert_eq!(service().extract_file(&output).unwrap().text, "CONFIDENTIAL-42");
    }

    #[test]
    fn test_text_validated_before_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, PDF).unwrap();
        let too_long = "x".repeat(101);
        assert!(matches!(
            service().add_file(&input, &dir.path().join("o.pdf"), &too_long),
            Err(WatermarkError::InvalidText(_))
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            service().extract_file(Path::new("archive.tar")),
            Err(WatermarkError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = WatermarkOptions::default().with_max_text_len(0);
        assert!(matches!(
            WatermarkService::new(options),
            Err(WatermarkError::Config(_))
        ));
    }

    struct Slow;

    impl Watermarker for Slow {
        fn add(&self, _input: &Path, output: &Path, _text: &str) -> Result<()> {
            std::thread::sleep(Duration::from_millis(400));
            std::fs::write(output, b"late")?;
            Ok(())
        }

        fn extract(&self, _input: &Path) -> Result<ExtractedWatermark> {
            std::thread::sleep(Duration::from_millis(400));
            Err(WatermarkError::WatermarkNotFound {
                format: "pdf",
                searched: Vec::new(),
            })
        }

        fn supported_extension(&self) -> &'static str {
            "pdf"
        }

        fn format(&self) -> FormatKind {
            FormatKind::Pdf
        }
    }

    fn slow_service() -> WatermarkService {
        let mut registry = FormatRegistry::new();
        registry.register(Arc::new(Slow));
        WatermarkService::with_registry(Arc::new(registry), WatermarkOptions::default())
            .with_timeout(Duration::from_millis(50))
    }

    #[cfg(feature = "service")]
    #[tokio::test]
    async fn test_add_timeout_leaves_destination_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        std::fs::write(&input, PDF).unwrap();

        let result = slow_service()
            .add_with_timeout(input, output.clone(), "x".into())
            .await;
        assert!(matches!(result, Err(WatermarkError::Timeout(_))));
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!output.exists());
    }

    #[cfg(feature = "service")]
    #[tokio::test]
    async fn test_extract_timeout() {
        let result = slow_service()
            .extract_with_timeout("any.pdf".into())
            .await;
        assert!(matches!(result, Err(WatermarkError::Timeout(_))));
    }

    #[cfg(feature = "service")]
    #[tokio::test]
    async fn test_timed_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        std::fs::write(&input, PDF).unwrap();

        let service = service();
        service
            .add_with_timeout(input, output.clone(), "timed".into())
            .await
            .unwrap();
        let found = service.extract_with_timeout(output).await.unwrap();
        assert_eq!(found.text, "timed");
    }
}
