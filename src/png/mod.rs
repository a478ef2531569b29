//! PNG watermarking by appending a marker after the image data.
//!
//! Decoders stop at the IEND chunk, so bytes after it are invisible to
//! viewers. Adding re-encodes the image first, which discards anything an
//! earlier add appended.

use std::io::Cursor;
use std::path::Path;

use image::ImageFormat;

use crate::common::error::{Result, WatermarkError};
use crate::common::fs::{read_input, write_atomically};
use crate::common::signature::Signature;
use crate::config::WatermarkOptions;
use crate::envelope::EnvelopeCodec;
use crate::envelope::wire::{PNG_DELIMITERS, parse_fields};
use crate::strategy::{ExtractedWatermark, FormatKind, Watermarker};

const FORMAT: &str = "png";
const LOCATION: &str = "trailing bytes";

/// Strategy for `.png` files.
#[derive(Debug, Clone)]
pub struct PngWatermarker {
    codec: EnvelopeCodec,
}

impl PngWatermarker {
    pub fn new(options: &WatermarkOptions) -> Self {
        Self {
            codec: options.codec_for(FormatKind::Png),
        }
    }

    pub fn embed(&self, data: &[u8], text: &str) -> Result<Vec<u8>> {
        Signature::Png.require(FORMAT, data)?;
        let envelope = self.codec.seal(text)?;

        let image = image::load_from_memory_with_format(data, ImageFormat::Png)?;
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png)?;

        let mut out = buffer.into_inner();
        out.push(b'\n');
        out.extend_from_slice(PNG_DELIMITERS.wrap(&envelope).as_bytes());
        out.push(b'\n');
        Ok(out)
    }

    pub fn recover(&self, data: &[u8]) -> Result<ExtractedWatermark> {
        Signature::Png.require(FORMAT, data)?;
        let span = PNG_DELIMITERS
            .find_first(data)
            .ok_or_else(|| WatermarkError::WatermarkNotFound {
                format: FORMAT,
                searched: vec![LOCATION.to_string()],
            })?;

        let fields = std::str::from_utf8(&data[span.inner])
            .map_err(|e| WatermarkError::Decryption(format!("marker is not UTF-8: {}", e)))?;
        let opened = self.codec.open_payload(&parse_fields(fields)?)?;
        Ok(ExtractedWatermark::from_opened(opened, LOCATION))
    }
}

impl Watermarker for PngWatermarker {
    fn add(&self, input: &Path, output: &Path, text: &str) -> Result<()> {
        let marked = self.embed(&read_input(input)?, text)?;
        write_atomically(output, &marked)?;
        tracing::debug!(format = FORMAT, bytes = marked.len(), output = %output.display(), "watermark added");
        Ok(())
    }

    fn extract(&self, input: &Path) -> Result<ExtractedWatermark> {
        self.recover(&read_input(input)?)
    }

    fn supported_extension(&self) -> &'static str {
        FORMAT
    }

    fn format(&self) -> FormatKind {
        FormatKind::Png
    }
}
