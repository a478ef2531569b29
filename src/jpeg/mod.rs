//! JPEG watermarking through a comment (COM) segment.
//!
//! Adding decodes the image, re-encodes it at the configured quality and
//! inserts one COM segment right after SOI. The segment payload is the
//! `WATERMARK:` tag followed by base64 of the JSON envelope. Re-encoding
//! drops any comment an earlier add left behind, so adding twice replaces.

pub mod segment;

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

use self::segment::{COM, SegmentWalker, com_segment};
use crate::common::error::{Result, WatermarkError};
use crate::common::fs::{read_input, write_atomically};
use crate::common::signature::Signature;
use crate::config::WatermarkOptions;
use crate::envelope::EnvelopeCodec;
use crate::envelope::wire::{is_json_tagged, parse_json_tag, to_json_tag};
use crate::strategy::{ExtractedWatermark, FormatKind, Watermarker};

const FORMAT: &str = "jpg";
const LOCATION: &str = "COM segment";

/// Strategy for `.jpg` and `.jpeg` files.
#[derive(Debug, Clone)]
pub struct JpegWatermarker {
    codec: EnvelopeCodec,
    quality: u8,
}

impl JpegWatermarker {
    pub fn new(options: &WatermarkOptions) -> Self {
        Self {
            codec: options.codec_for(FormatKind::Jpeg),
            quality: options.jpeg_quality,
        }
    }

    /// Re-encode `data` and insert the watermark comment.
    pub fn embed(&self, data: &[u8], text: &str) -> Result<Vec<u8>> {
        Signature::Jpeg.require(FORMAT, data)?;
        let envelope = self.codec.seal(text)?;
        let comment = com_segment(&to_json_tag(&envelope)?)?;

        let encoded = self.reencode(data)?;
        if !Signature::Jpeg.matches(&encoded) {
            return Err(WatermarkError::Repack("encoder output lacks SOI".into()));
        }

        let mut out = Vec::with_capacity(encoded.len() + comment.len());
        out.extend_from_slice(&encoded[..2]);
        out.extend_from_slice(&comment);
        out.extend_from_slice(&encoded[2..]);
        Ok(out)
    }

    fn reencode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let decoded = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?;
        // The baseline encoder takes only gray or RGB input
        let image = match decoded {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => decoded,
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        };

        let mut buffer = Cursor::new(Vec::new());
        image.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, self.quality))?;
        Ok(buffer.into_inner())
    }

    /// Find and open the first tagged comment in `data`.
    pub fn recover(&self, data: &[u8]) -> Result<ExtractedWatermark> {
        Signature::Jpeg.require(FORMAT, data)?;

        let mut walker = SegmentWalker::new(data);
        let tagged = walker
            .by_ref()
            .filter(|s| s.marker == COM)
            .map(|s| &data[s.payload])
            .find(|payload| is_json_tagged(payload));

        let Some(payload) = tagged else {
            let mut searched = vec![LOCATION.to_string()];
            if let Some(reason) = walker.stopped_early() {
                searched.push(format!("walk ended early: {}", reason));
            }
            return Err(WatermarkError::WatermarkNotFound {
                format: FORMAT,
                searched,
            });
        };

        let envelope = parse_json_tag(payload)?;
        let opened = self.codec.open(&envelope)?;
        Ok(ExtractedWatermark::from_opened(opened, LOCATION))
    }
}

impl Watermarker for JpegWatermarker {
    fn add(&self, input: &Path, output: &Path, text: &str) -> Result<()> {
        let data = read_input(input)?;
        let marked = self.embed(&data, text)?;
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
        FormatKind::Jpeg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Integrity;
    use image::{Rgb, RgbImage};

    fn sample_jpeg() -> Vec<u8> {
        let img = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 128]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, ImageFormat::Jpeg)
            .unwrap();
        buffer.into_inner()
    }

    fn strategy() -> JpegWatermarker {
        JpegWatermarker::new(&WatermarkOptions::default())
    }

    fn tagged_comments(data: &[u8]) -> usize {
        SegmentWalker::new(data)
            .filter(|s| s.marker == COM && is_json_tagged(&data[s.payload.clone()]))
            .count()
    }

    #[test]
    fn test_embed_and_recover() {
        let s = strategy();
        let marked = s.embed(&sample_jpeg(), "CONFIDENTIAL").unwrap();
        assert_eq!(&marked[2..4], &[0xFF, COM]);
        let wm = s.recover(&marked).unwrap();
        assert_eq!(wm.text, "CONFIDENTIAL");
        assert_eq!(wm.integrity, Integrity::Verified);
        assert!(image::load_from_memory_with_format(&marked, ImageFormat::Jpeg).is_ok());
    }

    #[test]
    fn test_readd_keeps_single_comment() {
        let s = strategy();
        let once = s.embed(&sample_jpeg(), "first").unwrap();
        let twice = s.embed(&once, "second").unwrap();
        assert_eq!(tagged_comments(&twice), 1);
        assert_eq!(s.recover(&twice).unwrap().text, "second");
    }

    #[test]
    fn test_plain_jpeg_has_no_watermark() {
        assert!(matches!(
            strategy().recover(&sample_jpeg()),
            Err(WatermarkError::WatermarkNotFound { format: "jpg", .. })
        ));
    }

    #[test]
    fn test_untagged_comment_ignored() {
        let mut data = sample_jpeg();
        let comment = com_segment(b"made with a camera").unwrap();
        data.splice(2..2, comment);
        assert!(strategy().recover(&data).is_err());
    }

    #[test]
    fn test_rejects_non_jpeg() {
        assert!(matches!(
            strategy().embed(b"\x89PNG\r\n\x1a\n", "x"),
            Err(WatermarkError::InvalidFormatSignature { format: "jpg", .. })
        ));
    }
}
