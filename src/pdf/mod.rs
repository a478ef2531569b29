//! PDF watermarking with a comment line.
//!
//! The marker is a `%` comment placed before the last `trailer` keyword, or
//! appended when the file has no classic trailer (cross-reference streams).
//! Nothing before the insertion point moves, so xref offsets stay valid.
//! Each add inserts another marker; the last one in the file wins. A damaged
//! marker after the last complete one fails extraction instead of letting an
//! older marker take its place.

use std::path::Path;

use memchr::memmem;

use crate::common::error::{Result, WatermarkError};
use crate::common::fs::{read_input, write_atomically};
use crate::common::signature::Signature;
use crate::config::WatermarkOptions;
use crate::envelope::EnvelopeCodec;
use crate::envelope::wire::{PDF_DELIMITERS, parse_fields};
use crate::strategy::{ExtractedWatermark, FormatKind, Watermarker};

const FORMAT: &str = "pdf";
const TRAILER: &[u8] = b"trailer";
const BEGIN_STEM: &[u8] = b"WATERMARK_BEGIN";
const END_STEM: &[u8] = b"WATERMARK_END";

/// Offset of a marker fragment in `tail`, if any.
fn stray_fragment(tail: &[u8]) -> Option<usize> {
    [BEGIN_STEM, END_STEM]
        .iter()
        .filter_map(|stem| memmem::find(tail, stem))
        .min()
}

/// Strategy for `.pdf` files.
#[derive(Debug, Clone)]
pub struct PdfWatermarker {
    codec: EnvelopeCodec,
}

impl PdfWatermarker {
    pub fn new(options: &WatermarkOptions) -> Self {
        Self {
            codec: options.codec_for(FormatKind::Pdf),
        }
    }

    pub fn embed(&self, data: &[u8], text: &str) -> Result<Vec<u8>> {
        Signature::Pdf.require(FORMAT, data)?;
        let envelope = self.codec.seal(text)?;
        let line = format!("\n{}\n", PDF_DELIMITERS.wrap(&envelope));

        let at = match memmem::rfind(data, TRAILER) {
            Some(pos) if pos > 0 => pos,
            _ => data.len(),
        };
        tracing::debug!(format = FORMAT, offset = at, appended = at == data.len(), "inserting marker");

        let mut out = Vec::with_capacity(data.len() + line.len());
        out.extend_from_slice(&data[..at]);
        out.extend_from_slice(line.as_bytes());
        out.extend_from_slice(&data[at..]);
        Ok(out)
    }

    pub fn recover(&self, data: &[u8]) -> Result<ExtractedWatermark> {
        Signature::Pdf.require(FORMAT, data)?;
        let spans = PDF_DELIMITERS.find_all(data);
        let tail_start = spans.last().map_or(0, |s| s.outer.end);
        if let Some(rel) = stray_fragment(&data[tail_start..]) {
            return Err(WatermarkError::Decryption(format!(
                "damaged watermark marker at byte {}",
                tail_start + rel
            )));
        }
        let Some(span) = spans.last() else {
            return Err(WatermarkError::WatermarkNotFound {
                format: FORMAT,
                searched: vec!["comment lines".to_string()],
            });
        };
        if spans.len() > 1 {
            tracing::debug!(count = spans.len(), "several markers, using the last");
        }

        let fields = std::str::from_utf8(&data[span.inner.clone()])
            .map_err(|e| WatermarkError::Decryption(format!("marker is not UTF-8: {}", e)))?;
        let opened = self.codec.open_payload(&parse_fields(fields)?)?;
        Ok(ExtractedWatermark::from_opened(
            opened,
            format!("comment at byte {}", span.outer.start),
        ))
    }
}

impl Watermarker for PdfWatermarker {
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
        FormatKind::Pdf
    }
}
