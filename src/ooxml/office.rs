//! Watermark strategy shared by the three OOXML package types.

use std::path::Path;

use super::anchors::{OfficeAnchor, anchor_order};
use super::constants::part;
use super::legacy::{self, LegacyHit};
use crate::common::error::{Result, WatermarkError};
use crate::common::fs::{read_input, write_atomically};
use crate::common::package::{PackageEditor, apply_anchors};
use crate::config::WatermarkOptions;
use crate::envelope::EnvelopeCodec;
use crate::envelope::wire::{OFFICE_DELIMITERS, parse_fields};
use crate::strategy::{ExtractedWatermark, FormatKind, Watermarker};

/// What distinguishes one OOXML package type from another.
#[derive(Debug, Clone, Copy)]
pub struct OfficeVariant {
    pub kind: FormatKind,
    pub extension: &'static str,
    /// Part every package of this type must contain
    pub main_part: &'static str,
    /// Part created to hold only the envelope
    pub aux_part: &'static str,
    /// Parts earlier encoders wrote sealed envelopes into
    pub legacy_sealed_parts: &'static [&'static str],
    /// Prefix of parts that may carry plaintext watermark comments, empty for none
    pub legacy_comment_prefix: &'static str,
}

impl OfficeVariant {
    fn comment_parts(&self, pkg: &PackageEditor) -> Vec<String> {
        if self.legacy_comment_prefix.is_empty() {
            return Vec::new();
        }
        let mut parts: Vec<String> = pkg
            .member_names()
            .into_iter()
            .filter(|n| n.starts_with(self.legacy_comment_prefix) && n.ends_with(".xml"))
            .collect();
        parts.sort();
        parts
    }
}

/// Strategy for DOCX, XLSX and PPTX packages.
///
/// The envelope is written to the core keywords, the `Watermark` custom
/// property and an auxiliary part. Adding to a watermarked package replaces
/// the envelope at every anchor.
#[derive(Debug, Clone)]
pub struct OfficeWatermarker {
    variant: OfficeVariant,
    codec: EnvelopeCodec,
    redundant_writes: bool,
    legacy_scan: bool,
}

impl OfficeWatermarker {
    pub fn new(variant: OfficeVariant, options: &WatermarkOptions) -> Self {
        Self {
            variant,
            codec: options.codec_for(variant.kind),
            redundant_writes: options.redundant_writes,
            legacy_scan: options.legacy_scan,
        }
    }

    #[inline]
    pub fn variant(&self) -> &OfficeVariant {
        &self.variant
    }

    fn open_package(&self, input: &Path) -> Result<PackageEditor> {
        let pkg = PackageEditor::open(read_input(input)?, self.variant.extension)?;
        if !pkg.has_original(self.variant.main_part) {
            return Err(WatermarkError::InvalidFormatSignature {
                format: self.variant.extension,
                detail: format!("package has no {}", self.variant.main_part),
            });
        }
        Ok(pkg)
    }

    /// Add to a package already in memory.
    pub fn add_to_package(&self, pkg: &mut PackageEditor, text: &str) -> Result<Vec<String>> {
        let envelope = self.codec.seal(text)?;
        let marker = OFFICE_DELIMITERS.wrap(&envelope);
        let anchors = anchor_order(self.variant.aux_part);
        let outcome = apply_anchors(
            self.variant.extension,
            &anchors,
            self.redundant_writes,
            |anchor: OfficeAnchor| anchor.write(pkg, &marker),
        )?;
        Ok(outcome.written)
    }

    /// Extract from a package already in memory.
    pub fn extract_from_package(&self, pkg: &mut PackageEditor) -> Result<ExtractedWatermark> {
        let mut searched = Vec::new();

        for anchor in anchor_order(self.variant.aux_part) {
            searched.push(anchor.to_string());
            let fields = match anchor.read(pkg) {
                Ok(Some(fields)) => fields,
                Ok(None) => continue,
                Err(reason) => {
                    tracing::debug!(anchor = %anchor, %reason, "anchor unreadable");
                    continue;
                },
            };
            match parse_fields(&fields) {
                Ok(payload) => {
                    let opened = self.codec.open_payload(&payload)?;
                    return Ok(ExtractedWatermark::from_opened(opened, anchor.to_string()));
                },
                Err(e) => {
                    tracing::debug!(anchor = %anchor, error = %e, "malformed envelope, trying next anchor");
                },
            }
        }

        if self.legacy_scan
            && let Some(hit) = self.scan_legacy(pkg, &mut searched)
        {
            tracing::warn!(
                format = self.variant.extension,
                location = %hit.location,
                "watermark recovered from a legacy location"
            );
            let opened = self.codec.open_payload(&hit.payload)?;
            return Ok(ExtractedWatermark::from_opened(opened, hit.location));
        }

        Err(WatermarkError::WatermarkNotFound {
            format: self.variant.extension,
            searched,
        })
    }

    fn scan_legacy(&self, pkg: &mut PackageEditor, searched: &mut Vec<String>) -> Option<LegacyHit> {
        let sealed: Vec<String> = self
            .variant
            .legacy_sealed_parts
            .iter()
            .map(|p| p.to_string())
            .collect();
        searched.extend(sealed.iter().cloned());
        if let Some(hit) = legacy::scan_sealed(pkg, &sealed) {
            return Some(hit);
        }

        searched.push(format!("{} (plaintext)", part::CORE_PROPERTIES));
        if let Some(hit) = legacy::scan_plain_token(pkg, part::CORE_PROPERTIES) {
            return Some(hit);
        }

        let comment_parts = self.variant.comment_parts(pkg);
        searched.extend(comment_parts.iter().map(|p| format!("{} (comment)", p)));
        legacy::scan_comments(pkg, &comment_parts)
    }
}

impl Watermarker for OfficeWatermarker {
    fn add(&self, input: &Path, output: &Path, text: &str) -> Result<()> {
        let mut pkg = self.open_package(input)?;
        let written = self.add_to_package(&mut pkg, text)?;
        let bytes = pkg.finish()?;
        write_atomically(output, &bytes)?;
        tracing::debug!(
            format = self.variant.extension,
            anchors = ?written,
            output = %output.display(),
            "watermark added"
        );
        Ok(())
    }

    fn extract(&self, input: &Path) -> Result<ExtractedWatermark> {
        let mut pkg = self.open_package(input)?;
        self.extract_from_package(&mut pkg)
    }

    fn supported_extension(&self) -> &'static str {
        self.variant.extension
    }

    fn format(&self) -> FormatKind {
        self.variant.kind
    }
}
