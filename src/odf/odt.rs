//! OpenDocument Text strategy.

use std::fmt;
use std::path::Path;

use super::constants::{
    ODF_MANIFEST, ODF_META, ODF_MIMETYPE, ODF_TEXT, WATERMARK_PART, XML_MEDIA_TYPE,
};
use super::manifest::{Manifest, ensure_file_entry, minimal_manifest};
use super::meta;
use crate::common::error::{Result, WatermarkError};
use crate::common::fs::{read_input, write_atomically};
use crate::common::package::{PackageEditor, apply_anchors};
use crate::common::xml::splice::check_well_formed;
use crate::config::WatermarkOptions;
use crate::envelope::wire::{OFFICE_DELIMITERS, Payload, parse_fields, parse_xml_element, to_xml_element};
use crate::envelope::{Envelope, EnvelopeCodec};
use crate::strategy::{ExtractedWatermark, FormatKind, Watermarker};

const FORMAT: &str = "odt";

type AnchorResult<T> = std::result::Result<T, String>;

/// An envelope location inside an ODT package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdtAnchor {
    /// Dedicated `<meta:keyword>` in `meta.xml`
    MetaKeyword,
    /// `<meta:user-defined meta:name="Watermark">` in `meta.xml`
    UserDefined,
    /// `watermark-data.xml`, listed in the manifest
    AuxiliaryPart,
}

/// Anchors in priority order, for both writing and reading.
pub const ANCHOR_ORDER: [OdtAnchor; 3] = [
    OdtAnchor::MetaKeyword,
    OdtAnchor::UserDefined,
    OdtAnchor::AuxiliaryPart,
];

impl fmt::Display for OdtAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OdtAnchor::MetaKeyword => write!(f, "{}#{}", ODF_META, meta::KEYWORD_TAG),
            OdtAnchor::UserDefined => write!(f, "{}#{}", ODF_META, meta::USER_DEFINED_TAG),
            OdtAnchor::AuxiliaryPart => f.write_str(WATERMARK_PART),
        }
    }
}

impl OdtAnchor {
    fn write(self, pkg: &mut PackageEditor, envelope: &Envelope) -> AnchorResult<()> {
        match self {
            OdtAnchor::MetaKeyword | OdtAnchor::UserDefined => {
                let marker = OFFICE_DELIMITERS.wrap(envelope);
                let existing = read_part(pkg, ODF_META)?;
                let base = existing.clone().unwrap_or_else(meta::empty_meta);
                let edited = if self == OdtAnchor::MetaKeyword {
                    meta::write_keyword(&base, &marker)?
                } else {
                    meta::write_user_defined(&base, &marker)?
                };
                if existing.is_none() {
                    register_part(pkg, ODF_META)?;
                }
                pkg.write(ODF_META, edited);
                Ok(())
            },
            OdtAnchor::AuxiliaryPart => {
                let xml = to_xml_element(envelope);
                check_well_formed(xml.as_bytes())?;
                register_part(pkg, WATERMARK_PART)?;
                pkg.write(WATERMARK_PART, xml.into_bytes());
                Ok(())
            },
        }
    }

    fn read(self, pkg: &mut PackageEditor) -> AnchorResult<Option<Payload>> {
        match self {
            OdtAnchor::MetaKeyword | OdtAnchor::UserDefined => {
                let Some(meta_xml) = read_part(pkg, ODF_META)? else {
                    return Ok(None);
                };
                let fields = if self == OdtAnchor::MetaKeyword {
                    meta::read_keyword(&meta_xml)
                } else {
                    meta::read_user_defined(&meta_xml)
                };
                match fields {
                    Some(fields) => parse_fields(&fields).map(Some).map_err(|e| e.to_string()),
                    None => Ok(None),
                }
            },
            OdtAnchor::AuxiliaryPart => match pkg.read(WATERMARK_PART).map_err(|e| e.to_string())? {
                Some(xml) => parse_xml_element(&xml)
                    .map(|envelope| Some(Payload::Sealed(envelope)))
                    .map_err(|e| e.to_string()),
                None => Ok(None),
            },
        }
    }
}

fn read_part(pkg: &mut PackageEditor, name: &str) -> AnchorResult<Option<String>> {
    pkg.read_string(name).map_err(|e| e.to_string())
}

/// List `path` in the manifest, creating a minimal manifest when absent.
fn register_part(pkg: &mut PackageEditor, path: &str) -> AnchorResult<()> {
    let manifest = read_part(pkg, ODF_MANIFEST)?.unwrap_or_else(|| minimal_manifest(ODF_TEXT));
    let edited = ensure_file_entry(&manifest, path, XML_MEDIA_TYPE)?;
    pkg.write(ODF_MANIFEST, edited.into_bytes());
    Ok(())
}

/// Strategy for `.odt` packages.
#[derive(Debug, Clone)]
pub struct OdtWatermarker {
    codec: EnvelopeCodec,
    redundant_writes: bool,
}

impl OdtWatermarker {
    pub fn new(options: &WatermarkOptions) -> Self {
        Self {
            codec: options.codec_for(FormatKind::Odt),
            redundant_writes: options.redundant_writes,
        }
    }

    /// Open the package and confirm it is an OpenDocument text document.
    ///
    /// The `mimetype` member decides; packages without one fall back to the
    /// manifest root entry.
    fn open_package(&self, input: &Path) -> Result<PackageEditor> {
        let mut pkg = PackageEditor::open(read_input(input)?, FORMAT)?;
        let mimetype = match pkg.read_string(ODF_MIMETYPE)? {
            Some(mimetype) => Some(mimetype.trim().to_string()),
            None => pkg
                .read_string(ODF_MANIFEST)?
                .and_then(|xml| Manifest::parse(&xml).ok())
                .and_then(|m| m.root_media_type().map(str::to_string)),
        };

        match mimetype {
            Some(mimetype) if mimetype.starts_with(ODF_TEXT) => Ok(pkg),
            Some(other) => Err(WatermarkError::InvalidFormatSignature {
                format: FORMAT,
                detail: format!("package MIME type is {}", other),
            }),
            None => Err(WatermarkError::InvalidFormatSignature {
                format: FORMAT,
                detail: "package has no mimetype member or manifest".to_string(),
            }),
        }
    }

    /// Add to a package already in memory.
    pub fn add_to_package(&self, pkg: &mut PackageEditor, text: &str) -> Result<Vec<String>> {
        let envelope = self.codec.seal(text)?;
        let outcome = apply_anchors(FORMAT, &ANCHOR_ORDER, self.redundant_writes, |anchor| {
            anchor.write(pkg, &envelope)
        })?;
        Ok(outcome.written)
    }

    /// Extract from a package already in memory.
    pub fn extract_from_package(&self, pkg: &mut PackageEditor) -> Result<ExtractedWatermark> {
        let mut searched = Vec::new();
        for anchor in ANCHOR_ORDER {
            searched.push(anchor.to_string());
            match anchor.read(pkg) {
                Ok(Some(payload)) => {
                    let opened = self.codec.open_payload(&payload)?;
                    return Ok(ExtractedWatermark::from_opened(opened, anchor.to_string()));
                },
                Ok(None) => {},
                Err(reason) => {
                    tracing::debug!(anchor = %anchor, %reason, "malformed envelope, trying next anchor");
                },
            }
        }

        Err(WatermarkError::WatermarkNotFound {
            format: FORMAT,
            searched,
        })
    }
}

impl Watermarker for OdtWatermarker {
    fn add(&self, input: &Path, output: &Path, text: &str) -> Result<()> {
        let mut pkg = self.open_package(input)?;
        let written = self.add_to_package(&mut pkg, text)?;
        let bytes = pkg.finish()?;
        write_atomically(output, &bytes)?;
        tracing::debug!(format = FORMAT, anchors = ?written, output = %output.display(), "watermark added");
        Ok(())
    }

    fn extract(&self, input: &Path) -> Result<ExtractedWatermark> {
        let mut pkg = self.open_package(input)?;
        self.extract_from_package(&mut pkg)
    }

    fn supported_extension(&self) -> &'static str {
        FORMAT
    }

    fn format(&self) -> FormatKind {
        FormatKind::Odt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::package::tests::build_zip;
    use crate::envelope::Integrity;

    const MANIFEST: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?><manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0" manifest:version="1.2"><manifest:file-entry manifest:full-path="/" manifest:media-type="application/vnd.oasis.opendocument.text"/><manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml"/></manifest:manifest>"#;

    fn odt(with_meta: bool) -> Vec<u8> {
        let meta: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?><office:document-meta xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:meta="urn:oasis:names:tc:opendocument:xmlns:meta:1.0"><office:meta><meta:keyword>draft</meta:keyword></office:meta></office:document-meta>"#;
        let mut members: Vec<(&str, &[u8])> = vec![
            ("mimetype", ODF_TEXT.as_bytes()),
            ("content.xml", b"<office:document-content/>"),
            (ODF_MANIFEST, MANIFEST),
        ];
        if with_meta {
            members.push((ODF_META, meta));
        }
        build_zip(&members)
    }

    fn strategy() -> OdtWatermarker {
        OdtWatermarker::new(&WatermarkOptions::default())
    }

    #[test]
    fn test_package_roundtrip_all_anchors() {
        let s = strategy();
        let mut pkg = PackageEditor::open(odt(true), FORMAT).unwrap();
        let written = s.add_to_package(&mut pkg, "内部资料").unwrap();
        assert_eq!(written.len(), 3);

        let mut reopened = PackageEditor::open(pkg.finish().unwrap(), FORMAT).unwrap();
        let wm = s.extract_from_package(&mut reopened).unwrap();
        assert_eq!(wm.text, "内部资料");
        assert_eq!(wm.integrity, Integrity::Verified);
        assert_eq!(wm.location, "meta.xml#meta:keyword");

        let manifest = reopened.read_string(ODF_MANIFEST).unwrap().unwrap();
        assert!(Manifest::parse(&manifest).unwrap().has_path(WATERMARK_PART));
        assert_eq!(reopened.member_names()[0], "mimetype");
    }

    #[test]
    fn test_meta_created_when_absent() {
        let s = strategy();
        let mut pkg = PackageEditor::open(odt(false), FORMAT).unwrap();
        s.add_to_package(&mut pkg, "wm").unwrap();
        assert!(pkg.contains(ODF_META));
        let manifest = pkg.read_string(ODF_MANIFEST).unwrap().unwrap();
        assert!(Manifest::parse(&manifest).unwrap().has_path(ODF_META));
    }

    #[test]
    fn test_auxiliary_part_alone_is_found() {
        let s = strategy();
        let envelope = s.codec.seal("aux only").unwrap();
        let mut members: Vec<(&str, &[u8])> = vec![("mimetype", ODF_TEXT.as_bytes())];
        let xml = to_xml_element(&envelope);
        members.push((WATERMARK_PART, xml.as_bytes()));
        let mut pkg = PackageEditor::open(build_zip(&members), FORMAT).unwrap();
        let wm = s.extract_from_package(&mut pkg).unwrap();
        assert_eq!(wm.text, "aux only");
        assert_eq!(wm.location, WATERMARK_PART);
    }

    #[test]
    fn test_not_found_lists_anchors() {
        let mut pkg = PackageEditor::open(odt(true), FORMAT).unwrap();
        match strategy().extract_from_package(&mut pkg).unwrap_err() {
            WatermarkError::WatermarkNotFound { searched, .. } => assert_eq!(searched.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_wrong_mimetype_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.odt");
        std::fs::write(
            &path,
            build_zip(&[("mimetype", b"application/vnd.oasis.opendocument.spreadsheet")]),
        )
        .unwrap();
        assert!(matches!(
            strategy().extract(&path),
            Err(WatermarkError::InvalidFormatSignature { format: "odt", .. })
        ));
    }
}
