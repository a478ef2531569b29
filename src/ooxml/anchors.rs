//! Envelope locations inside an OOXML package.
//!
//! Anchors are tried in [`ANCHOR_ORDER`] both when writing and when reading.
//! Each writer edits one part as text, synthesizing the element or part when
//! it is missing, and re-parses the result before accepting it.

use std::fmt;

use super::constants::{content_type, namespace, part, relationship_type};
use super::content_types::{empty_relationships, ensure_override, ensure_relationship};
use super::custom_properties::{CustomProperties, WATERMARK_PROPERTY};
use super::legacy::strip_plain_tokens;
use crate::common::package::PackageEditor;
use crate::common::xml::splice::{
    check_well_formed, element_content_span, insert_before_last, remove_empty_element, splice,
};
use crate::envelope::wire::OFFICE_DELIMITERS;

type AnchorResult<T> = std::result::Result<T, String>;

const KEYWORDS_TAG: &str = "cp:keywords";
const CORE_ROOT_CLOSE: &str = "</cp:coreProperties>";

/// A primary envelope location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeAnchor {
    /// `<cp:keywords>` in the core properties part
    CoreKeywords,
    /// The `Watermark` custom document property
    CustomProperty,
    /// A package part holding only the envelope
    AuxiliaryPart(&'static str),
}

impl fmt::Display for OfficeAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfficeAnchor::CoreKeywords => write!(f, "{}#{}", part::CORE_PROPERTIES, KEYWORDS_TAG),
            OfficeAnchor::CustomProperty => {
                write!(f, "{}#{}", part::CUSTOM_PROPERTIES, WATERMARK_PROPERTY)
            },
            OfficeAnchor::AuxiliaryPart(name) => f.write_str(name),
        }
    }
}

/// Anchors in priority order for a package whose auxiliary part is `aux_part`.
pub fn anchor_order(aux_part: &'static str) -> [OfficeAnchor; 3] {
    [
        OfficeAnchor::CoreKeywords,
        OfficeAnchor::CustomProperty,
        OfficeAnchor::AuxiliaryPart(aux_part),
    ]
}

impl OfficeAnchor {
    /// Write the wrapped envelope `marker` at this anchor.
    pub fn write(self, pkg: &mut PackageEditor, marker: &str) -> AnchorResult<()> {
        match self {
            OfficeAnchor::CoreKeywords => write_core_keywords(pkg, marker),
            OfficeAnchor::CustomProperty => write_custom_property(pkg, marker),
            OfficeAnchor::AuxiliaryPart(name) => write_auxiliary_part(pkg, name, marker),
        }
    }

    /// Field text of the envelope stored at this anchor, if any.
    pub fn read(self, pkg: &mut PackageEditor) -> AnchorResult<Option<String>> {
        let text = match self {
            OfficeAnchor::CoreKeywords => {
                let Some(core) = read_part(pkg, part::CORE_PROPERTIES)? else {
                    return Ok(None);
                };
                match element_content_span(core.as_bytes(), KEYWORDS_TAG) {
                    Some((start, end)) => core[start..end].to_string(),
                    None => return Ok(None),
                }
            },
            OfficeAnchor::CustomProperty => {
                let Some(xml) = read_part(pkg, part::CUSTOM_PROPERTIES)? else {
                    return Ok(None);
                };
                let props = CustomProperties::from_xml(&xml).map_err(|e| e.to_string())?;
                match props.get(WATERMARK_PROPERTY) {
                    Some(value) => value.to_string(),
                    None => return Ok(None),
                }
            },
            OfficeAnchor::AuxiliaryPart(name) => match read_part(pkg, name)? {
                Some(xml) => xml,
                None => return Ok(None),
            },
        };

        Ok(OFFICE_DELIMITERS
            .find_first(text.as_bytes())
            .map(|span| text[span.inner].to_string()))
    }
}

fn read_part(pkg: &mut PackageEditor, name: &str) -> AnchorResult<Option<String>> {
    pkg.read_string(name).map_err(|e| e.to_string())
}

/// Declare a new part in `[Content_Types].xml` and, for package-level parts,
/// in `_rels/.rels`.
fn register_part(
    pkg: &mut PackageEditor,
    part_name: &str,
    content_type: &str,
    relationship: Option<&str>,
) -> AnchorResult<()> {
    let types = read_part(pkg, part::CONTENT_TYPES)?
        .ok_or_else(|| format!("{} is missing", part::CONTENT_TYPES))?;
    let types = ensure_override(&types, &format!("/{}", part_name), content_type)?;

    let rels = match relationship {
        Some(rel_type) => {
            let rels = read_part(pkg, part::PACKAGE_RELS)?.unwrap_or_else(empty_relationships);
            Some(ensure_relationship(&rels, rel_type, part_name)?)
        },
        None => None,
    };

    pkg.write(part::CONTENT_TYPES, types.into_bytes());
    if let Some(rels) = rels {
        pkg.write(part::PACKAGE_RELS, rels.into_bytes());
    }
    Ok(())
}

fn write_core_keywords(pkg: &mut PackageEditor, marker: &str) -> AnchorResult<()> {
    let Some(core) = read_part(pkg, part::CORE_PROPERTIES)? else {
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<cp:coreProperties xmlns:cp=\"{}\" xmlns:dc=\"{}\" xmlns:dcterms=\"http://purl.org/dc/terms/\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"><{tag}>{}</{tag}></cp:coreProperties>",
            namespace::OPC_CORE_PROPERTIES,
            namespace::DC,
            marker,
            tag = KEYWORDS_TAG
        );
        register_part(
            pkg,
            part::CORE_PROPERTIES,
            content_type::OPC_CORE_PROPERTIES,
            Some(relationship_type::CORE_PROPERTIES),
        )?;
        pkg.write(part::CORE_PROPERTIES, xml.into_bytes());
        return Ok(());
    };

    let edited = match element_content_span(core.as_bytes(), KEYWORDS_TAG) {
        Some((start, end)) => {
            let kept = strip_plain_tokens(&OFFICE_DELIMITERS.strip_all(&core[start..end]));
            let content = if kept.trim().is_empty() {
                marker.to_string()
            } else {
                format!("{} {}", kept.trim(), marker)
            };
            splice(core.as_bytes(), start, end, content.as_bytes())
        },
        None => {
            let base = remove_empty_element(core.as_bytes(), KEYWORDS_TAG);
            let element = format!("<{tag}>{}</{tag}>", marker, tag = KEYWORDS_TAG);
            insert_before_last(&base, CORE_ROOT_CLOSE, &element)
                .ok_or_else(|| format!("no {} closing tag", CORE_ROOT_CLOSE))?
        },
    };

    check_well_formed(&edited)?;
    pkg.write(part::CORE_PROPERTIES, edited);
    Ok(())
}

fn write_custom_property(pkg: &mut PackageEditor, marker: &str) -> AnchorResult<()> {
    let existing = read_part(pkg, part::CUSTOM_PROPERTIES)?;
    let mut props = match &existing {
        Some(xml) => CustomProperties::from_xml(xml).map_err(|e| e.to_string())?,
        None => CustomProperties::new(),
    };
    props.set_string(WATERMARK_PROPERTY, marker);
    let xml = props.to_xml().map_err(|e| e.to_string())?;
    check_well_formed(xml.as_bytes())?;

    if existing.is_none() {
        register_part(
            pkg,
            part::CUSTOM_PROPERTIES,
            content_type::OFC_CUSTOM_PROPERTIES,
            Some(relationship_type::CUSTOM_PROPERTIES),
        )?;
    }
    pkg.write(part::CUSTOM_PROPERTIES, xml.into_bytes());
    Ok(())
}

fn write_auxiliary_part(pkg: &mut PackageEditor, name: &str, marker: &str) -> AnchorResult<()> {
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?><watermark><![CDATA[{}]]></watermark>",
        marker
    );
    check_well_formed(xml.as_bytes())?;
    if !pkg.contains(name) {
        register_part(pkg, name, content_type::XML, None)?;
    }
    pkg.write(name, xml.into_bytes());
    Ok(())
}
