//! Envelope anchors inside `meta.xml`.
//!
//! Two locations are used: a dedicated `<meta:keyword>` element and a
//! `<meta:user-defined meta:name="Watermark">` field. Both hold the envelope
//! as a delimited marker. Keywords without a marker are left alone.

use memchr::memmem;

use super::constants::{WATERMARK_FIELD, namespace};
use crate::common::xml::splice::{ElementSpan, check_well_formed, find_elements, splice};
use crate::envelope::wire::OFFICE_DELIMITERS;

pub const KEYWORD_TAG: &str = "meta:keyword";
pub const USER_DEFINED_TAG: &str = "meta:user-defined";

const META_OPEN_EMPTY: &str = "<office:meta/>";
const META_CLOSE: &str = "</office:meta>";
const ROOT_CLOSE: &str = "</office:document-meta>";

/// A fresh `meta.xml` with an empty `office:meta` element.
pub fn empty_meta() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<office:document-meta xmlns:office=\"{}\" xmlns:meta=\"{}\" xmlns:dc=\"{}\" office:version=\"1.2\"><office:meta></office:meta></office:document-meta>",
        namespace::OFFICE,
        namespace::META,
        namespace::DC
    )
}

fn is_watermark_field(meta: &str, span: &ElementSpan) -> bool {
    let tag = &meta[span.open_tag.clone()];
    tag.contains(&format!("meta:name=\"{}\"", WATERMARK_FIELD))
        || tag.contains(&format!("meta:name='{}'", WATERMARK_FIELD))
}

fn carries_marker(meta: &str, span: &ElementSpan) -> bool {
    OFFICE_DELIMITERS
        .find_first(meta[span.content.clone()].as_bytes())
        .is_some()
}

/// Field text of the first keyword carrying a marker.
pub fn read_keyword(meta: &str) -> Option<String> {
    find_elements(meta.as_bytes(), KEYWORD_TAG)
        .iter()
        .find_map(|span| marker_fields(&meta[span.content.clone()]))
}

/// Field text of the `Watermark` user-defined field.
pub fn read_user_defined(meta: &str) -> Option<String> {
    find_elements(meta.as_bytes(), USER_DEFINED_TAG)
        .iter()
        .filter(|span| is_watermark_field(meta, span))
        .find_map(|span| marker_fields(&meta[span.content.clone()]))
}

fn marker_fields(content: &str) -> Option<String> {
    OFFICE_DELIMITERS
        .find_first(content.as_bytes())
        .map(|span| content[span.inner].to_string())
}

/// Replace every marker-bearing keyword with one holding `marker`.
pub fn write_keyword(meta: &str, marker: &str) -> Result<Vec<u8>, String> {
    let stale: Vec<ElementSpan> = find_elements(meta.as_bytes(), KEYWORD_TAG)
        .into_iter()
        .filter(|span| carries_marker(meta, span))
        .collect();
    let element = format!("<{tag}>{}</{tag}>", marker, tag = KEYWORD_TAG);
    replace_or_insert(meta, &stale, &element)
}

/// Set the `Watermark` user-defined field to `marker`.
pub fn write_user_defined(meta: &str, marker: &str) -> Result<Vec<u8>, String> {
    let stale: Vec<ElementSpan> = find_elements(meta.as_bytes(), USER_DEFINED_TAG)
        .into_iter()
        .filter(|span| is_watermark_field(meta, span))
        .collect();
    let element = format!(
        "<{tag} meta:name=\"{}\" meta:value-type=\"string\">{}</{tag}>",
        WATERMARK_FIELD,
        marker,
        tag = USER_DEFINED_TAG
    );
    replace_or_insert(meta, &stale, &element)
}

/// Drop `stale` elements and append `element` to `office:meta`.
fn replace_or_insert(meta: &str, stale: &[ElementSpan], element: &str) -> Result<Vec<u8>, String> {
    let mut xml = meta.as_bytes().to_vec();
    for span in stale.iter().rev() {
        xml = splice(&xml, span.outer.start, span.outer.end, b"");
    }

    let edited = if let Some(idx) = memmem::rfind(&xml, META_CLOSE.as_bytes()) {
        splice(&xml, idx, idx, element.as_bytes())
    } else if let Some(idx) = memmem::find(&xml, META_OPEN_EMPTY.as_bytes()) {
        let filled = format!("<office:meta>{}</office:meta>", element);
        splice(&xml, idx, idx + META_OPEN_EMPTY.len(), filled.as_bytes())
    } else if let Some(idx) = memmem::rfind(&xml, ROOT_CLOSE.as_bytes()) {
        let filled = format!("<office:meta>{}</office:meta>", element);
        splice(&xml, idx, idx, filled.as_bytes())
    } else {
        return Err("meta.xml has no office:meta or document-meta element".to_string());
    };

    check_well_formed(&edited)?;
    Ok(edited)
}
