//! Registration of new parts in `[Content_Types].xml` and `_rels/.rels`.
//!
//! Both documents are edited in place as text so entries written by other
//! producers survive untouched. Every helper returns the edited document, or
//! a reason string when the document has no place to insert into.

use memchr::memmem;

use super::constants::namespace;
use crate::common::xml::splice::{check_well_formed, insert_before_last};

fn has_attr(xml: &str, name: &str, value: &str) -> bool {
    let needle = format!("{}=\"{}\"", name, value);
    memmem::find(xml.as_bytes(), needle.as_bytes()).is_some()
}

fn insert_checked(xml: &str, closing: &str, element: &str) -> Result<String, String> {
    let edited = insert_before_last(xml.as_bytes(), closing, element)
        .ok_or_else(|| format!("no {} to insert before", closing))?;
    check_well_formed(&edited)?;
    String::from_utf8(edited).map_err(|e| e.to_string())
}

/// Add an `<Override>` for `part_name` (leading `/`) unless one exists.
pub fn ensure_override(xml: &str, part_name: &str, content_type: &str) -> Result<String, String> {
    if has_attr(xml, "PartName", part_name) {
        return Ok(xml.to_string());
    }
    let element = format!(
        "<Override PartName=\"{}\" ContentType=\"{}\"/>",
        part_name, content_type
    );
    insert_checked(xml, "</Types>", &element)
}

/// Whether a relationship of `rel_type` is already declared.
#[inline]
pub fn has_relationship(rels: &str, rel_type: &str) -> bool {
    has_attr(rels, "Type", rel_type)
}

/// Add a relationship of `rel_type` to `target` unless one of that type exists.
pub fn ensure_relationship(rels: &str, rel_type: &str, target: &str) -> Result<String, String> {
    if has_relationship(rels, rel_type) {
        return Ok(rels.to_string());
    }
    let element = format!(
        "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"/>",
        next_relationship_id(rels),
        rel_type,
        target
    );
    insert_checked(rels, "</Relationships>", &element)
}

/// `rId<n>` one above the highest numeric id in use.
pub fn next_relationship_id(rels: &str) -> String {
    let max = rels
        .match_indices("Id=\"rId")
        .filter_map(|(idx, m)| {
            let digits: String = rels[idx + m.len()..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse::<u32>().ok()
        })
        .max()
        .unwrap_or(0);
    format!("rId{}", max + 1)
}

/// A package relationships part with no entries.
pub fn empty_relationships() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Relationships xmlns=\"{}\"></Relationships>",
        namespace::OPC_RELATIONSHIPS
    )
}
