//! OOXML custom document properties.
//!
//! Custom properties live in the `docProps/custom.xml` part and attach named,
//! typed values to a package. The watermark is stored as the `lpwstr`
//! property named [`WATERMARK_PROPERTY`]. Other properties are carried
//! through a parse and re-serialize cycle with their names, ids, variant
//! types and value text unchanged.
//!
//! # Example Usage
//!
//! ```rust
//! use docmark::ooxml::custom_properties::CustomProperties;
//!
//! let mut props = CustomProperties::new();
//! props.set_string("Watermark", "WATERMARK_BEGIN:abc:WATERMARK_END");
//! let xml = props.to_xml()?;
//!
//! let parsed = CustomProperties::from_xml(&xml)?;
//! assert_eq!(parsed.get("Watermark"), Some("WATERMARK_BEGIN:abc:WATERMARK_END"));
//! # Ok::<(), docmark::WatermarkError>(())
//! ```

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::constants::namespace;
use crate::common::error::{Result, WatermarkError};
use crate::common::xml::unescape_xml;

/// Fixed GUID format ID for custom properties as per OOXML specification.
///
/// All custom properties must use this format ID.
const FORMAT_ID: &str = "{D5CDD505-2E9C-101B-9397-08002B2CF9AE}";

/// Name of the custom property holding the watermark envelope.
pub const WATERMARK_PROPERTY: &str = "Watermark";

/// First property id available to user properties.
const FIRST_PID: i32 = 2;

/// A single custom property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomProperty {
    pub name: String,
    pub pid: i32,
    /// Variant type element name without the `vt:` prefix (`lpwstr`, `i4`, ...)
    pub vt_type: String,
    /// Value text, unescaped
    pub value: String,
}

/// The property set of a `docProps/custom.xml` part, in document order.
#[derive(Debug, Clone, Default)]
pub struct CustomProperties {
    properties: Vec<CustomProperty>,
    next_pid: i32,
}

fn xml_err(context: &str, e: impl std::fmt::Display) -> WatermarkError {
    WatermarkError::Repack(format!("custom properties: {}: {}", context, e))
}

impl CustomProperties {
    pub fn new() -> Self {
        Self {
            properties: Vec::new(),
            next_pid: FIRST_PID,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Value text of the property called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Set `name` to a string value, replacing any existing value and type.
    pub fn set_string(&mut self, name: &str, value: &str) {
        if let Some(existing) = self.properties.iter_mut().find(|p| p.name == name) {
            existing.vt_type = "lpwstr".to_string();
            existing.value = value.to_string();
            return;
        }
        let pid = self.next_pid;
        self.next_pid += 1;
        self.properties.push(CustomProperty {
            name: name.to_string(),
            pid,
            vt_type: "lpwstr".to_string(),
            value: value.to_string(),
        });
    }

    /// Remove the property called `name`, returning its value text.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.properties.iter().position(|p| p.name == name)?;
        Some(self.properties.remove(idx).value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CustomProperty> {
        self.properties.iter()
    }

    /// Generate XML content for `docProps/custom.xml`.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(|e| xml_err("declaration", e))?;

        let mut root = BytesStart::new("Properties");
        root.push_attribute(("xmlns", namespace::OFC_CUSTOM_PROPERTIES));
        root.push_attribute(("xmlns:vt", namespace::OFC_DOC_PROPS_VTYPES));
        writer
            .write_event(Event::Start(root))
            .map_err(|e| xml_err("root", e))?;

        for prop in &self.properties {
            let mut property = BytesStart::new("property");
            property.push_attribute(("fmtid", FORMAT_ID));
            property.push_attribute(("pid", prop.pid.to_string().as_str()));
            property.push_attribute(("name", prop.name.as_str()));
            writer
                .write_event(Event::Start(property))
                .map_err(|e| xml_err("property", e))?;

            let value_name = format!("vt:{}", prop.vt_type);
            writer
                .write_event(Event::Start(BytesStart::new(value_name.as_str())))
                .map_err(|e| xml_err("value", e))?;
            writer
                .write_event(Event::Text(BytesText::new(&prop.value)))
                .map_err(|e| xml_err("value text", e))?;
            writer
                .write_event(Event::End(BytesEnd::new(value_name.as_str())))
                .map_err(|e| xml_err("value", e))?;

            writer
                .write_event(Event::End(BytesEnd::new("property")))
                .map_err(|e| xml_err("property", e))?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("Properties")))
            .map_err(|e| xml_err("root", e))?;

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| xml_err("generated XML", e))
    }

    /// Parse custom properties from the content of `docProps/custom.xml`.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut properties = Vec::new();
        let mut max_pid = FIRST_PID - 1;

        let mut current: Option<(String, i32)> = None;
        let mut value_type: Option<String> = None;
        let mut raw_value = String::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"property" => {
                    let mut name = None;
                    let mut pid = None;
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| xml_err("attribute", e))?;
                        let value = std::str::from_utf8(&attr.value).unwrap_or("");
                        match attr.key.as_ref() {
                            b"name" => name = Some(unescape_xml(value)),
                            b"pid" => pid = value.parse::<i32>().ok(),
                            _ => {},
                        }
                    }
                    if let (Some(name), Some(pid)) = (name, pid) {
                        max_pid = max_pid.max(pid);
                        current = Some((name, pid));
                    }
                },
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                    if current.is_some() && value_type.is_none() =>
                {
                    let local = e.local_name();
                    let local = std::str::from_utf8(local.as_ref())
                        .map_err(|e| xml_err("element name", e))?;
                    value_type = Some(local.to_string());
                    raw_value.clear();
                },
                Ok(Event::Text(ref t)) if value_type.is_some() => {
                    let text = std::str::from_utf8(t.as_ref()).map_err(|e| xml_err("text", e))?;
                    raw_value.push_str(text);
                },
                Ok(Event::GeneralRef(ref r)) if value_type.is_some() => {
                    let name = std::str::from_utf8(r.as_ref()).map_err(|e| xml_err("entity", e))?;
                    raw_value.push('&');
                    raw_value.push_str(name);
                    raw_value.push(';');
                },
                Ok(Event::CData(ref c)) if value_type.is_some() => {
                    let text = std::str::from_utf8(c.as_ref()).map_err(|e| xml_err("CDATA", e))?;
                    // Escaped so the final unescape pass restores it verbatim
                    raw_value.push_str(&crate::common::xml::escape_xml(text));
                },
                Ok(Event::End(ref e)) if e.local_name().as_ref() == b"property" => {
                    if let (Some((name, pid)), Some(vt_type)) = (current.take(), value_type.take()) {
                        properties.push(CustomProperty {
                            name,
                            pid,
                            vt_type,
                            value: unescape_xml(&raw_value),
                        });
                    }
                    raw_value.clear();
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(xml_err("parse", e)),
                _ => {},
            }
        }

        Ok(Self {
            properties,
            next_pid: max_pid + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORD_CUSTOM: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/custom-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes"><property fmtid="{D5CDD505-2E9C-101B-9397-08002B2CF9AE}" pid="2" name="Client"><vt:lpwstr>A &amp; B</vt:lpwstr></property><property fmtid="{D5CDD505-2E9C-101B-9397-08002B2CF9AE}" pid="5" name="Revision"><vt:i4>7</vt:i4></property></Properties>"#;

    #[test]
    fn test_parse_existing_part() {
        let props = CustomProperties::from_xml(WORD_CUSTOM).unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(props.get("Client"), Some("A & B"));
        let revision = props.iter().find(|p| p.name == "Revision").unwrap();
        assert_eq!(revision.vt_type, "i4");
        assert_eq!(revision.value, "7");
    }

    #[test]
    fn test_new_property_takes_next_pid() {
        let mut props = CustomProperties::from_xml(WORD_CUSTOM).unwrap();
        props.set_string(WATERMARK_PROPERTY, "wm");
        let wm = props.iter().find(|p| p.name == WATERMARK_PROPERTY).unwrap();
        assert_eq!(wm.pid, 6);
    }

    #[test]
    fn test_reserialize_preserves_other_properties() {
        let mut props = CustomProperties::from_xml(WORD_CUSTOM).unwrap();
        props.set_string(WATERMARK_PROPERTY, "first");
        props.set_string(WATERMARK_PROPERTY, "second");
        let xml = props.to_xml().unwrap();
        crate::common::xml::splice::check_well_formed(xml.as_bytes()).unwrap();

        let reparsed = CustomProperties::from_xml(&xml).unwrap();
        assert_eq!(reparsed.len(), 3);
        assert_eq!(reparsed.get("Client"), Some("A & B"));
        assert_eq!(reparsed.get(WATERMARK_PROPERTY), Some("second"));
        assert!(xml.contains("<vt:i4>7</vt:i4>"));
    }

    #[test]
    fn test_remove() {
        let mut props = CustomProperties::from_xml(WORD_CUSTOM).unwrap();
        assert_eq!(props.remove("Revision").as_deref(), Some("7"));
        assert!(props.remove("Revision").is_none());
    }
}
