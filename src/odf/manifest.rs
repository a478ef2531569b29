//! ODF manifest handling.
//!
//! `META-INF/manifest.xml` lists every file in the package with its media
//! type. The root entry (`/`) repeats the package MIME type, which is used to
//! identify the document when the `mimetype` member is missing.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::constants::namespace;
use crate::common::xml::escape_xml;
use crate::common::xml::splice::{check_well_formed, insert_before_last};

const MANIFEST_CLOSE: &str = "</manifest:manifest>";

/// ODF manifest (META-INF/manifest.xml)
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub entries: HashMap<String, ManifestEntry>,
}

/// Entry in the ODF manifest
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub full_path: String,
    pub media_type: String,
}

impl Manifest {
    /// Parse manifest XML content
    pub fn parse(xml_content: &str) -> Result<Self, String> {
        let mut reader = Reader::from_str(xml_content);
        let mut buf = Vec::new();
        let mut entries = HashMap::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    if e.name().as_ref() == b"manifest:file-entry"
                        && let Some(entry) = Self::parse_file_entry(e)?
                    {
                        entries.insert(entry.full_path.clone(), entry);
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(format!("manifest XML error: {}", e)),
                _ => {},
            }
            buf.clear();
        }

        Ok(Self { entries })
    }

    /// Parse a single file-entry element
    fn parse_file_entry(e: &BytesStart) -> Result<Option<ManifestEntry>, String> {
        let mut full_path = String::new();
        let mut media_type = String::new();

        for attr_result in e.attributes() {
            let attr = attr_result.map_err(|_| "invalid attribute in manifest".to_string())?;
            let value = std::str::from_utf8(&attr.value)
                .map_err(|_| "invalid UTF-8 in manifest".to_string())?;

            match attr.key.as_ref() {
                b"manifest:full-path" => full_path = value.to_string(),
                b"manifest:media-type" => media_type = value.to_string(),
                _ => {},
            }
        }

        if full_path.is_empty() {
            Ok(None)
        } else {
            Ok(Some(ManifestEntry {
                full_path,
                media_type,
            }))
        }
    }

    /// Media type of the package root entry.
    pub fn root_media_type(&self) -> Option<&str> {
        self.entries.get("/").map(|entry| entry.media_type.as_str())
    }

    #[inline]
    pub fn has_path(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }
}

/// Add a `file-entry` for `path` unless the manifest already lists it.
///
/// Returns the manifest unchanged when the entry exists.
pub fn ensure_file_entry(xml: &str, path: &str, media_type: &str) -> Result<String, String> {
    let manifest = Manifest::parse(xml)?;
    if manifest.has_path(path) {
        return Ok(xml.to_string());
    }

    let entry = format!(
        "<manifest:file-entry manifest:full-path=\"{}\" manifest:media-type=\"{}\"/>",
        escape_xml(path),
        escape_xml(media_type)
    );
    let edited = insert_before_last(xml.as_bytes(), MANIFEST_CLOSE, &entry)
        .ok_or_else(|| format!("no {} closing tag", MANIFEST_CLOSE))?;
    check_well_formed(&edited)?;
    String::from_utf8(edited).map_err(|e| e.to_string())
}

/// A minimal manifest for packages that lack one.
pub fn minimal_manifest(mimetype: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<manifest:manifest xmlns:manifest=\"{}\" manifest:version=\"1.2\"><manifest:file-entry manifest:full-path=\"/\" manifest:media-type=\"{}\"/></manifest:manifest>",
        namespace::MANIFEST,
        escape_xml(mimetype)
    )
}
