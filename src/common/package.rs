//! In-memory rewriting of ZIP-packaged documents.
//!
//! [`PackageEditor`] reads members of an OOXML or ODF package, accepts
//! replacement or new members, and writes a new archive in which every
//! untouched member is raw-copied (compressed bytes, method and timestamps
//! preserved). Member order is kept, so an ODF `mimetype` entry stays first
//! and stored.

use std::collections::HashMap;
use std::fmt::Display;
use std::io::{Cursor, Read, Write};

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::common::error::{Result, WatermarkError};
use crate::common::signature::Signature;

/// An open package plus pending member edits.
pub struct PackageEditor {
    archive: ZipArchive<Cursor<Vec<u8>>>,
    format: &'static str,
    replaced: HashMap<String, Vec<u8>>,
    added: Vec<(String, Vec<u8>)>,
}

impl PackageEditor {
    /// Open a package from its bytes.
    ///
    /// Anything that is not a readable ZIP archive is reported as an invalid
    /// signature for `format`.
    pub fn open(bytes: Vec<u8>, format: &'static str) -> Result<Self> {
        Signature::Zip.require(format, &bytes)?;
        let archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| {
            WatermarkError::InvalidFormatSignature {
                format,
                detail: format!("unreadable ZIP archive: {}", e),
            }
        })?;
        Ok(Self {
            archive,
            format,
            replaced: HashMap::new(),
            added: Vec::new(),
        })
    }

    #[inline]
    pub fn format(&self) -> &'static str {
        self.format
    }

    /// Whether the original archive has a member called `name`.
    pub fn has_original(&self, name: &str) -> bool {
        self.archive.index_for_name(name).is_some()
    }

    /// Whether `name` exists in the package as it would be written.
    pub fn contains(&self, name: &str) -> bool {
        self.has_original(name) || self.added.iter().any(|(n, _)| n == name)
    }

    /// Current content of `name`, including pending edits.
    pub fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        if let Some(data) = self.replaced.get(name) {
            return Ok(Some(data.clone()));
        }
        if let Some((_, data)) = self.added.iter().find(|(n, _)| n == name) {
            return Ok(Some(data.clone()));
        }
        match self.archive.by_name(name) {
            Ok(mut file) => {
                let mut data = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut data)?;
                Ok(Some(data))
            },
            Err(ZipError::FileNotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Current content of `name` as UTF-8 text.
    pub fn read_string(&mut self, name: &str) -> Result<Option<String>> {
        match self.read(name)? {
            Some(data) => String::from_utf8(data).map(Some).map_err(|e| {
                WatermarkError::Repack(format!("{} is not valid UTF-8: {}", name, e))
            }),
            None => Ok(None),
        }
    }

    /// Replace an existing member or append a new one.
    pub fn write(&mut self, name: &str, content: Vec<u8>) {
        if self.has_original(name) {
            self.replaced.insert(name.to_string(), content);
        } else if let Some(slot) = self.added.iter_mut().find(|(n, _)| n == name) {
            slot.1 = content;
        } else {
            self.added.push((name.to_string(), content));
        }
    }

    /// Names of every member in write order.
    pub fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = (0..self.archive.len())
            .filter_map(|i| self.archive.name_for_index(i).map(str::to_string))
            .collect();
        names.extend(self.added.iter().map(|(n, _)| n.clone()));
        names
    }

    #[inline]
    pub fn is_modified(&self) -> bool {
        !self.replaced.is_empty() || !self.added.is_empty()
    }

    /// Write the edited package.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for i in 0..self.archive.len() {
            let name = match self.archive.name_for_index(i) {
                Some(name) => name.to_string(),
                None => continue,
            };

            if let Some(content) = self.replaced.remove(&name) {
                let original = self.archive.by_index_raw(i)?;
                let method = match original.compression() {
                    CompressionMethod::Stored => CompressionMethod::Stored,
                    _ => CompressionMethod::Deflated,
                };
                let mut options = SimpleFileOptions::default().compression_method(method);
                if let Some(modified) = original.last_modified() {
                    options = options.last_modified_time(modified);
                }
                drop(original);

                writer.start_file(name.as_str(), options)?;
                writer.write_all(&content)?;
                tracing::debug!(member = %name, bytes = content.len(), "rewrote package member");
            } else {
                let original = self.archive.by_index_raw(i)?;
                writer.raw_copy_file(original)?;
            }
        }

        for (name, content) in &self.added {
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            writer.start_file(name.as_str(), options)?;
            writer.write_all(content)?;
            tracing::debug!(member = %name, bytes = content.len(), "added package member");
        }

        Ok(writer.finish()?.into_inner())
    }
}

/// Outcome of trying a list of anchors in order.
#[derive(Debug, Default)]
pub struct AnchorOutcome {
    /// Anchors that accepted the envelope
    pub written: Vec<String>,
    /// Every attempt, with the reason for each refusal
    pub tried: Vec<String>,
}

/// Try `attempt` on each anchor in order.
///
/// With `redundant` set every anchor is tried; otherwise the walk stops at the
/// first success. Fails with `AnchorNotFound` when no anchor accepted.
pub fn apply_anchors<A, F>(
    format: &'static str,
    anchors: &[A],
    redundant: bool,
    mut attempt: F,
) -> Result<AnchorOutcome>
where
    A: Copy + Display,
    F: FnMut(A) -> std::result::Result<(), String>,
{
    let mut outcome = AnchorOutcome::default();
    for &anchor in anchors {
        match attempt(anchor) {
            Ok(()) => {
                tracing::debug!(format, anchor = %anchor, "envelope written");
                outcome.written.push(anchor.to_string());
                outcome.tried.push(format!("{}: ok", anchor));
                if !redundant {
                    break;
                }
            },
            Err(reason) => {
                tracing::debug!(format, anchor = %anchor, %reason, "anchor refused envelope");
                outcome.tried.push(format!("{}: {}", anchor, reason));
            },
        }
    }

    if outcome.written.is_empty() {
        return Err(WatermarkError::AnchorNotFound {
            format,
            tried: outcome.tried,
        });
    }
    Ok(outcome)
}
