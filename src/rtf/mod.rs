//! RTF watermarking with an ignorable destination group.
//!
//! The envelope is stored as `{\*\watermark-data ...}`. Readers that do not
//! know the destination skip it because of the `\*` prefix. The group goes
//! after the `{\info}` group when there is one, otherwise before the default
//! font declaration, otherwise right after the `{\rtfN` header.
//!
//! # Example
//!
//! ```rust,no_run
//! use docmark::config::WatermarkOptions;
//! use docmark::rtf::RtfWatermarker;
//!
//! let rtf = RtfWatermarker::new(&WatermarkOptions::default());
//! let marked = rtf.embed(br"{\rtf1\ansi\deff0 Hello}", "CONFIDENTIAL")?;
//! assert_eq!(rtf.recover(&marked)?.text, "CONFIDENTIAL");
//! # Ok::<(), docmark::WatermarkError>(())
//! ```

pub mod scan;

use std::fmt;
use std::path::Path;

use crate::common::error::{Result, WatermarkError};
use crate::common::fs::{read_input, write_atomically};
use crate::common::signature::Signature;
use crate::config::WatermarkOptions;
use crate::envelope::EnvelopeCodec;
use crate::envelope::wire::{RTF_GROUP_OPEN, parse_rtf_group, to_rtf_group};
use crate::strategy::{ExtractedWatermark, FormatKind, Watermarker};

const FORMAT: &str = "rtf";

/// Insertion points, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtfAnchor {
    AfterInfoGroup,
    BeforeDefaultFont,
    AfterHeader,
}

pub const ANCHOR_ORDER: [RtfAnchor; 3] = [
    RtfAnchor::AfterInfoGroup,
    RtfAnchor::BeforeDefaultFont,
    RtfAnchor::AfterHeader,
];

impl fmt::Display for RtfAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RtfAnchor::AfterInfoGroup => "after {\\info}",
            RtfAnchor::BeforeDefaultFont => "before \\deff",
            RtfAnchor::AfterHeader => "after {\\rtf",
        })
    }
}

impl RtfAnchor {
    /// Byte offset this anchor resolves to in `data`.
    pub fn locate(self, data: &[u8]) -> Option<usize> {
        match self {
            RtfAnchor::AfterInfoGroup => scan::info_group_end(data),
            RtfAnchor::BeforeDefaultFont => scan::find_control_word(data, "deff")
                .or_else(|| scan::find_control_word(data, "deflang")),
            RtfAnchor::AfterHeader => scan::header_word_end(data),
        }
    }
}

/// Remove every watermark group from `data`.
pub fn strip_watermark_groups(data: &[u8]) -> Vec<u8> {
    let groups = scan::groups_with_prefix(data, RTF_GROUP_OPEN);
    if groups.is_empty() {
        return data.to_vec();
    }
    let mut out = Vec::with_capacity(data.len());
    let mut last = 0;
    for group in groups {
        out.extend_from_slice(&data[last..group.start]);
        last = group.end;
    }
    out.extend_from_slice(&data[last..]);
    out
}

/// Strategy for `.rtf` files.
#[derive(Debug, Clone)]
pub struct RtfWatermarker {
    codec: EnvelopeCodec,
}

impl RtfWatermarker {
    pub fn new(options: &WatermarkOptions) -> Self {
        Self {
            codec: options.codec_for(FormatKind::Rtf),
        }
    }

    pub fn embed(&self, data: &[u8], text: &str) -> Result<Vec<u8>> {
        Signature::Rtf.require(FORMAT, data)?;
        let group = to_rtf_group(&self.codec.seal(text)?);
        let clean = strip_watermark_groups(data);

        let mut tried = Vec::new();
        for anchor in ANCHOR_ORDER {
            match anchor.locate(&clean) {
                Some(at) => {
                    tracing::debug!(format = FORMAT, anchor = %anchor, offset = at, "inserting group");
                    let mut out = Vec::with_capacity(clean.len() + group.len());
                    out.extend_from_slice(&clean[..at]);
                    out.extend_from_slice(group.as_bytes());
                    out.extend_from_slice(&clean[at..]);
                    return Ok(out);
                },
                None => tried.push(format!("{}: absent", anchor)),
            }
        }
        Err(WatermarkError::AnchorNotFound {
            format: FORMAT,
            tried,
        })
    }

    pub fn recover(&self, data: &[u8]) -> Result<ExtractedWatermark> {
        Signature::Rtf.require(FORMAT, data)?;
        for range in scan::groups_with_prefix(data, RTF_GROUP_OPEN) {
            let parsed = std::str::from_utf8(&data[range.clone()])
                .map_err(|e| WatermarkError::Decryption(format!("group is not UTF-8: {}", e)))
                .and_then(parse_rtf_group);
            match parsed {
                Ok(envelope) => {
                    let opened = self.codec.open(&envelope)?;
                    return Ok(ExtractedWatermark::from_opened(
                        opened,
                        format!("watermark group at byte {}", range.start),
                    ));
                },
                Err(e) => {
                    tracing::debug!(offset = range.start, error = %e, "malformed watermark group");
                },
            }
        }
        Err(WatermarkError::WatermarkNotFound {
            format: FORMAT,
            searched: vec!["\\*\\watermark-data groups".to_string()],
        })
    }
}

impl Watermarker for RtfWatermarker {
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
        FormatKind::Rtf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Integrity;

    fn strategy() -> RtfWatermarker {
        RtfWatermarker::new(&WatermarkOptions::default())
    }

    fn position_of_group(data: &[u8]) -> usize {
        memchr::memmem::find(data, RTF_GROUP_OPEN.as_bytes()).unwrap()
    }

    #[test]
    fn test_after_info_group() {
        let doc = br"{\rtf1\ansi\deff0{\info{\title T}}\pard Hello\par}";
        let marked = strategy().embed(doc, "机密").unwrap();
        let at = position_of_group(&marked);
        assert_eq!(&marked[..at], br"{\rtf1\ansi\deff0{\info{\title T}}");
        let wm = strategy().recover(&marked).unwrap();
        assert_eq!(wm.text, "机密");
        assert_eq!(wm.integrity, Integrity::Verified);
    }

    #[test]
    fn test_before_default_font() {
        let doc = br"{\rtf1\ansi\deff0 Hello}";
        let marked = strategy().embed(doc, "x").unwrap();
        assert_eq!(&marked[..position_of_group(&marked)], br"{\rtf1\ansi");
    }

    #[test]
    fn test_after_header() {
        let doc = br"{\rtf1 Hello}";
        let marked = strategy().embed(doc, "x").unwrap();
        assert_eq!(position_of_group(&marked), 6);
        assert!(marked.ends_with(b" Hello}"));
    }

    #[test]
    fn test_readd_replaces_group() {
        let s = strategy();
        let once = s.embed(br"{\rtf1\ansi\deff0 Hello}", "first").unwrap();
        let twice = s.embed(&once, "second").unwrap();
        assert_eq!(scan::groups_with_prefix(&twice, RTF_GROUP_OPEN).len(), 1);
        assert_eq!(s.recover(&twice).unwrap().text, "second");
        assert_eq!(strip_watermark_groups(&twice), br"{\rtf1\ansi\deff0 Hello}");
    }

    #[test]
    fn test_tampered_group_rejected() {
        let s = strategy();
        let marked = s.embed(br"{\rtf1 Hello}", "secret").unwrap();
        let text = String::from_utf8(marked).unwrap();
        let start = text.find("checksum=\"").unwrap() + 10;
        let mut tampered = text.clone();
        let flipped = if &text[start..start + 1] == "0" { "1" } else { "0" };
        tampered.replace_range(start..start + 1, flipped);
        assert!(s.recover(tampered.as_bytes()).is_err());
    }

    #[test]
    fn test_missing_group() {
        assert!(matches!(
            strategy().recover(br"{\rtf1 Hello}"),
            Err(WatermarkError::WatermarkNotFound { format: "rtf", .. })
        ));
    }
}
