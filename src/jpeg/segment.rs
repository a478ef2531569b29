//! JPEG marker segment walking.
//!
//! Walks the marker segments that precede the entropy-coded data. Every
//! length field is bounds-checked against the buffer; a segment whose length
//! leaves the file ends the walk instead of being trusted.

use std::ops::Range;

use crate::common::binary::{read_u16_be, slice_at, u16_be_bytes};
use crate::common::error::{Result, WatermarkError};

/// JPEG marker constants.
pub const SOI: u8 = 0xD8;
pub const EOI: u8 = 0xD9;
pub const SOS: u8 = 0xDA;
pub const COM: u8 = 0xFE;
pub const TEM: u8 = 0x01;

/// Largest payload a single segment can carry (length field minus itself).
pub const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

/// One marker segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Marker byte without the 0xFF prefix
    pub marker: u8,
    /// Offset of the 0xFF byte
    pub offset: usize,
    /// Segment payload, excluding marker and length field
    pub payload: Range<usize>,
}

/// Iterator over the segments of a JPEG stream, starting after SOI.
///
/// Stops after SOS or EOI, at the end of the buffer, or at the first
/// malformed length. [`SegmentWalker::stopped_early`] reports the latter.
pub struct SegmentWalker<'a> {
    data: &'a [u8],
    pos: usize,
    done: bool,
    malformed: Option<String>,
}

impl<'a> SegmentWalker<'a> {
    /// Start walking after the SOI marker.
    pub fn new(data: &'a [u8]) -> Self {
        let has_soi = data.len() >= 2 && data[0] == 0xFF && data[1] == SOI;
        Self {
            data,
            pos: 2,
            done: !has_soi,
            malformed: None,
        }
    }

    /// Reason the walk ended on a malformed segment, if it did.
    pub fn stopped_early(&self) -> Option<&str> {
        self.malformed.as_deref()
    }

    fn stop(&mut self, reason: String) -> Option<Segment> {
        tracing::debug!(offset = self.pos, %reason, "JPEG segment walk stopped");
        self.malformed = Some(reason);
        self.done = true;
        None
    }
}

impl Iterator for SegmentWalker<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.done {
            return None;
        }
        let data = self.data;

        if data.get(self.pos) != Some(&0xFF) {
            let found = data.get(self.pos).copied();
            return match found {
                None => {
                    self.done = true;
                    None
                },
                Some(byte) => self.stop(format!("expected marker, found byte {:#04X}", byte)),
            };
        }
        // Fill bytes
        while data.get(self.pos + 1) == Some(&0xFF) {
            self.pos += 1;
        }
        let Some(&marker) = data.get(self.pos + 1) else {
            self.done = true;
            return None;
        };
        let offset = self.pos;

        if marker == EOI || marker == TEM || (0xD0..=0xD7).contains(&marker) {
            self.pos += 2;
            if marker == EOI {
                self.done = true;
            }
            return Some(Segment {
                marker,
                offset,
                payload: self.pos..self.pos,
            });
        }

        let length = match read_u16_be(data, offset + 2) {
            Ok(length) => length as usize,
            Err(e) => return self.stop(format!("truncated length field: {}", e)),
        };
        if length < 2 {
            return self.stop(format!("segment length {} below minimum", length));
        }
        let start = offset + 4;
        if let Err(e) = slice_at(data, start, length - 2) {
            return self.stop(format!("segment {:#04X} overruns file: {}", marker, e));
        }

        self.pos = start + length - 2;
        if marker == SOS {
            self.done = true;
        }
        Some(Segment {
            marker,
            offset,
            payload: start..self.pos,
        })
    }
}

/// Encode a COM segment holding `payload`.
pub fn com_segment(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_SEGMENT_PAYLOAD {
        return Err(WatermarkError::Repack(format!(
            "comment payload of {} bytes exceeds the {} byte segment limit",
            payload.len(),
            MAX_SEGMENT_PAYLOAD
        )));
    }
    let mut segment = Vec::with_capacity(payload.len() + 4);
    segment.extend_from_slice(&[0xFF, COM]);
    segment.extend_from_slice(&u16_be_bytes((payload.len() + 2) as u16));
    segment.extend_from_slice(payload);
    Ok(segment)
}
