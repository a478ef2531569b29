//! Word documents.

use super::office::{OfficeVariant, OfficeWatermarker};
use crate::config::WatermarkOptions;
use crate::strategy::FormatKind;

pub const DOCX: OfficeVariant = OfficeVariant {
    kind: FormatKind::Docx,
    extension: "docx",
    main_part: "word/document.xml",
    aux_part: "word/watermark.xml",
    legacy_sealed_parts: &[],
    legacy_comment_prefix: "word/document",
};

impl OfficeWatermarker {
    pub fn docx(options: &WatermarkOptions) -> Self {
        Self::new(DOCX, options)
    }
}
