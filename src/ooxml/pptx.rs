//! PowerPoint presentations.
//!
//! Earlier encoders left `<!-- Watermark: ... -->` comments in slide parts;
//! those are read during the legacy scan only.

use super::office::{OfficeVariant, OfficeWatermarker};
use crate::config::WatermarkOptions;
use crate::strategy::FormatKind;

pub const PPTX: OfficeVariant = OfficeVariant {
    kind: FormatKind::Pptx,
    extension: "pptx",
    main_part: "ppt/presentation.xml",
    aux_part: "ppt/watermark.xml",
    legacy_sealed_parts: &[],
    legacy_comment_prefix: "ppt/slides/slide",
};

impl OfficeWatermarker {
    pub fn pptx(options: &WatermarkOptions) -> Self {
        Self::new(PPTX, options)
    }
}
