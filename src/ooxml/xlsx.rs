//! Excel workbooks.
//!
//! The auxiliary part is `xl/customWatermark.xml`, the location earlier
//! encoders also used. Sealed envelopes they wrote into the extended
//! properties, the core properties body, workbook attributes and the shared
//! string table are found by the legacy scan.

use super::constants::part;
use super::office::{OfficeVariant, OfficeWatermarker};
use crate::config::WatermarkOptions;
use crate::strategy::FormatKind;

pub const XLSX: OfficeVariant = OfficeVariant {
    kind: FormatKind::Xlsx,
    extension: "xlsx",
    main_part: "xl/workbook.xml",
    aux_part: "xl/customWatermark.xml",
    legacy_sealed_parts: &[
        part::APP_PROPERTIES,
        part::CORE_PROPERTIES,
        "xl/workbook.xml",
        "xl/sharedStrings.xml",
    ],
    legacy_comment_prefix: "",
};

impl OfficeWatermarker {
    pub fn xlsx(options: &WatermarkOptions) -> Self {
        Self::new(XLSX, options)
    }
}
