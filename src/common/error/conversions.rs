//! Error conversion implementations.
//!
//! This module contains From trait implementations to convert from third-party
//! error types to the unified [`WatermarkError`] type.

use super::types::WatermarkError;

#[cfg(any(feature = "ooxml", feature = "odf"))]
impl From<zip::result::ZipError> for WatermarkError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => WatermarkError::Io(e),
            other => WatermarkError::Repack(format!("ZIP error: {}", other)),
        }
    }
}

#[cfg(any(feature = "ooxml", feature = "odf"))]
impl From<quick_xml::Error> for WatermarkError {
    fn from(err: quick_xml::Error) -> Self {
        WatermarkError::Repack(format!("XML error: {}", err))
    }
}

#[cfg(feature = "images")]
impl From<image::ImageError> for WatermarkError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => WatermarkError::Io(e),
            other => WatermarkError::Repack(format!("image codec error: {}", other)),
        }
    }
}

impl From<serde_json::Error> for WatermarkError {
    fn from(err: serde_json::Error) -> Self {
        WatermarkError::Decryption(format!("malformed JSON payload: {}", err))
    }
}

impl From<std::string::FromUtf8Error> for WatermarkError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        WatermarkError::Decryption(format!("payload is not UTF-8: {}", err))
    }
}
