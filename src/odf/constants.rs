//! ODF MIME types, part paths and namespaces.

/// MIME type for OpenDocument Text (.odt)
pub const ODF_TEXT: &str = "application/vnd.oasis.opendocument.text";

/// Media type recorded in the manifest for XML parts
pub const XML_MEDIA_TYPE: &str = "text/xml";

// Standard part paths
pub const ODF_MIMETYPE: &str = "mimetype";
pub const ODF_META: &str = "meta.xml";
pub const ODF_MANIFEST: &str = "META-INF/manifest.xml";

/// Part holding only the watermark element
pub const WATERMARK_PART: &str = "watermark-data.xml";

/// Name of the user-defined metadata field carrying the envelope
pub const WATERMARK_FIELD: &str = "Watermark";

pub mod namespace {
    pub const OFFICE: &str = "urn:oasis:names:tc:opendocument:xmlns:office:1.0";
    pub const META: &str = "urn:oasis:names:tc:opendocument:xmlns:meta:1.0";
    pub const DC: &str = "http://purl.org/dc/elements/1.1/";
    pub const MANIFEST: &str = "urn:oasis:names:tc:opendocument:xmlns:manifest:1.0";
}
