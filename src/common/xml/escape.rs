//! Entity escaping for envelope text placed in XML parts.
//!
//! Sealed fields are base64 and hex and pass through unchanged; escaping
//! matters for plaintext legacy tokens and for keyword lists written by other
//! producers that get spliced back into metadata.

use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;

const SPECIAL: [&str; 5] = ["&", "<", ">", "\"", "'"];
const ENTITIES: [&str; 5] = ["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"];

static ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(SPECIAL)
        .expect("XML special characters form a valid automaton")
});

// Leftmost-longest so `&amp;lt;` decodes once, to `&lt;`
static UNESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(ENTITIES)
        .expect("XML entities form a valid automaton")
});

/// Escape text for an XML attribute value or element body.
///
/// ```
/// use docmark::common::xml::escape_xml;
/// // Envelope fields need no escaping
/// let fields = "q0Zr+7u/Aw==|1718000000|9e107d9d372bb6826bd81d3542a419d6";
/// assert_eq!(escape_xml(fields), fields);
/// assert_eq!(escape_xml("Watermark:R&D<draft>"), "Watermark:R&amp;D&lt;draft&gt;");
/// ```
#[inline]
pub fn escape_xml(s: &str) -> String {
    ESCAPER.replace_all(s, &ENTITIES)
}

/// Decode the five predefined entities. Anything else is kept as written.
///
/// ```
/// use docmark::common::xml::unescape_xml;
/// assert_eq!(
///     unescape_xml("checksum=&quot;9e107d9d&quot;"),
///     "checksum=\"9e107d9d\""
/// );
/// assert_eq!(unescape_xml("R&amp;amp;D"), "R&amp;D");
/// assert_eq!(unescape_xml("&#x26;"), "&#x26;");
/// ```
#[inline]
pub fn unescape_xml(s: &str) -> String {
    UNESCAPER.replace_all(s, &SPECIAL)
}
