//! Byte-level XML edits that keep the document well-formed.
//!
//! Package members are edited as text so that everything the edit does not
//! touch survives byte-for-byte (namespace prefixes, attribute order,
//! whitespace). Every edited document is re-parsed before it is accepted.

use std::ops::Range;

use memchr::memmem;
use quick_xml::Reader;
use quick_xml::events::Event;

/// Check that `xml` parses as a single well-formed document.
///
/// Returns a description of the first problem found.
pub fn check_well_formed(xml: &[u8]) -> Result<(), String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut depth: usize = 0;
    let mut roots = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            },
            Ok(Event::Empty(_)) => {
                if depth == 0 {
                    roots += 1;
                }
            },
            Ok(Event::End(_)) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unbalanced end tag".to_string())?;
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "parse error at byte {}: {}",
                    reader.buffer_position(),
                    e
                ));
            },
            _ => {},
        }
        buf.clear();
    }

    match (depth, roots) {
        (0, 1) => Ok(()),
        (0, 0) => Err("no root element".to_string()),
        (0, n) => Err(format!("{} root elements", n)),
        (d, _) => Err(format!("{} unclosed element(s)", d)),
    }
}

/// Insert `insertion` immediately before the last occurrence of `needle`.
pub fn insert_before_last(xml: &[u8], needle: &str, insertion: &str) -> Option<Vec<u8>> {
    let idx = memmem::rfind(xml, needle.as_bytes())?;
    Some(splice(xml, idx, idx, insertion.as_bytes()))
}

/// Replace `xml[start..end]` with `replacement`.
#[inline]
pub fn splice(xml: &[u8], start: usize, end: usize, replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(xml.len() - (end - start) + replacement.len());
    out.extend_from_slice(&xml[..start]);
    out.extend_from_slice(replacement);
    out.extend_from_slice(&xml[end..]);
    out
}

/// Locate the text content of the first element whose qualified name is
/// `qname`, returning `(content_start, content_end)`.
///
/// Self-closing elements (`<cp:keywords/>`) are reported as `None`; callers
/// treat them like an absent tag and synthesize a new one.
pub fn element_content_span(xml: &[u8], qname: &str) -> Option<(usize, usize)> {
    let open = format!("<{}", qname);
    let close = format!("</{}>", qname);
    let mut from = 0;

    while let Some(rel) = memmem::find(&xml[from..], open.as_bytes()) {
        let tag_start = from + rel;
        let after_name = tag_start + open.len();
        // Guard against prefix matches such as <cp:keywordsX>
        match xml.get(after_name) {
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') | Some(b'/') => {},
            _ => {
                from = after_name;
                continue;
            },
        }
        let tag_end = after_name + memchr::memchr(b'>', &xml[after_name..])?;
        if xml[tag_end - 1] == b'/' {
            return None;
        }
        let content_start = tag_end + 1;
        let content_end = content_start + memmem::find(&xml[content_start..], close.as_bytes())?;
        return Some((content_start, content_end));
    }
    None
}

/// An element with content located by [`find_elements`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpan {
    /// The opening tag, `<` through `>`
    pub open_tag: Range<usize>,
    pub content: Range<usize>,
    /// Start of the element through the end of its closing tag
    pub outer: Range<usize>,
}

/// Every non-empty element named `qname`, in document order.
///
/// Self-closing elements are skipped. Nested elements of the same name are
/// not supported; the first closing tag ends the match.
pub fn find_elements(xml: &[u8], qname: &str) -> Vec<ElementSpan> {
    let open = format!("<{}", qname);
    let close = format!("</{}>", qname);
    let mut spans = Vec::new();
    let mut from = 0;

    while let Some(rel) = memmem::find(&xml[from..], open.as_bytes()) {
        let tag_start = from + rel;
        let after_name = tag_start + open.len();
        from = after_name;
        if !matches!(
            xml.get(after_name),
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n')
        ) {
            continue;
        }
        let Some(rel_end) = memchr::memchr(b'>', &xml[after_name..]) else {
            break;
        };
        let tag_end = after_name + rel_end;
        if xml[tag_end - 1] == b'/' {
            from = tag_end + 1;
            continue;
        }
        let content_start = tag_end + 1;
        let Some(rel_close) = memmem::find(&xml[content_start..], close.as_bytes()) else {
            break;
        };
        let content_end = content_start + rel_close;
        let outer_end = content_end + close.len();
        spans.push(ElementSpan {
            open_tag: tag_start..tag_end + 1,
            content: content_start..content_end,
            outer: tag_start..outer_end,
        });
        from = outer_end;
    }
    spans
}

/// Remove a self-closing `<qname/>` or `<qname .../>` element if present.
pub fn remove_empty_element(xml: &[u8], qname: &str) -> Vec<u8> {
    let open = format!("<{}", qname);
    if let Some(start) = memmem::find(xml, open.as_bytes()) {
        let after_name = start + open.len();
        if matches!(xml.get(after_name), Some(b'/') | Some(b' '))
            && let Some(rel_end) = memchr::memchr(b'>', &xml[after_name..])
        {
            let end = after_name + rel_end;
            if xml[end - 1] == b'/' {
                return splice(xml, start, end + 1, b"");
            }
        }
    }
    xml.to_vec()
}
