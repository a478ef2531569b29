//! Escape-aware scanning of raw RTF bytes.
//!
//! RTF text may be in any ANSI code page, so scanning works on bytes. Only
//! the structural characters matter here: `\` starts a control word or
//! control symbol, and `{` / `}` open and close groups unless escaped.

use std::ops::Range;

use memchr::memmem;

/// Index one past the `}` that closes the group opened at `open`.
pub fn group_end(data: &[u8], open: usize) -> Option<usize> {
    if data.get(open) != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    let mut i = open;
    while i < data.len() {
        match data[i] {
            // Control symbol; skips escaped braces and backslashes
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            },
            _ => {},
        }
        i += 1;
    }
    None
}

/// Offset of the first unescaped control word `\word` not followed by
/// another letter.
pub fn find_control_word(data: &[u8], word: &str) -> Option<usize> {
    let word = word.as_bytes();
    let mut i = 0;
    while i < data.len() {
        if data[i] != b'\\' {
            i += 1;
            continue;
        }
        let start = i;
        let letters = data[i + 1..]
            .iter()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        if letters == 0 {
            // Control symbol such as \\ or \{
            i += 2;
            continue;
        }
        if &data[i + 1..i + 1 + letters] == word {
            return Some(start);
        }
        i += 1 + letters;
    }
    None
}

/// End of the `{\info ...}` group, if the document has one.
pub fn info_group_end(data: &[u8]) -> Option<usize> {
    let word = find_control_word(data, "info")?;
    let open = data[..word].iter().rposition(|&b| !b.is_ascii_whitespace())?;
    if data[open] != b'{' {
        return None;
    }
    group_end(data, open)
}

/// End of the `\rtfN` header control word, parameter included.
pub fn header_word_end(data: &[u8]) -> Option<usize> {
    let start = memmem::find(data, b"{\\rtf")?;
    let after_word = start + 5;
    let digits = data[after_word..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    Some(after_word + digits)
}

/// Every group whose text starts with `prefix`, in document order.
pub fn groups_with_prefix(data: &[u8], prefix: &str) -> Vec<Range<usize>> {
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(rel) = memmem::find(&data[from..], prefix.as_bytes()) {
        let start = from + rel;
        match group_end(data, start) {
            Some(end) => {
                found.push(start..end);
                from = end;
            },
            None => break,
        }
    }
    found
}
