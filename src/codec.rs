//! Field encoding for the line formats.
//!
//! Both the intermediate stream and the aggregate table join fields with
//! fixed separators (`|` and tab). Fields are backslash-escaped so a vessel
//! or rig name can never be mistaken for a separator:
//!
//! ```text
//! \  → \\      |  → \|      tab → \t      newline → \n      CR → \r
//! ```
//!
//! A field with none of those characters is written verbatim, so ordinary
//! data keeps the plain `vessel|rig\tdeparture|1|0` shape.

use std::borrow::Cow;

/// Separator between the parts of a key or of a value.
pub const PART_SEP: char = '|';

/// Separator between key and value, and between aggregate columns.
pub const FIELD_SEP: char = '\t';

/// Errors raised while splitting an encoded line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("line ends with a dangling escape")]
    DanglingEscape,

    #[error("unknown escape sequence \\{0}")]
    UnknownEscape(char),
}

pub type Result<T> = core::result::Result<T, CodecError>;

/// Escape a single field.
pub fn escape(field: &str) -> Cow<'_, str> {
    if !field.contains(['\\', PART_SEP, FIELD_SEP, '\n', '\r']) {
        return Cow::Borrowed(field);
    }

    let mut out = String::with_capacity(field.len() + 4);
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            PART_SEP => out.push_str("\\|"),
            FIELD_SEP => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Join fields with `sep`, escaping each one.
pub fn join(fields: &[&str], sep: char) -> String {
    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(sep);
        }
        out.push_str(&escape(field));
    }
    out
}

/// Split `line` on unescaped occurrences of `sep` without unescaping.
///
/// The returned slices still carry their escapes, which lets a caller split
/// the key from the value first and then split each half on `|`.
pub fn split_raw(line: &str, sep: char) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut chars = line.char_indices();

    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(_) => continue,
                None => return Err(CodecError::DanglingEscape),
            }
        }
        if c == sep {
            parts.push(&line[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&line[start..]);
    Ok(parts)
}

/// Reverse [`escape`].
pub fn unescape(field: &str) -> Result<Cow<'_, str>> {
    if !field.contains('\\') {
        return Ok(Cow::Borrowed(field));
    }

    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('|') => out.push('|'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => return Err(CodecError::UnknownEscape(other)),
            None => return Err(CodecError::DanglingEscape),
        }
    }
    Ok(Cow::Owned(out))
}

/// Split on unescaped `sep` and unescape every field.
pub fn split_fields(line: &str, sep: char) -> Result<Vec<String>> {
    split_raw(line, sep)?
        .into_iter()
        .map(|part| unescape(part).map(Cow::into_owned))
        .collect()
}
