//! Scalar leaves of the entity tree and their canonical text forms.
//!
//! Every renderer sees the same pre-normalized representation of a scalar:
//! `null`, `true`/`false`, decimal integers and floats that always carry a
//! decimal point.

// Slicing only happens on offsets produced by `char_indices`.
#![allow(clippy::string_slice)]

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

/// A leaf value that can be stored directly in an entity slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Canonical text form. Strings are returned as-is, without quoting.
    pub fn format(&self) -> Cow<'_, str> {
        match self {
            Self::Null => Cow::Borrowed("null"),
            Self::Bool(true) => Cow::Borrowed("true"),
            Self::Bool(false) => Cow::Borrowed("false"),
            Self::Int(n) => Cow::Owned(n.to_string()),
            Self::Float(f) => Cow::Owned(format_float(*f)),
            Self::Str(s) => Cow::Borrowed(s),
        }
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// Format a float so that it always shows a decimal point: `3.0`, never `3`.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_owned();
    }

    let mut text = value.to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(Self::Float(value as f64), Self::Int)
    }
}

impl From<usize> for Scalar {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or(Self::Float(value as f64), Self::Int)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// A run of string content, split so control characters can be styled
/// separately from plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Escape(Cow<'static, str>),
}

/// Escape sequence for a control character, `None` for printable characters.
///
/// Newlines are not escaped; multi-line strings are split on them instead.
pub fn escape_control(c: char) -> Option<Cow<'static, str>> {
    let named = match c {
        '\t' => "\\t",
        '\r' => "\\r",
        '\0' => "\\0",
        '\x0B' => "\\v",
        '\x0C' => "\\f",
        '\x1B' => "\\e",
        '\n' => return None,
        c if c.is_control() => return Some(Cow::Owned(format!("\\x{:02X}", c as u32))),
        _ => return None,
    };
    Some(Cow::Borrowed(named))
}

/// Split one line into text runs and individually escaped control characters.
pub fn segments(line: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut start = 0;

    for (idx, c) in line.char_indices() {
        if let Some(escape) = escape_control(c) {
            if start < idx {
                out.push(Segment::Text(&line[start..idx]));
            }
            out.push(Segment::Escape(escape));
            start = idx + c.len_utf8();
        }
    }

    if start < line.len() {
        out.push(Segment::Text(&line[start..]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_scalar_forms() {
        assert_eq!(Scalar::Null.format(), "null");
        assert_eq!(Scalar::Bool(true).format(), "true");
        assert_eq!(Scalar::Bool(false).format(), "false");
        assert_eq!(Scalar::Int(0).format(), "0");
        assert_eq!(Scalar::Float(0.0).format(), "0.0");
        assert_eq!(Scalar::Str("abc".into()).format(), "abc");
    }

    #[test]
    fn test_float_always_has_decimal_point() {
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(-2.0), "-2.0");
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(1e20), "100000000000000000000.0");
        assert_eq!(format_float(f64::NAN), "NaN");
        assert_eq!(format_float(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_large_unsigned_falls_back_to_float() {
        assert_eq!(Scalar::from(7_u64), Scalar::Int(7));
        assert!(matches!(Scalar::from(u64::MAX), Scalar::Float(_)));
    }

    #[test]
    fn test_control_characters_escaped_individually() {
        let parts = segments("a\tb\x1B\x07");
        assert_eq!(
            parts,
            vec![
                Segment::Text("a"),
                Segment::Escape(Cow::Borrowed("\\t")),
                Segment::Text("b"),
                Segment::Escape(Cow::Borrowed("\\e")),
                Segment::Escape(Cow::Owned("\\x07".to_owned())),
            ]
        );
    }

    #[test]
    fn test_plain_line_is_single_segment() {
        assert_eq!(segments("héllo"), vec![Segment::Text("héllo")]);
        assert!(segments("").is_empty());
    }
}
