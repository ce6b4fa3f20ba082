//! Label values stored in a vocabulary.
//!
//! A [`Label`] is any hashable literal the persisted vocabulary format can
//! express: `None`, booleans, integers, strings and (nested) tuples of those.
//! Its [`Display`](std::fmt::Display) impl writes the literal `repr` used in
//! saved encoder files, and [`crate::literal::parse_label`] reads it back.

use std::fmt;

/// A single vocabulary entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    Tuple(Vec<Label>),
}

impl Label {
    /// The literal representation written to saved vocabularies.
    pub fn repr(&self) -> String {
        self.to_string()
    }

    /// Borrow the string payload, if this is a string label.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Label::Str(s) => Some(s),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Literal repr
// ─────────────────────────────────────────────────────────────────────────────

/// Write `s` as a quoted string literal.
///
/// Single quotes are preferred; double quotes are used when the text contains
/// a single quote but no double quote, so the common case needs no escapes.
fn write_str_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    write!(f, "{}", quote)?;
    for ch in s.chars() {
        match ch {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c == quote => write!(f, "\\{}", c)?,
            c if (c as u32) < 0x20 || c as u32 == 0x7f => write!(f, "\\x{:02x}", c as u32)?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "{}", quote)
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::None => f.write_str("None"),
            Label::Bool(true) => f.write_str("True"),
            Label::Bool(false) => f.write_str("False"),
            Label::Int(i) => write!(f, "{}", i),
            Label::Str(s) => write_str_literal(f, s),
            Label::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                // One-element tuples keep their trailing comma.
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversions
// ─────────────────────────────────────────────────────────────────────────────

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label::Str(s.to_string())
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Label::Str(s)
    }
}

impl From<&String> for Label {
    fn from(s: &String) -> Self {
        Label::Str(s.clone())
    }
}

impl From<char> for Label {
    fn from(c: char) -> Self {
        Label::Str(c.to_string())
    }
}

impl From<i64> for Label {
    fn from(i: i64) -> Self {
        Label::Int(i)
    }
}

impl From<i32> for Label {
    fn from(i: i32) -> Self {
        Label::Int(i as i64)
    }
}

impl From<bool> for Label {
    fn from(b: bool) -> Self {
        Label::Bool(b)
    }
}

impl From<&Label> for Label {
    fn from(l: &Label) -> Self {
        l.clone()
    }
}

impl<T: Into<Label>> From<Option<T>> for Label {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Label::None)
    }
}

impl<A: Into<Label>, B: Into<Label>> From<(A, B)> for Label {
    fn from((a, b): (A, B)) -> Self {
        Label::Tuple(vec![a.into(), b.into()])
    }
}
