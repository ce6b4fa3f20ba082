//! Restrictive literal parser for saved vocabularies.
//!
//! Accepts exactly the literal forms a [`Label`] can print:
//!   - quoted strings (`'a'`, `"it's"`) with `\\ \' \" \n \r \t \0 \xNN \uNNNN \UNNNNNNNN` escapes
//!   - decimal integers with an optional sign (`12`, `-3`)
//!   - `None`, `True`, `False`
//!   - tuples of the above (`()`, `(1,)`, `('a', (2, None))`)
//!
//! Anything else (floats, lists, dicts, names, calls) is rejected, so a saved
//! encoder file can be loaded from an untrusted source without evaluating it.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{error::LiteralError, label::Label};

/// Integer token at the start of the input.
static RE_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?[0-9]+").unwrap());

/// Bare word at the start of the input (`None`, `True`, or something unsupported).
static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*").unwrap());

/// Tuples nest at most this deep; deeper input is rejected rather than recursed.
const MAX_DEPTH: usize = 32;

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, want: char) -> Result<(), LiteralError> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(LiteralError::UnexpectedChar { ch: c, pos: self.pos - c.len_utf8() }),
            None => Err(LiteralError::UnexpectedEnd(self.pos)),
        }
    }

    fn value(&mut self, depth: usize) -> Result<Label, LiteralError> {
        self.skip_ws();
        match self.peek() {
            None => Err(LiteralError::UnexpectedEnd(self.pos)),
            Some('\'' | '"') => self.string().map(Label::Str),
            Some('(') => self.tuple(depth),
            Some(c) if c == '-' || c == '+' || c.is_ascii_digit() => self.int(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.word(),
            Some(c) => Err(LiteralError::UnexpectedChar { ch: c, pos: self.pos }),
        }
    }

    fn int(&mut self) -> Result<Label, LiteralError> {
        let m = RE_INT.find(self.rest()).ok_or(LiteralError::UnexpectedChar {
            ch: self.peek().unwrap_or('?'),
            pos: self.pos,
        })?;
        let token = m.as_str();
        let after = &self.rest()[token.len()..];
        // Floats, complex numbers and underscored ints are not labels.
        if let Some(c) = after.chars().next() {
            if matches!(c, '.' | 'e' | 'E' | 'j' | 'J' | '_' | 'x' | 'o' | 'b') {
                let end = after.find([',', ')', ' ']).unwrap_or(after.len());
                return Err(LiteralError::Unsupported(format!("{}{}", token, &after[..end])));
            }
        }
        let value = token
            .trim_start_matches('+')
            .parse::<i64>()
            .map_err(|_| LiteralError::IntOverflow(token.to_string()))?;
        self.pos += token.len();
        Ok(Label::Int(value))
    }

    fn word(&mut self) -> Result<Label, LiteralError> {
        let token = RE_WORD.find(self.rest()).map(|m| m.as_str()).unwrap_or("");
        let label = match token {
            "None" => Label::None,
            "True" => Label::Bool(true),
            "False" => Label::Bool(false),
            other => return Err(LiteralError::Unsupported(other.to_string())),
        };
        self.pos += token.len();
        Ok(label)
    }

    fn hex_escape(&mut self, digits: usize) -> Result<char, LiteralError> {
        let start = self.pos;
        let hex = self.rest().get(..digits).ok_or(LiteralError::BadEscape(start))?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(LiteralError::BadEscape(start));
        }
        let code = u32::from_str_radix(hex, 16).map_err(|_| LiteralError::BadEscape(start))?;
        self.pos += digits;
        char::from_u32(code).ok_or(LiteralError::BadEscape(start))
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let quote = self.bump().ok_or(LiteralError::UnexpectedEnd(self.pos))?;
        let mut out = String::new();
        loop {
            let c = self.bump().ok_or(LiteralError::UnexpectedEnd(self.pos))?;
            match c {
                c if c == quote => return Ok(out),
                '\n' => return Err(LiteralError::UnexpectedChar { ch: c, pos: self.pos - 1 }),
                '\\' => {
                    let esc_pos = self.pos - 1;
                    let e = self.bump().ok_or(LiteralError::UnexpectedEnd(self.pos))?;
                    let decoded = match e {
                        '\\' => '\\',
                        '\'' => '\'',
                        '"' => '"',
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        '0' => '\0',
                        'x' => self.hex_escape(2)?,
                        'u' => self.hex_escape(4)?,
                        'U' => self.hex_escape(8)?,
                        _ => return Err(LiteralError::BadEscape(esc_pos)),
                    };
                    out.push(decoded);
                }
                c => out.push(c),
            }
        }
    }

    fn tuple(&mut self, depth: usize) -> Result<Label, LiteralError> {
        if depth >= MAX_DEPTH {
            return Err(LiteralError::Unsupported("tuple nested too deeply".to_string()));
        }
        self.expect('(')?;
        let mut items = Vec::new();
        let mut saw_comma = false;
        loop {
            self.skip_ws();
            if self.peek() == Some(')') {
                self.pos += 1;
                break;
            }
            items.push(self.value(depth + 1)?);
            self.skip_ws();
            match self.bump() {
                Some(',') => saw_comma = true,
                Some(')') => break,
                Some(c) => {
                    return Err(LiteralError::UnexpectedChar { ch: c, pos: self.pos - c.len_utf8() })
                }
                None => return Err(LiteralError::UnexpectedEnd(self.pos)),
            }
        }
        // `(x)` is just a parenthesised value, not a tuple.
        if items.len() == 1 && !saw_comma {
            return Ok(items.remove(0));
        }
        Ok(Label::Tuple(items))
    }
}

/// Parse one literal from the start of `input`, returning it together with the
/// unparsed remainder.
pub fn parse_label_prefix(input: &str) -> Result<(Label, &str), LiteralError> {
    let mut p = Parser { src: input, pos: 0 };
    let label = p.value(0)?;
    Ok((label, &input[p.pos..]))
}

/// Parse `input` as exactly one literal (surrounding whitespace allowed).
pub fn parse_label(input: &str) -> Result<Label, LiteralError> {
    let (label, rest) = parse_label_prefix(input)?;
    if !rest.trim().is_empty() {
        return Err(LiteralError::Trailing(rest.trim().to_string()));
    }
    Ok(label)
}
