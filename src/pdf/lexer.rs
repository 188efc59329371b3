// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Minimal PDF object syntax: tokens, direct objects and their serialization.
//!
//! Only what is needed to read trailers, cross-reference streams and stream
//! dictionaries. Strings, reals and names keep their raw source bytes so a
//! dictionary written back out is textually equivalent to the one read.

use super::error::{PdfError, Result};

/// Nesting limit for arrays and dictionaries.
const MAX_DEPTH: usize = 64;

pub fn is_whitespace(b: u8) -> bool {
    matches!(b, 0 | b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

pub fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

/// Skip whitespace and `%` comments starting at `pos`.
pub fn skip_ws(data: &[u8], mut pos: usize) -> usize {
    while pos < data.len() {
        if is_whitespace(data[pos]) {
            pos += 1;
        } else if data[pos] == b'%' {
            while pos < data.len() && data[pos] != b'\n' && data[pos] != b'\r' {
                pos += 1;
            }
        } else {
            break;
        }
    }
    pos
}

/// Read a run of regular characters after skipping whitespace.
///
/// Returns the token and the offset just past it, or `None` if the next
/// byte is a delimiter or input is exhausted.
pub fn read_token(data: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let start = skip_ws(data, pos);
    let mut end = start;
    while end < data.len() && is_regular(data[end]) {
        end += 1;
    }
    (end > start).then(|| (&data[start..end], end))
}

/// Match keyword `kw` at exactly `pos`, requiring a token boundary after it.
pub fn keyword_at(data: &[u8], pos: usize, kw: &[u8]) -> bool {
    data.get(pos..pos + kw.len()) == Some(kw)
        && data.get(pos + kw.len()).map_or(true, |&b| !is_regular(b))
}

/// Skip whitespace, then match `kw`. Returns the offset after the keyword.
pub fn expect_keyword(data: &[u8], pos: usize, kw: &[u8]) -> Option<usize> {
    let start = skip_ws(data, pos);
    keyword_at(data, start, kw).then_some(start + kw.len())
}

/// Read an unsigned decimal integer token.
pub fn read_unsigned(data: &[u8], pos: usize) -> Option<(u64, usize)> {
    let (token, end) = read_token(data, pos)?;
    if token.is_empty() || token.len() > 19 || !token.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let value = token.iter().fold(0u64, |acc, &d| acc * 10 + u64::from(d - b'0'));
    Some((value, end))
}

/// Parse an indirect object header `id gen obj` at `pos`.
///
/// Returns `(id, gen, offset after "obj")`.
pub fn parse_object_header(data: &[u8], pos: usize) -> Option<(u32, u16, usize)> {
    let (id, p) = read_unsigned(data, pos)?;
    let (gen, p) = read_unsigned(data, p)?;
    let p = expect_keyword(data, p, b"obj")?;
    Some((u32::try_from(id).ok()?, u16::try_from(gen).ok()?, p))
}

/// Ordered dictionary keyed by raw name bytes (without the leading slash).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary(Vec<(Vec<u8>, Object)>);

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<&Object> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Replace the value for `key`, or append it at the end.
    pub fn set(&mut self, key: &[u8], value: Object) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key.to_vec(), value)),
        }
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        let index = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(index).1)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &Object)> {
        self.0.iter().map(|(k, v)| (k.as_slice(), v))
    }
}

/// A direct PDF object.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    /// Raw token text, e.g. `0.5` or `-.25`.
    Real(Vec<u8>),
    /// Raw name bytes after the slash, `#xx` escapes left undecoded.
    Name(Vec<u8>),
    /// Raw literal including its delimiters: `(...)` or `<...>`.
    String(Vec<u8>),
    Array(Vec<Object>),
    Dictionary(Dictionary),
    Reference(u32, u16),
}

impl Object {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&[u8]> {
        match self {
            Self::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Self::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<(u32, u16)> {
        match self {
            Self::Reference(id, gen) => Some((*id, *gen)),
            _ => None,
        }
    }
}

/// Parse one direct object starting at `pos` (leading whitespace allowed).
///
/// Returns the object and the offset just past it.
pub fn parse_object(data: &[u8], pos: usize) -> Result<(Object, usize)> {
    parse_nested(data, pos, 0)
}

fn invalid(offset: usize, reason: &'static str) -> PdfError {
    PdfError::InvalidObject { offset, reason }
}

fn parse_nested(data: &[u8], pos: usize, depth: usize) -> Result<(Object, usize)> {
    if depth > MAX_DEPTH {
        return Err(invalid(pos, "nesting too deep"));
    }
    let pos = skip_ws(data, pos);
    let Some(&first) = data.get(pos) else {
        return Err(PdfError::UnexpectedEof);
    };

    match first {
        b'/' => {
            let mut end = pos + 1;
            while end < data.len() && is_regular(data[end]) {
                end += 1;
            }
            Ok((Object::Name(data[pos + 1..end].to_vec()), end))
        }
        b'(' => {
            let end = literal_string_end(data, pos)?;
            Ok((Object::String(data[pos..end].to_vec()), end))
        }
        b'<' if data.get(pos + 1) == Some(&b'<') => {
            let (dict, end) = parse_dict_body(data, pos + 2, depth)?;
            Ok((Object::Dictionary(dict), end))
        }
        b'<' => {
            let close = data[pos..]
                .iter()
                .position(|&b| b == b'>')
                .ok_or(PdfError::UnexpectedEof)?;
            let end = pos + close + 1;
            Ok((Object::String(data[pos..end].to_vec()), end))
        }
        b'[' => {
            let mut items = Vec::new();
            let mut p = pos + 1;
            loop {
                p = skip_ws(data, p);
                match data.get(p) {
                    None => return Err(PdfError::UnexpectedEof),
                    Some(b']') => return Ok((Object::Array(items), p + 1)),
                    Some(_) => {
                        let (item, next) = parse_nested(data, p, depth + 1)?;
                        items.push(item);
                        p = next;
                    }
                }
            }
        }
        b'0'..=b'9' | b'+' | b'-' | b'.' => parse_number(data, pos),
        _ => {
            let Some((token, end)) = read_token(data, pos) else {
                return Err(invalid(pos, "unexpected delimiter"));
            };
            match token {
                b"true" => Ok((Object::Boolean(true), end)),
                b"false" => Ok((Object::Boolean(false), end)),
                b"null" => Ok((Object::Null, end)),
                _ => Err(invalid(pos, "unexpected keyword")),
            }
        }
    }
}

/// Parse dictionary entries after the opening `<<`, through the closing `>>`.
fn parse_dict_body(data: &[u8], mut pos: usize, depth: usize) -> Result<(Dictionary, usize)> {
    let mut dict = Dictionary::new();
    loop {
        pos = skip_ws(data, pos);
        match data.get(pos) {
            None => return Err(PdfError::UnexpectedEof),
            Some(b'>') if data.get(pos + 1) == Some(&b'>') => return Ok((dict, pos + 2)),
            Some(b'/') => {
                let (key, next) = parse_nested(data, pos, depth + 1)?;
                let Object::Name(key) = key else {
                    return Err(invalid(pos, "dictionary key is not a name"));
                };
                let (value, next) = parse_nested(data, next, depth + 1)?;
                dict.set(&key, value);
                pos = next;
            }
            Some(_) => return Err(invalid(pos, "dictionary key is not a name")),
        }
    }
}

/// Offset just past the `)` that closes the literal string opened at `pos`.
fn literal_string_end(data: &[u8], pos: usize) -> Result<usize> {
    let mut depth = 0usize;
    let mut p = pos;
    while p < data.len() {
        match data[p] {
            b'\\' => p += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(p + 1);
                }
            }
            _ => {}
        }
        p += 1;
    }
    Err(PdfError::UnexpectedEof)
}

fn parse_number(data: &[u8], pos: usize) -> Result<(Object, usize)> {
    let mut end = pos;
    while end < data.len() && matches!(data[end], b'0'..=b'9' | b'+' | b'-' | b'.') {
        end += 1;
    }
    let token = &data[pos..end];
    if !token.iter().any(u8::is_ascii_digit) {
        return Err(invalid(pos, "malformed number"));
    }
    if token.contains(&b'.') {
        return Ok((Object::Real(token.to_vec()), end));
    }

    // ASCII digits with an optional sign, so from_utf8 cannot fail
    let text = std::str::from_utf8(token).map_err(|_| invalid(pos, "malformed number"))?;
    let Ok(value) = text.parse::<i64>() else {
        return Ok((Object::Real(token.to_vec()), end));
    };

    // `id gen R`
    if token[0].is_ascii_digit() {
        if let Some((gen, after_gen)) = read_unsigned(data, end) {
            if let Some(after_r) = expect_keyword(data, after_gen, b"R") {
                if let (Ok(id), Ok(gen)) = (u32::try_from(value), u16::try_from(gen)) {
                    return Ok((Object::Reference(id, gen), after_r));
                }
            }
        }
    }
    Ok((Object::Integer(value), end))
}

/// Append the textual form of `obj` to `out`.
pub fn write_object(obj: &Object, out: &mut Vec<u8>) {
    match obj {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(true) => out.extend_from_slice(b"true"),
        Object::Boolean(false) => out.extend_from_slice(b"false"),
        Object::Integer(v) => out.extend_from_slice(v.to_string().as_bytes()),
        Object::Real(raw) | Object::String(raw) => out.extend_from_slice(raw),
        Object::Name(name) => {
            out.push(b'/');
            out.extend_from_slice(name);
        }
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object(item, out);
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => write_dict(dict, out),
        Object::Reference(id, gen) => out.extend_from_slice(format!("{id} {gen} R").as_bytes()),
    }
}

pub fn write_dict(dict: &Dictionary, out: &mut Vec<u8>) {
    out.extend_from_slice(b"<<");
    for (key, value) in dict.iter() {
        out.push(b'/');
        out.extend_from_slice(key);
        out.push(b' ');
        write_object(value, out);
    }
    out.extend_from_slice(b">>");
}
