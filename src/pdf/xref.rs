// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Cross-reference parsing.
//!
//! Follows `startxref` to the newest section and walks the `/Prev` chain
//! back to the first revision. Handles classic `xref` tables,
//! cross-reference streams and hybrid files (`/XRefStm`). For every object
//! number the newest entry wins.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use super::error::{PdfError, Result};
use super::lexer::{
    keyword_at, parse_object, parse_object_header, read_token, read_unsigned, skip_ws, Dictionary,
    Object,
};
use super::stream::{self, rfind};

/// How far from the end of the file `startxref` is searched for.
const STARTXREF_WINDOW: usize = 4096;

/// One cross-reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// Generation to use if the number is reused.
    Free { generation: u16 },
    /// Stored at a byte offset in the file.
    InUse { offset: usize, generation: u16 },
    /// Stored as the `index`-th object of object stream `stream`.
    Compressed { stream: u32, index: u32 },
}

/// Merged view of every cross-reference section in the file.
#[derive(Debug, Clone, Default)]
pub struct XrefTable {
    pub entries: BTreeMap<u32, XrefEntry>,
    /// Trailer of the newest section (stream dictionary for xref streams).
    pub trailer: Dictionary,
    /// Byte offsets of cross-reference stream objects. These objects are
    /// structure, not content, and are rebuilt on write.
    pub stream_offsets: Vec<usize>,
}

impl XrefTable {
    /// Insert unless a newer section already described `id`.
    fn merge(&mut self, id: u32, entry: XrefEntry) {
        self.entries.entry(id).or_insert(entry);
    }

    /// Fold in an older revision: entries already present stay.
    fn absorb(&mut self, older: XrefTable) {
        for (id, entry) in older.entries {
            self.merge(id, entry);
        }
        self.stream_offsets.extend(older.stream_offsets);
    }

    /// Fold in the `/XRefStm` stream of the same revision. Its rows replace
    /// free rows of the classic table, which hybrid writers emit for objects
    /// that only stream-aware readers can find.
    fn overlay(&mut self, hybrid: XrefTable) {
        for (id, entry) in hybrid.entries {
            match self.entries.get(&id) {
                None | Some(XrefEntry::Free { .. }) => {
                    self.entries.insert(id, entry);
                }
                Some(_) => {}
            }
        }
        self.stream_offsets.extend(hybrid.stream_offsets);
    }
}

/// Offset announced by the last `startxref` keyword.
pub fn find_startxref(data: &[u8]) -> Result<usize> {
    let window_start = data.len().saturating_sub(STARTXREF_WINDOW);
    let pos = rfind(&data[window_start..], b"startxref")
        .map(|p| window_start + p)
        .ok_or(PdfError::MissingStartXref)?;
    let (offset, _) = read_unsigned(data, pos + b"startxref".len())
        .ok_or(PdfError::InvalidXref("startxref has no offset"))?;
    usize::try_from(offset).map_err(|_| PdfError::InvalidXref("startxref offset too large"))
}

/// Read every section reachable from `startxref`.
pub fn read_xref_chain(data: &[u8]) -> Result<XrefTable> {
    let mut table = XrefTable::default();
    let mut visited = HashSet::new();
    let mut next = Some(find_startxref(data)?);
    let mut newest = true;

    while let Some(offset) = next {
        if !visited.insert(offset) {
            return Err(PdfError::XrefLoop(offset));
        }
        let mut revision = XrefTable::default();
        let section = read_section(data, offset, &mut revision)?;

        // hybrid file: the stream supplements the classic table
        if let Some(stm) = section.get(b"XRefStm").and_then(Object::as_integer) {
            let stm = usize::try_from(stm).map_err(|_| PdfError::InvalidXref("negative /XRefStm"))?;
            if visited.insert(stm) {
                let mut hybrid = XrefTable::default();
                read_section(data, stm, &mut hybrid)?;
                revision.overlay(hybrid);
            }
        }
        table.absorb(revision);

        next = match section.get(b"Prev") {
            None => None,
            Some(prev) => {
                let prev = prev
                    .as_integer()
                    .and_then(|p| usize::try_from(p).ok())
                    .ok_or(PdfError::InvalidXref("malformed /Prev"))?;
                Some(prev)
            }
        };
        if newest {
            table.trailer = section;
            newest = false;
        }
    }

    debug!(
        entries = table.entries.len(),
        xref_streams = table.stream_offsets.len(),
        "read cross-reference chain"
    );
    Ok(table)
}

/// Parse the section at `offset`, merge its entries and return its trailer.
fn read_section(data: &[u8], offset: usize, table: &mut XrefTable) -> Result<Dictionary> {
    if offset >= data.len() {
        return Err(PdfError::InvalidXref("section offset out of range"));
    }
    let pos = skip_ws(data, offset);
    if keyword_at(data, pos, b"xref") {
        read_table(data, pos + 4, table)
    } else if parse_object_header(data, pos).is_some() {
        read_stream(data, pos, table)
    } else {
        Err(PdfError::InvalidXref("no cross-reference section at offset"))
    }
}

fn read_table(data: &[u8], mut pos: usize, table: &mut XrefTable) -> Result<Dictionary> {
    const BAD_ENTRY: PdfError = PdfError::InvalidXref("malformed table entry");

    loop {
        pos = skip_ws(data, pos);
        if pos >= data.len() {
            return Err(PdfError::UnexpectedEof);
        }
        if keyword_at(data, pos, b"trailer") {
            let (trailer, _) = parse_object(data, pos + b"trailer".len())?;
            return match trailer {
                Object::Dictionary(d) => Ok(d),
                _ => Err(PdfError::InvalidXref("trailer is not a dictionary")),
            };
        }

        let (start, p) = read_unsigned(data, pos).ok_or(PdfError::InvalidXref("malformed subsection header"))?;
        let (count, p) = read_unsigned(data, p).ok_or(PdfError::InvalidXref("malformed subsection header"))?;
        pos = p;
        for i in 0..count {
            let id = u32::try_from(start + i).map_err(|_| BAD_ENTRY)?;
            let (offset, p) = read_unsigned(data, pos).ok_or(BAD_ENTRY)?;
            let (generation, p) = read_unsigned(data, p).ok_or(BAD_ENTRY)?;
            let (kind, p) = read_token(data, p).ok_or(BAD_ENTRY)?;
            let generation = u16::try_from(generation).map_err(|_| BAD_ENTRY)?;
            let entry = match kind {
                b"n" => XrefEntry::InUse {
                    offset: usize::try_from(offset).map_err(|_| BAD_ENTRY)?,
                    generation,
                },
                b"f" => XrefEntry::Free { generation },
                _ => return Err(BAD_ENTRY),
            };
            table.merge(id, entry);
            pos = p;
        }
    }
}

fn read_stream(data: &[u8], pos: usize, table: &mut XrefTable) -> Result<Dictionary> {
    let (_, _, p) = parse_object_header(data, pos).ok_or(PdfError::InvalidXref("bad stream header"))?;
    let (dict, p) = parse_object(data, p)?;
    let Object::Dictionary(dict) = dict else {
        return Err(PdfError::InvalidXref("cross-reference stream has no dictionary"));
    };
    if dict.get(b"Type").and_then(Object::as_name) != Some(b"XRef".as_slice()) {
        return Err(PdfError::InvalidXref("object at offset is not a cross-reference stream"));
    }

    let start = stream::data_start(data, p).ok_or(PdfError::InvalidXref("missing stream keyword"))?;
    let length = dict
        .get(b"Length")
        .and_then(Object::as_integer)
        .and_then(|l| usize::try_from(l).ok())
        .ok_or(PdfError::InvalidXref("cross-reference stream /Length must be a direct integer"))?;
    let raw = data.get(start..start + length).ok_or(PdfError::UnexpectedEof)?;
    let decoded = stream::decode(&dict, raw)?;

    let widths: Vec<usize> = dict
        .get(b"W")
        .and_then(Object::as_array)
        .ok_or(PdfError::InvalidXref("missing /W"))?
        .iter()
        .map(|w| w.as_integer().and_then(|w| usize::try_from(w).ok()).filter(|&w| w <= 8))
        .collect::<Option<_>>()
        .ok_or(PdfError::InvalidXref("malformed /W"))?;
    if widths.len() != 3 || widths.iter().sum::<usize>() == 0 {
        return Err(PdfError::InvalidXref("malformed /W"));
    }

    let size = dict
        .get(b"Size")
        .and_then(Object::as_integer)
        .ok_or(PdfError::InvalidXref("missing /Size"))?;
    let index: Vec<i64> = match dict.get(b"Index") {
        Some(Object::Array(items)) => items
            .iter()
            .map(Object::as_integer)
            .collect::<Option<_>>()
            .ok_or(PdfError::InvalidXref("malformed /Index"))?,
        _ => vec![0, size],
    };
    if index.len() % 2 != 0 {
        return Err(PdfError::InvalidXref("malformed /Index"));
    }

    let row_len: usize = widths.iter().sum();
    let mut rows = decoded.chunks_exact(row_len);
    for pair in index.chunks(2) {
        let (first, count) = (pair[0], pair[1]);
        if first < 0 || count < 0 {
            return Err(PdfError::InvalidXref("malformed /Index"));
        }
        for i in 0..count {
            let row = rows.next().ok_or(PdfError::InvalidXref("cross-reference stream too short"))?;
            let id = u32::try_from(first + i).map_err(|_| PdfError::InvalidXref("object number overflow"))?;
            let (f0, rest) = row.split_at(widths[0]);
            let (f1, f2) = rest.split_at(widths[1]);
            let kind = if widths[0] == 0 { 1 } else { be_uint(f0) };
            let entry = match kind {
                1 => XrefEntry::InUse {
                    offset: usize::try_from(be_uint(f1)).map_err(|_| PdfError::InvalidXref("offset overflow"))?,
                    generation: u16::try_from(be_uint(f2)).map_err(|_| PdfError::InvalidXref("generation overflow"))?,
                },
                2 => XrefEntry::Compressed {
                    stream: u32::try_from(be_uint(f1)).map_err(|_| PdfError::InvalidXref("object number overflow"))?,
                    index: u32::try_from(be_uint(f2)).map_err(|_| PdfError::InvalidXref("index overflow"))?,
                },
                0 => XrefEntry::Free {
                    generation: u16::try_from(be_uint(f2)).unwrap_or(u16::MAX),
                },
                // unknown types read as the null object
                _ => XrefEntry::Free { generation: 0 },
            };
            table.merge(id, entry);
        }
    }

    table.stream_offsets.push(pos);
    Ok(dict)
}

fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}
