// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! PDF carrier.
//!
//! The container is stored as the data of a plain stream object referenced
//! from the trailer under the private key `/NanoDRM`:
//!
//! ```text
//! N 0 obj
//! << /Length L >>
//! stream
//! <container bytes, exactly L of them>
//! endstream
//! endobj
//! ```
//!
//! The stream is delimited by `/Length` only, so the container may hold any
//! byte sequence including `endstream`.
//!
//! Writing always emits a single-revision file: the original header, every
//! live object copied byte-for-byte in original file order, the payload
//! object, then a freshly built cross-reference section and trailer. Objects
//! stored inside object streams stay inside their object stream; in that case
//! the new cross-reference section is an (uncompressed) cross-reference
//! stream, otherwise a classic `xref` table.
//!
//! Does NOT support:
//! - Encrypted documents -- rejected at parse time
//! - Filters other than FlateDecode on cross-reference streams

pub mod error;
pub mod lexer;
pub mod stream;
pub mod xref;

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

use error::{PdfError, Result};
use lexer::{
    expect_keyword, parse_object, parse_object_header, read_unsigned, skip_ws, write_dict,
    Dictionary, Object,
};
use tracing::{debug, warn};
use xref::{read_xref_chain, XrefEntry, XrefTable};

use crate::drm::{Carrier, DrmError};

/// Trailer key referencing the payload object.
pub const PAYLOAD_TRAILER_KEY: &[u8] = b"NanoDRM";

/// Trailer keys that describe a cross-reference section rather than the
/// document, dropped before the trailer is written again.
const SECTION_KEYS: &[&[u8]] = &[
    b"Prev", b"XRefStm", b"Type", b"W", b"Index", b"Filter", b"DecodeParms", b"Length", b"F",
    b"FFilter", b"FDecodeParms", b"DL",
];

pub fn is_pdf_header(data: &[u8]) -> bool {
    data.starts_with(b"%PDF-")
}

/// An indirect object exactly as it appears in the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndirectObject {
    pub id: u32,
    pub generation: u16,
    /// Everything from `id gen obj` through `endobj`.
    pub bytes: Vec<u8>,
}

/// A parsed PDF file reduced to its live objects and trailer.
#[derive(Debug, Clone)]
pub struct PdfCarrier {
    /// Bytes before the first object: `%PDF-x.y` and the binary comment.
    header: Vec<u8>,
    /// Live objects in original file order.
    objects: Vec<IndirectObject>,
    /// Objects stored in object streams: id -> (stream id, index).
    compressed: BTreeMap<u32, (u32, u32)>,
    /// Generations recorded for free object numbers.
    freed: BTreeMap<u32, u16>,
    trailer: Dictionary,
}

impl PdfCarrier {
    /// Parse a PDF, resolving the full cross-reference chain.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if !is_pdf_header(data) {
            return Err(PdfError::InvalidHeader);
        }
        let table = read_xref_chain(data)?;
        if table.trailer.contains(b"Encrypt") {
            return Err(PdfError::Encrypted);
        }

        let structural: HashSet<usize> = table.stream_offsets.iter().copied().collect();
        let mut spans = Vec::new();
        let mut compressed = BTreeMap::new();
        let mut freed = BTreeMap::new();
        for (&id, &entry) in &table.entries {
            match entry {
                XrefEntry::Free { generation } => {
                    freed.insert(id, generation);
                }
                XrefEntry::Compressed { stream, index } => {
                    compressed.insert(id, (stream, index));
                }
                XrefEntry::InUse { offset, .. } if id == 0 || offset == 0 => {
                    warn!(id, offset, "ignoring in-use xref entry without a usable offset");
                }
                XrefEntry::InUse { offset, .. } if structural.contains(&offset) => {}
                XrefEntry::InUse { offset, generation } => {
                    let (start, end) = object_span(data, id, generation, offset, &table)?;
                    spans.push((start, end, id, generation));
                }
            }
        }
        spans.sort_unstable();

        let header_end = spans.first().map_or_else(|| header_len(data), |s| s.0);
        let mut header = data[..header_end].to_vec();
        if !matches!(header.last(), Some(b'\n' | b'\r')) {
            header.push(b'\n');
        }
        let objects: Vec<IndirectObject> = spans
            .into_iter()
            .map(|(start, end, id, generation)| IndirectObject {
                id,
                generation,
                bytes: data[start..end].to_vec(),
            })
            .collect();

        let mut trailer = table.trailer;
        for key in SECTION_KEYS {
            trailer.remove(key);
        }
        let carrier = Self {
            header,
            objects,
            compressed,
            freed,
            trailer,
        };

        let (root, _) = carrier
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .ok_or(PdfError::InvalidXref("trailer has no /Root reference"))?;
        if !carrier.contains(root) {
            return Err(PdfError::MissingObject(root));
        }
        debug!(
            objects = carrier.objects.len(),
            compressed = carrier.compressed.len(),
            "parsed PDF"
        );
        Ok(carrier)
    }

    pub fn objects(&self) -> &[IndirectObject] {
        &self.objects
    }

    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    fn contains(&self, id: u32) -> bool {
        self.compressed.contains_key(&id) || self.objects.iter().any(|o| o.id == id)
    }

    fn max_id(&self) -> u32 {
        let direct = self.objects.iter().map(|o| o.id).max().unwrap_or(0);
        let packed = self.compressed.keys().next_back().copied().unwrap_or(0);
        direct.max(packed)
    }

    /// Object reference stored under the payload trailer key.
    pub fn payload_reference(&self) -> Option<(u32, u16)> {
        self.trailer
            .get(PAYLOAD_TRAILER_KEY)
            .and_then(Object::as_reference)
    }

    /// Data of the payload stream, if the trailer references one.
    pub fn payload(&self) -> Result<Option<Cow<'_, [u8]>>> {
        let Some((id, _)) = self.payload_reference() else {
            return Ok(None);
        };
        let object = self
            .objects
            .iter()
            .find(|o| o.id == id)
            .ok_or(PdfError::MissingObject(id))?;
        stream_data(&object.bytes).map(Some)
    }

    /// Store `container` as the payload stream, replacing any previous one.
    pub fn set_payload(&mut self, container: &[u8]) {
        let (id, generation) = match self.payload_reference() {
            Some(reference) => reference,
            None => (self.max_id() + 1, 0),
        };
        let bytes = payload_object(id, generation, container);

        match self.objects.iter_mut().find(|o| o.id == id) {
            Some(existing) => {
                debug!(id, len = container.len(), "replacing payload object");
                existing.generation = generation;
                existing.bytes = bytes;
            }
            None => {
                debug!(id, len = container.len(), "appending payload object");
                self.compressed.remove(&id);
                self.freed.remove(&id);
                self.objects.push(IndirectObject { id, generation, bytes });
            }
        }
        self.trailer
            .set(PAYLOAD_TRAILER_KEY, Object::Reference(id, generation));
    }

    /// Serialize as a single revision with a rebuilt cross-reference section.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            self.header.len() + self.objects.iter().map(|o| o.bytes.len() + 1).sum::<usize>() + 1024,
        );
        out.extend_from_slice(&self.header);

        let mut offsets = BTreeMap::new();
        for object in &self.objects {
            offsets.insert(object.id, (out.len(), object.generation));
            out.extend_from_slice(&object.bytes);
            out.push(b'\n');
        }

        match self.table_rows(&offsets) {
            Some(rows) => self.write_xref_table(&rows, &mut out),
            None => self.write_xref_stream(&offsets, &mut out),
        }
        out
    }

    /// Rows of a classic table as `(field, generation, keyword)`, or `None`
    /// when an object lives in an object stream and only a cross-reference
    /// stream can describe it.
    fn table_rows(&self, offsets: &BTreeMap<u32, (usize, u16)>) -> Option<Vec<(usize, u16, char)>> {
        self.entries(offsets, self.max_id() + 1)
            .into_iter()
            .map(|row| match row {
                Row::Free { next, generation } => Some((next as usize, generation, 'f')),
                Row::InUse { offset, generation } => Some((offset, generation, 'n')),
                Row::Compressed { .. } => None,
            })
            .collect()
    }

    fn write_xref_table(&self, rows: &[(usize, u16, char)], out: &mut Vec<u8>) {
        let xref_offset = out.len();

        out.extend_from_slice(format!("xref\n0 {}\n", rows.len()).as_bytes());
        for (field, generation, keyword) in rows {
            out.extend_from_slice(format!("{field:010} {generation:05} {keyword}\r\n").as_bytes());
        }

        let mut trailer = self.trailer.clone();
        trailer.set(b"Size", Object::Integer(rows.len() as i64));
        out.extend_from_slice(b"trailer\n");
        write_dict(&trailer, out);
        out.extend_from_slice(format!("\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes());
    }

    fn write_xref_stream(&self, offsets: &BTreeMap<u32, (usize, u16)>, out: &mut Vec<u8>) {
        let xref_id = self.max_id() + 1;
        let size = xref_id + 1;
        let xref_offset = out.len();

        let mut offsets = offsets.clone();
        offsets.insert(xref_id, (xref_offset, 0));
        let entries = self.entries(&offsets, size);

        let (mut max1, mut max2) = (0u64, 0u64);
        for entry in &entries {
            let (f1, f2) = entry.fields();
            max1 = max1.max(f1);
            max2 = max2.max(f2);
        }
        let (w1, w2) = (byte_width(max1), byte_width(max2));

        let mut rows = Vec::with_capacity(entries.len() * (1 + w1 + w2));
        for entry in &entries {
            let (f1, f2) = entry.fields();
            rows.push(entry.kind());
            rows.extend_from_slice(&f1.to_be_bytes()[8 - w1..]);
            rows.extend_from_slice(&f2.to_be_bytes()[8 - w2..]);
        }

        let mut dict = self.trailer.clone();
        dict.set(b"Type", Object::Name(b"XRef".to_vec()));
        dict.set(b"Size", Object::Integer(i64::from(size)));
        dict.set(
            b"W",
            Object::Array(vec![
                Object::Integer(1),
                Object::Integer(w1 as i64),
                Object::Integer(w2 as i64),
            ]),
        );
        dict.set(b"Length", Object::Integer(rows.len() as i64));

        out.extend_from_slice(format!("{xref_id} 0 obj\n").as_bytes());
        write_dict(&dict, out);
        out.extend_from_slice(b"\nstream\n");
        out.extend_from_slice(&rows);
        out.extend_from_slice(b"\nendstream\nendobj\n");
        out.extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF\n").as_bytes());
    }

    /// One row per object number `0..size`, free rows chained in ascending order.
    fn entries(&self, offsets: &BTreeMap<u32, (usize, u16)>, size: u32) -> Vec<Row> {
        let mut rows: Vec<Row> = (0..size)
            .map(|id| {
                if let Some(&(offset, generation)) = offsets.get(&id) {
                    Row::InUse { offset, generation }
                } else if let Some(&(stream, index)) = self.compressed.get(&id) {
                    Row::Compressed { stream, index }
                } else {
                    let generation = match self.freed.get(&id) {
                        Some(&generation) => generation,
                        None if id == 0 => 65535,
                        None => 0,
                    };
                    Row::Free { next: 0, generation }
                }
            })
            .collect();

        let free: Vec<u32> = (0..size)
            .filter(|&id| matches!(rows[id as usize], Row::Free { .. }))
            .collect();
        for pair in free.windows(2) {
            if let Row::Free { next, .. } = &mut rows[pair[0] as usize] {
                *next = pair[1];
            }
        }
        rows
    }
}

impl Carrier for PdfCarrier {
    type Slot = (u32, u16);

    fn parse(data: &[u8]) -> std::result::Result<Self, DrmError> {
        Ok(Self::from_bytes(data)?)
    }

    fn locate(&self) -> Option<(u32, u16)> {
        self.payload_reference()
    }

    fn read_container(&self) -> std::result::Result<Option<Cow<'_, [u8]>>, DrmError> {
        Ok(self.payload()?)
    }

    fn write_container(&mut self, container: Vec<u8>) -> std::result::Result<(), DrmError> {
        self.set_payload(&container);
        Ok(())
    }

    fn to_bytes(&self) -> std::result::Result<Vec<u8>, DrmError> {
        Ok(PdfCarrier::to_bytes(self))
    }
}

/// A cross-reference row as written.
#[derive(Debug, Clone, Copy)]
enum Row {
    Free { next: u32, generation: u16 },
    InUse { offset: usize, generation: u16 },
    Compressed { stream: u32, index: u32 },
}

impl Row {
    fn kind(&self) -> u8 {
        match self {
            Row::Free { .. } => 0,
            Row::InUse { .. } => 1,
            Row::Compressed { .. } => 2,
        }
    }

    fn fields(&self) -> (u64, u64) {
        match *self {
            Row::Free { next, generation } => (u64::from(next), u64::from(generation)),
            Row::InUse { offset, generation } => (offset as u64, u64::from(generation)),
            Row::Compressed { stream, index } => (u64::from(stream), u64::from(index)),
        }
    }
}

/// Bytes needed to store `value` big-endian (at least one).
fn byte_width(value: u64) -> usize {
    (8 - value.leading_zeros() as usize / 8).max(1)
}

/// Header length when a file has no objects: first line plus comment lines.
fn header_len(data: &[u8]) -> usize {
    let mut pos = 0;
    while pos < data.len() && data[pos] == b'%' {
        while pos < data.len() && data[pos] != b'\n' && data[pos] != b'\r' {
            pos += 1;
        }
        while pos < data.len() && (data[pos] == b'\n' || data[pos] == b'\r') {
            pos += 1;
        }
    }
    pos
}

fn payload_object(id: u32, generation: u16, container: &[u8]) -> Vec<u8> {
    let mut bytes = format!(
        "{id} {generation} obj\n<< /Length {} >>\nstream\n",
        container.len()
    )
    .into_bytes();
    bytes.extend_from_slice(container);
    bytes.extend_from_slice(b"\nendstream\nendobj");
    bytes
}

/// Byte range `[start, end)` of object `id`, from its header through `endobj`.
fn object_span(
    data: &[u8],
    id: u32,
    generation: u16,
    offset: usize,
    table: &XrefTable,
) -> Result<(usize, usize)> {
    let bad_offset = || PdfError::BadObjectOffset { id, offset };
    if offset >= data.len() {
        return Err(bad_offset());
    }
    let start = skip_ws(data, offset);
    let (found_id, found_gen, body) = parse_object_header(data, start).ok_or_else(bad_offset)?;
    if found_id != id || found_gen != generation {
        return Err(bad_offset());
    }

    // `id gen obj endobj` is a legal (null) object
    let body = skip_ws(data, body);
    if lexer::keyword_at(data, body, b"endobj") {
        return Ok((start, body + b"endobj".len()));
    }
    let (value, after_value) = parse_object(data, body)?;
    let after_value = skip_ws(data, after_value);
    let end_of_body = match (&value, stream::data_start(data, after_value)) {
        (Object::Dictionary(dict), Some(data_start)) => stream_end(data, dict, data_start, table)?,
        _ => after_value,
    };
    let end = expect_keyword(data, end_of_body, b"endobj").ok_or(PdfError::InvalidObject {
        offset: end_of_body,
        reason: "missing endobj",
    })?;
    Ok((start, end))
}

/// Offset just past `endstream` for a stream whose data begins at `data_start`.
///
/// Trusts `/Length` when it lands on `endstream`; otherwise scans for the
/// keyword, as broken writers often get the length wrong.
fn stream_end(data: &[u8], dict: &Dictionary, data_start: usize, table: &XrefTable) -> Result<usize> {
    let declared = match dict.get(b"Length") {
        Some(Object::Integer(len)) => usize::try_from(*len).ok(),
        Some(Object::Reference(len_id, _)) => resolve_length(data, *len_id, table),
        _ => None,
    };
    if let Some(len) = declared {
        if let Some(end) = data_start
            .checked_add(len)
            .and_then(|p| expect_keyword(data, p, b"endstream"))
        {
            return Ok(end);
        }
    }
    let at = stream::find(data, data_start, b"endstream").ok_or(PdfError::InvalidObject {
        offset: data_start,
        reason: "unterminated stream",
    })?;
    Ok(at + b"endstream".len())
}

/// Value of an indirect `/Length` object stored directly in the file.
fn resolve_length(data: &[u8], id: u32, table: &XrefTable) -> Option<usize> {
    let XrefEntry::InUse { offset, .. } = *table.entries.get(&id)? else {
        return None;
    };
    let (found, _, body) = parse_object_header(data, offset)?;
    if found != id {
        return None;
    }
    let (len, _) = read_unsigned(data, body)?;
    usize::try_from(len).ok()
}

/// Data of the stream object in `bytes` (a full `id gen obj ... endobj`).
fn stream_data(bytes: &[u8]) -> Result<Cow<'_, [u8]>> {
    let invalid = |reason| PdfError::InvalidObject { offset: 0, reason };
    let (_, _, body) = parse_object_header(bytes, 0).ok_or(invalid("bad object header"))?;
    let (value, after) = parse_object(bytes, body)?;
    let Object::Dictionary(dict) = value else {
        return Err(invalid("payload object is not a stream"));
    };
    let start = stream::data_start(bytes, after).ok_or(invalid("payload object is not a stream"))?;
    let len = dict
        .get(b"Length")
        .and_then(Object::as_integer)
        .and_then(|l| usize::try_from(l).ok())
        .ok_or(invalid("payload stream needs a direct /Length"))?;
    let raw = bytes
        .get(start..start.saturating_add(len))
        .ok_or(PdfError::UnexpectedEof)?;
    if dict.contains(b"Filter") {
        Ok(Cow::Owned(stream::decode(&dict, raw)?))
    } else {
        Ok(Cow::Borrowed(raw))
    }
}
