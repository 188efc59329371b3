// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Shared fixtures and independent validators for the integration tests.
//!
//! Fixtures are generated in code so every test starts from a known carrier.
//! The validators re-check output with their own minimal parsing rather than
//! the crate's parsers.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tempfile::TempDir;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Deterministic pseudo-random bytes.
pub fn random_payload(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut out = vec![0u8; len];
    rng.fill_bytes(&mut out);
    out
}

/// Every byte value once, in order.
pub fn all_byte_values() -> Vec<u8> {
    (0..=255u8).collect()
}

/// Write `bytes` to `name` inside `dir` and return the path.
pub fn write_temp(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

// --- PNG ---------------------------------------------------------------

/// Append one chunk with a correct CRC.
pub fn png_chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(chunk_type);
    out.extend_from_slice(data);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// An 8-bit RGB PNG with a gradient, a `tEXt` chunk and zlib-compressed
/// image data split over two `IDAT` chunks.
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let mut raw = Vec::with_capacity((height * (1 + width * 3)) as usize);
    for y in 0..height {
        raw.push(0); // filter: none
        for x in 0..width {
            raw.extend_from_slice(&[(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 0x80]);
        }
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw).unwrap();
    let compressed = encoder.finish().unwrap();
    let (first, second) = compressed.split_at(compressed.len() / 2);

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);

    let mut out = PNG_SIGNATURE.to_vec();
    png_chunk(&mut out, b"IHDR", &ihdr);
    png_chunk(&mut out, b"tEXt", b"Comment\0fixture");
    png_chunk(&mut out, b"IDAT", first);
    png_chunk(&mut out, b"IDAT", second);
    png_chunk(&mut out, b"IEND", &[]);
    out
}

/// `(type, data)` for every chunk through IEND. Panics on a malformed stream.
pub fn png_chunks(bytes: &[u8]) -> Vec<([u8; 4], Vec<u8>)> {
    assert_eq!(&bytes[..8], &PNG_SIGNATURE, "PNG signature");
    let mut pos = 8;
    let mut chunks = Vec::new();
    loop {
        let len = u32::from_be_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
        let chunk_type: [u8; 4] = bytes[pos + 4..pos + 8].try_into().unwrap();
        let data = bytes[pos + 8..pos + 8 + len].to_vec();
        let stored = u32::from_be_bytes(bytes[pos + 8 + len..pos + 12 + len].try_into().unwrap());
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&chunk_type);
        hasher.update(&data);
        assert_eq!(
            stored,
            hasher.finalize(),
            "CRC of {} chunk",
            String::from_utf8_lossy(&chunk_type)
        );
        pos += 12 + len;
        chunks.push((chunk_type, data));
        if &chunk_type == b"IEND" {
            return chunks;
        }
    }
}

/// Every CRC valid, IHDR first, IEND last, image data still inflates to the
/// size IHDR announces.
pub fn assert_png_valid(bytes: &[u8]) {
    let chunks = png_chunks(bytes);
    assert_eq!(&chunks[0].0, b"IHDR");
    assert_eq!(&chunks.last().unwrap().0, b"IEND");

    let ihdr = &chunks[0].1;
    let width = u32::from_be_bytes(ihdr[0..4].try_into().unwrap()) as usize;
    let height = u32::from_be_bytes(ihdr[4..8].try_into().unwrap()) as usize;

    let idat: Vec<u8> = chunks
        .iter()
        .filter(|(t, _)| t == b"IDAT")
        .flat_map(|(_, d)| d.iter().copied())
        .collect();
    let mut raw = Vec::new();
    ZlibDecoder::new(idat.as_slice()).read_to_end(&mut raw).unwrap();
    assert_eq!(raw.len(), height * (1 + width * 3), "inflated image data size");
}

// --- PDF ---------------------------------------------------------------

/// Writes PDF objects while tracking their offsets for the xref sections.
pub struct PdfBuilder {
    pub buf: Vec<u8>,
    /// Table rows for objects written since the last cross-reference section.
    pending: BTreeMap<u32, String>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            buf: b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec(),
            pending: BTreeMap::new(),
        }
    }

    pub fn object(&mut self, id: u32, body: &str) -> usize {
        let offset = self.buf.len();
        self.pending.insert(id, format!("{offset:010} 00000 n\r\n"));
        self.buf
            .extend_from_slice(format!("{id} 0 obj\n{body}\nendobj\n").as_bytes());
        offset
    }

    pub fn stream(&mut self, id: u32, dict_entries: &str, data: &[u8]) -> usize {
        let offset = self.buf.len();
        self.pending.insert(id, format!("{offset:010} 00000 n\r\n"));
        self.buf.extend_from_slice(
            format!("{id} 0 obj\n<< {dict_entries} /Length {} >>\nstream\n", data.len()).as_bytes(),
        );
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
        offset
    }

    /// List `id` as free in the next table.
    pub fn free(&mut self, id: u32, next: u32, generation: u16) {
        self.pending.insert(id, format!("{next:010} {generation:05} f\r\n"));
    }

    /// Classic `xref` table covering the pending objects (plus object 0 when
    /// `with_free_head`), then trailer and `startxref`. Returns the xref offset.
    pub fn xref_table(&mut self, trailer_entries: &str, with_free_head: bool) -> usize {
        let xref_offset = self.buf.len();
        let mut rows: Vec<(u32, String)> = std::mem::take(&mut self.pending).into_iter().collect();
        if with_free_head {
            rows.insert(0, (0, "0000000000 65535 f\r\n".to_string()));
        }

        self.buf.extend_from_slice(b"xref\n");
        let mut i = 0;
        while i < rows.len() {
            let mut j = i + 1;
            while j < rows.len() && rows[j].0 == rows[j - 1].0 + 1 {
                j += 1;
            }
            self.buf
                .extend_from_slice(format!("{} {}\n", rows[i].0, j - i).as_bytes());
            for (_, row) in &rows[i..j] {
                self.buf.extend_from_slice(row.as_bytes());
            }
            i = j;
        }
        self.buf.extend_from_slice(
            format!("trailer\n<< {trailer_entries} >>\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes(),
        );
        xref_offset
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

const PAGE_CONTENT: &[u8] = b"BT /F1 24 Tf 40 100 Td (Hello) Tj ET";

/// Single-revision PDF with a classic xref table: catalog, page tree, one
/// page with a content stream, and an info dictionary.
pub fn classic_pdf() -> Vec<u8> {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    pdf.object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>");
    pdf.object(
        3,
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] /Contents 4 0 R >>",
    );
    pdf.stream(4, "", PAGE_CONTENT);
    pdf.object(5, "<< /Producer (fixture builder) >>");
    pdf.xref_table(
        "/Size 6 /Root 1 0 R /Info 5 0 R /ID [<00112233445566778899AABBCCDDEEFF> <00112233445566778899AABBCCDDEEFF>]",
        true,
    );
    pdf.finish()
}

/// [`classic_pdf`] plus an incremental update that replaces the content
/// stream (object 4) and adds an annotation (object 6).
pub fn incremental_pdf() -> Vec<u8> {
    let base = classic_pdf();
    let prev = last_startxref(&base);
    let mut pdf = PdfBuilder {
        buf: base,
        pending: BTreeMap::new(),
    };
    pdf.stream(4, "", b"BT /F1 24 Tf 40 100 Td (Hello again) Tj ET");
    pdf.object(6, "<< /Type /Annot /Subtype /Text /Rect [0 0 10 10] >>");
    pdf.xref_table(&format!("/Size 7 /Root 1 0 R /Info 5 0 R /Prev {prev}"), false);
    pdf.finish()
}

/// Object stream 5 holding the page tree (object 2) and the page (object 3).
fn page_tree_object_stream(pdf: &mut PdfBuilder) -> usize {
    let pages = b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".as_slice();
    let page = b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] /Contents 4 0 R >>".as_slice();
    let offsets = format!("2 0 3 {} ", pages.len() + 1);
    let mut body = offsets.clone().into_bytes();
    body.extend_from_slice(pages);
    body.push(b' ');
    body.extend_from_slice(page);
    pdf.stream(
        5,
        &format!("/Type /ObjStm /N 2 /First {} /Filter /FlateDecode", offsets.len()),
        &deflate(&body),
    )
}

/// Xref stream rows with `/W [1 4 2]`.
fn xref_stream_rows(rows: &[(u8, u32, u16)]) -> Vec<u8> {
    let mut raw = Vec::new();
    for &(kind, f2, f3) in rows {
        raw.push(kind);
        raw.extend_from_slice(&f2.to_be_bytes());
        raw.extend_from_slice(&f3.to_be_bytes());
    }
    raw
}

/// PDF 1.5 layout: the page tree lives in an object stream and the
/// cross-reference section is a FlateDecode xref stream.
pub fn object_stream_pdf() -> Vec<u8> {
    let mut pdf = PdfBuilder::new();
    let catalog = pdf.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    let contents = pdf.stream(4, "", PAGE_CONTENT);
    let objstm = page_tree_object_stream(&mut pdf);

    let xref_offset = pdf.buf.len();
    let raw = xref_stream_rows(&[
        (0, 0, 65535),
        (1, catalog as u32, 0),
        (2, 5, 0),
        (2, 5, 1),
        (1, contents as u32, 0),
        (1, objstm as u32, 0),
        (1, xref_offset as u32, 0),
    ]);
    pdf.stream(
        6,
        "/Type /XRef /Size 7 /W [1 4 2] /Root 1 0 R /Filter /FlateDecode",
        &deflate(&raw),
    );
    pdf.buf
        .extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF\n").as_bytes());
    pdf.finish()
}

/// Hybrid-reference file: objects 2 and 3 sit in an object stream that only
/// the `/XRefStm` stream describes. The classic table marks them free, as
/// writers targeting pre-1.5 readers do.
pub fn hybrid_pdf() -> Vec<u8> {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    pdf.stream(4, "", PAGE_CONTENT);
    page_tree_object_stream(&mut pdf);

    let raw = xref_stream_rows(&[(2, 5, 0), (2, 5, 1)]);
    let stm = pdf.stream(6, "/Type /XRef /Size 7 /Index [2 2] /W [1 4 2]", &raw);
    pdf.free(2, 3, 1);
    pdf.free(3, 0, 1);
    pdf.xref_table(&format!("/Size 7 /Root 1 0 R /XRefStm {stm}"), true);
    pdf.finish()
}

/// [`object_stream_pdf`] plus an incremental update written as a second,
/// uncompressed xref stream that replaces the content stream (object 4).
pub fn xref_stream_update_pdf() -> Vec<u8> {
    let base = object_stream_pdf();
    let prev = last_startxref(&base);
    let mut pdf = PdfBuilder {
        buf: base,
        pending: BTreeMap::new(),
    };
    let contents = pdf.stream(4, "", b"BT /F1 24 Tf 40 100 Td (Hello again) Tj ET");

    let xref_offset = pdf.buf.len();
    let raw = xref_stream_rows(&[(1, contents as u32, 0), (1, xref_offset as u32, 0)]);
    pdf.stream(
        7,
        &format!("/Type /XRef /Size 8 /Index [4 1 7 1] /W [1 4 2] /Root 1 0 R /Prev {prev}"),
        &raw,
    );
    pdf.buf
        .extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF\n").as_bytes());
    pdf.finish()
}

/// Offset recorded after the last `startxref`.
pub fn last_startxref(bytes: &[u8]) -> usize {
    let at = bytes
        .windows(9)
        .rposition(|w| w == b"startxref")
        .expect("startxref present");
    let digits: String = bytes[at + 9..]
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .map(|&b| b as char)
        .collect();
    digits.parse().unwrap()
}

fn find(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| from + i)
}

fn integer_after(bytes: &[u8], pos: usize) -> (u64, usize) {
    let mut p = pos;
    while bytes[p].is_ascii_whitespace() {
        p += 1;
    }
    let start = p;
    while bytes[p].is_ascii_digit() {
        p += 1;
    }
    let value = std::str::from_utf8(&bytes[start..p]).unwrap().parse().unwrap();
    (value, p)
}

/// In-use cross-reference entries `(id, generation, offset)` of the final
/// section. Handles a classic table and an uncompressed xref stream.
pub fn xref_in_use(bytes: &[u8]) -> Vec<(u32, u16, usize)> {
    let xref = last_startxref(bytes);
    let mut entries = Vec::new();

    if bytes[xref..].starts_with(b"xref") {
        let trailer = find(bytes, xref, b"trailer").expect("trailer keyword");
        let mut pos = xref + 4;
        while pos < trailer {
            let (start, p) = integer_after(bytes, pos);
            let (count, p) = integer_after(bytes, p);
            pos = p;
            for i in 0..count {
                let (offset, p) = integer_after(bytes, pos);
                let (generation, p) = integer_after(bytes, p);
                let mut q = p;
                while bytes[q] == b' ' {
                    q += 1;
                }
                if bytes[q] == b'n' {
                    entries.push(((start + i) as u32, generation as u16, offset as usize));
                }
                pos = q + 1;
                while pos < trailer && bytes[pos].is_ascii_whitespace() {
                    pos += 1;
                }
            }
        }
        return entries;
    }

    for (id, (kind, f2, f3)) in xref_stream_fields(bytes, xref).into_iter().enumerate() {
        if kind == 1 {
            entries.push((id as u32, f3 as u16, f2 as usize));
        }
    }
    entries
}

/// Compressed entries `(id, object stream, index)` of a final xref stream.
/// Empty when the final section is a classic table.
pub fn xref_compressed(bytes: &[u8]) -> Vec<(u32, u32, u32)> {
    let xref = last_startxref(bytes);
    if bytes[xref..].starts_with(b"xref") {
        return Vec::new();
    }
    xref_stream_fields(bytes, xref)
        .into_iter()
        .enumerate()
        .filter(|(_, (kind, _, _))| *kind == 2)
        .map(|(id, (_, stream, index))| (id as u32, stream as u32, index as u32))
        .collect()
}

/// `(type, field 2, field 3)` per object number of a single-subsection xref stream.
fn xref_stream_fields(bytes: &[u8], xref: usize) -> Vec<(u64, u64, u64)> {
    let w_at = find(bytes, xref, b"/W [").expect("/W array") + 4;
    let (w1, p) = integer_after(bytes, w_at);
    let (w2, p) = integer_after(bytes, p);
    let (w3, _) = integer_after(bytes, p);
    let (size, _) = integer_after(bytes, find(bytes, xref, b"/Size").expect("/Size") + 5);
    let data = find(bytes, xref, b"stream\n").expect("stream keyword") + 7;
    let rows = if find(&bytes[..data], xref, b"/FlateDecode").is_some() {
        let (len, _) = integer_after(bytes, find(bytes, xref, b"/Length").expect("/Length") + 7);
        let mut raw = Vec::new();
        ZlibDecoder::new(&bytes[data..data + len as usize])
            .read_to_end(&mut raw)
            .unwrap();
        raw
    } else {
        bytes[data..].to_vec()
    };
    let row = (w1 + w2 + w3) as usize;
    let field = |bytes: &[u8]| bytes.iter().fold(0u64, |acc, &b| acc << 8 | u64::from(b));
    (0..size as usize)
        .map(|id| {
            let r = &rows[id * row..(id + 1) * row];
            let kind = if w1 == 0 { 1 } else { field(&r[..w1 as usize]) };
            let f2 = field(&r[w1 as usize..(w1 + w2) as usize]);
            let f3 = field(&r[(w1 + w2) as usize..]);
            (kind, f2, f3)
        })
        .collect()
}

/// Every in-use entry of the final xref section points at `id gen obj`.
pub fn assert_pdf_xref_consistent(bytes: &[u8]) {
    let entries = xref_in_use(bytes);
    assert!(!entries.is_empty(), "xref has in-use entries");
    for (id, generation, offset) in entries {
        let expected = format!("{id} {generation} obj");
        assert!(
            bytes[offset..].starts_with(expected.as_bytes()),
            "object {id} not at offset {offset}"
        );
    }
    assert!(bytes.ends_with(b"%%EOF\n"));
}

/// Full `id 0 obj ... endobj` text of the object at the xref offset for `id`.
pub fn object_text(bytes: &[u8], id: u32) -> Vec<u8> {
    let (_, _, offset) = xref_in_use(bytes)
        .into_iter()
        .find(|e| e.0 == id)
        .unwrap_or_else(|| panic!("object {id} in xref"));
    let end = find(bytes, offset, b"endobj").unwrap() + 6;
    bytes[offset..end].to_vec()
}
