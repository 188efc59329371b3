// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Stream boundaries and the one filter cross-reference streams need.
//!
//! Supports FlateDecode with TIFF (2) and PNG (10-15) predictors. Every
//! other filter is reported as unsupported.

use std::io::Read;

use flate2::read::ZlibDecoder;

use super::error::{PdfError, Result};
use super::lexer::{expect_keyword, Dictionary, Object};

/// Offset of the first data byte of a stream whose dictionary ends at `pos`.
///
/// The `stream` keyword should be followed by CRLF or LF; a lone CR is
/// tolerated.
pub fn data_start(data: &[u8], pos: usize) -> Option<usize> {
    let p = expect_keyword(data, pos, b"stream")?;
    Some(match data.get(p..p + 2) {
        Some(b"\r\n") => p + 2,
        _ if matches!(data.get(p), Some(b'\n' | b'\r')) => p + 1,
        _ => p,
    })
}

/// First occurrence of `needle` in `haystack` at or after `from`.
pub fn find(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| from + i)
}

/// Last occurrence of `needle` in `haystack`.
pub fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Apply the stream's `/Filter` chain to `raw`.
pub fn decode(dict: &Dictionary, raw: &[u8]) -> Result<Vec<u8>> {
    let filters: Vec<&[u8]> = match dict.get(b"Filter") {
        None | Some(Object::Null) => Vec::new(),
        Some(Object::Name(name)) => vec![name.as_slice()],
        Some(Object::Array(items)) => items
            .iter()
            .map(|o| o.as_name().ok_or(PdfError::InvalidXref("filter is not a name")))
            .collect::<Result<_>>()?,
        Some(_) => return Err(PdfError::InvalidXref("malformed /Filter")),
    };
    let params: Vec<Option<&Dictionary>> = match dict.get(b"DecodeParms") {
        Some(Object::Array(items)) => items.iter().map(Object::as_dict).collect(),
        Some(Object::Dictionary(d)) => vec![Some(d)],
        _ => Vec::new(),
    };

    let mut out = raw.to_vec();
    for (i, filter) in filters.iter().enumerate() {
        match *filter {
            b"FlateDecode" | b"Fl" => {
                out = inflate(&out)?;
                if let Some(p) = params.get(i).copied().flatten() {
                    out = unpredict(p, out)?;
                }
            }
            other => {
                return Err(PdfError::UnsupportedFilter(
                    String::from_utf8_lossy(other).into_owned(),
                ))
            }
        }
    }
    Ok(out)
}

fn inflate(raw: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(raw.len() * 4);
    ZlibDecoder::new(raw)
        .read_to_end(&mut out)
        .map_err(|e| PdfError::Decompress(e.to_string()))?;
    Ok(out)
}

fn param(dict: &Dictionary, key: &[u8], default: i64) -> i64 {
    dict.get(key).and_then(Object::as_integer).unwrap_or(default)
}

/// Undo a TIFF or PNG predictor.
fn unpredict(params: &Dictionary, data: Vec<u8>) -> Result<Vec<u8>> {
    let predictor = param(params, b"Predictor", 1);
    if predictor == 1 {
        return Ok(data);
    }
    let colors = param(params, b"Colors", 1);
    let bpc = param(params, b"BitsPerComponent", 8);
    let columns = param(params, b"Columns", 1);
    if !(1..=32).contains(&colors) || ![1, 2, 4, 8, 16].contains(&bpc) || !(1..=1 << 20).contains(&columns) {
        return Err(PdfError::UnsupportedFilter(format!("predictor parameters {colors}/{bpc}/{columns}")));
    }
    let bpp = ((colors * bpc + 7) / 8) as usize;
    let row_len = ((colors * bpc * columns + 7) / 8) as usize;

    match predictor {
        2 if bpc == 8 => {
            let mut data = data;
            for row in data.chunks_mut(row_len) {
                for i in bpp..row.len() {
                    row[i] = row[i].wrapping_add(row[i - bpp]);
                }
            }
            Ok(data)
        }
        10..=15 => png_unpredict(&data, row_len, bpp),
        _ => Err(PdfError::UnsupportedFilter(format!("predictor {predictor}"))),
    }
}

fn png_unpredict(data: &[u8], row_len: usize, bpp: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_len];
    for encoded in data.chunks(row_len + 1) {
        let (&filter, src) = encoded.split_first().ok_or(PdfError::InvalidXref("empty predictor row"))?;
        let mut row = src.to_vec();
        for i in 0..row.len() {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            row[i] = row[i].wrapping_add(match filter {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                _ => return Err(PdfError::UnsupportedFilter(format!("PNG row filter {filter}"))),
            });
        }
        prev[..row.len()].copy_from_slice(&row);
        out.extend_from_slice(&row);
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
