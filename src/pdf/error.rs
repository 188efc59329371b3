// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Error types for PDF structure parsing and rewriting.

use std::fmt;

/// Errors that can occur while parsing or rewriting a PDF file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfError {
    /// Data does not start with `%PDF-`.
    InvalidHeader,
    /// Input ended while an object or section was being read.
    UnexpectedEof,
    /// No `startxref` keyword near the end of the file.
    MissingStartXref,
    /// A cross-reference section or trailer is malformed.
    InvalidXref(&'static str),
    /// `/Prev` chain revisits an offset it already read.
    XrefLoop(usize),
    /// Malformed object syntax at the given byte offset.
    InvalidObject { offset: usize, reason: &'static str },
    /// The xref entry for this object does not point at `id gen obj`.
    BadObjectOffset { id: u32, offset: usize },
    /// An indirect reference names an object the xref doesn't list.
    MissingObject(u32),
    /// Stream filter or predictor this parser can't decode.
    UnsupportedFilter(String),
    /// Flate data failed to inflate.
    Decompress(String),
    /// The document is encrypted.
    Encrypted,
}

impl fmt::Display for PdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHeader => write!(f, "missing %PDF- header"),
            Self::UnexpectedEof => write!(f, "unexpected end of PDF data"),
            Self::MissingStartXref => write!(f, "startxref not found"),
            Self::InvalidXref(msg) => write!(f, "invalid cross-reference data: {msg}"),
            Self::XrefLoop(offset) => write!(f, "cross-reference chain loops at offset {offset}"),
            Self::InvalidObject { offset, reason } => {
                write!(f, "invalid object syntax at offset {offset}: {reason}")
            }
            Self::BadObjectOffset { id, offset } => {
                write!(f, "object {id} not found at offset {offset}")
            }
            Self::MissingObject(id) => write!(f, "referenced object {id} does not exist"),
            Self::UnsupportedFilter(name) => write!(f, "unsupported stream filter: {name}"),
            Self::Decompress(msg) => write!(f, "stream decompression failed: {msg}"),
            Self::Encrypted => write!(f, "encrypted documents are not supported"),
        }
    }
}

impl std::error::Error for PdfError {}

pub type Result<T> = std::result::Result<T, PdfError>;
