// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Error types for PNG chunk stream parsing and writing.

use std::fmt;

/// Errors that can occur while parsing or rewriting a PNG chunk stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PngError {
    /// The first 8 bytes are not the PNG signature.
    InvalidSignature,
    /// Input ended in the middle of a chunk.
    UnexpectedEof,
    /// A chunk declares a length above 2^31-1.
    InvalidChunkLength(u32),
    /// A chunk type contains bytes other than ASCII letters.
    InvalidChunkType([u8; 4]),
    /// Recorded CRC does not match the chunk type and data.
    CrcMismatch { chunk_type: [u8; 4], stored: u32, computed: u32 },
    /// The first chunk is not IHDR.
    MissingIhdr,
    /// The stream ended without an IEND chunk.
    MissingIend,
    /// Data to be written does not fit in a single chunk.
    ChunkTooLarge(usize),
}

impl fmt::Display for PngError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSignature => write!(f, "missing PNG signature"),
            Self::UnexpectedEof => write!(f, "unexpected end of PNG data"),
            Self::InvalidChunkLength(len) => write!(f, "invalid chunk length: {len}"),
            Self::InvalidChunkType(t) => write!(f, "invalid chunk type: {:02X?}", t),
            Self::CrcMismatch { chunk_type, stored, computed } => write!(
                f,
                "CRC mismatch in {} chunk (stored {stored:08x}, computed {computed:08x})",
                String::from_utf8_lossy(chunk_type)
            ),
            Self::MissingIhdr => write!(f, "first chunk is not IHDR"),
            Self::MissingIend => write!(f, "missing IEND chunk"),
            Self::ChunkTooLarge(len) => write!(f, "chunk data too large: {len} bytes"),
        }
    }
}

impl std::error::Error for PngError {}

pub type Result<T> = std::result::Result<T, PngError>;
