// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! PNG chunk stream parsing and serialization.
//!
//! Walks the chunks after the signature up to and including IEND, checking
//! each declared length and CRC. Chunks keep their original bytes so that an
//! untouched chunk is written back byte-for-byte.

use super::error::{PngError, Result};

/// The 8-byte PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

pub const IHDR: [u8; 4] = *b"IHDR";
pub const IEND: [u8; 4] = *b"IEND";

/// Largest data length a chunk may declare.
pub const MAX_CHUNK_LEN: usize = 0x7FFF_FFFF;

/// One chunk: type, data and the CRC over type + data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_type: [u8; 4],
    pub data: Vec<u8>,
    pub crc: u32,
}

impl Chunk {
    /// Build a chunk and compute its CRC.
    pub fn new(chunk_type: [u8; 4], data: Vec<u8>) -> Self {
        let crc = chunk_crc(&chunk_type, &data);
        Self { chunk_type, data, crc }
    }

    /// Swap the data and recompute the CRC.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.crc = chunk_crc(&self.chunk_type, &data);
        self.data = data;
    }

    /// Serialized size: length(4) + type(4) + data + crc(4).
    pub fn encoded_len(&self) -> usize {
        12 + self.data.len()
    }
}

/// Bit 5 of the first type byte: ancillary chunks may be ignored by decoders.
pub const fn is_ancillary(chunk_type: [u8; 4]) -> bool {
    chunk_type[0] & 0x20 != 0
}

/// CRC-32 over the chunk type followed by the chunk data.
pub fn chunk_crc(chunk_type: &[u8; 4], data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    hasher.finalize()
}

pub fn is_png_signature(data: &[u8]) -> bool {
    data.len() >= PNG_SIGNATURE.len() && data[..8] == PNG_SIGNATURE
}

/// Parse every chunk from the signature through IEND.
///
/// Returns the chunks (IEND last) and the byte offset just past IEND.
/// Anything after that offset is not interpreted.
pub fn parse_chunks(data: &[u8]) -> Result<(Vec<Chunk>, usize)> {
    if !is_png_signature(data) {
        return Err(PngError::InvalidSignature);
    }
    let mut chunks = Vec::new();
    let mut pos = PNG_SIGNATURE.len();

    loop {
        if pos == data.len() {
            return Err(PngError::MissingIend);
        }
        let (chunk, next) = read_chunk(data, pos)?;
        if chunks.is_empty() && chunk.chunk_type != IHDR {
            return Err(PngError::MissingIhdr);
        }
        let is_end = chunk.chunk_type == IEND;
        chunks.push(chunk);
        pos = next;

        if is_end {
            return Ok((chunks, pos));
        }
    }
}

/// Read one chunk at `pos`, checking its length, type and CRC.
///
/// Returns the chunk and the offset of the byte after its CRC.
pub fn read_chunk(data: &[u8], pos: usize) -> Result<(Chunk, usize)> {
    if pos + 8 > data.len() {
        return Err(PngError::UnexpectedEof);
    }
    let length = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
    if length as usize > MAX_CHUNK_LEN {
        return Err(PngError::InvalidChunkLength(length));
    }
    let chunk_type = [data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]];
    if !chunk_type.iter().all(u8::is_ascii_alphabetic) {
        return Err(PngError::InvalidChunkType(chunk_type));
    }
    let data_start = pos + 8;
    let data_end = data_start + length as usize;
    if data_end + 4 > data.len() {
        return Err(PngError::UnexpectedEof);
    }

    let body = &data[data_start..data_end];
    let stored = u32::from_be_bytes([
        data[data_end],
        data[data_end + 1],
        data[data_end + 2],
        data[data_end + 3],
    ]);
    let computed = chunk_crc(&chunk_type, body);
    if stored != computed {
        return Err(PngError::CrcMismatch { chunk_type, stored, computed });
    }

    let chunk = Chunk {
        chunk_type,
        data: body.to_vec(),
        crc: stored,
    };
    Ok((chunk, data_end + 4))
}

/// Serialize the signature followed by `chunks` in order.
pub fn write_chunks(chunks: &[Chunk], out: &mut Vec<u8>) -> Result<()> {
    out.reserve(PNG_SIGNATURE.len() + chunks.iter().map(Chunk::encoded_len).sum::<usize>());
    out.extend_from_slice(&PNG_SIGNATURE);
    for chunk in chunks {
        if chunk.data.len() > MAX_CHUNK_LEN {
            return Err(PngError::ChunkTooLarge(chunk.data.len()));
        }
        out.extend_from_slice(&(chunk.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&chunk.chunk_type);
        out.extend_from_slice(&chunk.data);
        out.extend_from_slice(&chunk.crc.to_be_bytes());
    }
    Ok(())
}
