// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! PNG carrier (zero external dependencies beyond CRC-32).
//!
//! The container lives in a private ancillary chunk of type `ndRm`:
//!
//! - `n` lower-case: ancillary, decoders may skip it
//! - `d` lower-case: private, not a registered public chunk
//! - `R` upper-case: reserved bit, must be clear
//! - `m` lower-case: safe to copy by editors that don't understand it
//!
//! The first `ndRm` chunk is authoritative. Later duplicates are kept as
//! opaque data. A new chunk is inserted directly before IEND, an existing one
//! is rewritten in place so every other chunk keeps its position and bytes.
//!
//! Well-formed `ndRm` chunks that directly follow IEND (written by tools that
//! append instead of insert) are moved before IEND on parse. Other bytes
//! after IEND are carried through untouched.

pub mod chunk;
pub mod error;

use std::borrow::Cow;

use chunk::{is_ancillary, parse_chunks, read_chunk, write_chunks, Chunk, IEND, MAX_CHUNK_LEN};
use error::{PngError, Result};
use tracing::{debug, warn};

use crate::drm::{Carrier, DrmError};

/// Chunk type holding the payload container.
pub const PAYLOAD_CHUNK_TYPE: [u8; 4] = *b"ndRm";

const _: () = assert!(is_ancillary(PAYLOAD_CHUNK_TYPE));

/// A parsed PNG file: its chunks through IEND plus any bytes after IEND.
#[derive(Debug, Clone)]
pub struct PngCarrier {
    chunks: Vec<Chunk>,
    /// Bytes after IEND, written back untouched.
    trailing: Vec<u8>,
}

impl PngCarrier {
    /// Parse a PNG byte stream, validating every chunk CRC.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let (mut chunks, mut end) = parse_chunks(data)?;

        let mut stray = Vec::new();
        while let Ok((chunk, next)) = read_chunk(data, end) {
            if chunk.chunk_type != PAYLOAD_CHUNK_TYPE {
                break;
            }
            stray.push(chunk);
            end = next;
        }
        if !stray.is_empty() {
            warn!(count = stray.len(), "payload chunk after IEND, moving it before IEND");
            // parse_chunks guarantees IEND is last
            let iend = chunks.split_off(chunks.len() - 1);
            chunks.extend(stray);
            chunks.extend(iend);
        }

        let carrier = Self {
            chunks,
            trailing: data[end..].to_vec(),
        };
        let copies = carrier
            .chunks
            .iter()
            .filter(|c| c.chunk_type == PAYLOAD_CHUNK_TYPE)
            .count();
        if copies > 1 {
            warn!(copies, "multiple payload chunks, using the first");
        }
        Ok(carrier)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Index of the authoritative payload chunk.
    pub fn payload_chunk_index(&self) -> Option<usize> {
        self.chunks
            .iter()
            .position(|c| c.chunk_type == PAYLOAD_CHUNK_TYPE)
    }

    /// Store `container` in the payload chunk, creating it before IEND if needed.
    pub fn set_payload(&mut self, container: Vec<u8>) -> Result<()> {
        if container.len() > MAX_CHUNK_LEN {
            return Err(PngError::ChunkTooLarge(container.len()));
        }
        match self.payload_chunk_index() {
            Some(index) => {
                debug!(index, len = container.len(), "replacing payload chunk");
                self.chunks[index].set_data(container);
            }
            None => {
                // parse_chunks guarantees IEND is last
                let iend = self
                    .chunks
                    .iter()
                    .rposition(|c| c.chunk_type == IEND)
                    .ok_or(PngError::MissingIend)?;
                debug!(index = iend, len = container.len(), "inserting payload chunk");
                self.chunks.insert(iend, Chunk::new(PAYLOAD_CHUNK_TYPE, container));
            }
        }
        Ok(())
    }

    /// Serialize signature, chunks and trailing bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        write_chunks(&self.chunks, &mut out)?;
        out.extend_from_slice(&self.trailing);
        Ok(out)
    }
}

impl Carrier for PngCarrier {
    type Slot = usize;

    fn parse(data: &[u8]) -> std::result::Result<Self, DrmError> {
        Ok(Self::from_bytes(data)?)
    }

    fn locate(&self) -> Option<usize> {
        self.payload_chunk_index()
    }

    fn read_container(&self) -> std::result::Result<Option<Cow<'_, [u8]>>, DrmError> {
        Ok(self.locate().map(|i| Cow::Borrowed(self.chunks[i].data.as_slice())))
    }

    fn write_container(&mut self, container: Vec<u8>) -> std::result::Result<(), DrmError> {
        Ok(self.set_payload(container)?)
    }

    fn to_bytes(&self) -> std::result::Result<Vec<u8>, DrmError> {
        Ok(PngCarrier::to_bytes(self)?)
    }
}
