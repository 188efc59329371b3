// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Payload container construction and parsing.
//!
//! The container is the self-describing wrapper stored inside a carrier.
//! Both PNG and PDF carriers store the exact same byte layout:
//!
//! ```text
//! [4 bytes] magic "NDRM"
//! [2 bytes] format version (big-endian u16)
//! [4 bytes] payload length (big-endian u32)
//! [4 bytes] CRC-32 of the payload (big-endian u32)
//! [N bytes] payload
//! ```
//!
//! Total container size = 14 + payload_len bytes. Bytes after the payload
//! are tolerated as carrier padding and ignored.

use std::fmt;

/// Marker identifying containers written by this crate.
pub const MAGIC: [u8; 4] = *b"NDRM";

/// Container format version written by [`encode`].
pub const VERSION: u16 = 1;

/// Fixed header size: magic(4) + version(2) + length(4) + checksum(4) = 14 bytes.
pub const HEADER_LEN: usize = 4 + 2 + 4 + 4;

/// Largest payload the 32-bit length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

/// Why a container that carries the magic failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    /// The slot holding the container does not start with the magic.
    MissingMagic,
    /// Fewer than [`HEADER_LEN`] bytes are available.
    TruncatedHeader,
    /// The declared payload length runs past the end of the buffer.
    LengthMismatch { declared: u32, available: usize },
    /// The stored CRC does not match the payload.
    ChecksumMismatch { stored: u32, computed: u32 },
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMagic => write!(f, "payload slot does not hold a container"),
            Self::TruncatedHeader => write!(f, "container header truncated"),
            Self::LengthMismatch { declared, available } => write!(
                f,
                "declared payload length {declared} exceeds {available} available bytes"
            ),
            Self::ChecksumMismatch { stored, computed } => write!(
                f,
                "payload CRC mismatch (stored {stored:08x}, computed {computed:08x})"
            ),
        }
    }
}

/// Result of decoding a buffer that may or may not hold a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerError {
    /// No magic at the start of the buffer: nothing was ever written here.
    Absent,
    /// The magic is present but the container is damaged.
    Corrupt(Corruption),
    /// Written by a newer version of the format.
    UnsupportedVersion(u16),
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "no payload container present"),
            Self::Corrupt(c) => write!(f, "corrupt payload container: {c}"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported container version {v}"),
        }
    }
}

impl std::error::Error for ContainerError {}

/// Header fields of a container, read without validating the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u16,
    /// Declared payload length in bytes.
    pub length: u32,
    /// Stored CRC-32 of the payload.
    pub checksum: u32,
}

impl ContainerHeader {
    /// Parse the fixed header at the start of `buf`.
    ///
    /// Returns `Absent` if the magic is missing and `Corrupt(TruncatedHeader)`
    /// if the magic is present but the header is cut short.
    pub fn parse(buf: &[u8]) -> Result<Self, ContainerError> {
        if buf.len() < MAGIC.len() || buf[..4] != MAGIC {
            return Err(ContainerError::Absent);
        }
        if buf.len() < HEADER_LEN {
            return Err(ContainerError::Corrupt(Corruption::TruncatedHeader));
        }
        Ok(Self {
            version: u16::from_be_bytes([buf[4], buf[5]]),
            length: u32::from_be_bytes([buf[6], buf[7], buf[8], buf[9]]),
            checksum: u32::from_be_bytes([buf[10], buf[11], buf[12], buf[13]]),
        })
    }
}

/// Wrap `payload` in a container.
///
/// Callers must keep `payload.len()` within [`MAX_PAYLOAD_LEN`]; the
/// dispatcher enforces this before any carrier is touched.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= MAX_PAYLOAD_LEN, "payload exceeds u32 length field");

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_be_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&crc32fast::hash(payload).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Validate a container and return the payload slice.
pub fn decode(buf: &[u8]) -> Result<&[u8], ContainerError> {
    let header = ContainerHeader::parse(buf)?;
    if header.version == 0 || header.version > VERSION {
        return Err(ContainerError::UnsupportedVersion(header.version));
    }

    let available = buf.len() - HEADER_LEN;
    let len = header.length as usize;
    if len > available {
        return Err(ContainerError::Corrupt(Corruption::LengthMismatch {
            declared: header.length,
            available,
        }));
    }

    let payload = &buf[HEADER_LEN..HEADER_LEN + len];
    let computed = crc32fast::hash(payload);
    if computed != header.checksum {
        return Err(ContainerError::Corrupt(Corruption::ChecksumMismatch {
            stored: header.checksum,
            computed,
        }));
    }
    Ok(payload)
}
