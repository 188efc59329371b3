// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Carrier dispatch: format detection and the embed/extract pipelines.
//!
//! A carrier format is chosen once from the file signature and the matching
//! [`Carrier`] implementation does the format-specific work:
//!
//! - **PNG** ([`PngCarrier`](crate::png::PngCarrier)): private ancillary chunk `ndRm`.
//! - **PDF** ([`PdfCarrier`](crate::pdf::PdfCarrier)): stream object referenced by
//!   trailer key `/NanoDRM`.
//!
//! Both wrap the payload in the same [`container`] (magic, version, length,
//! CRC-32), so a damaged or truncated payload is reported instead of being
//! returned as data. Files are replaced atomically via [`commit`].

pub mod commit;
pub mod config;
pub mod container;
pub mod error;
mod pipeline;

use std::borrow::Cow;
use std::fmt::Debug;
use std::fs;
use std::path::Path;

pub use config::Config;
pub use container::{ContainerHeader, Corruption};
pub use error::{DrmError, ErrorKind};
pub use pipeline::{
    embed, extract, inspect, inspect_bytes, read, read_with_config, write, write_with_config,
    Inspection, PayloadStatus,
};

use crate::pdf;
use crate::png::chunk::{self, MAX_CHUNK_LEN};

/// Format-specific strategy for storing a container inside a file.
///
/// Implementations keep every byte outside the payload slot intact.
pub trait Carrier: Sized {
    /// Identifies where the container lives (chunk index, object reference).
    type Slot: Copy + Debug;

    fn parse(data: &[u8]) -> Result<Self, DrmError>;

    /// Authoritative payload slot, if the carrier has one.
    fn locate(&self) -> Option<Self::Slot>;

    /// Raw bytes of the payload slot. `None` when no slot exists.
    fn read_container(&self) -> Result<Option<Cow<'_, [u8]>>, DrmError>;

    /// Store `container`, replacing the current slot or creating one.
    fn write_container(&mut self, container: Vec<u8>) -> Result<(), DrmError>;

    fn to_bytes(&self) -> Result<Vec<u8>, DrmError>;
}

/// Supported carrier file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CarrierFormat {
    Png,
    Pdf,
}

impl CarrierFormat {
    /// Detect the format from the leading bytes of a file.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if chunk::is_png_signature(data) {
            Some(Self::Png)
        } else if pdf::is_pdf_header(data) {
            Some(Self::Pdf)
        } else {
            None
        }
    }

    /// Read `path` and detect its format.
    pub fn detect(path: &Path) -> Result<Option<Self>, DrmError> {
        let data = fs::read(path)?;
        Ok(Self::sniff(&data))
    }

    /// Largest payload this format can hold in a single container.
    pub fn max_payload_len(self) -> usize {
        match self {
            Self::Png => MAX_CHUNK_LEN - container::HEADER_LEN,
            Self::Pdf => container::MAX_PAYLOAD_LEN,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Pdf => "PDF",
        }
    }
}

impl std::fmt::Display for CarrierFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
