// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Embed/extract pipeline.
//!
//! Write path: read file, sniff format, parse carrier, wrap payload in a
//! container, store it in the payload slot, serialize, commit atomically.
//! Read path: read file, sniff, parse, locate the slot, validate the container.
//!
//! Serialization happens fully in memory before the commit, so any parse or
//! serialize failure leaves the file on disk untouched.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::commit::write_atomic;
use super::config::Config;
use super::container::{self, ContainerError, ContainerHeader, Corruption};
use super::error::DrmError;
use super::{Carrier, CarrierFormat};
use crate::pdf::PdfCarrier;
use crate::png::PngCarrier;

/// State of the payload slot as reported by [`inspect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadStatus {
    /// The carrier has no payload slot.
    Absent,
    /// The container validates; `len` payload bytes are available.
    Valid { len: usize },
    /// The slot exists but its container is damaged.
    Corrupt(Corruption),
    /// The container was written by a newer format version.
    UnsupportedVersion(u16),
}

/// Summary of a carrier's payload slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inspection {
    pub format: CarrierFormat,
    /// Container header, when the slot starts with a complete one.
    pub header: Option<ContainerHeader>,
    pub status: PayloadStatus,
}

impl Inspection {
    pub fn is_valid(&self) -> bool {
        matches!(self.status, PayloadStatus::Valid { .. })
    }
}

/// Embed `payload` into the PNG or PDF at `path`, replacing any previous payload.
///
/// # Errors
/// - [`DrmError::UnsupportedFormat`] if the file is neither PNG nor PDF.
/// - [`DrmError::PayloadTooLarge`] if the payload exceeds the format limit.
/// - [`DrmError::InvalidPng`] / [`DrmError::InvalidPdf`] if the carrier can't be parsed.
/// - [`DrmError::Io`] on read or commit failure.
pub fn write(path: &Path, payload: &[u8]) -> Result<(), DrmError> {
    write_with_config(path, payload, &Config::default())
}

/// [`write`] with explicit options.
pub fn write_with_config(path: &Path, payload: &[u8], config: &Config) -> Result<(), DrmError> {
    let data = fs::read(path)?;
    let out = embed_limited(&data, payload, config.max_payload_len)?;
    write_atomic(path, &out, config.sync)?;
    Ok(())
}

/// Recover the payload from the PNG or PDF at `path`.
///
/// Returns an empty vector when nothing has been embedded yet.
///
/// # Errors
/// As [`write`], plus [`DrmError::CorruptPayload`] and
/// [`DrmError::UnsupportedContainerVersion`] for a damaged or foreign container.
pub fn read(path: &Path) -> Result<Vec<u8>, DrmError> {
    read_with_config(path, &Config::default())
}

/// [`read`] with explicit options. Reads don't use any option today.
pub fn read_with_config(path: &Path, _config: &Config) -> Result<Vec<u8>, DrmError> {
    let data = fs::read(path)?;
    extract(&data)
}

/// Report the format and payload slot state of the file at `path`.
///
/// Unlike [`read`], a corrupt container is reported, not returned as an error.
pub fn inspect(path: &Path) -> Result<Inspection, DrmError> {
    let data = fs::read(path)?;
    inspect_bytes(&data)
}

/// In-memory [`write`]: returns the carrier bytes with `payload` embedded.
pub fn embed(data: &[u8], payload: &[u8]) -> Result<Vec<u8>, DrmError> {
    embed_limited(data, payload, Config::default().max_payload_len)
}

/// In-memory [`read`].
pub fn extract(data: &[u8]) -> Result<Vec<u8>, DrmError> {
    match sniff(data)? {
        CarrierFormat::Png => extract_from::<PngCarrier>(data),
        CarrierFormat::Pdf => extract_from::<PdfCarrier>(data),
    }
}

/// In-memory [`inspect`].
pub fn inspect_bytes(data: &[u8]) -> Result<Inspection, DrmError> {
    let format = sniff(data)?;
    let (header, status) = match format {
        CarrierFormat::Png => inspect_in::<PngCarrier>(data)?,
        CarrierFormat::Pdf => inspect_in::<PdfCarrier>(data)?,
    };
    Ok(Inspection { format, header, status })
}

fn sniff(data: &[u8]) -> Result<CarrierFormat, DrmError> {
    let format = CarrierFormat::sniff(data).ok_or(DrmError::UnsupportedFormat)?;
    debug!(%format, len = data.len(), "detected carrier format");
    Ok(format)
}

fn embed_limited(data: &[u8], payload: &[u8], max: usize) -> Result<Vec<u8>, DrmError> {
    let format = sniff(data)?;
    let max = max.min(format.max_payload_len());
    if payload.len() > max {
        return Err(DrmError::PayloadTooLarge { len: payload.len(), max });
    }
    match format {
        CarrierFormat::Png => embed_into::<PngCarrier>(data, payload),
        CarrierFormat::Pdf => embed_into::<PdfCarrier>(data, payload),
    }
}

fn embed_into<C: Carrier>(data: &[u8], payload: &[u8]) -> Result<Vec<u8>, DrmError> {
    let mut carrier = C::parse(data)?;
    let slot = carrier.locate();
    debug!(?slot, len = payload.len(), "embedding payload");
    carrier.write_container(container::encode(payload))?;
    carrier.to_bytes()
}

fn extract_from<C: Carrier>(data: &[u8]) -> Result<Vec<u8>, DrmError> {
    let carrier = C::parse(data)?;
    let Some(raw) = carrier.read_container()? else {
        debug!("no payload slot");
        return Ok(Vec::new());
    };
    // a slot without magic counts as corrupt, not absent
    let payload = container::decode(&raw)?;
    debug!(slot = ?carrier.locate(), len = payload.len(), "extracted payload");
    Ok(payload.to_vec())
}

fn inspect_in<C: Carrier>(
    data: &[u8],
) -> Result<(Option<ContainerHeader>, PayloadStatus), DrmError> {
    let carrier = C::parse(data)?;
    let Some(raw) = carrier.read_container()? else {
        return Ok((None, PayloadStatus::Absent));
    };
    let header = ContainerHeader::parse(&raw).ok();
    let status = match container::decode(&raw) {
        Ok(payload) => PayloadStatus::Valid { len: payload.len() },
        Err(ContainerError::Absent) => PayloadStatus::Corrupt(Corruption::MissingMagic),
        Err(ContainerError::Corrupt(c)) => PayloadStatus::Corrupt(c),
        Err(ContainerError::UnsupportedVersion(v)) => PayloadStatus::UnsupportedVersion(v),
    };
    Ok((header, status))
}
