// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Error types for the embed/extract pipeline.
//!
//! [`DrmError`] covers every failure mode from format detection through
//! carrier parsing, container validation and the atomic commit.

use core::fmt;

use super::container::{ContainerError, Corruption};
use crate::pdf::error::PdfError;
use crate::png::error::PngError;

/// Coarse classification of a [`DrmError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// File signature is neither PNG nor PDF.
    UnsupportedFormat,
    /// Carrier structure is invalid or uses features this crate can't rewrite.
    Parse,
    /// A container is present but fails validation.
    CorruptPayload,
    /// The payload exceeds the configured or format limit. Nothing is written.
    TooLarge,
    /// Filesystem failure.
    Io,
}

/// Errors that can occur while embedding or extracting a payload.
#[derive(Debug)]
pub enum DrmError {
    /// The file signature is neither PNG nor PDF.
    UnsupportedFormat,
    /// The carrier could not be parsed as a valid PNG.
    InvalidPng(PngError),
    /// The carrier could not be parsed as a valid PDF.
    InvalidPdf(PdfError),
    /// A container is present but its length or checksum is wrong.
    CorruptPayload(Corruption),
    /// A container written by a newer format version.
    UnsupportedContainerVersion(u16),
    /// The payload exceeds the configured or format limit.
    PayloadTooLarge { len: usize, max: usize },
    /// Reading or committing the file failed.
    Io(std::io::Error),
}

impl DrmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat => ErrorKind::UnsupportedFormat,
            Self::InvalidPng(_) | Self::InvalidPdf(_) | Self::UnsupportedContainerVersion(_) => {
                ErrorKind::Parse
            }
            Self::CorruptPayload(_) => ErrorKind::CorruptPayload,
            Self::PayloadTooLarge { .. } => ErrorKind::TooLarge,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

impl fmt::Display for DrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat => write!(f, "unsupported file type (expected PNG or PDF)"),
            Self::InvalidPng(e) => write!(f, "invalid PNG: {e}"),
            Self::InvalidPdf(e) => write!(f, "invalid PDF: {e}"),
            Self::CorruptPayload(c) => write!(f, "embedded payload is corrupt: {c}"),
            Self::UnsupportedContainerVersion(v) => {
                write!(f, "embedded payload uses unsupported container version {v}")
            }
            Self::PayloadTooLarge { len, max } => {
                write!(f, "payload of {len} bytes exceeds the {max} byte limit")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for DrmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidPng(e) => Some(e),
            Self::InvalidPdf(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PngError> for DrmError {
    fn from(e: PngError) -> Self {
        Self::InvalidPng(e)
    }
}

impl From<PdfError> for DrmError {
    fn from(e: PdfError) -> Self {
        Self::InvalidPdf(e)
    }
}

impl From<std::io::Error> for DrmError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// `Absent` has no `DrmError` counterpart; callers handle it before converting.
impl From<ContainerError> for DrmError {
    fn from(e: ContainerError) -> Self {
        match e {
            ContainerError::Absent => Self::CorruptPayload(Corruption::MissingMagic),
            ContainerError::Corrupt(c) => Self::CorruptPayload(c),
            ContainerError::UnsupportedVersion(v) => Self::UnsupportedContainerVersion(v),
        }
    }
}
