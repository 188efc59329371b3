// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! # nano-drm
//!
//! Embed an opaque binary payload (typically a small JSON licence record)
//! inside PNG and PDF files and read it back, without affecting how the file
//! renders. Two carrier strategies:
//!
//! - **PNG**: a private ancillary `ndRm` chunk, inserted before `IEND` or
//!   replaced in place. Every other chunk is kept byte-for-byte.
//! - **PDF**: a length-delimited stream object referenced from the trailer
//!   under `/NanoDRM`. The file is re-emitted as a single revision with a
//!   rebuilt cross-reference section; all live objects keep their bytes.
//!
//! Payloads are wrapped in a small container (magic, version, length,
//! CRC-32) so truncation and bit rot are detected. Files are replaced
//! atomically through a temp file and rename.
//!
//! The PNG and PDF parsers are std-only apart from `crc32fast` for chunk
//! CRCs and `flate2` for compressed cross-reference streams.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//!
//! let path = Path::new("cover.png");
//! nano_drm::write(path, br#"{"licensee":"acme"}"#).unwrap();
//! let payload = nano_drm::read(path).unwrap();
//! assert_eq!(payload, br#"{"licensee":"acme"}"#);
//! ```

pub mod drm;
pub mod pdf;
pub mod png;

pub use drm::{read, read_with_config, write, write_with_config};
pub use drm::{embed, extract, inspect, inspect_bytes, Inspection, PayloadStatus};
pub use drm::{Carrier, CarrierFormat, Config, ContainerHeader, Corruption, DrmError, ErrorKind};
pub use pdf::error::PdfError;
pub use pdf::PdfCarrier;
pub use png::error::PngError;
pub use png::PngCarrier;
