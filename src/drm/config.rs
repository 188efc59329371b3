// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Write/read options.

use super::container::MAX_PAYLOAD_LEN;

/// Options for [`write_with_config`](super::write_with_config) and
/// [`read_with_config`](super::read_with_config).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// fsync the temp file before the rename and the directory after it.
    pub sync: bool,
    /// Largest payload accepted by a write. Carriers with a tighter format
    /// limit (PNG chunks are capped at 2^31-1 bytes) apply that limit instead.
    pub max_payload_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync: true,
            max_payload_len: MAX_PAYLOAD_LEN,
        }
    }
}
