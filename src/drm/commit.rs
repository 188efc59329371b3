// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Atomic file replacement.
//!
//! The new carrier is written to a temp file in the target's directory and
//! renamed over the target, so readers see either the old or the new file,
//! never a partial one. A failure before the rename leaves the target
//! untouched and the temp file is removed on drop.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Replace the contents of `path` with `bytes` atomically.
///
/// With `sync` set, the temp file is flushed to disk before the rename and
/// the directory entry after it.
pub fn write_atomic(path: &Path, bytes: &[u8], sync: bool) -> io::Result<()> {
    // write through symlinks instead of replacing them
    let target = fs::canonicalize(path)?;
    let dir = parent_dir(&target);

    let mut tmp = tempfile::Builder::new()
        .prefix(".nano-drm-")
        .suffix(".tmp")
        .tempfile_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file()
        .set_permissions(fs::metadata(&target)?.permissions())?;
    if sync {
        tmp.as_file().sync_all()?;
    }
    tmp.persist(&target).map_err(|e| e.error)?;

    if sync {
        sync_dir(&dir)?;
    }
    debug!(path = %target.display(), len = bytes.len(), "committed carrier");
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
