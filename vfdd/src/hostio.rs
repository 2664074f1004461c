/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Host I/O Adapter: byte-level access to OS-exposed attribute files.
//!
//! Tasks never touch `std::fs` directly; they hold an `Arc<dyn HostIo>` so the
//! whole daemon can be driven against an in-memory device in tests.

use std::path::Path;

use tracing::trace;

use crate::error::HostIoError;

/// Byte-oriented read/write/exists against sysfs-like files.
pub trait HostIo: Send + Sync {
    fn read(&self, path: &Path) -> Result<Vec<u8>, HostIoError>;
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), HostIoError>;
    fn exists(&self, path: &Path) -> bool;
}

/// [`HostIo`] backed by the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysfsIo;

impl HostIo for SysfsIo {
    fn read(&self, path: &Path) -> Result<Vec<u8>, HostIoError> {
        std::fs::read(path).map_err(|e| HostIoError::from_io(path, e))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), HostIoError> {
        // sysfs attributes want the whole value in a single write(2).
        std::fs::write(path, bytes).map_err(|e| HostIoError::from_io(path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Reads `path` as (lossy) UTF-8 text.
pub fn read_string(io: &dyn HostIo, path: &Path) -> Result<String, HostIoError> {
    let bytes = io.read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Reads `path` and parses its leading integer with [`parse_int`].
///
/// Returns `None` when the file cannot be read or holds no number.
pub fn read_int(io: &dyn HostIo, path: &Path) -> Option<i64> {
    match read_string(io, path) {
        Ok(text) => parse_int(&text),
        Err(e) => {
            trace!("{}", e);
            None
        }
    }
}

pub fn write_str(io: &dyn HostIo, path: &Path, value: &str) -> Result<(), HostIoError> {
    io.write(path, value.as_bytes())
}

pub fn write_int(io: &dyn HostIo, path: &Path, value: i64) -> Result<(), HostIoError> {
    write_str(io, path, &value.to_string())
}

/// Parses the leading integer of `text` the way `strtol(text, NULL, 0)` does:
/// leading whitespace, an optional sign, a `0x` prefix for hexadecimal, and
/// trailing garbage is ignored.
pub fn parse_int(text: &str) -> Option<i64> {
    let s = text.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, digits) = match s.get(..2) {
        Some("0x") | Some("0X") => (16, &s[2..]),
        _ => (10, s),
    };

    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let value = i64::from_str_radix(&digits[..end], radix).ok()?;
    Some(if negative { -value } else { value })
}

// ── In-memory fake ────────────────────────────────────────────────────────────

#[cfg(test)]
pub use fake::MemoryIo;


// ── Tests ─────────────────────────────────────────────────────────────────────
