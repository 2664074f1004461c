/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the vfdd daemon.
//!
//! Two error enums model the two failure layers:
//!
//! * [`HostIoError`] – a single read/write against a device attribute file
//!   failed (low-level, carries the path).
//! * [`TaskError`] – why a task could not be constructed or why an arbiter
//!   request was ignored.
//!
//! None of these ever cross the scheduler boundary: every task converts a
//! failure into a logged, locally handled outcome.

use std::path::PathBuf;

use thiserror::Error;

// ── Host I/O ──────────────────────────────────────────────────────────────────

/// Failure of a single Host I/O Adapter operation.
#[derive(Debug, Error)]
pub enum HostIoError {
    /// The attribute file does not exist.
    #[error("'{}' not found", path.display())]
    NotFound { path: PathBuf },

    /// Any other read/write failure (permissions, short write, EIO, …).
    #[error("I/O failure on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HostIoError {
    /// Classify a `std::io::Error` raised while accessing `path`.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            HostIoError::NotFound { path }
        } else {
            HostIoError::Io { path, source }
        }
    }
}

// ── Task errors ───────────────────────────────────────────────────────────────

/// Error taxonomy of the task layer.
///
/// | Variant | Outcome |
/// |---|---|
/// | `ConfigInvalid` | task skipped, daemon continues |
/// | `UnknownTaskType` | logged, skipped |
/// | `NoValidTasks` | fatal, daemon exits |
/// | `DeviceMissing` / `DeviceIncompatible` | display task skipped |
/// | `EventSocket` | suspend task skipped |
/// | `UnknownIndicator` | logged, ignored |
///
/// A [`HostIoError`] never becomes a `TaskError`: the caller logs it and
/// retries on its next run.
#[derive(Debug, Error)]
pub enum TaskError {
    /// A configuration value is missing or malformed.
    #[error("invalid configuration for '{key}': {reason}")]
    ConfigInvalid { key: String, reason: String },

    /// The task list names a type that has no constructor.
    #[error("task '{0}' unknown")]
    UnknownTaskType(String),

    /// Every configured task failed to construct.
    #[error("no valid tasks in config")]
    NoValidTasks,

    /// The display device directory does not exist.
    #[error("device '{}' not found", device.display())]
    DeviceMissing { device: PathBuf },

    /// The display device lacks the attributes the arbiter needs.
    #[error("device '{}' is incompatible: {reason}", device.display())]
    DeviceIncompatible { device: PathBuf, reason: String },

    /// The kernel uevent socket could not be opened.
    #[error("cannot open uevent socket: {0}")]
    EventSocket(#[source] nix::errno::Errno),

    /// `set_indicator` named a lamp the device catalogue does not have.
    #[error("no indicator named '{0}'")]
    UnknownIndicator(String),
}

impl TaskError {
    /// Shorthand for [`TaskError::ConfigInvalid`].
    pub fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        TaskError::ConfigInvalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
