/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! vfdd – front-panel display daemon
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── config/      – YAML configuration flattened to dotted keys
//! ├── error.rs     – host I/O and task error types
//! ├── hostio.rs    – sysfs attribute access behind a trait
//! ├── task/        – Task trait, Context, registry & lifecycle
//! ├── scheduler/   – cooperative single-threaded dispatcher
//! ├── display/     – display arbiter and indicator codec
//! └── producers/   – clock, disk, temp, dot, suspend
//! ```

pub mod config;
pub mod display;
pub mod error;
pub mod hostio;
pub mod producers;
pub mod scheduler;
pub mod task;
