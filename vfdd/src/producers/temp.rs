/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Numeric sysfs value (a thermal zone by default) shown as text.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, trace};

use super::{DisplayLink, BACKOFF_MS};
use crate::display::DEFAULT_PRIORITY;
use crate::error::TaskError;
use crate::hostio::{self, HostIo};
use crate::task::{Context, Task, TaskEnv};

pub const DEFAULT_VALUE: &str = "/sys/class/thermal/thermal_zone0/temp";
pub const DEFAULT_FORMAT: &str = "%dC";
pub const DEFAULT_DIVIDER: i64 = 1000;

const PERIOD_MS: u64 = 500;

pub struct TempTask {
    io: Arc<dyn HostIo>,
    value: PathBuf,
    format: String,
    divider: i64,
    priority: i64,
    display: DisplayLink,
    shown: Option<String>,
}

impl TempTask {
    pub fn new(env: &TaskEnv<'_>) -> Result<Self, TaskError> {
        let instance = env.instance;
        let cfg = env.config;

        let divider = cfg.get_int(Some(instance), "divider", DEFAULT_DIVIDER);
        if divider == 0 {
            return Err(TaskError::config(
                format!("{}.divider", instance),
                "must not be zero",
            ));
        }

        let task = Self {
            io: Arc::clone(&env.io),
            value: PathBuf::from(cfg.get_string(Some(instance), "value", DEFAULT_VALUE)),
            format: cfg.get_string(Some(instance), "format", DEFAULT_FORMAT),
            divider,
            priority: cfg.get_int(Some(instance), "priority", DEFAULT_PRIORITY),
            display: DisplayLink::from_config(env),
            shown: None,
        };

        debug!(
            "  format '{}' priority {} display '{}' value '{}'",
            task.format,
            task.priority,
            task.display.name(),
            task.value.display()
        );
        Ok(task)
    }

    pub fn boxed(env: &TaskEnv<'_>) -> Result<Box<dyn Task>, TaskError> {
        Ok(Box::new(Self::new(env)?))
    }
}

impl Task for TempTask {
    fn post_init(&mut self, ctx: &mut Context<'_>) {
        self.display.resolve(ctx);
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> u64 {
        trace!("{}: run", ctx.name());

        let Some(raw) = hostio::read_int(self.io.as_ref(), &self.value) else {
            return BACKOFF_MS;
        };
        let text = format_value(&self.format, raw / self.divider);

        if self.shown.as_deref() != Some(text.as_str()) {
            let me = ctx.id();
            if let Some(display) = self.display.get(ctx) {
                display.set_display(me, self.priority, Some(text.as_str()));
                self.shown = Some(text);
            }
        }

        PERIOD_MS
    }
}

/// Expands a printf-style template holding one `%d`.  `%%` is a literal
/// percent sign; any other conversion is copied through untouched.
pub fn format_value(format: &str, value: i64) -> String {
    let mut out = String::with_capacity(format.len() + 8);
    let mut substituted = false;
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some('d') if !substituted => {
                chars.next();
                out.push_str(&value.to_string());
                substituted = true;
            }
            _ => out.push('%'),
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
