/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Wall clock with a blinking hour/minute separator lamp.

use std::ffi::{CStr, CString};

use tracing::{debug, trace};

use super::DisplayLink;
use crate::display::{DisplayArbiter, DEFAULT_PRIORITY};
use crate::error::TaskError;
use crate::task::{Context, Task, TaskEnv, TaskId, Timestamp};

pub const DEFAULT_FORMAT: &str = "%H%M";
pub const DEFAULT_SEPARATOR: &str = ":";

/// Separator lamp on for the first 500 ms of every second.
const DEFAULT_BLINK: (u64, u64) = (500, 1000);

pub struct ClockTask {
    format: CString,
    /// Indicator name, `None` when disabled.
    separator: Option<String>,
    separator_always: bool,
    priority: i64,
    /// `(on_ms, period_ms)`
    blink: (u64, u64),
    display: DisplayLink,
    last_secs: Option<u64>,
    separator_lit: Option<bool>,
}

impl ClockTask {
    pub fn new(env: &TaskEnv<'_>) -> Result<Self, TaskError> {
        let instance = env.instance;
        let cfg = env.config;

        let format = cfg.get_string(Some(instance), "format", DEFAULT_FORMAT);
        let format = CString::new(format).map_err(|_| {
            TaskError::config(format!("{}.format", instance), "contains a NUL byte")
        })?;

        let separator = cfg.get_string(Some(instance), "separator", DEFAULT_SEPARATOR);
        let separator = Some(separator).filter(|s| !s.is_empty());

        let blink = if cfg.get_string(Some(instance), "blink", "").is_empty() {
            DEFAULT_BLINK
        } else {
            let (on, period) = cfg.get_int_pair(instance, "blink")?;
            match (u64::try_from(on), u64::try_from(period)) {
                (Ok(on), Ok(period)) if period > 0 && on <= period => (on, period),
                _ => {
                    return Err(TaskError::config(
                        format!("{}.blink", instance),
                        "expected 'on_ms period_ms' with 0 <= on_ms <= period_ms and period_ms > 0",
                    ))
                }
            }
        };

        let task = Self {
            format,
            separator,
            separator_always: cfg.get_int(Some(instance), "separator.always", 0) != 0,
            priority: cfg.get_int(Some(instance), "priority", DEFAULT_PRIORITY),
            blink,
            display: DisplayLink::from_config(env),
            last_secs: None,
            separator_lit: None,
        };

        debug!(
            "  format {:?} separator {:?} (always {}) priority {} display '{}'",
            task.format,
            task.separator,
            task.separator_always,
            task.priority,
            task.display.name()
        );
        Ok(task)
    }

    pub fn boxed(env: &TaskEnv<'_>) -> Result<Box<dyn Task>, TaskError> {
        Ok(Box::new(Self::new(env)?))
    }

    /// Lamp state for `now`, given whether the clock owns the display.
    fn separator_wanted(&self, now: Timestamp, active: bool) -> bool {
        let (on, period) = self.blink;
        (self.separator_always || active) && now.as_millis() % period < on
    }

    fn refresh_separator(
        &mut self,
        display: &mut DisplayArbiter,
        me: TaskId,
        now: Timestamp,
        active: bool,
    ) {
        let lit = self.separator_wanted(now, active);
        let Some(name) = &self.separator else {
            return;
        };
        if self.separator_lit != Some(lit) {
            display.set_indicator(me, name, lit);
            self.separator_lit = Some(lit);
        }
    }

    /// Delay until the next second or separator edge, whichever comes first.
    fn next_wake(&self, now: Timestamp) -> u64 {
        let to_second = 1000 - now.subsec_millis();
        if self.separator.is_none() {
            return to_second;
        }
        let (on, period) = self.blink;
        let phase = now.as_millis() % period;
        let to_edge = if phase < on { on - phase } else { period - phase };
        to_second.min(to_edge)
    }
}

impl Task for ClockTask {
    fn post_init(&mut self, ctx: &mut Context<'_>) {
        self.display.resolve(ctx);
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> u64 {
        let now = ctx.now();
        let me = ctx.id();
        trace!("{}: run", ctx.name());

        let Some(display) = self.display.get(ctx) else {
            return self.next_wake(now);
        };

        if self.last_secs != Some(now.secs()) {
            self.last_secs = Some(now.secs());
            let text = format_local_time(now.secs() as i64, &self.format);
            display.set_display(me, self.priority, Some(text.as_str()));
        }

        let active = display.is_active(me);
        self.refresh_separator(display, me, now, active);

        self.next_wake(now)
    }

    fn display_notify(&mut self, ctx: &mut Context<'_>, active: bool) {
        let now = ctx.now();
        let me = ctx.id();
        trace!("{}: display_notify {}", ctx.name(), active);

        if let Some(display) = self.display.get(ctx) {
            self.refresh_separator(display, me, now, active);
        }
    }
}

/// `strftime(3)` of `secs` since the epoch in the local time zone.
fn format_local_time(secs: i64, format: &CStr) -> String {
    let t = secs as libc::time_t;
    // SAFETY: an all-zero `tm` is a valid value; it is only written to.
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    // SAFETY: both pointers are valid for the duration of the call.
    if unsafe { libc::localtime_r(&t, &mut tm) }.is_null() {
        return String::new();
    }

    let mut buf = [0u8; 64];
    // SAFETY: `buf` is writable for `buf.len()` bytes, `format` is
    // NUL-terminated and `tm` was filled in above.  strftime never writes
    // past the given size and returns the number of bytes written.
    let len = unsafe {
        libc::strftime(
            buf.as_mut_ptr().cast::<libc::c_char>(),
            buf.len(),
            format.as_ptr(),
            &tm,
        )
    };
    String::from_utf8_lossy(&buf[..len]).into_owned()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
