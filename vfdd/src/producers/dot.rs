/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Threshold lamp over one field of a sysfs attribute, e.g. network carrier.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, trace};

use super::{DisplayLink, BACKOFF_MS};
use crate::error::TaskError;
use crate::hostio::{self, HostIo};
use crate::task::{Context, Task, TaskEnv};

pub const DEFAULT_ATTR: &str = "/sys/class/net/eth0/carrier";
pub const DEFAULT_FIELD: i64 = 1;
pub const DEFAULT_THRESHOLD: i64 = 1;
pub const DEFAULT_INDICATOR: &str = "lan";

const PERIOD_MS: u64 = 500;

pub struct DotTask {
    io: Arc<dyn HostIo>,
    attr: PathBuf,
    /// 1-based whitespace-separated field.
    field: usize,
    threshold: i64,
    indicator: String,
    display: DisplayLink,
    lit: Option<bool>,
}

impl DotTask {
    pub fn new(env: &TaskEnv<'_>) -> Result<Self, TaskError> {
        let instance = env.instance;
        let cfg = env.config;

        let field = cfg.get_int(Some(instance), "field", DEFAULT_FIELD);
        let task = Self {
            io: Arc::clone(&env.io),
            attr: PathBuf::from(cfg.get_string(Some(instance), "attr", DEFAULT_ATTR)),
            field: field.max(1) as usize,
            threshold: cfg.get_int(Some(instance), "threshold", DEFAULT_THRESHOLD),
            indicator: cfg.get_string(Some(instance), "indicator", DEFAULT_INDICATOR),
            display: DisplayLink::from_config(env),
            lit: None,
        };

        debug!(
            "  if attr '{}'.{} >= {} display '{}' indicator '{}'",
            task.attr.display(),
            task.field,
            task.threshold,
            task.display.name(),
            task.indicator
        );
        Ok(task)
    }

    pub fn boxed(env: &TaskEnv<'_>) -> Result<Box<dyn Task>, TaskError> {
        Ok(Box::new(Self::new(env)?))
    }
}

impl Task for DotTask {
    fn post_init(&mut self, ctx: &mut Context<'_>) {
        self.display.resolve(ctx);
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> u64 {
        trace!("{}: run", ctx.name());

        let text = match hostio::read_string(self.io.as_ref(), &self.attr) {
            Ok(text) => text,
            Err(e) => {
                trace!("{}", e);
                return BACKOFF_MS;
            }
        };
        let lit = field_value(&text, self.field) >= self.threshold;

        if self.lit != Some(lit) {
            let me = ctx.id();
            if let Some(display) = self.display.get(ctx) {
                display.set_indicator(me, &self.indicator, lit);
                self.lit = Some(lit);
            }
        }

        PERIOD_MS
    }
}

/// Integer value of the `field`-th (1-based) token; 0 when absent or not a
/// number.
fn field_value(text: &str, field: usize) -> i64 {
    text.split_whitespace()
        .nth(field - 1)
        .and_then(hostio::parse_int)
        .unwrap_or(0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
