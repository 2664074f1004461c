/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Disk activity lamp driven by a block device's `stat` counters.
//!
//! `/sys/block/<dev>/stat` holds eleven counters; `field` (1-based) picks
//! one.  Field 4 is "milliseconds spent reading", which moves whenever the
//! disk does anything useful.  The lamp is lit for one period after the
//! counter advanced by at least `threshold` since the last latched value.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, trace};

use super::{DisplayLink, BACKOFF_MS};
use crate::error::TaskError;
use crate::hostio::{self, HostIo};
use crate::task::{Context, Task, TaskEnv};

pub const DEFAULT_DEVICE: &str = "sda";
pub const DEFAULT_FIELD: i64 = 4;
pub const DEFAULT_THRESHOLD: i64 = 1;
pub const DEFAULT_INDICATOR: &str = "hdd";

const STAT_FIELDS: usize = 11;
const PERIOD_MS: u64 = 250;

pub struct DiskTask {
    io: Arc<dyn HostIo>,
    stat_path: PathBuf,
    /// 0-based counter index.
    field: usize,
    threshold: i64,
    indicator: String,
    display: DisplayLink,
    /// Counter value the next delta is measured from.
    old_value: Option<i64>,
    lit: Option<bool>,
}

impl DiskTask {
    pub fn new(env: &TaskEnv<'_>) -> Result<Self, TaskError> {
        let instance = env.instance;
        let cfg = env.config;

        let device = cfg.get_string(Some(instance), "device", DEFAULT_DEVICE);
        let field = cfg.get_int(Some(instance), "field", DEFAULT_FIELD);
        if !(1..=STAT_FIELDS as i64).contains(&field) {
            return Err(TaskError::config(
                format!("{}.field", instance),
                format!("invalid field number {}, must be 1 to {}", field, STAT_FIELDS),
            ));
        }
        let threshold = cfg.get_int(Some(instance), "threshold", DEFAULT_THRESHOLD);
        let indicator = cfg.get_string(Some(instance), "indicator", DEFAULT_INDICATOR);

        debug!(
            "  device '{}' field {} threshold {} indicator '{}'",
            device, field, threshold, indicator
        );

        Ok(Self {
            io: Arc::clone(&env.io),
            stat_path: PathBuf::from("/sys/block").join(&device).join("stat"),
            field: field as usize - 1,
            threshold,
            indicator,
            display: DisplayLink::from_config(env),
            old_value: None,
            lit: None,
        })
    }

    pub fn boxed(env: &TaskEnv<'_>) -> Result<Box<dyn Task>, TaskError> {
        Ok(Box::new(Self::new(env)?))
    }

    fn read_counter(&self) -> Option<i64> {
        let text = hostio::read_string(self.io.as_ref(), &self.stat_path)
            .map_err(|e| trace!("{}", e))
            .ok()?;
        text.split_whitespace()
            .take(STAT_FIELDS)
            .nth(self.field)
            .and_then(|v| v.parse().ok())
    }

    /// Feeds one counter sample; returns whether the lamp should be lit.
    fn sample(&mut self, value: i64) -> bool {
        match self.old_value {
            Some(old) if value - old < self.threshold => false,
            Some(_) => {
                self.old_value = Some(value);
                true
            }
            None => {
                self.old_value = Some(value);
                false
            }
        }
    }
}

impl Task for DiskTask {
    fn post_init(&mut self, ctx: &mut Context<'_>) {
        self.display.resolve(ctx);
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> u64 {
        if !self.display.is_resolved() {
            return BACKOFF_MS;
        }
        trace!("{}: run", ctx.name());

        let Some(value) = self.read_counter() else {
            return BACKOFF_MS;
        };
        let lit = self.sample(value);

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

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::producers::rig::{Rig, HDD};
    use crate::task::TaskId;

    const STAT: &str = "/sys/block/sda/stat";

    fn stat_with(read_ms: i64) -> String {
        format!("   10 0 80 {} 0 0 0 0 0 {} 0\n", read_ms, read_ms)
    }

    fn disk_rig(extra: &[(&str, &str)]) -> (Rig, TaskId) {
        let mut cfg = Config::new();
        for (k, v) in extra {
            cfg.set(*k, *v);
        }
        let mut rig = Rig::new(cfg);
        rig.io.put(STAT, &stat_with(100));
        let disk = rig.add("disk");
        rig.start();
        (rig, disk)
    }

    #[test]
    fn lamp_follows_counter_activity() {
        let (mut rig, disk) = disk_rig(&[]);

        assert_eq!(rig.run(disk, 0), 250);
        assert_eq!(rig.lamps() & HDD, 0, "first sample only latches");

        rig.io.put(STAT, &stat_with(101));
        rig.run(disk, 250);
        assert_eq!(rig.lamps() & HDD, HDD);

        rig.run(disk, 500);
        assert_eq!(rig.lamps() & HDD, 0, "no activity since last latch");
    }

    #[test]
    fn small_deltas_accumulate_against_the_latched_value() {
        let (mut rig, disk) = disk_rig(&[("disk.threshold", "5")]);
        rig.run(disk, 0);

        rig.io.put(STAT, &stat_with(103));
        rig.run(disk, 250);
        assert_eq!(rig.lamps() & HDD, 0);

        rig.io.put(STAT, &stat_with(106));
        rig.run(disk, 500);
        assert_eq!(rig.lamps() & HDD, HDD, "6 since the latch at 100");
    }

    #[test]
    fn backs_off_without_stat_or_display() {
        let (mut rig, disk) = disk_rig(&[("disk.device", "nvme0n1")]);
        assert_eq!(rig.run(disk, 0), BACKOFF_MS);

        let (mut rig, disk) = disk_rig(&[("disk.display", "elsewhere")]);
        assert_eq!(rig.run(disk, 0), BACKOFF_MS);
    }

    #[test]
    fn field_must_be_between_one_and_eleven() {
        for bad in ["0", "12", "-3"] {
            let mut cfg = Config::new();
            cfg.set("disk.field", bad);
            let mut rig = Rig::new(cfg);
            let err = rig
                .reg
                .register("disk", &rig.cfg, rig.io.clone())
                .unwrap_err();
            assert!(matches!(err, TaskError::ConfigInvalid { .. }), "{bad}");
        }
    }

    #[test]
    fn selected_field_is_the_one_watched() {
        let (mut rig, disk) = disk_rig(&[("disk.field", "1")]);
        rig.run(disk, 0);

        // field 4 moves, field 1 does not
        rig.io.put(STAT, &stat_with(500));
        rig.run(disk, 250);
        assert_eq!(rig.lamps() & HDD, 0);
    }
}
