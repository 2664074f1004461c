/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Cooperative, single-threaded task dispatcher.
//!
//! [`Scheduler`] repeatedly runs every task in the [`Registry`] whose timer
//! has elapsed or whose [`Attention`](crate::task::Attention) flag is raised,
//! re-arms the timer from the delay the task returns, then sleeps until the
//! earliest timer (at most [`MAX_SLEEP_MS`]).
//!
//! # Loop body
//! ```text
//! ┌─► ready passes: run due/attention tasks until none is ready
//! │   sleep(min remaining, capped at 10 s)
//! │   elapsed = wall clock after − before      (covers oversleep, suspend)
//! │   remaining -= elapsed, floored at 0
//! └── until the shutdown flag is seen
//! ```
//!
//! Cancellation is cooperative: the shutdown flag is polled once per outer
//! iteration and no task is ever interrupted mid-`run()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, trace};

use crate::task::{Registry, TaskId, Timestamp};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Upper bound on one scheduler sleep.
///
/// Bounds how long an attention flag raised by a background thread can go
/// unnoticed.
pub const MAX_SLEEP_MS: u64 = 10_000;

// ── Clock ─────────────────────────────────────────────────────────────────────

/// Time source and sleep primitive used by the scheduler.
pub trait Clock {
    fn now(&self) -> Timestamp;
    fn sleep(&self, duration: Duration);
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

/// Scheduler context: the registry plus the current wall-clock sample.
pub struct Scheduler<C: Clock = SystemClock> {
    registry: Registry,
    clock: C,
    now: Timestamp,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(registry: Registry, clock: C) -> Self {
        let now = clock.now();
        Self {
            registry,
            clock,
            now,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Clock sample every task operation of the current iteration sees.
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Full daemon lifecycle: `post_init` on every task, iterate until
    /// `shutdown` is raised, then `fini` on every task.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        info!(tasks = self.registry.len(), "scheduler starting");
        self.registry.post_init_all(self.now);

        while !shutdown.load(Ordering::Relaxed) {
            self.step();
        }

        info!("scheduler stopping");
        self.now = self.clock.now();
        self.registry.finalize_all(self.now);
    }

    /// One outer iteration: ready passes, sleep, timer bookkeeping.
    pub fn step(&mut self) {
        let sleep_ms = self.run_ready();

        trace!(sleep_ms, "sleeping");
        self.clock.sleep(Duration::from_millis(sleep_ms));

        // find out how much we actually slept
        let before = self.now;
        self.now = self.clock.now();
        let elapsed = self.now.millis_since(before);

        for slot in self.registry.slots_mut() {
            slot.remaining_ms = slot.remaining_ms.saturating_sub(elapsed);
        }
    }

    /// Runs ready-to-run tasks until none is left ready.
    ///
    /// Returns how long to sleep: the smallest remaining delay across all
    /// tasks, capped at [`MAX_SLEEP_MS`].
    pub fn run_ready(&mut self) -> u64 {
        loop {
            let mut sleep_ms = MAX_SLEEP_MS;

            for index in 0..self.registry.len() {
                let slot = &self.registry.slots()[index];
                let due = slot.remaining_ms == 0;
                // Cleared before run(): a raise during run() re-arms a pass.
                let woken = slot.attention.take();

                if due || woken {
                    let id = TaskId(index);
                    if let Some(delay) = self.registry.invoke(id, self.now, |task, ctx| task.run(ctx))
                    {
                        self.registry.slots_mut()[index].remaining_ms = delay;
                    }
                }

                sleep_ms = sleep_ms.min(self.registry.slots()[index].remaining_ms);
            }

            let ready = self
                .registry
                .slots()
                .iter()
                .any(|s| s.remaining_ms == 0 || s.attention.is_raised());
            if !ready {
                return sleep_ms;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
