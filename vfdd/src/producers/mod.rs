/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Producer tasks: everything that feeds text or lamps to a display arbiter.
//!
//! | Type      | Shows                               | Period        |
//! |-----------|-------------------------------------|---------------|
//! | `clock`   | local time, blinking separator lamp | blink edge    |
//! | `disk`    | activity lamp from `/sys/block/*/stat` | 250 ms     |
//! | `temp`    | a scaled sysfs value as text        | 500 ms        |
//! | `dot`     | lamp from a sysfs attribute field   | 500 ms        |
//! | `suspend` | pinned text while the panel sleeps  | uevent driven |

pub mod clock;
pub mod disk;
pub mod dot;
pub mod suspend;
pub mod temp;

use tracing::{debug, warn};

use crate::display::DisplayArbiter;
use crate::task::{Context, TaskEnv, TaskId};

/// Display task producers attach to unless configured otherwise.
pub const DEFAULT_DISPLAY: &str = "display";

/// Back-off used while a producer has nothing to talk to or read from.
pub const BACKOFF_MS: u64 = 10_000;

/// A producer's named reference to its display arbiter.
///
/// The name comes from the `<instance>.display` key and is resolved to an id
/// once, in `post_init`.
#[derive(Debug, Clone)]
pub struct DisplayLink {
    name: String,
    id: Option<TaskId>,
}

impl DisplayLink {
    pub fn from_config(env: &TaskEnv<'_>) -> Self {
        Self {
            name: env
                .config
                .get_string(Some(env.instance), "display", DEFAULT_DISPLAY),
            id: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resolve(&mut self, ctx: &mut Context<'_>) {
        self.id = ctx.find_display(&self.name);
        match self.id {
            Some(id) => debug!("{}: using display '{}' ({:?})", ctx.name(), self.name, id),
            None => warn!("{}: display task '{}' not found", ctx.name(), self.name),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.id.is_some()
    }

    /// The linked arbiter, if it was found in `post_init`.
    pub fn get<'c>(&self, ctx: &'c mut Context<'_>) -> Option<&'c mut DisplayArbiter> {
        ctx.display(self.id?)
    }
}

// ── Test rig ──────────────────────────────────────────────────────────────────
