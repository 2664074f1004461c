/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Core task abstractions for the vfdd cooperative scheduler.
//!
//! ```text
//! Registry ──owns──► TaskSlot { name, remaining_ms, attention, Box<dyn Task> }
//!     ▲                                                   │
//!     └────────── Context (now, id, &mut slots) ◄─────────┘ passed to every call
//! ```
//!
//! # Ownership model
//! The [`Registry`] owns every task.  While one task runs, its box is
//! temporarily taken out of its slot so the task can receive a [`Context`]
//! holding `&mut` access to all *other* slots.  That is how a producer reaches
//! the display arbiter ([`Context::display`]) without shared mutable globals or
//! reference counting: references between tasks are plain [`TaskId`] indices
//! resolved on demand.

pub mod registry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::display::DisplayArbiter;

pub use registry::{Registry, TaskEnv};
use registry::TaskSlot;

// ── Identity ──────────────────────────────────────────────────────────────────

/// Index of a task inside the [`Registry`].
///
/// Tasks are never removed while the scheduler runs, so an id stays valid for
/// the lifetime of the registry.  It is the non-owning back-reference the
/// display arbiter keeps for each of its users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

// ── Time ──────────────────────────────────────────────────────────────────────

/// Wall-clock sample in milliseconds since the UNIX epoch.
///
/// The scheduler samples the clock once per iteration; every task operation
/// in that iteration sees the same value through [`Context::now`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_millis(ms: u64) -> Self {
        Timestamp(ms)
    }

    /// Samples the system wall clock.
    pub fn now() -> Self {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Timestamp(ms)
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Whole seconds since the epoch.
    pub fn secs(self) -> u64 {
        self.0 / 1000
    }

    /// Millisecond part within the current second (0–999).
    pub fn subsec_millis(self) -> u64 {
        self.0 % 1000
    }

    /// Milliseconds from `earlier` to `self`; zero if the clock went backwards.
    pub fn millis_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

// ── Attention ─────────────────────────────────────────────────────────────────

/// Out-of-band wake request for one task.
///
/// Any thread may [`raise`](Attention::raise) it; only the scheduler clears
/// it.  It is a single independent flag, never a multi-field transaction, so
/// an atomic boolean is all the synchronisation it needs.
#[derive(Debug, Clone, Default)]
pub struct Attention(Arc<AtomicBool>);

impl Attention {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the scheduler to run the owning task on its next pass.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear the flag, returning whether it was set.
    pub(crate) fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

// ── Task trait ────────────────────────────────────────────────────────────────

/// A schedulable unit of periodic work.
///
/// All methods execute on the scheduler thread and must not block.  Blocking
/// work belongs on a background thread that talks back only through the
/// task's [`Attention`].
pub trait Task {
    /// Do whatever this task does.
    ///
    /// Returns the number of milliseconds after which the scheduler should
    /// call `run` again.  An attention wake may call it earlier.
    fn run(&mut self, ctx: &mut Context<'_>) -> u64;

    /// Invoked once, after every task has been registered, to resolve named
    /// references to other tasks.
    fn post_init(&mut self, _ctx: &mut Context<'_>) {}

    /// Release resources at shutdown.
    fn fini(&mut self, _ctx: &mut Context<'_>) {}

    /// The display arbiter switched the shown text to (`true`) or away from
    /// (`false`) this task.
    fn display_notify(&mut self, _ctx: &mut Context<'_>, _active: bool) {}

    /// Downcast hook: `Some` only for the display arbiter.
    fn as_display_mut(&mut self) -> Option<&mut DisplayArbiter> {
        None
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Scheduler context passed to every [`Task`] operation.
///
/// Holds the current wall-clock sample, the id of the task being invoked and
/// mutable access to every other task in the registry.
pub struct Context<'a> {
    now: Timestamp,
    id: TaskId,
    slots: &'a mut [TaskSlot],
}

impl<'a> Context<'a> {
    pub(crate) fn new(now: Timestamp, id: TaskId, slots: &'a mut [TaskSlot]) -> Self {
        Self { now, id, slots }
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Id of the task this context was handed to.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Instance name of the task this context was handed to.
    pub fn name(&self) -> &str {
        &self.slots[self.id.0].name
    }

    /// Linear search for a task by instance name; first match wins.
    pub fn find(&self, name: &str) -> Option<TaskId> {
        registry::find_in(self.slots, name)
    }

    /// Mutable access to the display arbiter with the given id.
    ///
    /// `None` if `id` is not a display arbiter (or is the calling task).
    pub fn display(&mut self, id: TaskId) -> Option<&mut DisplayArbiter> {
        self.slots
            .get_mut(id.0)?
            .task
            .as_deref_mut()?
            .as_display_mut()
    }

    /// Resolves `name` to a display arbiter id, as producers do in
    /// `post_init`.
    pub fn find_display(&mut self, name: &str) -> Option<TaskId> {
        let id = self.find(name)?;
        self.display(id).map(|_| id)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
