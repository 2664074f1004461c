/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Task registry and lifecycle.
//!
//! The registry is created once at startup from the configured `tasks` list,
//! resolves each instance name to a constructor by its type prefix, and owns
//! the resulting tasks in list order.
//!
//! Lookup by name is a linear scan over the registry.  Registries hold at
//! most a few dozen tasks, so O(n) is the documented contract; on a name
//! collision the first match wins.

use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use super::{Attention, Context, Task, TaskId, Timestamp};
use crate::config::Config;
use crate::display::{DisplayArbiter, DisplayNotice};
use crate::error::TaskError;
use crate::hostio::HostIo;
use crate::producers;

/// Task list used when the config has no `tasks` key.
pub const DEFAULT_TASKS: &str = "clock";

// ── Slots ─────────────────────────────────────────────────────────────────────

/// One registry entry: identity, scheduling state and the task itself.
pub(crate) struct TaskSlot {
    pub(crate) name: String,
    /// Milliseconds left until the task is due.
    pub(crate) remaining_ms: u64,
    pub(crate) attention: Attention,
    /// `None` only while the task is being invoked.
    pub(crate) task: Option<Box<dyn Task>>,
}

pub(crate) fn find_in(slots: &[TaskSlot], name: &str) -> Option<TaskId> {
    slots.iter().position(|s| s.name == name).map(TaskId)
}

// ── Constructors ──────────────────────────────────────────────────────────────

/// Everything a task constructor may need.
pub struct TaskEnv<'a> {
    /// Full instance name, e.g. `temp/cpu`.
    pub instance: &'a str,
    /// Id the task will get once registered.
    pub id: TaskId,
    /// The task's own attention flag.
    pub attention: Attention,
    pub config: &'a Config,
    pub io: Arc<dyn HostIo>,
}

type Constructor = fn(&TaskEnv<'_>) -> Result<Box<dyn Task>, TaskError>;

struct TaskModule {
    name: &'static str,
    new: Constructor,
}

static TASK_MODULES: &[TaskModule] = &[
    TaskModule {
        name: "display",
        new: DisplayArbiter::boxed,
    },
    TaskModule {
        name: "suspend",
        new: producers::suspend::SuspendTask::boxed,
    },
    TaskModule {
        name: "clock",
        new: producers::clock::ClockTask::boxed,
    },
    TaskModule {
        name: "dot",
        new: producers::dot::DotTask::boxed,
    },
    TaskModule {
        name: "temp",
        new: producers::temp::TempTask::boxed,
    },
    TaskModule {
        name: "disk",
        new: producers::disk::DiskTask::boxed,
    },
];

/// `true` if `instance` is `type_name` itself or `type_name/<suffix>`.
fn type_matches(instance: &str, type_name: &str) -> bool {
    match instance.strip_prefix(type_name) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Insertion-ordered collection of live tasks.
#[derive(Default)]
pub struct Registry {
    slots: Vec<TaskSlot>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from the `tasks` config key.
    ///
    /// Unknown task types and constructors that fail are logged and skipped.
    ///
    /// # Errors
    /// [`TaskError::NoValidTasks`] if nothing could be registered.
    pub fn from_config(config: &Config, io: Arc<dyn HostIo>) -> Result<Self, TaskError> {
        let list = config.get_string(None, "tasks", DEFAULT_TASKS);
        let mut registry = Self::new();

        for instance in list.split_whitespace() {
            match registry.register(instance, config, Arc::clone(&io)) {
                Ok(id) => debug!(task = instance, id = id.index(), "registered"),
                Err(e @ TaskError::UnknownTaskType(_)) => warn!("{}, ignoring", e),
                Err(e) => error!(task = instance, "{}, task skipped", e),
            }
        }

        if registry.is_empty() {
            error!("No valid tasks in config, aborting");
            return Err(TaskError::NoValidTasks);
        }

        info!(
            "Registered {} task(s): {}",
            registry.len(),
            registry.names().collect::<Vec<_>>().join(" ")
        );
        Ok(registry)
    }

    /// Resolves the type prefix of `instance`, constructs the task and
    /// appends it to the registry.
    pub fn register(
        &mut self,
        instance: &str,
        config: &Config,
        io: Arc<dyn HostIo>,
    ) -> Result<TaskId, TaskError> {
        let module = TASK_MODULES
            .iter()
            .find(|m| type_matches(instance, m.name))
            .ok_or_else(|| TaskError::UnknownTaskType(instance.to_string()))?;

        trace!("initializing '{}' plugin", instance);

        let attention = Attention::new();
        let env = TaskEnv {
            instance,
            id: TaskId(self.slots.len()),
            attention: attention.clone(),
            config,
            io,
        };
        let task = (module.new)(&env)?;
        Ok(self.insert_with(instance, attention, task))
    }

    /// Appends an already constructed task with a fresh attention flag.
    pub fn insert(&mut self, instance: &str, task: Box<dyn Task>) -> TaskId {
        self.insert_with(instance, Attention::new(), task)
    }

    pub(crate) fn insert_with(
        &mut self,
        instance: &str,
        attention: Attention,
        task: Box<dyn Task>,
    ) -> TaskId {
        let id = TaskId(self.slots.len());
        self.slots.push(TaskSlot {
            name: instance.to_string(),
            remaining_ms: 0,
            attention,
            task: Some(task),
        });
        id
    }

    /// Linear search by instance name; first match wins.
    pub fn find(&self, name: &str) -> Option<TaskId> {
        find_in(&self.slots, name)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Instance names in registry order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    pub fn attention(&self, id: TaskId) -> Option<Attention> {
        self.slots.get(id.0).map(|s| s.attention.clone())
    }

    pub fn remaining_ms(&self, id: TaskId) -> Option<u64> {
        self.slots.get(id.0).map(|s| s.remaining_ms)
    }

    pub fn display_mut(&mut self, id: TaskId) -> Option<&mut DisplayArbiter> {
        self.slots
            .get_mut(id.0)?
            .task
            .as_deref_mut()?
            .as_display_mut()
    }

    pub(crate) fn slots(&self) -> &[TaskSlot] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [TaskSlot] {
        &mut self.slots
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Calls `post_init` on every task, registry order.
    pub fn post_init_all(&mut self, now: Timestamp) {
        for index in 0..self.slots.len() {
            self.invoke(TaskId(index), now, |task, ctx| task.post_init(ctx));
        }
    }

    /// Calls `fini` on every task, registry order, then drops them.
    pub fn finalize_all(&mut self, now: Timestamp) {
        for index in 0..self.slots.len() {
            trace!("finalizing '{}' plugin", self.slots[index].name);
            self.invoke(TaskId(index), now, |task, ctx| task.fini(ctx));
        }
        self.slots.clear();
    }

    /// Runs `f` on task `id` with a [`Context`] over the rest of the
    /// registry, then delivers any display notifications it caused.
    ///
    /// Returns `None` if `id` does not exist or is already being invoked.
    pub fn invoke<R>(
        &mut self,
        id: TaskId,
        now: Timestamp,
        f: impl FnOnce(&mut dyn Task, &mut Context<'_>) -> R,
    ) -> Option<R> {
        let result = self.invoke_one(id, now, f);
        self.deliver_display_notices(now);
        result
    }

    fn invoke_one<R>(
        &mut self,
        id: TaskId,
        now: Timestamp,
        f: impl FnOnce(&mut dyn Task, &mut Context<'_>) -> R,
    ) -> Option<R> {
        let mut task = self.slots.get_mut(id.0)?.task.take()?;
        let result = {
            let mut ctx = Context::new(now, id, &mut self.slots);
            f(task.as_mut(), &mut ctx)
        };
        self.slots[id.0].task = Some(task);
        Some(result)
    }

    /// Drains the arbiters' queued active/inactive transitions and calls
    /// `display_notify` on the affected producers.
    ///
    /// Notifications are deferred to this point so a notified producer can
    /// call straight back into the arbiter.
    fn deliver_display_notices(&mut self, now: Timestamp) {
        loop {
            let notices: Vec<DisplayNotice> = self
                .slots
                .iter_mut()
                .filter_map(|s| s.task.as_deref_mut()?.as_display_mut())
                .flat_map(|display| display.take_notices())
                .collect();
            if notices.is_empty() {
                break;
            }
            for notice in notices {
                self.invoke_one(notice.task, now, |task, ctx| {
                    task.display_notify(ctx, notice.active)
                });
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
