/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Display arbitration engine.
//!
//! [`DisplayArbiter`] owns the single-line text display and its indicator
//! lamps.  Producer tasks request display time through
//! [`set_display`](DisplayArbiter::set_display) and lamps through
//! [`set_indicator`](DisplayArbiter::set_indicator); the arbiter keeps one
//! display user per producer and, on its own scheduled runs, time-shares the
//! text between them.
//!
//! # Arbitration rules
//!
//! | Topic | Rule |
//! |---|---|
//! | Slice length | `quantum * priority / min_priority`, cut short to the next multiple of `quantum` on the wall clock |
//! | Rotation | list order, starting after the active user, skipping users with no text |
//! | `PRIORITY_MAX` | takes the display immediately and never rotates away |
//! | Lamps | lamp *i* lit iff any user requests it, whoever owns the text |
//! | `min_priority` | lowest priority ever seen; never rises again |
//!
//! Device writes happen only from [`tick`](DisplayArbiter::tick) (plus
//! brightness, which is not arbitrated), and only when the rendered value
//! changed.  A failed write leaves the previous rendered state in place, so
//! it is naturally retried on the next run.

pub mod indicator;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::error::TaskError;
use crate::hostio::{self, HostIo};
use crate::task::{Attention, Context, Task, TaskEnv, TaskId, Timestamp};

use indicator::{format_overlay, parse_catalogue, parse_overlay, Indicator};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Priority that pins the display to one user.
pub const PRIORITY_MAX: i64 = 1_000_000;

/// Priority producers use unless configured otherwise.
pub const DEFAULT_PRIORITY: i64 = 100;

pub const DEFAULT_DEVICE: &str = "/sys/bus/platform/devices/meson-vfd.14";
pub const DEFAULT_BRIGHTNESS: i64 = 50;
pub const DEFAULT_QUANTUM_MS: u64 = 5000;

/// Delay returned when nobody wants the display.
const IDLE_DELAY_MS: u64 = 1_000_000;

/// Per-user lamp requests are a `u64` bitmask over the catalogue.
const MAX_INDICATORS: usize = 64;

// ── Types ─────────────────────────────────────────────────────────────────────

/// A pending `display_notify` call for a producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayNotice {
    pub task: TaskId,
    pub active: bool,
}

/// Per-producer display request.
#[derive(Debug)]
struct DisplayUser {
    /// Owning producer (non-owning back-reference).
    task: TaskId,
    /// `None` = not requesting display time.
    text: Option<String>,
    priority: i64,
    /// Bit *i* set ⇒ this user wants catalogue indicator *i* lit.
    indicators: u64,
}

// ── DisplayArbiter ────────────────────────────────────────────────────────────

/// The task owning the shared display device.
pub struct DisplayArbiter {
    instance: String,
    io: Arc<dyn HostIo>,
    device: PathBuf,
    attention: Attention,

    indicators: Vec<Indicator>,
    /// Overlay bits not driven by any catalogue indicator.
    base_overlay: Vec<u16>,

    brightness: i64,
    brightness_max: i64,
    quantum: u64,
    min_priority: i64,

    users: Vec<DisplayUser>,
    active: Option<TaskId>,
    /// Wall-clock `(start, end)` ms of the active user's slice; `None` means
    /// a fresh slice must be computed on the next run.
    slice: Option<(u64, u64)>,

    shown_text: Option<String>,
    shown_overlay: Option<Vec<u16>>,
    notices: Vec<DisplayNotice>,
}

impl DisplayArbiter {
    /// Opens the configured device and reads its indicator catalogue.
    ///
    /// # Errors
    /// * [`TaskError::DeviceMissing`] if the device path does not exist.
    /// * [`TaskError::DeviceIncompatible`] if `dotled` or `overlay` cannot be read.
    /// * [`TaskError::ConfigInvalid`] if `quantum` is not positive.
    pub fn new(env: &TaskEnv<'_>) -> Result<Self, TaskError> {
        let instance = env.instance;
        let cfg = env.config;
        let io = Arc::clone(&env.io);

        let device = PathBuf::from(cfg.get_string(Some(instance), "device", DEFAULT_DEVICE));
        if !io.exists(&device) {
            return Err(TaskError::DeviceMissing { device });
        }

        let brightness = cfg.get_int(Some(instance), "brightness", DEFAULT_BRIGHTNESS);
        let quantum = cfg.get_int(Some(instance), "quantum", DEFAULT_QUANTUM_MS as i64);
        let quantum = u64::try_from(quantum)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                TaskError::config(format!("{}.quantum", instance), "must be at least 1 ms")
            })?;

        debug!(
            "  device [{}] brightness {} quantum {}",
            device.display(),
            brightness,
            quantum
        );

        let catalogue = hostio::read_string(io.as_ref(), &device.join("dotled")).map_err(|e| {
            TaskError::DeviceIncompatible {
                device: device.clone(),
                reason: format!("cannot read indicator catalogue: {}", e),
            }
        })?;
        let overlay = hostio::read_string(io.as_ref(), &device.join("overlay")).map_err(|e| {
            TaskError::DeviceIncompatible {
                device: device.clone(),
                reason: format!("cannot read overlay: {}", e),
            }
        })?;
        let mut base_overlay = parse_overlay(&overlay);

        let mut indicators = Vec::new();
        for ind in parse_catalogue(&catalogue) {
            if ind.word >= base_overlay.len() {
                warn!(
                    "{}: indicator '{}' uses overlay word {} but device has {}, ignoring",
                    instance,
                    ind.name,
                    ind.word,
                    base_overlay.len()
                );
            } else if indicators.len() == MAX_INDICATORS {
                warn!("{}: too many indicators, ignoring '{}'", instance, ind.name);
            } else {
                base_overlay[ind.word] &= !ind.mask;
                indicators.push(ind);
            }
        }

        let brightness_max = hostio::read_int(io.as_ref(), &device.join("brightness_max"))
            .unwrap_or_else(|| {
                warn!("{}: brightness_max unreadable, assuming 100", instance);
                100
            });

        let mut arbiter = Self {
            instance: instance.to_string(),
            io,
            device,
            attention: env.attention.clone(),
            indicators,
            base_overlay,
            brightness,
            brightness_max,
            quantum,
            min_priority: PRIORITY_MAX,
            users: Vec::new(),
            active: None,
            slice: None,
            shown_text: None,
            shown_overlay: None,
            notices: Vec::new(),
        };
        arbiter.set_brightness(brightness);

        info!(
            "{}: {} indicator(s), {} overlay word(s)",
            arbiter.instance,
            arbiter.indicators.len(),
            arbiter.base_overlay.len()
        );
        Ok(arbiter)
    }

    /// Registry constructor.
    pub fn boxed(env: &TaskEnv<'_>) -> Result<Box<dyn Task>, TaskError> {
        Ok(Box::new(Self::new(env)?))
    }

    // ── Public operations ─────────────────────────────────────────────────────

    /// Display `text` on behalf of `source`.
    ///
    /// Only one text per producer is kept; a new one replaces the old.  With
    /// `text == None` or `priority < 1` the producer's display user is
    /// removed (a no-op if it has none).
    pub fn set_display(&mut self, source: TaskId, priority: i64, text: Option<&str>) {
        trace!(
            "{}: set_display {:?} prio {} from {:?}",
            self.instance,
            text,
            priority,
            source
        );

        let text = match text {
            Some(text) if priority >= 1 => text,
            _ => return self.remove_user(source),
        };

        let index = self.user_index_or_insert(source);
        let user = &mut self.users[index];
        let old_priority = user.priority;
        user.text = Some(text.to_string());
        user.priority = priority;

        if priority < self.min_priority {
            self.min_priority = priority;
        }

        if priority == PRIORITY_MAX {
            self.switch_to(Some(source));
            self.slice = None;
            self.attention.raise();
        } else if self.active == Some(source) {
            if old_priority != priority {
                self.slice = None;
            }
            self.attention.raise();
        } else if self.active.is_none() {
            // Display was idle: pick this user up right away.
            self.attention.raise();
        }
    }

    /// Turn the named lamp on or off on behalf of `source`.
    ///
    /// Unknown indicator names are logged and ignored.
    pub fn set_indicator(&mut self, source: TaskId, name: &str, enable: bool) {
        trace!(
            "{}: set_indicator '{}' {}",
            self.instance,
            name,
            if enable { "on" } else { "off" }
        );

        let Some(bit) = self.indicators.iter().position(|i| i.name == name) else {
            warn!("{}: {}", self.instance, TaskError::UnknownIndicator(name.to_string()));
            return;
        };

        let index = self.user_index_or_insert(source);
        let user = &mut self.users[index];
        if enable {
            user.indicators |= 1 << bit;
        } else {
            user.indicators &= !(1 << bit);
        }

        let merged_changed = self.shown_overlay.as_deref() != Some(&self.merged_overlay()[..]);
        if self.active == Some(source) || merged_changed {
            self.attention.raise();
        }
    }

    /// Change brightness (0–100 %), written straight to the device.
    pub fn set_brightness(&mut self, value: i64) {
        let value = value.clamp(0, 100);
        trace!("{}: set_brightness {}", self.instance, value);

        self.brightness = value;
        let raw = (value * self.brightness_max + 50) / 100;
        if let Err(e) = hostio::write_int(self.io.as_ref(), &self.device.join("brightness"), raw) {
            warn!("{}: {}", self.instance, e);
        }
    }

    /// Current brightness in percent.
    pub fn brightness(&self) -> i64 {
        self.brightness
    }

    /// `true` if `source` currently owns the displayed text.
    pub fn is_active(&self, source: TaskId) -> bool {
        self.active == Some(source)
    }

    pub fn active(&self) -> Option<TaskId> {
        self.active
    }

    pub fn min_priority(&self) -> i64 {
        self.min_priority
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Overlay words as they should currently be shown: the device's
    /// non-indicator bits OR every user's requested lamps.
    pub fn merged_overlay(&self) -> Vec<u16> {
        let requested = self.users.iter().fold(0u64, |acc, u| acc | u.indicators);
        let mut words = self.base_overlay.clone();
        for (bit, ind) in self.indicators.iter().enumerate() {
            if requested & (1 << bit) != 0 {
                words[ind.word] |= ind.mask;
            }
        }
        words
    }

    /// Hands out the queued active/inactive transitions.
    pub fn take_notices(&mut self) -> Vec<DisplayNotice> {
        std::mem::take(&mut self.notices)
    }

    // ── Scheduling ────────────────────────────────────────────────────────────

    /// One arbiter run at wall-clock `now`; returns the delay until the next.
    pub fn tick(&mut self, now: Timestamp) -> u64 {
        let now = now.as_millis();
        trace!("{}: run", self.instance);

        // A clock stepped back before the slice start ends the slice too.
        let expired = match self.slice {
            Some((start, end)) => now >= end || now < start,
            None => self.active.is_none(),
        };
        if expired {
            self.pick_next();
            self.slice = None;
        }

        let active = self
            .active_user()
            .map(|u| (u.text.clone().unwrap_or_default(), u.priority));

        self.render_overlay(false);

        let Some((text, priority)) = active else {
            self.render_text("", false);
            self.slice = None;
            return IDLE_DELAY_MS;
        };
        self.render_text(&text, false);

        let end = match self.slice {
            Some((_, end)) => end,
            None => {
                let end = now + self.slice_len(priority, now);
                self.slice = Some((now, end));
                end
            }
        };
        end - now
    }

    /// Advance to the next user that wants the display.
    fn pick_next(&mut self) {
        if self.active_user().map(|u| u.priority) == Some(PRIORITY_MAX) {
            return;
        }

        let count = self.users.len();
        let start = self
            .active
            .and_then(|a| self.user_index(a))
            .map_or(0, |i| i + 1);

        let next = (0..count)
            .map(|k| &self.users[(start + k) % count])
            .find(|u| u.text.is_some())
            .map(|u| u.task);

        self.switch_to(next);
    }

    /// Slice for `priority`, aligned to the shared `quantum` grid.
    fn slice_len(&self, priority: i64, now: u64) -> u64 {
        let slice = self.quantum.saturating_mul(priority.max(1) as u64)
            / self.min_priority.max(1) as u64;
        let adj = now % self.quantum;
        if slice > adj {
            slice - adj
        } else {
            self.quantum - adj
        }
    }

    fn switch_to(&mut self, next: Option<TaskId>) {
        if next == self.active {
            return;
        }
        if let Some(prev) = self.active {
            self.notices.push(DisplayNotice {
                task: prev,
                active: false,
            });
        }
        if let Some(task) = next {
            self.notices.push(DisplayNotice { task, active: true });
        }
        debug!(
            "{}: display switched {:?} -> {:?}",
            self.instance, self.active, next
        );
        self.active = next;
    }

    fn remove_user(&mut self, source: TaskId) {
        let Some(index) = self.user_index(source) else {
            return;
        };
        let user = self.users.remove(index);

        if self.active == Some(source) {
            self.switch_to(None);
            self.slice = None;
            self.attention.raise();
        } else if user.indicators != 0 {
            self.attention.raise();
        }
    }

    fn user_index(&self, task: TaskId) -> Option<usize> {
        self.users.iter().position(|u| u.task == task)
    }

    fn user_index_or_insert(&mut self, task: TaskId) -> usize {
        match self.user_index(task) {
            Some(index) => index,
            None => {
                self.users.push(DisplayUser {
                    task,
                    text: None,
                    priority: DEFAULT_PRIORITY,
                    indicators: 0,
                });
                self.users.len() - 1
            }
        }
    }

    fn active_user(&self) -> Option<&DisplayUser> {
        self.active
            .and_then(|a| self.user_index(a))
            .map(|i| &self.users[i])
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    fn render_text(&mut self, text: &str, force: bool) {
        if !force && self.shown_text.as_deref() == Some(text) {
            return;
        }
        trace!("{}: show [{}]", self.instance, text);
        match hostio::write_str(self.io.as_ref(), &self.device.join("display"), text) {
            Ok(()) => self.shown_text = Some(text.to_string()),
            Err(e) => warn!("{}: {}", self.instance, e),
        }
    }

    fn render_overlay(&mut self, force: bool) {
        let words = self.merged_overlay();
        if !force && self.shown_overlay.as_ref() == Some(&words) {
            return;
        }
        let formatted = format_overlay(&words);
        trace!("{}: overlay [{}]", self.instance, formatted);
        match hostio::write_str(self.io.as_ref(), &self.device.join("overlay"), &formatted) {
            Ok(()) => self.shown_overlay = Some(words),
            Err(e) => warn!("{}: {}", self.instance, e),
        }
    }

    /// Drop every user and blank the device.
    pub fn shutdown(&mut self) {
        self.users.clear();
        self.active = None;
        self.slice = None;
        self.notices.clear();
        self.render_text("", true);
        self.render_overlay(true);
    }
}

impl Task for DisplayArbiter {
    fn run(&mut self, ctx: &mut Context<'_>) -> u64 {
        self.tick(ctx.now())
    }

    fn fini(&mut self, _ctx: &mut Context<'_>) {
        self.shutdown();
    }

    fn as_display_mut(&mut self) -> Option<&mut DisplayArbiter> {
        Some(self)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::hostio::MemoryIo;

    const DEV: &str = "/dev/vfd";

    /// Device with three lamps:
    ///   colon – word 0 bit 1
    ///   hdd   – word 1 bit 2
    ///   lan   – word 1 bit 3
    /// and a non-lamp bit set in each overlay word.
    fn fake_device() -> Arc<MemoryIo> {
        let io = Arc::new(MemoryIo::new());
        io.add_dir(DEV);
        io.put(format!("{DEV}/dotled"), "colon 0 0 1\nhdd 0 1 2\nlan 0 1 3\n");
        io.put(format!("{DEV}/overlay"), "0003 0100");
        io.put(format!("{DEV}/brightness_max"), "7\n");
        io
    }

    fn arbiter_on(io: &Arc<MemoryIo>, quantum: u64) -> (DisplayArbiter, Attention) {
        let mut cfg = Config::new();
        cfg.set("display.device", DEV);
        cfg.set("display.quantum", quantum.to_string());
        let attention = Attention::new();
        let env = TaskEnv {
            instance: "display",
            id: TaskId(0),
            attention: attention.clone(),
            config: &cfg,
            io: Arc::clone(io) as Arc<dyn HostIo>,
        };
        (DisplayArbiter::new(&env).unwrap(), attention)
    }

    fn at(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    const A: TaskId = TaskId(1);
    const B: TaskId = TaskId(2);
    const C: TaskId = TaskId(3);

    // ── Construction ──────────────────────────────────────────────────────────

    #[test]
    fn missing_device_is_rejected() {
        let io: Arc<dyn HostIo> = Arc::new(MemoryIo::new());
        let cfg = Config::new();
        let env = TaskEnv {
            instance: "display",
            id: TaskId(0),
            attention: Attention::new(),
            config: &cfg,
            io,
        };
        assert!(matches!(
            DisplayArbiter::new(&env),
            Err(TaskError::DeviceMissing { .. })
        ));
    }

    #[test]
    fn device_without_catalogue_is_incompatible() {
        let io = Arc::new(MemoryIo::new());
        io.add_dir(DEV);
        io.put(format!("{DEV}/overlay"), "0000");
        let mut cfg = Config::new();
        cfg.set("display.device", DEV);
        let env = TaskEnv {
            instance: "display",
            id: TaskId(0),
            attention: Attention::new(),
            config: &cfg,
            io: io as Arc<dyn HostIo>,
        };
        assert!(matches!(
            DisplayArbiter::new(&env),
            Err(TaskError::DeviceIncompatible { .. })
        ));
    }

    #[test]
    fn zero_quantum_is_invalid_config() {
        let io = fake_device();
        let mut cfg = Config::new();
        cfg.set("display.device", DEV);
        cfg.set("display.quantum", "0");
        let env = TaskEnv {
            instance: "display",
            id: TaskId(0),
            attention: Attention::new(),
            config: &cfg,
            io: io as Arc<dyn HostIo>,
        };
        assert!(matches!(
            DisplayArbiter::new(&env),
            Err(TaskError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn construction_applies_configured_brightness() {
        let io = fake_device();
        let (disp, _) = arbiter_on(&io, 1000);
        // 50 % of 7, rounded
        assert_eq!(io.get(format!("{DEV}/brightness")).as_deref(), Some("4"));
        assert_eq!(disp.brightness(), 50);
    }

    #[test]
    fn brightness_is_clamped_and_scaled() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);

        disp.set_brightness(150);
        assert_eq!(io.get(format!("{DEV}/brightness")).as_deref(), Some("7"));
        disp.set_brightness(-3);
        assert_eq!(io.get(format!("{DEV}/brightness")).as_deref(), Some("0"));
        disp.set_brightness(20);
        assert_eq!(io.get(format!("{DEV}/brightness")).as_deref(), Some("1"));
        assert_eq!(disp.brightness(), 20);
    }

    // ── Arbitration ───────────────────────────────────────────────────────────

    #[test]
    fn idle_arbiter_sleeps_long() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        assert_eq!(disp.tick(at(0)), IDLE_DELAY_MS);
        assert_eq!(disp.active(), None);
    }

    #[test]
    fn first_user_wakes_idle_arbiter() {
        let io = fake_device();
        let (mut disp, attention) = arbiter_on(&io, 1000);
        disp.set_display(A, 100, Some("1200"));
        assert!(attention.is_raised());

        disp.tick(at(0));
        assert!(disp.is_active(A));
        assert_eq!(io.get(format!("{DEV}/display")).as_deref(), Some("1200"));
    }

    #[test]
    fn priority_max_pins_the_display() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        disp.set_display(A, 100, Some("aaaa"));
        disp.set_display(B, 50, Some("bbbb"));
        disp.tick(at(0));
        assert!(disp.is_active(A));

        disp.set_display(C, PRIORITY_MAX, Some("susp"));
        assert!(disp.is_active(C), "pinned user is active immediately");

        let mut now = 0;
        for _ in 0..20 {
            now += disp.tick(at(now));
            assert!(disp.is_active(C));
        }
        assert_eq!(io.get(format!("{DEV}/display")).as_deref(), Some("susp"));
    }

    #[test]
    fn later_priority_max_supersedes_earlier() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        disp.set_display(A, PRIORITY_MAX, Some("aaaa"));
        disp.set_display(B, PRIORITY_MAX, Some("bbbb"));
        assert!(disp.is_active(B));
    }

    #[test]
    fn slices_are_proportional_to_priority() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        disp.set_display(A, 300, Some("aaaa"));
        disp.set_display(B, 100, Some("bbbb"));

        let mut now = 0;
        let mut owned = [0u64; 2];
        for _ in 0..6 {
            let delay = disp.tick(at(now));
            let slot = if disp.is_active(A) { 0 } else { 1 };
            owned[slot] += delay;
            now += delay;
        }
        // three visits each: A gets 3 × 3000 ms, B 3 × 1000 ms
        assert_eq!(owned, [9000, 3000]);
    }

    #[test]
    fn slice_end_is_aligned_to_quantum_grid() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        disp.set_display(A, 100, Some("aaaa"));

        assert_eq!(disp.tick(at(10_234)), 766);
        // attention wake mid-slice keeps the same end
        assert_eq!(disp.tick(at(10_500)), 500);
    }

    #[test]
    fn clock_stepping_back_ends_the_current_slice() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        disp.set_display(A, 100, Some("aaaa"));
        disp.set_display(B, 100, Some("bbbb"));

        assert_eq!(disp.tick(at(3_600_000)), 1000);
        assert!(disp.is_active(A));

        // wall clock set back by an hour
        assert_eq!(disp.tick(at(1_000)), 1000);
        assert!(disp.is_active(B));
        assert_eq!(io.get(format!("{DEV}/display")).as_deref(), Some("bbbb"));
    }

    #[test]
    fn rotation_follows_list_order_and_skips_textless_users() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        disp.set_display(A, 100, Some("aaaa"));
        disp.set_indicator(B, "hdd", true); // B has no text
        disp.set_display(C, 100, Some("cccc"));

        let mut now = 0;
        let mut seen = Vec::new();
        for _ in 0..4 {
            now += disp.tick(at(now));
            seen.push(disp.active().unwrap());
        }
        assert_eq!(seen, vec![A, C, A, C]);
    }

    #[test]
    fn attention_wake_does_not_advance_rotation() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        disp.set_display(A, 100, Some("aaaa"));
        disp.set_display(B, 100, Some("bbbb"));

        disp.tick(at(0));
        assert!(disp.is_active(A));
        disp.set_display(A, 100, Some("aaab"));
        disp.tick(at(200));
        assert!(disp.is_active(A));
        assert_eq!(io.get(format!("{DEV}/display")).as_deref(), Some("aaab"));
    }

    #[test]
    fn text_update_of_active_user_raises_attention() {
        let io = fake_device();
        let (mut disp, attention) = arbiter_on(&io, 1000);
        disp.set_display(A, 100, Some("aaaa"));
        disp.set_display(B, 100, Some("bbbb"));
        disp.tick(at(0));
        attention.take();

        disp.set_display(B, 100, Some("bbbc"));
        assert!(!attention.is_raised(), "inactive user waits for its slice");
        disp.set_display(A, 100, Some("aaab"));
        assert!(attention.is_raised());
    }

    #[test]
    fn transitions_queue_display_notices() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        disp.set_display(A, 100, Some("aaaa"));
        disp.set_display(B, 100, Some("bbbb"));

        let first = disp.tick(at(0));
        assert_eq!(
            disp.take_notices(),
            vec![DisplayNotice {
                task: A,
                active: true
            }]
        );
        disp.tick(at(first));
        assert_eq!(
            disp.take_notices(),
            vec![
                DisplayNotice {
                    task: A,
                    active: false
                },
                DisplayNotice {
                    task: B,
                    active: true
                },
            ]
        );
    }

    #[test]
    fn single_user_keeps_display_without_notice_storm() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        disp.set_display(A, 100, Some("aaaa"));
        let mut now = 0;
        for _ in 0..5 {
            now += disp.tick(at(now));
        }
        assert_eq!(disp.take_notices().len(), 1);
        assert_eq!(io.writes_to(format!("{DEV}/display")), vec!["aaaa"]);
    }

    // ── Removal ───────────────────────────────────────────────────────────────

    #[test]
    fn removal_is_idempotent() {
        let io = fake_device();
        let (mut disp, attention) = arbiter_on(&io, 1000);
        disp.set_display(A, 100, Some("aaaa"));
        disp.tick(at(0));
        disp.take_notices();

        disp.set_display(A, 0, None);
        assert_eq!(disp.user_count(), 0);
        assert_eq!(disp.take_notices().len(), 1);
        attention.take();

        disp.set_display(A, 0, None);
        assert_eq!(disp.user_count(), 0);
        assert!(disp.take_notices().is_empty());
        assert!(!attention.is_raised());
    }

    #[test]
    fn zero_priority_with_text_removes_user() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        disp.set_display(A, 100, Some("aaaa"));
        disp.set_display(A, 0, Some("aaaa"));
        assert_eq!(disp.user_count(), 0);
    }

    #[test]
    fn removing_pinned_user_wraps_to_head_of_list() {
        let io = fake_device();
        let (mut disp, attention) = arbiter_on(&io, 1000);
        disp.set_display(A, 100, Some("aaaa"));
        disp.set_display(B, 100, Some("bbbb"));
        disp.set_display(C, PRIORITY_MAX, Some("cccc"));
        assert!(disp.is_active(C));

        disp.tick(at(0));
        attention.take();
        disp.set_display(C, 0, None);
        assert_eq!(disp.active(), None);
        assert!(attention.is_raised(), "re-pick is forced promptly");

        disp.tick(at(100));
        assert!(disp.is_active(A));
        assert_eq!(io.get(format!("{DEV}/display")).as_deref(), Some("aaaa"));
    }

    #[test]
    fn last_user_leaving_blanks_display() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        disp.set_display(A, 100, Some("aaaa"));
        disp.tick(at(0));
        disp.set_display(A, 0, None);
        assert_eq!(disp.tick(at(10)), IDLE_DELAY_MS);
        assert_eq!(io.get(format!("{DEV}/display")).as_deref(), Some(""));
    }

    #[test]
    fn min_priority_never_rises_after_low_priority_user_leaves() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        disp.set_display(A, 100, Some("aaaa"));
        disp.set_display(B, 10, Some("bbbb"));
        assert_eq!(disp.min_priority(), 10);

        disp.set_display(B, 0, None);
        assert_eq!(disp.min_priority(), 10);

        // A alone now gets 1000 * 100 / 10 ms per slice
        assert_eq!(disp.tick(at(0)), 10_000);
    }

    // ── Indicators ────────────────────────────────────────────────────────────

    #[test]
    fn indicators_are_or_of_all_users() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        // base bits: word0 0x0001 (0x0002 belongs to colon), word1 0x0100
        assert_eq!(disp.merged_overlay(), vec![0x0001, 0x0100]);

        disp.set_indicator(A, "hdd", true);
        disp.set_indicator(B, "hdd", true);
        disp.set_indicator(B, "lan", true);
        assert_eq!(disp.merged_overlay(), vec![0x0001, 0x010c]);

        disp.set_indicator(A, "hdd", false);
        assert_eq!(disp.merged_overlay(), vec![0x0001, 0x010c], "B still wants hdd");

        disp.set_display(B, 0, None);
        assert_eq!(disp.merged_overlay(), vec![0x0001, 0x0100]);
    }

    #[test]
    fn overlay_renders_even_without_an_active_user() {
        let io = fake_device();
        let (mut disp, attention) = arbiter_on(&io, 1000);
        disp.tick(at(0));
        attention.take();

        disp.set_indicator(A, "colon", true);
        assert!(attention.is_raised(), "lamp change wakes the arbiter");
        disp.tick(at(10));
        assert_eq!(io.get(format!("{DEV}/overlay")).as_deref(), Some("0003 0100"));
        assert_eq!(disp.active(), None);
    }

    #[test]
    fn overlay_written_only_on_change() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        disp.set_display(A, 100, Some("aaaa"));
        disp.set_indicator(A, "lan", true);
        disp.tick(at(0));
        disp.tick(at(100));
        disp.tick(at(200));
        assert_eq!(io.writes_to(format!("{DEV}/overlay")), vec!["0001 0108"]);
    }

    #[test]
    fn unknown_indicator_is_ignored() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        disp.set_indicator(A, "rocket", true);
        assert_eq!(disp.user_count(), 0);
    }

    #[test]
    fn failed_write_is_retried_on_next_run() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        disp.set_display(A, 100, Some("aaaa"));

        io.fail_writes(format!("{DEV}/display"), true);
        disp.tick(at(0));
        assert!(io.writes_to(format!("{DEV}/display")).is_empty());

        io.fail_writes(format!("{DEV}/display"), false);
        disp.tick(at(100));
        assert_eq!(io.writes_to(format!("{DEV}/display")), vec!["aaaa"]);
    }

    #[test]
    fn shutdown_blanks_display_and_lamps() {
        let io = fake_device();
        let (mut disp, _) = arbiter_on(&io, 1000);
        disp.set_display(A, 100, Some("aaaa"));
        disp.set_indicator(A, "hdd", true);
        disp.tick(at(0));

        disp.shutdown();
        assert_eq!(disp.user_count(), 0);
        assert_eq!(io.get(format!("{DEV}/display")).as_deref(), Some(""));
        assert_eq!(io.get(format!("{DEV}/overlay")).as_deref(), Some("0001 0100"));
    }
}
