/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Suspend indicator.
//!
//! Listens for kernel uevents on a netlink socket.  When the panel driver
//! reports its device going `offline` the task pins a fixed text to the
//! display, lights a set of lamps and dims the panel; `online` undoes all of
//! it.
//!
//! ```text
//! listener thread                          scheduler thread
//! ───────────────                          ────────────────
//! poll(netlink, 500 ms)
//! recvfrom → parse_uevent → PowerEvent ──mpsc──► run(): drain channel
//! attention.raise() ─────────────────────────────► (woken early)
//! ```
//!
//! The listener only ever touches the channel and the attention flag; every
//! display operation happens in `run()` on the scheduler thread.  The mpsc
//! channel carries the event itself across threads; the flag only wakes the
//! scheduler, so a wake with an empty channel is harmless.

use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::socket::{
    bind, recvfrom, setsockopt, socket, sockopt, AddressFamily, NetlinkAddr, SockFlag,
    SockProtocol, SockType,
};
use tracing::{debug, info, trace, warn};

use super::DisplayLink;
use crate::display::PRIORITY_MAX;
use crate::error::TaskError;
use crate::task::{Attention, Context, Task, TaskEnv};

pub const DEFAULT_TEXT: &str = "----";
pub const DEFAULT_INDICATORS: &str = "";
pub const DEFAULT_BRIGHTNESS: i64 = 10;
pub const DEFAULT_MATCH: &str = "vfd";

const RECV_BUFFER: usize = 16 * 1024;
/// How often the listener looks at its stop flag.
const POLL_MS: u16 = 500;
const IDLE_MS: u64 = 10_000;

// ── Uevent decoding ───────────────────────────────────────────────────────────

/// Power transition reported for the watched device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    Suspend,
    Resume,
}

/// The two fields of a kernel uevent this task cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uevent<'a> {
    pub action: &'a str,
    pub devpath: &'a str,
}

impl Uevent<'_> {
    /// Maps `offline`/`online` of a device whose path contains `pattern`.
    pub fn power_event(&self, pattern: &str) -> Option<PowerEvent> {
        if !self.devpath.contains(pattern) {
            return None;
        }
        match self.action {
            "offline" => Some(PowerEvent::Suspend),
            "online" => Some(PowerEvent::Resume),
            _ => None,
        }
    }
}

/// Decodes a kernel uevent datagram: `ACTION@DEVPATH\0KEY=VALUE\0...`.
///
/// `ACTION=` and `DEVPATH=` properties override the header.  Messages
/// re-broadcast by udev (`libudev` magic) are not kernel uevents and yield
/// `None`, as do datagrams without a usable header.
pub fn parse_uevent(msg: &[u8]) -> Option<Uevent<'_>> {
    if msg.starts_with(b"libudev") {
        return None;
    }

    let mut parts = msg
        .split(|b| *b == 0)
        .filter_map(|p| std::str::from_utf8(p).ok());
    let (mut action, mut devpath) = parts.next()?.split_once('@')?;

    for prop in parts {
        match prop.split_once('=') {
            Some(("ACTION", v)) => action = v,
            Some(("DEVPATH", v)) => devpath = v,
            _ => {}
        }
    }

    if action.is_empty() || devpath.is_empty() {
        return None;
    }
    Some(Uevent { action, devpath })
}

// ── Netlink listener ──────────────────────────────────────────────────────────

/// Opens a non-blocking socket subscribed to every uevent multicast group.
fn open_uevent_socket() -> Result<OwnedFd, Errno> {
    let sock = socket(
        AddressFamily::Netlink,
        SockType::Datagram,
        SockFlag::SOCK_CLOEXEC | SockFlag::SOCK_NONBLOCK,
        SockProtocol::NetlinkKObjectUEvent,
    )?;

    // needs CAP_NET_ADMIN; the default buffer is usually enough
    if let Err(e) = setsockopt(&sock, sockopt::RcvBufForce, &RECV_BUFFER) {
        debug!("uevent socket: cannot force receive buffer: {}", e);
    }

    bind(sock.as_raw_fd(), &NetlinkAddr::new(0, u32::MAX))?;
    Ok(sock)
}

struct Listener {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Listener {
    fn spawn(
        name: &str,
        sock: OwnedFd,
        pattern: String,
        events: Sender<PowerEvent>,
        attention: Attention,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name(format!("{}-uevent", name))
            .spawn(move || listen(sock, &pattern, &events, &attention, &thread_stop))?;
        Ok(Self { stop, handle })
    }

    fn stop(self) {
        self.stop.store(true, Ordering::Release);
        if self.handle.join().is_err() {
            warn!("uevent listener panicked");
        }
    }
}

fn listen(
    sock: OwnedFd,
    pattern: &str,
    events: &Sender<PowerEvent>,
    attention: &Attention,
    stop: &AtomicBool,
) {
    let mut buf = vec![0u8; RECV_BUFFER];

    while !stop.load(Ordering::Acquire) {
        let mut fds = [PollFd::new(sock.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(POLL_MS)) {
            Ok(0) | Err(Errno::EINTR) => continue,
            Ok(_) => {}
            Err(e) => {
                warn!("uevent poll failed, listener exiting: {}", e);
                return;
            }
        }
        let readable = fds[0]
            .revents()
            .is_some_and(|r| r.contains(PollFlags::POLLIN));
        if !readable {
            continue;
        }

        // drain everything queued
        loop {
            let (len, sender) = match recvfrom::<NetlinkAddr>(sock.as_raw_fd(), &mut buf) {
                Ok(received) => received,
                Err(Errno::EINTR) => continue,
                Err(Errno::EAGAIN) => break,
                Err(e) => {
                    debug!("uevent recv failed: {}", e);
                    break;
                }
            };

            // only the kernel (port id 0) sends real uevents
            if sender.map_or(true, |a| a.pid() != 0) {
                trace!("dropping uevent from user space");
                continue;
            }

            let Some(uevent) = parse_uevent(&buf[..len]) else {
                continue;
            };
            trace!("uevent {} {}", uevent.action, uevent.devpath);

            if let Some(event) = uevent.power_event(pattern) {
                if events.send(event).is_err() {
                    return;
                }
                attention.raise();
            }
        }
    }
}

// ── Task ──────────────────────────────────────────────────────────────────────

pub struct SuspendTask {
    text: String,
    indicators: Vec<String>,
    brightness: i64,
    pattern: String,
    display: DisplayLink,
    attention: Attention,
    events: Receiver<PowerEvent>,
    /// Socket and channel end handed to the listener in `post_init`.
    pending: Option<(OwnedFd, Sender<PowerEvent>)>,
    listener: Option<Listener>,
    /// Brightness to restore on resume; `Some` while suspended.
    saved_brightness: Option<i64>,
}

impl SuspendTask {
    /// Reads settings and opens the uevent socket.
    ///
    /// # Errors
    /// [`TaskError::EventSocket`] if the netlink socket cannot be opened.
    pub fn new(env: &TaskEnv<'_>) -> Result<Self, TaskError> {
        let sock = open_uevent_socket().map_err(TaskError::EventSocket)?;
        let (mut task, sender) = Self::configure(env);
        task.pending = Some((sock, sender));
        Ok(task)
    }

    pub fn boxed(env: &TaskEnv<'_>) -> Result<Box<dyn Task>, TaskError> {
        Ok(Box::new(Self::new(env)?))
    }

    /// Settings only, no socket.  Events are fed through the returned sender.
    fn configure(env: &TaskEnv<'_>) -> (Self, Sender<PowerEvent>) {
        let instance = env.instance;
        let cfg = env.config;
        let (sender, events) = mpsc::channel();

        let task = Self {
            text: cfg.get_string(Some(instance), "text", DEFAULT_TEXT),
            indicators: cfg
                .get_string(Some(instance), "indicators", DEFAULT_INDICATORS)
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            brightness: cfg.get_int(Some(instance), "brightness", DEFAULT_BRIGHTNESS),
            pattern: cfg.get_string(Some(instance), "match", DEFAULT_MATCH),
            display: DisplayLink::from_config(env),
            attention: env.attention.clone(),
            events,
            pending: None,
            listener: None,
            saved_brightness: None,
        };

        debug!(
            "  text '{}' indicators {:?} brightness {} match '{}' display '{}'",
            task.text,
            task.indicators,
            task.brightness,
            task.pattern,
            task.display.name()
        );
        (task, sender)
    }

    fn apply(&mut self, ctx: &mut Context<'_>, event: PowerEvent) {
        let me = ctx.id();
        let name = ctx.name().to_string();
        let Some(display) = self.display.get(ctx) else {
            return;
        };

        match (event, self.saved_brightness) {
            (PowerEvent::Suspend, None) => {
                info!("{}: display suspended", name);
                display.set_display(me, PRIORITY_MAX, Some(self.text.as_str()));
                for ind in &self.indicators {
                    display.set_indicator(me, ind, true);
                }
                self.saved_brightness = Some(display.brightness());
                display.set_brightness(self.brightness);
            }
            (PowerEvent::Resume, Some(saved)) => {
                info!("{}: display resumed", name);
                for ind in &self.indicators {
                    display.set_indicator(me, ind, false);
                }
                display.set_display(me, 0, None);
                display.set_brightness(saved);
                self.saved_brightness = None;
            }
            (event, _) => debug!("{}: {:?} ignored, already in that state", name, event),
        }
    }
}

impl Task for SuspendTask {
    fn post_init(&mut self, ctx: &mut Context<'_>) {
        self.display.resolve(ctx);

        let Some((sock, sender)) = self.pending.take() else {
            return;
        };
        let pattern = self.pattern.clone();
        match Listener::spawn(ctx.name(), sock, pattern, sender, self.attention.clone()) {
            Ok(listener) => self.listener = Some(listener),
            Err(e) => warn!("{}: cannot start uevent listener: {}", ctx.name(), e),
        }
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> u64 {
        trace!("{}: run", ctx.name());

        while let Ok(event) = self.events.try_recv() {
            self.apply(ctx, event);
        }

        IDLE_MS
    }

    fn fini(&mut self, ctx: &mut Context<'_>) {
        if let Some(listener) = self.listener.take() {
            trace!("{}: stopping uevent listener", ctx.name());
            listener.stop();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
