/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::{error, info, warn};

use vfdd::config::Config;
use vfdd::hostio::SysfsIo;
use vfdd::scheduler::{Scheduler, SystemClock};
use vfdd::task::Registry;

const DEFAULT_CONFIG: &str = "/etc/vfdd.yaml";

/// Raised by SIGINT/SIGTERM; polled once per scheduler iteration.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

// ── CLI argument definition ───────────────────────────────────────────────────

/// Front-panel display daemon.
///
/// Example:
///   vfdd -v /etc/vfdd.yaml
#[derive(Debug, Parser)]
#[command(
    name = "vfdd",
    version,
    about = "vfdd – multiplexes clock, disk, temperature and suspend state on a front-panel display",
    long_about = None,
)]
struct Cli {
    /// Log every scheduler and arbiter step (same as RUST_LOG=trace).
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    verbose: bool,

    /// Path to the YAML configuration file.
    #[arg(default_value = DEFAULT_CONFIG)]
    config: PathBuf,
}

// ── Signals ───────────────────────────────────────────────────────────────────

extern "C" fn request_shutdown(_signal: libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

fn install_signal_handlers() {
    let action = SigAction::new(
        SigHandler::Handler(request_shutdown),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in [Signal::SIGINT, Signal::SIGTERM] {
        // SAFETY: the handler only stores to an atomic, which is
        // async-signal-safe.
        if let Err(e) = unsafe { sigaction(signal, &action) } {
            warn!("cannot install {:?} handler: {}", signal, e);
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    // Level is controlled by RUST_LOG (e.g. RUST_LOG=debug); -v forces trace.
    let default_level = if cli.verbose { "trace" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    info!(config = %cli.config.display(), verbose = cli.verbose, "vfdd starting up");

    // ── Load configuration ────────────────────────────────────────────────────
    let config = match Config::load_from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            process::exit(1);
        }
    };

    // ── Build tasks ───────────────────────────────────────────────────────────
    let registry = match Registry::from_config(&config, Arc::new(SysfsIo)) {
        Ok(registry) => registry,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    install_signal_handlers();

    Scheduler::new(registry, SystemClock).run(&SHUTDOWN);

    info!("vfdd stopped");
}
