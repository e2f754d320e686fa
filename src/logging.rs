// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Logging setup: `tracing` fanned out to stderr plus a rolling file
//! appender under `COREDIR`, bridged from the `log` facade so dependencies
//! that only know `log::*` still show up. On-device builds additionally
//! route through `android_logger` so output reaches `logcat`.

use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Initializes global logging. Returns the appender guard; drop it only at
/// process exit or buffered log lines are lost.
pub fn init_logging(coredir: &Path, verbose: bool) -> tracing_appender::non_blocking::WorkerGuard {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_appender = tracing_appender::rolling::never(coredir, "daemon.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    let _ = tracing_log::LogTracer::init();

    #[cfg(target_os = "android")]
    android_logger::init_once(
        android_logger::Config::default().with_max_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }),
    );

    guard
}
