// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! The boot-stage IPC boundary (spec.md 6): each entry point receives a
//! client handle, writes a single acknowledgement integer, and closes it.
//! The actual control protocol between client and daemon is out of scope
//! (spec.md 1); [`StageClient`] is the minimal ack-only seam the boot
//! driver depends on.

use std::io::Write;
use std::os::fd::{AsRawFd, FromRawFd, RawFd};

use anyhow::{Context, Result};

pub trait StageClient {
    /// Writes a single acknowledgement integer and closes the connection.
    /// No further bytes cross the boundary.
    fn ack(&mut self, code: i32) -> Result<()>;
}

pub struct FdStageClient {
    fd: RawFd,
}

impl FdStageClient {
    pub fn new(fd: RawFd) -> Self {
        Self { fd }
    }
}

impl StageClient for FdStageClient {
    fn ack(&mut self, code: i32) -> Result<()> {
        let mut file = unsafe { std::fs::File::from_raw_fd(self.fd) };
        let result = file
            .write_all(&code.to_ne_bytes())
            .context("write stage acknowledgement");
        // The fd is owned by the caller's IPC layer, not this struct; leak
        // the File so closing remains that layer's responsibility.
        std::mem::forget(file);
        result
    }
}

impl AsRawFd for FdStageClient {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

/// Stand-in used when a boot stage is invoked directly as a CLI subcommand
/// rather than over a live IPC connection — there is no caller fd to
/// acknowledge into, so the ack is simply logged.
pub struct NullStageClient;

impl StageClient for NullStageClient {
    fn ack(&mut self, code: i32) -> Result<()> {
        log::debug!("stage acknowledgement {code} (no IPC client attached)");
        Ok(())
    }
}

#[cfg(test)]
pub struct RecordingStageClient {
    pub acks: Vec<i32>,
}

#[cfg(test)]
impl Default for RecordingStageClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl RecordingStageClient {
    pub fn new() -> Self {
        Self { acks: Vec::new() }
    }
}

#[cfg(test)]
impl StageClient for RecordingStageClient {
    fn ack(&mut self, code: i32) -> Result<()> {
        self.acks.push(code);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_client_captures_acknowledgement() {
        let mut client = RecordingStageClient::new();
        client.ack(0).unwrap();
        assert_eq!(client.acks, vec![0]);
    }
}
