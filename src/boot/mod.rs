// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Boot-Stage Driver (spec.md 4.G): sequences `post-fs`, `post-fs-data` and
//! `late-start`, and owns the error-unblock semaphore.
//!
//! Per spec.md 9's redesign note, there is no process-global failure
//! handler here: every stage function returns plain `Result`s internally
//! and converts a stage-fatal error into a call to [`unblock`] at its own
//! boundary, instead of routing through shared indirection.

pub mod late_start;
pub mod post_fs;
pub mod post_fs_data;

use crate::config::Config;
use crate::defs;
use crate::image::LoopImage;
use crate::mounter::Mounter;
use crate::props::PropertyStore;

/// Everything one boot stage needs; borrowed for the stage's duration only
/// (spec.md 9: no shared global scratch buffers survive past a stage).
pub struct BootContext<'a> {
    pub config: &'a Config,
    pub mounter: &'a dyn Mounter,
    pub loop_image: &'a dyn LoopImage,
    pub props: &'a dyn PropertyStore,
}

/// Creates `UNBLOCKFILE`, gating boot continuation. Safe to call more than
/// once; only the first call per boot matters to the platform.
pub fn unblock(ctx: &BootContext) {
    let path = ctx.config.resolve(defs::UNBLOCKFILE);
    if let Some(parent) = path.parent() {
        let _ = ctx.mounter.mkdir(parent);
    }
    if let Err(err) = ctx.mounter.create_file(&path) {
        log::warn!("failed to create unblock file: {err}");
    }
}

pub(crate) fn sentinel_exists(ctx: &BootContext, absolute: &str) -> bool {
    ctx.config.resolve(absolute).exists()
}
