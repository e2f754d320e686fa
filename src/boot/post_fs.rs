// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! `post-fs` entry point (spec.md 4.G): the earliest stage, run before
//! `/data` is writable. Overlays files staged in the cache partition only.

use crate::defs;
use crate::ipc::StageClient;
use crate::simple_mount::simple_mount;

use super::{sentinel_exists, unblock, BootContext};

pub fn run(ctx: &BootContext, client: &mut dyn StageClient) {
    let _ = client.ack(0);

    if sentinel_exists(ctx, defs::UNINSTALLER) || sentinel_exists(ctx, defs::DISABLEFILE) {
        unblock(ctx);
        return;
    }

    for path in ["/system", "/vendor"] {
        if let Err(err) = simple_mount(&ctx.config.cachemount, &ctx.config.root, ctx.mounter, path) {
            log::error!("simple_mount {path} failed: {err}");
        }
    }

    unblock(ctx);
}

#[cfg(test)]
#[allow(clippy::field_reassign_with_default)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::image::FakeLoopImage;
    use crate::ipc::RecordingStageClient;
    use crate::mounter::RecordingMounter;
    use crate::props::LoggingPropertyStore;

    fn ctx_for<'a>(config: &'a Config, mounter: &'a RecordingMounter, loop_image: &'a FakeLoopImage) -> BootContext<'a> {
        BootContext {
            config,
            mounter,
            loop_image,
            props: &LoggingPropertyStore,
        }
    }

    #[test]
    fn disable_sentinel_skips_simple_mount_and_still_unblocks() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.root = tmp.path().to_path_buf();
        let disable_file = config.resolve(defs::DISABLEFILE);
        std::fs::create_dir_all(disable_file.parent().unwrap()).unwrap();
        std::fs::write(disable_file, "").unwrap();

        let mounter = RecordingMounter::new();
        let loop_image = FakeLoopImage::new();
        let ctx = ctx_for(&config, &mounter, &loop_image);
        let mut client = RecordingStageClient::new();

        run(&ctx, &mut client);

        assert_eq!(client.acks, vec![0]);
        assert!(config.resolve(defs::UNBLOCKFILE).exists());
    }
}
