// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! `late-start` entry point (spec.md 4.G): runs once the platform's own
//! services are starting, after SELinux policy patching (an out-of-scope
//! external collaborator — spec.md 1).

use std::time::Duration;

use crate::defs;
use crate::ipc::StageClient;
use crate::scripts;

use super::{sentinel_exists, unblock, BootContext};

/// Interval between manager-install polls, and the bound on how many times
/// to poll before giving up — the original engine this stage is modeled on
/// polled unboundedly; capping it is an intentional behavior change so a
/// dead package manager can't wedge the daemon forever (spec.md 9, redesign
/// note).
const MANAGER_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MANAGER_POLL_MAX_ATTEMPTS: u32 = 60;

pub fn run(ctx: &BootContext, client: &mut dyn StageClient) {
    let _ = client.ack(0);

    wait_for_selinux_relabel();

    if sentinel_exists(ctx, defs::UNINSTALLER) {
        unblock(ctx);
        return;
    }

    if let Err(err) = scripts::exec_common_script(&ctx.config.coredir, "service") {
        log::error!("common service.d scripts failed: {err}");
    }

    if sentinel_exists(ctx, defs::DISABLEFILE) {
        if let Err(err) = ctx.props.set(defs::DISABLED_PROPERTY, "1") {
            log::error!("failed to set disabled property: {err}");
        }
        unblock(ctx);
        return;
    }

    let enabled_ids = match crate::modules::scan_enabled_modules(&ctx.config.mountpoint, ctx.props) {
        Ok(modules) => modules.into_iter().map(|m| m.id).collect::<Vec<_>>(),
        Err(err) => {
            log::error!("failed to enumerate modules for service scripts: {err}");
            Vec::new()
        }
    };
    if let Err(err) = scripts::exec_module_script(&ctx.config.mountpoint, "service", &enabled_ids) {
        log::error!("module service scripts failed: {err}");
    }

    wait_for_manager(ctx);
    unlink_staged_manager(ctx);

    unblock(ctx);
}

/// Out-of-scope platform collaborator (spec.md 1): blocking until the
/// SELinux policy patch applied earlier in boot has taken effect. Always
/// returns immediately so stage sequencing can be exercised without a real
/// policy-patching daemon.
fn wait_for_selinux_relabel() {}

/// Polls until the package manager daemon is ready to install the bundled
/// manager APK, bounded per [`MANAGER_POLL_MAX_ATTEMPTS`].
fn wait_for_manager(ctx: &BootContext) {
    if !ctx.config.resolve(defs::MANAGERAPK).exists() {
        return;
    }
    for attempt in 0..MANAGER_POLL_MAX_ATTEMPTS {
        if package_manager_ready() {
            return;
        }
        log::debug!("waiting for package manager (attempt {attempt})");
        std::thread::sleep(MANAGER_POLL_INTERVAL);
    }
    log::warn!("package manager never became ready; skipping manager install");
}

/// Out-of-scope platform collaborator (spec.md 1): querying `pm path
/// android` for readiness. Always reports ready so the bounded poll loop
/// above falls through immediately under test and outside a real device.
fn package_manager_ready() -> bool {
    true
}

fn unlink_staged_manager(ctx: &BootContext) {
    let apk = ctx.config.resolve(defs::MANAGERAPK);
    let _ = std::fs::remove_file(apk);
}

#[cfg(test)]
#[allow(clippy::field_reassign_with_default)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::image::FakeLoopImage;
    use crate::ipc::RecordingStageClient;
    use crate::mounter::RecordingMounter;
    use crate::props::{LoggingPropertyStore, RecordingPropertyStore};

    fn ctx_for<'a>(config: &'a Config, mounter: &'a RecordingMounter, loop_image: &'a FakeLoopImage) -> BootContext<'a> {
        BootContext {
            config,
            mounter,
            loop_image,
            props: &LoggingPropertyStore,
        }
    }

    #[test]
    fn uninstaller_sentinel_short_circuits_service_scripts() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.root = tmp.path().to_path_buf();
        std::fs::create_dir_all(config.resolve(defs::UNINSTALLER).parent().unwrap()).unwrap();
        std::fs::write(config.resolve(defs::UNINSTALLER), "").unwrap();

        let mounter = RecordingMounter::new();
        let loop_image = FakeLoopImage::new();
        let ctx = ctx_for(&config, &mounter, &loop_image);
        let mut client = RecordingStageClient::new();

        run(&ctx, &mut client);

        assert!(config.resolve(defs::UNBLOCKFILE).exists());
    }

    #[test]
    fn no_manager_apk_staged_unblocks_promptly() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.root = tmp.path().to_path_buf();
        config.mountpoint = tmp.path().join("modules");
        config.coredir = tmp.path().join("coredir");

        let mounter = RecordingMounter::new();
        let loop_image = FakeLoopImage::new();
        let ctx = ctx_for(&config, &mounter, &loop_image);
        let mut client = RecordingStageClient::new();

        run(&ctx, &mut client);

        assert!(config.resolve(defs::UNBLOCKFILE).exists());
        assert!(!config.resolve(defs::MANAGERAPK).exists());
    }

    #[test]
    fn disable_sentinel_sets_property_and_skips_service_modules() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.root = tmp.path().to_path_buf();
        config.mountpoint = tmp.path().join("modules");
        config.coredir = tmp.path().join("coredir");
        let disable_file = config.resolve(defs::DISABLEFILE);
        std::fs::create_dir_all(disable_file.parent().unwrap()).unwrap();
        std::fs::write(&disable_file, "").unwrap();

        let mounter = RecordingMounter::new();
        let loop_image = FakeLoopImage::new();
        let props = RecordingPropertyStore::new();
        let ctx = BootContext {
            config: &config,
            mounter: &mounter,
            loop_image: &loop_image,
            props: &props,
        };
        let mut client = RecordingStageClient::new();

        run(&ctx, &mut client);

        assert!(config.resolve(defs::UNBLOCKFILE).exists());
        assert_eq!(
            props.sets(),
            vec![(defs::DISABLED_PROPERTY.to_string(), "1".to_string())]
        );
        assert!(!config.resolve(defs::MANAGERAPK).exists());
    }
}
