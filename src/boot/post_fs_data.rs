// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! `post-fs-data` entry point (spec.md 4.G): merges staged images, mounts
//! the active image, builds and magic-mounts the overlay tree for every
//! enabled module, and splinters `/vendor` out when it is separately
//! mounted.

use std::path::Path;

use anyhow::Result;

use crate::defs;
use crate::image;
use crate::ipc::StageClient;
use crate::modules;
use crate::scripts;
use crate::tree::magic_mount::magic_mount;
use crate::tree::{Node, NodeType, OverlayPaths, Status, Tree};

use super::{sentinel_exists, unblock, BootContext};

pub fn run(ctx: &BootContext, client: &mut dyn StageClient) {
    let _ = client.ack(0);

    if !data_is_ready(ctx) {
        unblock(ctx);
        return;
    }
    if sentinel_exists(ctx, defs::UNINSTALLER) {
        unblock(ctx);
        launch_uninstaller_detached(ctx);
        return;
    }

    if let Err(err) = run_fallible(ctx) {
        log::error!("post-fs-data failed: {err}");
    }
    unblock(ctx);
}

fn data_is_ready(ctx: &BootContext) -> bool {
    ctx.config.resolve("/data").is_dir()
}

fn launch_uninstaller_detached(ctx: &BootContext) {
    let uninstaller = ctx.config.resolve(defs::UNINSTALLER);
    if let Err(err) = std::process::Command::new("sh").arg(&uninstaller).spawn() {
        log::warn!("failed to launch uninstaller: {err}");
    }
}

fn run_fallible(ctx: &BootContext) -> Result<()> {
    // Step 1: merge staged images into the active image. Source order is
    // preserved from the engine this was modeled on: cache then data —
    // if both supply the same module, the data-partition merge wins
    // (spec.md 9, open question on merge order).
    let tmp_merge_dir = ctx.config.coredir.join(".merge_tmp");
    image::merge_img(ctx.loop_image, &ctx.config.cache_img, &ctx.config.active_img, &tmp_merge_dir)?;
    image::merge_img(ctx.loop_image, &ctx.config.data_merge_img, &ctx.config.active_img, &tmp_merge_dir)?;

    // Step 2: create the active image if this is a fresh install.
    let new_img = !ctx.config.active_img.exists();
    if new_img {
        ctx.loop_image.create(&ctx.config.active_img, defs::NEW_IMG_SIZE_BYTES)?;
    }

    // Step 3: mount it, seeding `.core` on a fresh image.
    ctx.loop_image.mount(&ctx.config.active_img, &ctx.config.mountpoint)?;
    if new_img {
        ctx.mounter.mkdir(&ctx.config.mountpoint.join(".core"))?;
    }

    // Step 4.
    scripts::exec_common_script(&ctx.config.coredir, "post-fs-data")?;

    // Step 5.
    if sentinel_exists(ctx, defs::DISABLEFILE) {
        return core_only(ctx);
    }

    // Step 6.
    let enabled = modules::scan_enabled_modules(&ctx.config.mountpoint, ctx.props)?;
    let mut tree = Tree::new();
    let system_root = tree.new_root("/system", Status::INTER);
    let paths = OverlayPaths {
        mountpoint: &ctx.config.mountpoint,
        mirrdir: &ctx.config.mirrdir,
        dummdir: &ctx.config.dummdir,
        root: &ctx.config.root,
    };
    for module in enabled.iter().filter(|m| m.has_overlay_payload) {
        crate::tree::constructor::construct(&mut tree, &paths, &module.id, system_root);
    }
    let contributed = !tree.node(system_root).children.is_empty();

    // Step 7: unmount, trim to the enabled set's actual footprint, remount.
    ctx.loop_image.unmount(&ctx.config.mountpoint)?;
    image::trim_img(ctx.loop_image, &ctx.config.active_img)?;
    ctx.loop_image.mount(&ctx.config.active_img, &ctx.config.mountpoint)?;

    let mut vendor_root = None;
    if contributed {
        // Step 8: mirror the live partitions backing /system and /vendor.
        let separate_vendor = mount_mirrors(ctx)?;

        // Step 9: vendor splinter.
        vendor_root = splinter_vendor(&mut tree, system_root, separate_vendor);
    }

    // Step 10.
    magic_mount(&mut tree, &paths, ctx.mounter, system_root)?;
    if let Some(vendor_root) = vendor_root {
        magic_mount(&mut tree, &paths, ctx.mounter, vendor_root)?;
    }

    // Step 11.
    tree.destroy_subtree(system_root);
    if let Some(vendor_root) = vendor_root {
        tree.destroy_subtree(vendor_root);
    }

    // Step 12.
    let enabled_ids: Vec<String> = enabled.into_iter().map(|m| m.id).collect();
    scripts::exec_module_script(&ctx.config.mountpoint, "post-fs-data", &enabled_ids)?;

    Ok(())
}

/// Sentinel-disable path (spec.md 4.G, `core_only`): bind the staged hosts
/// file over `/system/etc/hosts` if present; the hide subsystem itself is
/// an out-of-scope external collaborator.
fn core_only(ctx: &BootContext) -> Result<()> {
    if sentinel_exists(ctx, defs::HOSTSFILE) {
        let hosts = ctx.config.resolve(defs::HOSTSFILE);
        let live_hosts = ctx.config.resolve("/system/etc/hosts");
        ctx.mounter.bind_mount(&hosts, &live_hosts)?;
    }
    Ok(())
}

/// Parses `/proc/mounts` to find the block devices backing `/system` and
/// `/vendor`, bind-mounts them read-only under `MIRRDIR`. Returns whether
/// `/vendor` is a separate mount; when it is not, `MIRRDIR/vendor` becomes
/// a symlink into `MIRRDIR/system/vendor` instead.
fn mount_mirrors(ctx: &BootContext) -> Result<bool> {
    let system_mirror = ctx.config.mirrdir.join("system");
    ctx.mounter.mkdir(&system_mirror)?;
    if let Some(source) = mount_source_for(Path::new("/system")) {
        ctx.mounter.bind_mount(&source, &system_mirror)?;
    }

    let vendor_source = mount_source_for(Path::new("/vendor"));
    let separate_vendor = vendor_source.is_some();
    if let Some(source) = vendor_source {
        let vendor_mirror = ctx.config.mirrdir.join("vendor");
        ctx.mounter.mkdir(&vendor_mirror)?;
        ctx.mounter.bind_mount(&source, &vendor_mirror)?;
    } else {
        ctx.mounter.symlink(&system_mirror.join("vendor"), &ctx.config.mirrdir.join("vendor"))?;
    }

    Ok(separate_vendor)
}

fn mount_source_for(mount_point: &Path) -> Option<std::path::PathBuf> {
    let me = procfs::process::Process::myself().ok()?;
    let mount_info = me.mountinfo().ok()?;
    mount_info
        .into_iter()
        .find(|entry| entry.mount_point == mount_point)
        .map(|entry| std::path::PathBuf::from(entry.mount_source.unwrap_or_default()))
}

/// Vendor splinter (spec.md 4.G step 9). Substitutes a `VENDOR` placeholder
/// in `/system`'s child list and re-parents the original `vendor` node as
/// a detached root named `/vendor`.
fn splinter_vendor(tree: &mut Tree, system_root: crate::tree::NodeId, separate_vendor: bool) -> Option<crate::tree::NodeId> {
    let vendor_child = tree.child_named(system_root, "vendor")?;
    let placeholder_type = if separate_vendor { NodeType::Dir } else { NodeType::Lnk };
    let placeholder = Node::new("vendor", placeholder_type, Status::VENDOR, None);
    tree.replace_child_slot(system_root, vendor_child, placeholder);

    tree.node_mut(vendor_child).parent = None;
    tree.node_mut(vendor_child).name = "/vendor".to_string();
    Some(vendor_child)
}
