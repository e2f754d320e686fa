// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Magic-Mount Driver (spec.md 4.D): recursively dispatches each overlay
//! node to a bind mount, a skeleton clone, or deeper traversal.

use anyhow::Result;

use crate::mounter::Mounter;

use super::skeleton::clone_skeleton;
use super::{NodeId, OverlayPaths, Status, Tree};

pub fn magic_mount(tree: &mut Tree, paths: &OverlayPaths, mounter: &dyn Mounter, node: NodeId) -> Result<()> {
    let status = tree.node(node).status;

    if status.contains(Status::MODULE) {
        let full_path = tree.full_path(node);
        let module = tree.node(node).module.clone().unwrap_or_default();
        let source = paths.module_path(&module, &full_path);
        let live = paths.live_path(&full_path);
        mounter.bind_mount(&source, &live)?;
    } else if status.contains(Status::SKEL) {
        clone_skeleton(tree, paths, mounter, node)?;
    } else if status.contains(Status::INTER) {
        let children = tree.node(node).children.clone();
        for child in children {
            magic_mount(tree, paths, mounter, child)?;
        }
    }
    // DUMMY, bare VENDOR-only, or unreachable combinations: no-op.

    Ok(())
}
