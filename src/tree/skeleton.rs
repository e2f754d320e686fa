// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Skeleton Cloner (spec.md 4.C): materializes a writable shadow directory
//! for a node that cannot be replaced wholesale, then bind-mounts every
//! child of that shadow onto the corresponding live entry.

use anyhow::Result;

use crate::mounter::Mounter;
use crate::utils;

use super::{Node, NodeId, NodeType, OverlayPaths, Status, Tree};

/// Clones `node` (SKEL, or an INTER node reached while recursing through a
/// skeleton) into its shadow directory and dispatches every child.
pub fn clone_skeleton(tree: &mut Tree, paths: &OverlayPaths, mounter: &dyn Mounter, node: NodeId) -> Result<()> {
    let full_path = tree.full_path(node);

    // Step 1: fill in DUMMY siblings for every mirror entry the modules
    // didn't already claim. Precedence keeps whatever a module contributed.
    let mirror_dir = paths.mirror_path(&full_path);
    if let Ok(entries) = std::fs::read_dir(&mirror_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Ok(file_type) = entry.file_type() else { continue };
            let node_type = classify(file_type);
            tree.insert_child(node, Node::new(name, node_type, Status::DUMMY, None));
        }
    }

    // Step 2: create the empty shadow directory and clone live attributes.
    let shadow_dir = paths.shadow_path(&full_path);
    mounter.mkdir(&shadow_dir)?;
    let live_dir = paths.live_path(&full_path);
    let _ = utils::clone_attrs(&live_dir, &shadow_dir);

    // Step 3: only an actual SKEL node gets the shadow bound over the live
    // path; an INTER node visited while recursing through a skeleton does not.
    if tree.node(node).status.contains(Status::SKEL) {
        mounter.bind_mount(&shadow_dir, &live_dir)?;
    }

    // Step 4: dispatch every child.
    let children = tree.node(node).children.clone();
    for child in children {
        clone_child(tree, paths, mounter, child, &full_path)?;
    }
    Ok(())
}

fn classify(file_type: std::fs::FileType) -> NodeType {
    if file_type.is_symlink() {
        NodeType::Lnk
    } else if file_type.is_dir() {
        NodeType::Dir
    } else {
        NodeType::Reg
    }
}

fn clone_child(
    tree: &mut Tree,
    paths: &OverlayPaths,
    mounter: &dyn Mounter,
    child: NodeId,
    parent_full_path: &str,
) -> Result<()> {
    let (name, child_type, status, module) = {
        let n = tree.node(child);
        (n.name.clone(), n.node_type, n.status, n.module.clone())
    };
    let child_full_path = format!("{}/{}", parent_full_path, name);

    if status.is_vendor() {
        if child_type == NodeType::Lnk {
            let mirror_link = paths.mirror_path(&child_full_path);
            let live_link = paths.live_path(&child_full_path);
            if let Ok(target) = std::fs::read_link(&mirror_link) {
                let _ = std::fs::remove_file(&live_link);
                mounter.symlink(&target, &live_link)?;
            }
        }
        return Ok(());
    }

    if status.contains(Status::SKEL) || status.contains(Status::INTER) {
        return clone_skeleton(tree, paths, mounter, child);
    }

    let source = if status.contains(Status::MODULE) {
        paths.module_path(module.as_deref().unwrap_or_default(), &child_full_path)
    } else {
        // The only remaining kind is DUMMY: an unchanged entry of the mirror.
        paths.mirror_path(&child_full_path)
    };

    let shadow_entry = paths.shadow_path(&child_full_path);
    match child_type {
        NodeType::Dir => mounter.mkdir(&shadow_entry)?,
        NodeType::Reg => mounter.create_file(&shadow_entry)?,
        NodeType::Lnk => {
            if let Ok(target) = std::fs::read_link(&source) {
                mounter.symlink(&target, &shadow_entry)?;
            }
        }
    }

    if child_type != NodeType::Lnk {
        let live_entry = paths.live_path(&child_full_path);
        mounter.bind_mount(&source, &live_entry)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mounter::{MountOp, RecordingMounter};
    use std::fs;

    fn write_file(path: &std::path::Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn skel_directory_binds_shadow_and_every_mirror_child() {
        let tmp = tempfile::tempdir().unwrap();
        let mountpoint = tmp.path().join("modules");
        let mirrdir = tmp.path().join("mirror");
        let dummdir = tmp.path().join("dummy");
        let root = tmp.path().join("live");

        write_file(&mountpoint.join("A/system/etc/foo.conf"), "x");
        write_file(&mirrdir.join("system/etc/bar.conf"), "bar");
        write_file(&mirrdir.join("system/etc/baz.conf"), "baz");
        fs::create_dir_all(root.join("system/etc")).unwrap();

        let paths = OverlayPaths {
            mountpoint: &mountpoint,
            mirrdir: &mirrdir,
            dummdir: &dummdir,
            root: &root,
        };

        let mut tree = Tree::new();
        let sys_root = tree.new_root("/system", Status::INTER);
        super::super::constructor::construct(&mut tree, &paths, "A", sys_root);
        let etc = tree.child_named(sys_root, "etc").unwrap();
        assert!(tree.node(etc).status.contains(Status::SKEL));

        let mounter = RecordingMounter::new();
        clone_skeleton(&mut tree, &paths, &mounter, etc).unwrap();

        let ops = mounter.ops();
        assert!(ops.contains(&MountOp::BindMount {
            source: dummdir.join("system/etc"),
            target: root.join("system/etc"),
        }));
        assert!(ops.contains(&MountOp::BindMount {
            source: mountpoint.join("A/system/etc/foo.conf"),
            target: root.join("system/etc/foo.conf"),
        }));
        assert!(ops.contains(&MountOp::BindMount {
            source: mirrdir.join("system/etc/bar.conf"),
            target: root.join("system/etc/bar.conf"),
        }));
        assert!(ops.contains(&MountOp::BindMount {
            source: mirrdir.join("system/etc/baz.conf"),
            target: root.join("system/etc/baz.conf"),
        }));
    }

    #[test]
    fn symlink_child_materializes_in_shadow_without_bind_mount() {
        let tmp = tempfile::tempdir().unwrap();
        let mountpoint = tmp.path().join("modules");
        let mirrdir = tmp.path().join("mirror");
        let dummdir = tmp.path().join("dummy");
        let root = tmp.path().join("live");

        fs::create_dir_all(mountpoint.join("C/system/bin")).unwrap();
        std::os::unix::fs::symlink("/system/bin/toolbox", mountpoint.join("C/system/bin/link")).unwrap();
        fs::create_dir_all(root.join("system/bin")).unwrap();

        let paths = OverlayPaths {
            mountpoint: &mountpoint,
            mirrdir: &mirrdir,
            dummdir: &dummdir,
            root: &root,
        };

        let mut tree = Tree::new();
        let sys_root = tree.new_root("/system", Status::INTER);
        super::super::constructor::construct(&mut tree, &paths, "C", sys_root);
        let bin = tree.child_named(sys_root, "bin").unwrap();
        assert!(tree.node(bin).status.contains(Status::SKEL));

        let mounter = RecordingMounter::new();
        clone_skeleton(&mut tree, &paths, &mounter, bin).unwrap();

        let ops = mounter.ops();
        assert!(ops.contains(&MountOp::Symlink {
            target: std::path::PathBuf::from("/system/bin/toolbox"),
            link: dummdir.join("system/bin/link"),
        }));
        for op in &ops {
            if let MountOp::BindMount { target, .. } = op {
                assert_ne!(target, &root.join("system/bin/link"));
            }
        }
    }
}
