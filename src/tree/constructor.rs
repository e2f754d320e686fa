// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tree Constructor (spec.md 4.B): walks one module's `system/` subtree and
//! merges it into the shared overlay tree.

use crate::defs;

use super::{Node, NodeId, NodeType, OverlayPaths, Status, Tree};

/// Recursively constructs `module`'s contribution under `parent`, merging
/// into whatever siblings earlier modules already inserted.
///
/// The root call passes `parent` = the `/system` root node.
pub fn construct(tree: &mut Tree, paths: &OverlayPaths, module: &str, parent: NodeId) {
    let parent_full_path = tree.full_path(parent);
    let module_dir = paths.module_path(module, &parent_full_path);

    let entries = match std::fs::read_dir(&module_dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let node_type = if file_type.is_symlink() {
            NodeType::Lnk
        } else if file_type.is_dir() {
            NodeType::Dir
        } else {
            NodeType::Reg
        };

        let target = format!("{}/{}", parent_full_path, name);
        let clone_mode = if node_type == NodeType::Lnk || !paths.live_path(&target).exists() {
            true
        } else if parent_full_path == "/system" && name == "vendor" {
            false
        } else {
            paths
                .live_path(&target)
                .symlink_metadata()
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false)
        };

        let mut node = Node::new(name, node_type, Status::empty(), Some(module.to_string()));
        if clone_mode {
            tree.node_mut(parent).status |= Status::SKEL;
            node.status = Status::MODULE;
        } else if node_type == NodeType::Dir {
            let replace_marker = paths.module_path(module, &target).join(defs::REPLACE_DIR_FILE_NAME);
            node.status = if replace_marker.exists() { Status::MODULE } else { Status::INTER };
        } else {
            node.status = Status::MODULE;
        }

        let effective = tree.insert_child(parent, node);
        let status = tree.node(effective).status;
        if status.contains(Status::INTER) || status.contains(Status::SKEL) {
            construct(tree, paths, module, effective);
        }
    }
}
