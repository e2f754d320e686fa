// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! The overlay-tree data model (spec.md 4.A): an in-memory n-ary tree of
//! overlay nodes with precedence-merged insertion.
//!
//! Nodes live in an arena (`Tree::nodes`) and reference each other by
//! [`NodeId`] rather than pointer, so `full_path` can walk parent links
//! without unsafe back-references (see spec.md 9, Design Notes).

pub mod constructor;
pub mod magic_mount;
pub mod skeleton;

use std::fmt;
use std::path::{Path, PathBuf};

use bitflags::bitflags;

bitflags! {
    /// Status bitset over {DUMMY, INTER, SKEL, MODULE, VENDOR} (spec.md 3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        const DUMMY  = 0b0_0001;
        const INTER  = 0b0_0010;
        const SKEL   = 0b0_0100;
        const MODULE = 0b0_1000;
        const VENDOR = 0b1_0000;
    }
}

const KIND_MASK: Status = Status::DUMMY
    .union(Status::INTER)
    .union(Status::SKEL)
    .union(Status::MODULE);

impl Status {
    /// Highest set kind bit among {DUMMY, INTER, SKEL, MODULE}, used for
    /// precedence comparison. Exactly one kind bit is set on any live node,
    /// so this is just that bit's numeric value; the four constants were
    /// deliberately assigned in ascending precedence order so a plain `>`
    /// comparison implements "MODULE > SKEL > INTER > DUMMY" (spec.md 3).
    pub fn kind_rank(self) -> u8 {
        (self & KIND_MASK).bits()
    }

    pub fn is_vendor(self) -> bool {
        self.contains(Status::VENDOR)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Dir,
    Reg,
    Lnk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub node_type: NodeType,
    pub status: Status,
    /// Identifier of the module that contributed this node; meaningful only
    /// when `Status::MODULE` is set.
    pub module: Option<String>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, node_type: NodeType, status: Status, module: Option<String>) -> Self {
        Self {
            name: name.into(),
            node_type,
            status,
            module,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Owns every [`Node`] ever created during one boot-stage tree construction.
/// Freed slots (post `destroy_subtree`) become `None` and are never reused —
/// a `NodeId` is valid for the lifetime of the `Tree` that produced it.
#[derive(Default)]
pub struct Tree {
    nodes: Vec<Option<Node>>,
}

impl Tree {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(Some(node));
        NodeId(self.nodes.len() - 1)
    }

    /// Creates a new root node (no parent). The root's name should already be
    /// a slash-prefixed path such as `/system` (spec.md 4.A, `full_path`).
    pub fn new_root(&mut self, name: impl Into<String>, status: Status) -> NodeId {
        self.push(Node::new(name, NodeType::Dir, status, None))
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.0].as_ref().expect("accessed a freed node")
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.0].as_mut().expect("accessed a freed node")
    }

    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|&id| self.node(id).name == name)
    }

    /// `insert_child(parent, child) -> effective_child` (spec.md 4.A).
    ///
    /// If no sibling of `parent` shares `child.name`, appends and returns the
    /// new node. Otherwise compares kinds: a strictly higher kind replaces
    /// the existing sibling in place (index preserved); otherwise the new
    /// child is discarded and the existing sibling is returned unchanged.
    pub fn insert_child(&mut self, parent: NodeId, mut child: Node) -> NodeId {
        child.parent = Some(parent);

        let existing_slot = self
            .node(parent)
            .children
            .iter()
            .position(|&id| self.node(id).name == child.name);

        match existing_slot {
            None => {
                let new_id = self.push(child);
                self.node_mut(parent).children.push(new_id);
                new_id
            }
            Some(slot) => {
                let existing_id = self.node(parent).children[slot];
                let existing_kind = self.node(existing_id).status.kind_rank();
                let child_kind = child.status.kind_rank();
                if child_kind > existing_kind {
                    self.destroy_subtree(existing_id);
                    let new_id = self.push(child);
                    self.node_mut(parent).children[slot] = new_id;
                    new_id
                } else {
                    existing_id
                }
            }
        }
    }

    /// Post-order free of `node` and everything beneath it.
    pub fn destroy_subtree(&mut self, node: NodeId) {
        let children = self.nodes[node.0]
            .as_ref()
            .map(|n| n.children.clone())
            .unwrap_or_default();
        for child in children {
            self.destroy_subtree(child);
        }
        self.nodes[node.0] = None;
    }

    /// Slash-joined path from the root to `node`.
    pub fn full_path(&self, node: NodeId) -> String {
        let n = self.node(node);
        match n.parent {
            None => n.name.clone(),
            Some(parent) => format!("{}/{}", self.full_path(parent), n.name),
        }
    }

    /// Detaches `node` from its parent's child list without destroying it —
    /// used by the vendor splinter (spec.md 4.G step 9) to re-parent a
    /// subtree under a fresh root.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.node(node).parent {
            self.node_mut(parent).children.retain(|&id| id != node);
        }
        self.node_mut(node).parent = None;
    }

    pub fn replace_child_slot(&mut self, parent: NodeId, old: NodeId, replacement: Node) -> NodeId {
        let slot = self
            .node(parent)
            .children
            .iter()
            .position(|&id| id == old)
            .expect("old child must be a child of parent");
        let mut replacement = replacement;
        replacement.parent = Some(parent);
        let new_id = self.push(replacement);
        self.node_mut(parent).children[slot] = new_id;
        new_id
    }

    /// Indented tree dump used in boot-driver debug logging.
    pub fn debug_tree(&self, root: NodeId) -> String {
        let mut out = String::new();
        self.write_tree(root, 0, &mut out);
        out
    }

    fn write_tree(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = self.node(id);
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!("{} [{:?}]\n", node.name, node.status));
        for &child in &node.children {
            self.write_tree(child, depth + 1, out);
        }
    }
}

/// Resolves the handful of path families every overlay component needs:
/// the live filesystem (rooted at `root`, `/` in production and a temp dir
/// under test), the module payload tree, the read-only mirror, and the
/// writable shadow tree.
pub struct OverlayPaths<'a> {
    pub mountpoint: &'a Path,
    pub mirrdir: &'a Path,
    pub dummdir: &'a Path,
    pub root: &'a Path,
}

impl<'a> OverlayPaths<'a> {
    fn join(base: &Path, full_path: &str) -> PathBuf {
        base.join(full_path.trim_start_matches('/'))
    }

    pub fn live_path(&self, full_path: &str) -> PathBuf {
        Self::join(self.root, full_path)
    }

    pub fn mirror_path(&self, full_path: &str) -> PathBuf {
        Self::join(self.mirrdir, full_path)
    }

    pub fn shadow_path(&self, full_path: &str) -> PathBuf {
        Self::join(self.dummdir, full_path)
    }

    pub fn module_path(&self, module: &str, full_path: &str) -> PathBuf {
        self.mountpoint.join(module).join(full_path.trim_start_matches('/'))
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tree {{ {} slots }}", self.nodes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str, id: &str) -> Node {
        Node::new(name, NodeType::Reg, Status::MODULE, Some(id.to_string()))
    }

    #[test]
    fn insert_child_appends_when_no_conflict() {
        let mut tree = Tree::new();
        let root = tree.new_root("/system", Status::INTER);
        let id = tree.insert_child(root, module("foo.conf", "A"));
        assert_eq!(tree.node(id).name, "foo.conf");
        assert_eq!(tree.node(root).children, vec![id]);
    }

    #[test]
    fn precedence_monotonicity_first_insert_wins_on_tie() {
        let mut tree = Tree::new();
        let root = tree.new_root("/system", Status::INTER);
        let a = tree.insert_child(root, module("hosts", "A"));
        let b = tree.insert_child(root, module("hosts", "B"));
        assert_eq!(a, b, "same-kind conflict must keep the first insert");
        assert_eq!(tree.node(a).module.as_deref(), Some("A"));
    }

    #[test]
    fn higher_kind_replaces_lower_kind() {
        let mut tree = Tree::new();
        let root = tree.new_root("/system", Status::INTER);
        let dummy = tree.insert_child(
            root,
            Node::new("etc", NodeType::Dir, Status::DUMMY, None),
        );
        let module_node = tree.insert_child(
            root,
            Node::new("etc", NodeType::Dir, Status::MODULE, Some("A".to_string())),
        );
        assert_eq!(module_node, tree.node(root).children[0]);
        assert_ne!(dummy, module_node);
        assert_eq!(tree.node(module_node).status.kind_rank(), Status::MODULE.kind_rank());
    }

    #[test]
    fn lower_kind_does_not_replace_higher_kind() {
        let mut tree = Tree::new();
        let root = tree.new_root("/system", Status::INTER);
        let module_node = tree.insert_child(
            root,
            Node::new("etc", NodeType::Dir, Status::MODULE, Some("A".to_string())),
        );
        let result = tree.insert_child(
            root,
            Node::new("etc", NodeType::Dir, Status::DUMMY, None),
        );
        assert_eq!(result, module_node);
    }

    #[test]
    fn full_path_joins_from_root() {
        let mut tree = Tree::new();
        let root = tree.new_root("/system", Status::INTER);
        let etc = tree.insert_child(root, Node::new("etc", NodeType::Dir, Status::INTER, None));
        let hosts = tree.insert_child(etc, module("hosts", "A"));
        assert_eq!(tree.full_path(root), "/system");
        assert_eq!(tree.full_path(etc), "/system/etc");
        assert_eq!(tree.full_path(hosts), "/system/etc/hosts");
    }

    #[test]
    fn destroy_subtree_frees_descendants() {
        let mut tree = Tree::new();
        let root = tree.new_root("/system", Status::INTER);
        let etc = tree.insert_child(root, Node::new("etc", NodeType::Dir, Status::INTER, None));
        let _hosts = tree.insert_child(etc, module("hosts", "A"));
        tree.destroy_subtree(etc);
        assert!(tree.nodes[etc.0].is_none());
    }
}
