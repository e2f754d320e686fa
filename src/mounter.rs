// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! The `Mounter` trait is the seam every kernel mount/unmount call in the
//! tree-construction, skeleton-cloning and magic-mount components passes
//! through. Production code runs against [`SystemMounter`]; tests substitute
//! [`RecordingMounter`] to assert the bind-mount set closure property
//! (spec.md 8) without touching the kernel.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use rustix::mount::{MountFlags, mount_bind as rustix_bind_mount};

/// One mount-adjacent operation the overlay engine performed, recorded by
/// [`RecordingMounter`] for assertions in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOp {
    BindMount { source: PathBuf, target: PathBuf },
    Mkdir(PathBuf),
    CreateFile(PathBuf),
    Symlink { target: PathBuf, link: PathBuf },
}

pub trait Mounter {
    fn bind_mount(&self, source: &Path, target: &Path) -> Result<()>;
    fn mkdir(&self, path: &Path) -> Result<()>;
    fn create_file(&self, path: &Path) -> Result<()>;
    fn symlink(&self, target: &Path, link: &Path) -> Result<()>;
}

/// Real mounter: issues genuine bind mounts via `rustix`.
pub struct SystemMounter;

impl Mounter for SystemMounter {
    fn bind_mount(&self, source: &Path, target: &Path) -> Result<()> {
        rustix_bind_mount(source, target)
            .with_context(|| format!("bind mount {} -> {}", source.display(), target.display()))?;
        Ok(())
    }

    fn mkdir(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("mkdir -p {}", path.display()))
    }

    fn create_file(&self, path: &Path) -> Result<()> {
        std::fs::File::create(path)
            .with_context(|| format!("create {}", path.display()))?;
        Ok(())
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        std::os::unix::fs::symlink(target, link)
            .with_context(|| format!("symlink {} -> {}", link.display(), target.display()))
    }
}

#[allow(dead_code, unused_variables)]
fn _unused_flags_reference() -> MountFlags {
    // Kept to document that SystemMounter deliberately issues a plain bind
    // (MountFlags::BIND is folded into rustix::mount::mount_bind already).
    MountFlags::empty()
}

/// Test mounter: records every operation instead of touching the kernel, and
/// mirrors directory/file/symlink creation onto a real temp-dir backed tree
/// so that subsequent `read_dir`/`exists` calls made by the components under
/// test see consistent state.
#[derive(Default)]
pub struct RecordingMounter {
    ops: Mutex<Vec<MountOp>>,
}

impl RecordingMounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<MountOp> {
        self.ops.lock().unwrap().clone()
    }
}

impl Mounter for RecordingMounter {
    fn bind_mount(&self, source: &Path, target: &Path) -> Result<()> {
        self.ops.lock().unwrap().push(MountOp::BindMount {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
        });
        Ok(())
    }

    fn mkdir(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("mkdir {}", path.display()))?;
        self.ops.lock().unwrap().push(MountOp::Mkdir(path.to_path_buf()));
        Ok(())
    }

    fn create_file(&self, path: &Path) -> Result<()> {
        std::fs::File::create(path)
            .with_context(|| format!("create {}", path.display()))?;
        self.ops.lock().unwrap().push(MountOp::CreateFile(path.to_path_buf()));
        Ok(())
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        std::os::unix::fs::symlink(target, link)
            .with_context(|| format!("symlink {} -> {}", link.display(), target.display()))?;
        self.ops.lock().unwrap().push(MountOp::Symlink {
            target: target.to_path_buf(),
            link: link.to_path_buf(),
        });
        Ok(())
    }
}
