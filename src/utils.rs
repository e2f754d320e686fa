// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Small filesystem helpers shared across components.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use anyhow::{Context, Result};

/// Clones owner, mode, SELinux context and timestamps from `source` onto
/// `dest`. Best-effort on the SELinux xattr: filesystems without xattr
/// support (tmpfs under some configs, most test harnesses) simply skip it.
pub fn clone_attrs(source: &Path, dest: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(source).with_context(|| format!("stat {}", source.display()))?;

    let _ = rustix::fs::chown(
        dest,
        Some(rustix::fs::Uid::from_raw(meta.uid())),
        Some(rustix::fs::Gid::from_raw(meta.gid())),
    );
    let _ = rustix::fs::chmod(dest, rustix::fs::Mode::from_raw_mode(meta.mode()));

    let times = rustix::fs::Timestamps {
        last_access: rustix::fs::Timespec {
            tv_sec: meta.atime(),
            tv_nsec: meta.atime_nsec(),
        },
        last_modification: rustix::fs::Timespec {
            tv_sec: meta.mtime(),
            tv_nsec: meta.mtime_nsec(),
        },
    };
    let _ = rustix::fs::utimensat(rustix::fs::CWD, dest, &times, rustix::fs::AtFlags::empty());

    if let Ok(ctx) = extattr::lgetxattr(source, "security.selinux") {
        let _ = extattr::lsetxattr(dest, "security.selinux", &ctx, extattr::Flags::empty());
    }
    Ok(())
}

/// Recursively deletes `path` if it exists; silent no-op otherwise — used
/// for `remove` sentinel modules and module-upgrade directory replacement.
pub fn remove_recursively(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    if path.is_dir() {
        fs::remove_dir_all(path).with_context(|| format!("rm -r {}", path.display()))
    } else {
        fs::remove_file(path).with_context(|| format!("rm {}", path.display()))
    }
}

/// Recursively copies `source` onto `dest`, preserving attributes, used by
/// the Image Merger to clone a loop-mounted module image into another.
pub fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(source).with_context(|| format!("stat {}", source.display()))?;
    if meta.file_type().is_symlink() {
        let target = fs::read_link(source)?;
        let _ = fs::remove_file(dest);
        std::os::unix::fs::symlink(&target, dest)
            .with_context(|| format!("symlink {} -> {}", dest.display(), target.display()))?;
    } else if meta.is_dir() {
        fs::create_dir_all(dest).with_context(|| format!("mkdir {}", dest.display()))?;
        let _ = clone_attrs(source, dest);
        for entry in fs::read_dir(source)?.flatten() {
            copy_tree(&entry.path(), &dest.join(entry.file_name()))?;
        }
    } else {
        fs::copy(source, dest).with_context(|| format!("copy {} -> {}", source.display(), dest.display()))?;
        let _ = clone_attrs(source, dest);
    }
    Ok(())
}
