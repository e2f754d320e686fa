// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Image Merger (spec.md 4.E): combines an incoming module image into the
//! active image, resizing to fit and detecting per-module upgrades.
//!
//! Loopback create/mount/resize primitives are out of scope (spec.md 1);
//! [`LoopImage`] is the seam production code plugs real loop-device ioctls
//! into, mirroring [`crate::mounter::Mounter`] for the overlay engine proper.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::defs;
use crate::utils;

/// `round_size(x) = ((x/32)+2)*32`, megabytes, with a two-unit slack
/// (spec.md 4.E).
pub fn round_size(used_bytes: u64) -> u64 {
    let used_mb = used_bytes / (1024 * 1024);
    ((used_mb / defs::ROUND_SIZE_UNIT_MB) + defs::ROUND_SIZE_SLACK_UNITS) * defs::ROUND_SIZE_UNIT_MB
        * 1024
        * 1024
}

/// Out-of-scope loopback collaborator: create/mount/resize/size-query for a
/// sparse ext4 image. Production code talks to the kernel loop driver;
/// tests substitute [`FakeLoopImage`].
pub trait LoopImage {
    fn usage(&self, image: &Path) -> Result<(u64, u64)>;
    fn resize(&self, image: &Path, new_size_bytes: u64) -> Result<()>;
    fn mount(&self, image: &Path, at: &Path) -> Result<()>;
    fn unmount(&self, at: &Path) -> Result<()>;
    fn create(&self, image: &Path, size_bytes: u64) -> Result<()>;
}

/// `merge_img(source, target)` (spec.md 4.E).
pub fn merge_img(loop_image: &dyn LoopImage, source: &Path, target: &Path, work_dir: &Path) -> Result<()> {
    if !source.exists() {
        return Ok(());
    }
    if !target.exists() {
        std::fs::rename(source, target).with_context(|| format!("rename {} -> {}", source.display(), target.display()))?;
        return Ok(());
    }

    let (s_used, _s_total) = loop_image.usage(source)?;
    let (t_used, t_total) = loop_image.usage(target)?;
    let desired = round_size(s_used + t_used);
    if desired != t_total {
        loop_image.resize(target, desired)?;
    }

    let source_tmp = work_dir.join("source_tmp");
    let target_tmp = work_dir.join("target_tmp");
    std::fs::create_dir_all(&source_tmp)?;
    std::fs::create_dir_all(&target_tmp)?;
    loop_image.mount(source, &source_tmp)?;
    loop_image.mount(target, &target_tmp)?;

    for entry in std::fs::read_dir(&source_tmp)?.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == "." || name == ".." || name == ".core" || name == "lost+found" {
            continue;
        }
        let target_module_dir = target_tmp.join(&name);
        if target_module_dir.exists() {
            log::info!("Upgrade {name}");
            utils::remove_recursively(&target_module_dir)?;
        } else {
            log::info!("New {name}");
        }
    }

    utils::copy_tree(&source_tmp, &target_tmp)?;

    loop_image.unmount(&source_tmp)?;
    loop_image.unmount(&target_tmp)?;
    let _ = std::fs::remove_dir(&source_tmp);
    let _ = std::fs::remove_dir(&target_tmp);
    std::fs::remove_file(source).with_context(|| format!("unlink {}", source.display()))?;
    Ok(())
}

/// Resizes `img` down to `round_size(used)` if that differs from its
/// current total size — run after tree construction so the final size
/// reflects only actually-enabled modules.
pub fn trim_img(loop_image: &dyn LoopImage, img: &Path) -> Result<()> {
    let (used, total) = loop_image.usage(img)?;
    let desired = round_size(used);
    if desired != total {
        loop_image.resize(img, desired)?;
    }
    Ok(())
}

/// In-memory [`LoopImage`] fake for unit tests. Each fake "image" is a real
/// (empty) file, matching `merge_img`'s `exists`/`rename`/`remove_file`
/// calls; its filesystem content lives in a side-car `<image>.content/`
/// directory. `mount` copies that content to the mount point and `unmount`
/// copies it back, approximating a real loop mount's shared backing store
/// closely enough for merge-correctness assertions.
#[derive(Default)]
pub struct FakeLoopImage {
    sizes: std::sync::Mutex<std::collections::HashMap<PathBuf, (u64, u64)>>,
    mounts: std::sync::Mutex<std::collections::HashMap<PathBuf, PathBuf>>,
}

impl FakeLoopImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_usage(&self, image: &Path, used: u64, total: u64) {
        self.sizes.lock().unwrap().insert(image.to_path_buf(), (used, total));
    }

    fn content_dir(image: &Path) -> PathBuf {
        let mut name = image.as_os_str().to_os_string();
        name.push(".content");
        PathBuf::from(name)
    }

    /// Test helper: writes `relative` under `image`'s backing content
    /// directory, creating the fake image file itself if needed.
    pub fn seed_file(&self, image: &Path, relative: &str, content: &str) {
        if !image.exists() {
            std::fs::write(image, b"").unwrap();
        }
        let dest = Self::content_dir(image).join(relative);
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(dest, content).unwrap();
    }
}

impl LoopImage for FakeLoopImage {
    fn usage(&self, image: &Path) -> Result<(u64, u64)> {
        Ok(*self.sizes.lock().unwrap().get(image).unwrap_or(&(0, 0)))
    }

    fn resize(&self, image: &Path, new_size_bytes: u64) -> Result<()> {
        let mut sizes = self.sizes.lock().unwrap();
        let entry = sizes.entry(image.to_path_buf()).or_insert((0, 0));
        entry.1 = new_size_bytes;
        Ok(())
    }

    fn mount(&self, image: &Path, at: &Path) -> Result<()> {
        std::fs::create_dir_all(at)?;
        let content_dir = Self::content_dir(image);
        if content_dir.is_dir() {
            utils::copy_tree(&content_dir, at)?;
        }
        self.mounts.lock().unwrap().insert(at.to_path_buf(), image.to_path_buf());
        Ok(())
    }

    fn unmount(&self, at: &Path) -> Result<()> {
        if let Some(image) = self.mounts.lock().unwrap().remove(at) {
            let content_dir = Self::content_dir(&image);
            utils::remove_recursively(&content_dir)?;
            utils::copy_tree(at, &content_dir)?;
        }
        Ok(())
    }

    fn create(&self, image: &Path, size_bytes: u64) -> Result<()> {
        std::fs::write(image, b"")?;
        self.set_usage(image, 0, size_bytes);
        Ok(())
    }
}
