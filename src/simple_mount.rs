// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Simple Mount (spec.md 4.F): unconditional bind-mount of files staged in
//! `CACHEMOUNT/<path>` onto the live `<path>`. Runs in `post-fs`, before
//! `/data` is writable, so there is no image work here at all.

use std::path::Path;

use anyhow::Result;

use crate::mounter::Mounter;

/// Recurses into `CACHEMOUNT/<path>`; for each regular file present both in
/// cache and live, clones attributes from live onto the cache copy and
/// bind-mounts the cache file over the live one. Missing live targets are
/// skipped — you cannot bind-mount onto a path that doesn't exist.
pub fn simple_mount(cachemount: &Path, root: &Path, mounter: &dyn Mounter, path: &str) -> Result<()> {
    let cache_path = cachemount.join(path.trim_start_matches('/'));
    let Ok(entries) = std::fs::read_dir(&cache_path) else {
        return Ok(());
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Ok(file_type) = entry.file_type() else { continue };
        let child_path = format!("{}/{}", path.trim_end_matches('/'), name);
        let live_path = root.join(child_path.trim_start_matches('/'));

        if file_type.is_dir() {
            simple_mount(cachemount, root, mounter, &child_path)?;
        } else if file_type.is_file() {
            if !live_path.exists() {
                continue;
            }
            let _ = crate::utils::clone_attrs(&live_path, &entry.path());
            mounter.bind_mount(&entry.path(), &live_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mounter::{MountOp, RecordingMounter};
    use std::fs;

    #[test]
    fn binds_cache_files_onto_matching_live_files_only() {
        let tmp = tempfile::tempdir().unwrap();
        let cachemount = tmp.path().join("cache");
        let root = tmp.path().join("live");

        fs::create_dir_all(cachemount.join("system/etc")).unwrap();
        fs::write(cachemount.join("system/etc/hosts"), "cached").unwrap();
        fs::write(cachemount.join("system/etc/orphan.conf"), "no live target").unwrap();
        fs::create_dir_all(root.join("system/etc")).unwrap();
        fs::write(root.join("system/etc/hosts"), "live").unwrap();

        let mounter = RecordingMounter::new();
        simple_mount(&cachemount, &root, &mounter, "/system").unwrap();

        let ops = mounter.ops();
        assert_eq!(
            ops,
            vec![MountOp::BindMount {
                source: cachemount.join("system/etc/hosts"),
                target: root.join("system/etc/hosts"),
            }]
        );
    }
}
