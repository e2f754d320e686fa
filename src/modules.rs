// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Module enumeration at `MOUNTPOINT` (spec.md 4.G step 6): culls removed
//! and disabled modules, records the enabled set, and applies
//! `system.prop`.

use std::path::Path;

use anyhow::Result;

use crate::defs;
use crate::props::PropertyStore;
use crate::utils;

const SKIP_ENTRIES: [&str; 2] = [".core", "lost+found"];

/// One enabled module discovered under `MOUNTPOINT`.
#[derive(Debug, Clone)]
pub struct EnabledModule {
    pub id: String,
    /// False when `auto_mount` is absent or `<m>/system` is absent — such a
    /// module is still enabled (scripts still run) but contributes nothing
    /// to the overlay tree.
    pub has_overlay_payload: bool,
}

/// Enumerates `mountpoint`'s top-level entries, culling `remove`d modules,
/// skipping `disable`d ones, and applying each survivor's `system.prop`.
/// Returns the modules eligible for tree construction and/or scripts.
pub fn scan_enabled_modules(mountpoint: &Path, props: &dyn PropertyStore) -> Result<Vec<EnabledModule>> {
    let mut enabled = Vec::new();
    let Ok(entries) = std::fs::read_dir(mountpoint) else {
        return Ok(enabled);
    };

    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else { continue };
        if !file_type.is_dir() {
            continue;
        }
        let id = entry.file_name().to_string_lossy().into_owned();
        if SKIP_ENTRIES.contains(&id.as_str()) {
            continue;
        }
        let module_dir = entry.path();

        if module_dir.join(defs::REMOVE_FILE_NAME).exists() {
            let _ = utils::remove_recursively(&module_dir);
            continue;
        }
        if module_dir.join(defs::DISABLE_FILE_NAME).exists() {
            continue;
        }

        let _ = crate::props::apply_module_system_prop(props, &module_dir);

        let has_auto_mount = module_dir.join(defs::AUTO_MOUNT_FILE_NAME).exists();
        let has_system_dir = module_dir.join("system").is_dir();
        if has_auto_mount && has_system_dir {
            ensure_vendor_symlink(&module_dir)?;
        }

        enabled.push(EnabledModule {
            id,
            has_overlay_payload: has_auto_mount && has_system_dir,
        });
    }

    Ok(enabled)
}

/// If `<m>/system/vendor` exists, ensures a symlink `<m>/vendor ->
/// <m>/system/vendor`, unlinking any stale entry first, so vendor entries
/// remain reachable both inside `/system` and after the vendor splinter.
fn ensure_vendor_symlink(module_dir: &Path) -> Result<()> {
    let system_vendor = module_dir.join("system/vendor");
    if !system_vendor.exists() {
        return Ok(());
    }
    let link = module_dir.join("vendor");
    let _ = std::fs::remove_file(&link);
    let _ = std::fs::remove_dir(&link);
    std::os::unix::fs::symlink("system/vendor", &link)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props::LoggingPropertyStore;
    use std::fs;

    #[test]
    fn removed_module_is_deleted_and_excluded() {
        let tmp = tempfile::tempdir().unwrap();
        let mountpoint = tmp.path().join("modules");
        fs::create_dir_all(mountpoint.join("E")).unwrap();
        fs::write(mountpoint.join("E/remove"), "").unwrap();

        let enabled = scan_enabled_modules(&mountpoint, &LoggingPropertyStore).unwrap();
        assert!(enabled.is_empty());
        assert!(!mountpoint.join("E").exists());
    }

    #[test]
    fn disabled_module_is_skipped_but_kept_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let mountpoint = tmp.path().join("modules");
        fs::create_dir_all(mountpoint.join("E")).unwrap();
        fs::write(mountpoint.join("E/disable"), "").unwrap();

        let enabled = scan_enabled_modules(&mountpoint, &LoggingPropertyStore).unwrap();
        assert!(enabled.is_empty());
        assert!(mountpoint.join("E").exists());
    }

    #[test]
    fn module_without_auto_mount_is_enabled_but_has_no_payload() {
        let tmp = tempfile::tempdir().unwrap();
        let mountpoint = tmp.path().join("modules");
        fs::create_dir_all(mountpoint.join("A/system")).unwrap();

        let enabled = scan_enabled_modules(&mountpoint, &LoggingPropertyStore).unwrap();
        assert_eq!(enabled.len(), 1);
        assert!(!enabled[0].has_overlay_payload);
    }

    #[test]
    fn module_with_vendor_gets_sibling_symlink() {
        let tmp = tempfile::tempdir().unwrap();
        let mountpoint = tmp.path().join("modules");
        fs::create_dir_all(mountpoint.join("D/system/vendor")).unwrap();
        fs::write(mountpoint.join("D/auto_mount"), "").unwrap();

        let enabled = scan_enabled_modules(&mountpoint, &LoggingPropertyStore).unwrap();
        assert_eq!(enabled.len(), 1);
        assert!(enabled[0].has_overlay_payload);
        assert!(mountpoint.join("D/vendor").exists());
    }
}
