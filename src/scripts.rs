// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Script Runner (spec.md 4.H): enumerates and executes common and
//! per-module scripts for a named boot stage.
//!
//! Order is filesystem-enumeration order, not sorted — the source this
//! engine is modeled on never guaranteed alphabetical order either
//! (spec.md 9), so callers must not depend on it.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Command;

use anyhow::Result;

/// Runs every executable regular file directly under `COREDIR/<stage>.d`,
/// waiting on each before starting the next.
pub fn exec_common_script(coredir: &Path, stage: &str) -> Result<()> {
    let dir = coredir.join(format!("{stage}.d"));
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Ok(());
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !is_executable_file(&path) {
            continue;
        }
        run_script(&path)?;
    }
    Ok(())
}

/// Runs `MOUNTPOINT/<m>/<stage>.sh` for every module in `enabled_modules`,
/// if present.
pub fn exec_module_script(mountpoint: &Path, stage: &str, enabled_modules: &[String]) -> Result<()> {
    for module in enabled_modules {
        let script = mountpoint.join(module).join(format!("{stage}.sh"));
        if is_executable_file(&script) {
            run_script(&script)?;
        }
    }
    Ok(())
}

fn is_executable_file(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    meta.is_file() && meta.permissions().mode() & 0o111 != 0
}

fn run_script(path: &Path) -> Result<()> {
    log::info!("running script {}", path.display());
    let status = Command::new(path).status();
    match status {
        Ok(status) if !status.success() => {
            log::warn!("script {} exited with {status}", path.display());
        }
        Err(err) => {
            log::warn!("failed to spawn script {}: {err}", path.display());
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_executable(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
        let mut perms = fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).unwrap();
    }

    #[test]
    fn common_script_runs_only_executable_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let stage_dir = tmp.path().join("post-fs-data.d");
        fs::create_dir_all(&stage_dir).unwrap();
        make_executable(&stage_dir.join("run.sh"), "#!/bin/sh\nexit 0\n");
        fs::write(stage_dir.join("README"), "not a script").unwrap();

        exec_common_script(tmp.path(), "post-fs-data").unwrap();
    }

    #[test]
    fn missing_stage_directory_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        exec_common_script(tmp.path(), "service").unwrap();
    }

    #[test]
    fn module_script_skipped_when_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let mountpoint = tmp.path().join("modules");
        fs::create_dir_all(mountpoint.join("A")).unwrap();
        exec_module_script(&mountpoint, "service", &["A".to_string()]).unwrap();
    }
}
