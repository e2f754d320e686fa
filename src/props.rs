// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! `system.prop` parsing and the property-store boundary.
//!
//! Actually setting an Android system property is out of scope (spec.md 1);
//! [`PropertyStore`] is the seam a real daemon would plug `resetprop`-style
//! IPC into, mirroring how [`crate::mounter::Mounter`] seams the kernel
//! mount calls.

use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;

pub trait PropertyStore {
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

pub struct LoggingPropertyStore;

impl PropertyStore for LoggingPropertyStore {
    fn set(&self, key: &str, value: &str) -> Result<()> {
        log::info!("would set property {key}={value}");
        Ok(())
    }
}

/// Test double recording every `set` call, for assertions in boot-stage tests.
#[derive(Default)]
pub struct RecordingPropertyStore {
    sets: Mutex<Vec<(String, String)>>,
}

impl RecordingPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sets(&self) -> Vec<(String, String)> {
        self.sets.lock().unwrap().clone()
    }
}

impl PropertyStore for RecordingPropertyStore {
    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.sets.lock().unwrap().push((key.to_string(), value.to_string()));
        Ok(())
    }
}

/// Parses `key=value` lines from a `system.prop` file, skipping blanks and
/// `#`-comments.
pub fn parse_system_prop(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// Reads and applies `<module>/system.prop` if it exists; a missing file is
/// not an error (spec.md 7, recoverable I/O).
pub fn apply_module_system_prop(store: &dyn PropertyStore, module_dir: &Path) -> Result<()> {
    let prop_file = module_dir.join(crate::defs::SYSTEM_PROP_FILE_NAME);
    let Ok(content) = std::fs::read_to_string(&prop_file) else {
        return Ok(());
    };
    for (key, value) in parse_system_prop(&content) {
        store.set(&key, &value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_comments_and_blank_lines() {
        let content = "# a comment\n\nro.debuggable=1\nkey.with.dots = value \n";
        let parsed = parse_system_prop(content);
        assert_eq!(
            parsed,
            vec![
                ("ro.debuggable".to_string(), "1".to_string()),
                ("key.with.dots".to_string(), "value".to_string()),
            ]
        );
    }

    #[test]
    fn missing_system_prop_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        apply_module_system_prop(&LoggingPropertyStore, tmp.path()).unwrap();
    }
}
