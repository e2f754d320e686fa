// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Path and sentinel-file constants for the boot-stage overlay engine.

pub const CONFIG_FILE_DEFAULT: &str = "/data/adb/magic-mount/config.toml";
pub const DAEMON_LOG_FILE: &str = "/data/adb/magic-mount/daemon.log";

/// Mount point of the active (loop-mounted) module image.
pub const MOUNTPOINT: &str = "/data/adb/modules";
/// Read-only mirrors of the live `/system` and `/vendor` partitions.
pub const MIRRDIR: &str = "/sbin/.magic_mount/mirror";
/// Writable shadow tree used by the Skeleton Cloner.
pub const DUMMDIR: &str = "/sbin/.magic_mount/dummy";
/// Staging area for `simple_mount`, populated before `/data` is available.
pub const CACHEMOUNT: &str = "/sbin/.magic_mount/cache";

pub const COREDIR: &str = "/data/adb/magic-mount";

pub const UNINSTALLER: &str = "/cache/magic_mount_uninstaller.sh";
pub const DISABLEFILE: &str = "/cache/.disable_magic_mount";
pub const UNBLOCKFILE: &str = "/dev/.magic_mount_unblock";
pub const LATELOGMON: &str = "/cache/magic_mount.log";
pub const HOSTSFILE: &str = "/data/adb/magic-mount/hosts";
pub const MANAGERAPK: &str = "/data/adb/magic-mount/manager.apk";

pub const CACHE_IMG: &str = "/cache/magisk.img";
pub const DATA_MERGE_IMG: &str = "/data/magic_mount_merge.img";
pub const ACTIVE_IMG: &str = "/data/adb/magic_mount.img";

pub const DISABLE_FILE_NAME: &str = "disable";
pub const REMOVE_FILE_NAME: &str = "remove";
pub const REPLACE_DIR_FILE_NAME: &str = ".replace";
pub const AUTO_MOUNT_FILE_NAME: &str = "auto_mount";
pub const SYSTEM_PROP_FILE_NAME: &str = "system.prop";

/// Property set at `late-start` when `DISABLEFILE` is present (spec.md 4.G).
pub const DISABLED_PROPERTY: &str = "magic_mount.disabled";

/// Default size of a freshly created active image, in bytes.
pub const NEW_IMG_SIZE_BYTES: u64 = 64 * 1024 * 1024;

/// `round_size` unit, in megabytes (see spec.md 4.E).
pub const ROUND_SIZE_UNIT_MB: u64 = 32;
/// Slack added on top of the rounded unit count.
pub const ROUND_SIZE_SLACK_UNITS: u64 = 2;
