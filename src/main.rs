// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::{Context, Result};
use clap::Parser;

use magic_mount_daemon::boot::{late_start, post_fs, post_fs_data, BootContext};
use magic_mount_daemon::cli::{Cli, Commands};
use magic_mount_daemon::config::Config;
use magic_mount_daemon::image::LoopImage;
use magic_mount_daemon::ipc::NullStageClient;
use magic_mount_daemon::logging;
use magic_mount_daemon::mounter::{Mounter, SystemMounter};
use magic_mount_daemon::props::{LoggingPropertyStore, PropertyStore};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Out-of-scope loopback collaborator (spec.md 1): the production binary
/// has no real ioctl-based loop-device backend wired in yet, so boot-stage
/// image work is logged rather than performed. A device build plugs a real
/// implementation in here.
struct UnimplementedLoopImage;

impl LoopImage for UnimplementedLoopImage {
    fn usage(&self, image: &std::path::Path) -> Result<(u64, u64)> {
        log::warn!("loop image usage query not implemented: {}", image.display());
        Ok((0, 0))
    }
    fn resize(&self, image: &std::path::Path, new_size_bytes: u64) -> Result<()> {
        log::warn!("loop image resize not implemented: {} -> {new_size_bytes}", image.display());
        Ok(())
    }
    fn mount(&self, image: &std::path::Path, at: &std::path::Path) -> Result<()> {
        log::warn!("loop image mount not implemented: {} -> {}", image.display(), at.display());
        Ok(())
    }
    fn unmount(&self, at: &std::path::Path) -> Result<()> {
        log::warn!("loop image unmount not implemented: {}", at.display());
        Ok(())
    }
    fn create(&self, image: &std::path::Path, size_bytes: u64) -> Result<()> {
        log::warn!("loop image create not implemented: {} ({size_bytes} bytes)", image.display());
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_default().unwrap_or_default(),
    };
    config.merge_with_cli(cli.verbose);

    std::fs::create_dir_all(&config.coredir)
        .with_context(|| format!("failed to create {}", config.coredir.display()))?;
    let _guard = logging::init_logging(&config.coredir, config.verbose);

    let mounter: &dyn Mounter = &SystemMounter;
    let loop_image = UnimplementedLoopImage;
    let props: &dyn PropertyStore = &LoggingPropertyStore;

    match cli.command {
        Commands::GenConfig { output } => {
            Config::default().save_to_file(&output)?;
            println!("wrote default configuration to {}", output.display());
        }
        Commands::ShowConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::PostFs => {
            let ctx = BootContext { config: &config, mounter, loop_image: &loop_image, props };
            let mut client = NullStageClient;
            post_fs::run(&ctx, &mut client);
        }
        Commands::PostFsData => {
            let ctx = BootContext { config: &config, mounter, loop_image: &loop_image, props };
            let mut client = NullStageClient;
            post_fs_data::run(&ctx, &mut client);
        }
        Commands::LateStart => {
            let ctx = BootContext { config: &config, mounter, loop_image: &loop_image, props };
            let mut client = NullStageClient;
            late_start::run(&ctx, &mut client);
        }
    }

    Ok(())
}
