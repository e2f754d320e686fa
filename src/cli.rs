// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "magic-mount-daemon", version, about = "Boot-stage module overlay engine")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the default configuration to a file.
    GenConfig {
        #[arg(short, long, default_value = crate::config::CONFIG_FILE_DEFAULT)]
        output: PathBuf,
    },
    /// Print the effective configuration as TOML.
    ShowConfig,
    /// Run the `post-fs` boot stage.
    PostFs,
    /// Run the `post-fs-data` boot stage.
    PostFsData,
    /// Run the `late-start` boot stage.
    LateStart,
}
