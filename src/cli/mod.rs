//! CLI command definitions for gz-git-config
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod flags;
pub mod profile;
pub mod tree;

use clap::{Parser, Subcommand};
use flags::FlagArgs;
use profile::ProfileCommand;
use std::path::PathBuf;
use tree::TreeArgs;

/// Inspect and manage gz-git configuration
#[derive(Parser, Debug)]
#[command(name = "gz-git-config", author, version, about, long_about = None)]
pub struct Cli {
    /// Config home directory (overrides GZ_GIT_CONFIG_HOME)
    #[arg(long, value_name = "DIR", global = true)]
    pub config_home: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the config home, the default profile, and the global config
    Init,

    /// Show every resolved field with its source
    Show {
        #[command(flatten)]
        flags: FlagArgs,

        /// Directory to resolve from (default: current directory)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print one resolved field and its source
    Get {
        /// Field name, e.g. parallel, base-url, sync.strategy
        key: String,

        #[command(flatten)]
        flags: FlagArgs,

        /// Directory to resolve from (default: current directory)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage profiles
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Load and validate a workspace hierarchy
    Tree(TreeArgs),
}
