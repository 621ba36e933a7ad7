//! gz-git-config
//!
//! Resolves and inspects the layered configuration of the gz-git
//! multi-repository workspace tool.

use anyhow::{Context, Result};
use clap::Parser;
use gz_git_config::cli::flags::FlagArgs;
use gz_git_config::cli::profile::run_profile;
use gz_git_config::cli::tree::run_tree;
use gz_git_config::cli::{Cli, Command};
use gz_git_config::config::{EffectiveConfig, FieldKey, Loaded, Manager, Resolver};
use gz_git_config::format::{
    OutputFormat, format_effective_json, format_effective_text, format_field_json,
    format_field_text, format_warnings,
};
use gz_git_config::logging::{LogTarget, init_logging};
use gz_git_config::paths::ConfigPaths;
use std::path::{Path, PathBuf};
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogTarget::parse(&cli.log), cli.verbose)?;

    let paths = match &cli.config_home {
        Some(root) => ConfigPaths::with_root(root),
        None => ConfigPaths::discover().context("locating config home")?,
    };
    debug!(root = %paths.root().display(), "Using config home");
    let manager = Manager::new(paths);

    match &cli.command {
        Command::Init => {
            manager.initialize().context("initializing config home")?;
            println!("Initialized {}", manager.paths().root().display());
        }
        Command::Show { flags, dir, json } => {
            let loaded = resolve(&manager, flags, dir.as_deref())?;
            eprint!("{}", format_warnings(&loaded.warnings));
            match OutputFormat::from_json_flag(*json) {
                OutputFormat::Json => {
                    let out = format_effective_json(&loaded.value);
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
                OutputFormat::Text => print!("{}", format_effective_text(&loaded.value)),
            }
        }
        Command::Get {
            key,
            flags,
            dir,
            json,
        } => {
            let key: FieldKey = key.parse()?;
            let loaded = resolve(&manager, flags, dir.as_deref())?;
            eprint!("{}", format_warnings(&loaded.warnings));
            let entry = loaded
                .value
                .fields()
                .into_iter()
                .find(|entry| entry.key == key)
                .context("field missing from resolved configuration")?;
            match OutputFormat::from_json_flag(*json) {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&format_field_json(&entry))?);
                }
                OutputFormat::Text => println!("{}", format_field_text(&entry)),
            }
        }
        Command::Profile(command) => run_profile(&manager, command)?,
        Command::Tree(args) => run_tree(args, manager.env().clone())?,
    }

    Ok(())
}

/// Load every precedence layer and resolve with the given flags.
fn resolve(
    manager: &Manager,
    flags: &FlagArgs,
    dir: Option<&Path>,
) -> Result<Loaded<EffectiveConfig>> {
    let cwd: PathBuf = match dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("reading current directory")?,
    };
    let home = dirs::home_dir();
    let resolver = Resolver::load(manager, &cwd, home.as_deref())
        .context("loading configuration layers")?;
    resolver
        .resolve(&flags.to_flags())
        .context("resolving configuration")
}
