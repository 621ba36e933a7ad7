//! Tree subcommand: load and validate a workspace hierarchy.

use crate::config::{EnvSource, LoadOptions, load_tree};
use crate::format::{OutputFormat, format_tree_json, format_tree_text, format_warnings};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

/// Arguments for the tree subcommand
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Root directory of the hierarchy (default: current directory)
    pub dir: Option<PathBuf>,

    /// Fail when a git child has no repository
    #[arg(long)]
    pub strict: bool,

    /// Config file name looked up in each directory
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<String>,

    /// Maximum nesting depth
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Only load the root and its parents
    #[arg(long)]
    pub no_children: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl TreeArgs {
    pub fn load_options(&self, env: EnvSource) -> LoadOptions {
        let mut options = LoadOptions::default()
            .with_strict_git_repos(self.strict)
            .with_children(!self.no_children)
            .with_env(env);
        if let Some(file) = &self.config_file {
            options = options.with_config_file(file.as_str());
        }
        if let Some(depth) = self.max_depth {
            options = options.with_max_depth(depth);
        }
        options
    }
}

/// Load, validate, and print the hierarchy.
pub fn run_tree(args: &TreeArgs, env: EnvSource) -> Result<()> {
    let dir = match &args.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("reading current directory")?,
    };

    let loaded = load_tree(&dir, &args.load_options(env))
        .with_context(|| format!("loading configuration tree at {}", dir.display()))?;
    loaded.value.validate().context("validating configuration tree")?;

    eprint!("{}", format_warnings(&loaded.warnings));
    match OutputFormat::from_json_flag(args.json) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&format_tree_json(&loaded.value))?);
        }
        OutputFormat::Text => print!("{}", format_tree_text(&loaded.value)),
    }
    Ok(())
}
