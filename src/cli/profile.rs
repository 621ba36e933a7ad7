//! Profile subcommands.

use super::flags::FlagArgs;
use crate::config::{Manager, Profile};
use crate::format::{OutputFormat, format_warnings};
use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::json;

/// Profile management commands
#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// List stored profiles
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the active profile name
    Current,

    /// Show a profile's stored values
    Show {
        name: String,

        /// Show values after ${VAR} expansion
        #[arg(long)]
        expand: bool,
    },

    /// Create a new profile from flags
    Create {
        name: String,

        #[command(flatten)]
        flags: FlagArgs,
    },

    /// Make a profile active
    Use { name: String },

    /// Delete a profile
    Delete { name: String },
}

/// Run a profile subcommand.
pub fn run_profile(manager: &Manager, command: &ProfileCommand) -> Result<()> {
    match command {
        ProfileCommand::List { json } => {
            let names = manager.list_profiles()?;
            let active = manager.active_profile()?;
            match OutputFormat::from_json_flag(*json) {
                OutputFormat::Json => {
                    let out = json!({ "active": active, "profiles": names });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
                OutputFormat::Text => {
                    for name in names {
                        let marker = if name == active { "*" } else { " " };
                        println!("{marker} {name}");
                    }
                }
            }
        }
        ProfileCommand::Current => {
            println!("{}", manager.active_profile()?);
        }
        ProfileCommand::Show { name, expand } => {
            let profile = if *expand {
                let loaded = manager.load_profile(name)?;
                eprint!("{}", format_warnings(&loaded.warnings));
                loaded.value
            } else {
                manager.load_profile_raw(name)?
            };
            print!("{}", profile.to_yaml()?);
        }
        ProfileCommand::Create { name, flags } => {
            let profile = Profile::new(name.as_str()).with_settings(flags.to_settings());
            manager
                .create_profile(&profile)
                .with_context(|| format!("creating profile '{name}'"))?;
            println!("Created profile '{name}'");
        }
        ProfileCommand::Use { name } => {
            manager.set_active_profile(name)?;
            println!("Active profile: {name}");
        }
        ProfileCommand::Delete { name } => {
            manager.delete_profile(name)?;
            println!("Deleted profile '{name}'");
        }
    }
    Ok(())
}
