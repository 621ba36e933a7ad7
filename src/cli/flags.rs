//! Override flags shared by `show`, `get`, and `profile create`.

use crate::config::{Flags, Settings};
use clap::Args;
use serde_json::Value;

/// Configuration override flags. Only flags actually given reach the resolver.
#[derive(Args, Debug, Clone, Default)]
pub struct FlagArgs {
    /// Forge provider (github, gitlab, gitea)
    #[arg(long)]
    pub provider: Option<String>,

    /// Forge API base URL
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Forge API token (supports ${VAR})
    #[arg(long)]
    pub token: Option<String>,

    /// Clone protocol (ssh, https)
    #[arg(long, value_name = "PROTO")]
    pub clone_proto: Option<String>,

    /// SSH port used for clones
    #[arg(long, value_name = "PORT")]
    pub ssh_port: Option<u32>,

    /// Maximum parallel operations
    #[arg(long, value_name = "N")]
    pub parallel: Option<i32>,

    /// Include GitLab subgroups (true/false; bare flag means true)
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub include_subgroups: Option<bool>,

    /// Subgroup layout (flat, nested)
    #[arg(long, value_name = "MODE")]
    pub subgroup_mode: Option<String>,
}

impl FlagArgs {
    /// The flags map for the resolver, keyed by flag name.
    pub fn to_flags(&self) -> Flags {
        let mut flags = Flags::new();
        let mut put = |name: &str, value: Option<Value>| {
            if let Some(value) = value {
                flags.insert(name.to_string(), value);
            }
        };
        put("provider", self.provider.clone().map(Value::from));
        put("base-url", self.base_url.clone().map(Value::from));
        put("token", self.token.clone().map(Value::from));
        put("clone-proto", self.clone_proto.clone().map(Value::from));
        put("ssh-port", self.ssh_port.map(Value::from));
        put("parallel", self.parallel.map(Value::from));
        put("include-subgroups", self.include_subgroups.map(Value::from));
        put("subgroup-mode", self.subgroup_mode.clone().map(Value::from));
        flags
    }

    /// The same values as profile settings.
    pub fn to_settings(&self) -> Settings {
        Settings {
            provider: self.provider.clone().unwrap_or_default(),
            base_url: self.base_url.clone().unwrap_or_default(),
            token: self.token.clone().unwrap_or_default(),
            clone_proto: self.clone_proto.clone().unwrap_or_default(),
            ssh_port: self.ssh_port.unwrap_or_default(),
            parallel: self.parallel.unwrap_or_default(),
            include_subgroups: self.include_subgroups,
            subgroup_mode: self.subgroup_mode.clone().unwrap_or_default(),
            ..Settings::default()
        }
    }
}
