//! Field validation and `${VAR}` environment expansion.
//!
//! Validation and expansion are separate steps. Expansion never fails: a
//! missing variable expands to the empty string and is reported as a
//! [`ConfigWarning`] that the caller decides how to surface.

use crate::error::{ConfigError, Result};
use regex_lite::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Allowed forge providers.
pub const PROVIDERS: &[&str] = &["github", "gitlab", "gitea"];
/// Allowed clone protocols.
pub const CLONE_PROTOCOLS: &[&str] = &["ssh", "https"];
/// Allowed subgroup layouts.
pub const SUBGROUP_MODES: &[&str] = &["flat", "nested"];
/// Allowed sync strategies.
pub const SYNC_STRATEGIES: &[&str] = &["pull", "reset", "skip"];
/// Allowed output formats for the `defaults.output` group.
pub const OUTPUT_FORMATS: &[&str] = &["text", "json"];

/// Shell metacharacters rejected in hook commands, longest first.
const UNSAFE_METACHARS: &[&str] = &["$(", "&&", "||", "|", ";", "&", ">", "<", "`", "\n"];

/// Kind of non-fatal condition found while loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// `${VAR}` referenced a variable that is not set.
    MissingEnvVar,
    /// A `git` child points at a directory without a repository.
    MissingRepository,
    /// A generic map (global defaults, flags) used an unrecognized key.
    UnknownKey,
    /// The active profile could not be loaded.
    MissingProfile,
}

/// Non-fatal configuration warning returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigWarning {
    pub kind: WarningKind,
    /// Field or key the warning is about.
    pub field: String,
    pub message: String,
    /// File the warning came from, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl ConfigWarning {
    pub fn new(kind: WarningKind, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            message: message.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {} ({})", self.field, self.message, path.display()),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

/// A value together with the warnings produced while building it.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub value: T,
    pub warnings: Vec<ConfigWarning>,
}

impl<T> Loaded<T> {
    pub fn new(value: T, warnings: Vec<ConfigWarning>) -> Self {
        Self { value, warnings }
    }
}

/// Where `${VAR}` values come from.
#[derive(Debug, Clone, Default)]
pub enum EnvSource {
    /// The process environment.
    #[default]
    Process,
    /// A fixed set of variables; anything else is missing.
    Map(HashMap<String, String>),
}

impl EnvSource {
    /// Build a fixed source from name/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<String> {
        match self {
            Self::Process => std::env::var(name).ok(),
            Self::Map(map) => map.get(name).cloned(),
        }
    }
}

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env pattern"))
}

fn profile_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid name pattern"))
}

/// Replace every `${NAME}` token in `input`.
///
/// Missing variables become empty strings and add a warning for `field`.
pub fn expand_env(
    input: &str,
    field: &str,
    env: &EnvSource,
    warnings: &mut Vec<ConfigWarning>,
) -> String {
    if !input.contains("${") {
        return input.to_string();
    }

    env_pattern()
        .replace_all(input, |caps: &regex_lite::Captures<'_>| {
            let name = &caps[1];
            match env.get(name) {
                Some(value) => value,
                None => {
                    warnings.push(ConfigWarning::new(
                        WarningKind::MissingEnvVar,
                        field,
                        format!("environment variable {name} is not set; expanded to empty string"),
                    ));
                    String::new()
                }
            }
        })
        .into_owned()
}

/// Expand a field in place.
pub fn expand_field(
    value: &mut String,
    field: &str,
    env: &EnvSource,
    warnings: &mut Vec<ConfigWarning>,
) {
    *value = expand_env(value, field, env, warnings);
}

/// Validate a profile name against `^[A-Za-z0-9_-]+$`.
pub fn validate_profile_name(name: &str) -> Result<()> {
    if profile_name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::validation(
            "name",
            format!(
                "profile name '{name}' may only contain letters, digits, '-' and '_'"
            ),
        ))
    }
}

/// Validate an enumerated string field; empty means unset and passes.
pub fn validate_enum(field: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if value.is_empty() || allowed.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::validation(
        field,
        format!("'{value}' must be one of: {}", allowed.join(", ")),
    ))
}

/// Validate an SSH port.
///
/// Stored configs allow 0 (unset); resolved configs require a real port.
pub fn validate_port(field: &str, port: u32, allow_zero: bool) -> Result<()> {
    let min = if allow_zero { 0 } else { 1 };
    if port < min || port > 65_535 {
        return Err(ConfigError::validation(
            field,
            format!("{port} is outside the range {min}-65535"),
        ));
    }
    Ok(())
}

/// Validate a count that must not be negative.
pub fn validate_non_negative(field: &str, value: i32) -> Result<()> {
    if value < 0 {
        return Err(ConfigError::validation(
            field,
            format!("{value} must be zero or greater"),
        ));
    }
    Ok(())
}

/// Reject hook commands containing shell control characters.
pub fn validate_hook_command(command: &str) -> Result<()> {
    for metachar in UNSAFE_METACHARS {
        if command.contains(metachar) {
            return Err(ConfigError::UnsafeCommand {
                command: command.to_string(),
                metachar: (*metachar).to_string(),
            });
        }
    }
    if command.trim().is_empty() {
        return Err(ConfigError::validation("hooks", "hook command must not be empty"));
    }
    Ok(())
}
