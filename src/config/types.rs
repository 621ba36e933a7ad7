//! Configuration types and structures.
//!
//! Every level of configuration (profile, project, hierarchical node, child
//! entry) shares the same [`Settings`] override fields. All fields use their
//! zero value to mean "not specified"; see [`super::merge`].

use super::merge::{Merge, Unset, inherit, merge_maps, overlay};
use super::validate::{
    CLONE_PROTOCOLS, ConfigWarning, EnvSource, OUTPUT_FORMATS, PROVIDERS, SUBGROUP_MODES,
    SYNC_STRATEGIES, expand_field, validate_enum, validate_hook_command, validate_non_negative,
    validate_port, validate_profile_name,
};
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::Path;

/// Name of the reserved profile that always exists.
pub const DEFAULT_PROFILE: &str = "default";

/// Implements [`Unset`] as "equal to `Default`" for plain override groups.
macro_rules! unset_when_default {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Unset for $ty {
                fn is_unset(&self) -> bool {
                    *self == Self::default()
                }
            }
        )*
    };
}

fn field(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

// ---------------------------------------------------------------------------
// Branch lists
// ---------------------------------------------------------------------------

/// Ordered list of branch names.
///
/// Accepts a single string, a comma-separated string, or a list; always
/// serializes back as a comma-joined string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchList(Vec<String>);

impl BranchList {
    pub fn new<I, S>(branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            branches
                .into_iter()
                .flat_map(|b| split_branches(b.as_ref()))
                .collect(),
        )
    }

    /// Parse a comma-separated string.
    pub fn parse(raw: &str) -> Self {
        Self(split_branches(raw))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, branch: &str) -> bool {
        self.0.iter().any(|b| b == branch)
    }
}

fn split_branches(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .collect()
}

impl std::fmt::Display for BranchList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

impl Unset for BranchList {
    fn is_unset(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for BranchList {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.join(","))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BranchListDe {
    One(String),
    Many(Vec<String>),
}

impl<'de> Deserialize<'de> for BranchList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match BranchListDe::deserialize(deserializer)? {
            BranchListDe::One(raw) => Ok(Self::parse(&raw)),
            BranchListDe::Many(items) => Ok(Self::new(items)),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-command override groups
// ---------------------------------------------------------------------------

/// Overrides for `sync`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncOverrides {
    /// pull, reset, or skip.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub strategy: String,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub max_retries: i32,
    /// Duration string such as `30s`.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub timeout: String,
}

/// Overrides for `branch`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BranchOverrides {
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub default_branch: String,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub protected_branches: BranchList,
}

/// Overrides for `fetch`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchOverrides {
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub all_remotes: Option<bool>,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub prune: Option<bool>,
}

/// Overrides for `pull`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PullOverrides {
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub rebase: Option<bool>,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub ff_only: Option<bool>,
}

/// Overrides for `push`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushOverrides {
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub set_upstream: Option<bool>,
}

/// The five per-command override groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandOverrides {
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub sync: SyncOverrides,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub branch: BranchOverrides,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub fetch: FetchOverrides,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub pull: PullOverrides,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub push: PushOverrides,
}

unset_when_default!(
    SyncOverrides,
    BranchOverrides,
    FetchOverrides,
    PullOverrides,
    PushOverrides,
    CommandOverrides,
);

impl Merge for SyncOverrides {
    fn merge_from(&mut self, other: &Self) {
        overlay(&mut self.strategy, &other.strategy);
        overlay(&mut self.max_retries, &other.max_retries);
        overlay(&mut self.timeout, &other.timeout);
    }
}

impl Merge for BranchOverrides {
    fn merge_from(&mut self, other: &Self) {
        overlay(&mut self.default_branch, &other.default_branch);
        overlay(&mut self.protected_branches, &other.protected_branches);
    }
}

impl Merge for FetchOverrides {
    fn merge_from(&mut self, other: &Self) {
        overlay(&mut self.all_remotes, &other.all_remotes);
        overlay(&mut self.prune, &other.prune);
    }
}

impl Merge for PullOverrides {
    fn merge_from(&mut self, other: &Self) {
        overlay(&mut self.rebase, &other.rebase);
        overlay(&mut self.ff_only, &other.ff_only);
    }
}

impl Merge for PushOverrides {
    fn merge_from(&mut self, other: &Self) {
        overlay(&mut self.set_upstream, &other.set_upstream);
    }
}

impl Merge for CommandOverrides {
    fn merge_from(&mut self, other: &Self) {
        self.sync.merge_from(&other.sync);
        self.branch.merge_from(&other.branch);
        self.fetch.merge_from(&other.fetch);
        self.pull.merge_from(&other.pull);
        self.push.merge_from(&other.push);
    }
}

impl CommandOverrides {
    /// Validate enumerations and ranges under `prefix`.
    pub fn validate(&self, prefix: &str) -> Result<()> {
        validate_enum(
            &field(prefix, "sync.strategy"),
            &self.sync.strategy,
            SYNC_STRATEGIES,
        )?;
        validate_non_negative(&field(prefix, "sync.maxRetries"), self.sync.max_retries)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Shared override fields
// ---------------------------------------------------------------------------

/// Override fields shared by profiles, project configs, hierarchical nodes,
/// and child entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Forge provider: github, gitlab, or gitea.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub provider: String,

    /// Forge API base URL. Supports `${VAR}` expansion.
    #[serde(rename = "baseURL", skip_serializing_if = "Unset::is_unset")]
    pub base_url: String,

    /// Forge API token. Supports `${VAR}` expansion.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub token: String,

    /// Clone protocol: ssh or https.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub clone_proto: String,

    /// SSH port for clones; 0 means unset.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub ssh_port: u32,

    /// Maximum parallel operations; 0 means unset.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub parallel: i32,

    /// Whether to include GitLab subgroups.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub include_subgroups: Option<bool>,

    /// Subgroup layout: flat or nested.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub subgroup_mode: String,

    #[serde(flatten)]
    pub commands: CommandOverrides,
}

unset_when_default!(Settings);

impl Merge for Settings {
    fn merge_from(&mut self, other: &Self) {
        overlay(&mut self.provider, &other.provider);
        overlay(&mut self.base_url, &other.base_url);
        overlay(&mut self.token, &other.token);
        overlay(&mut self.clone_proto, &other.clone_proto);
        overlay(&mut self.ssh_port, &other.ssh_port);
        overlay(&mut self.parallel, &other.parallel);
        overlay(&mut self.include_subgroups, &other.include_subgroups);
        overlay(&mut self.subgroup_mode, &other.subgroup_mode);
        self.commands.merge_from(&other.commands);
    }
}

impl Settings {
    /// Validate enumerations and ranges. `prefix` qualifies field names in errors.
    pub fn validate(&self, prefix: &str) -> Result<()> {
        validate_enum(&field(prefix, "provider"), &self.provider, PROVIDERS)?;
        validate_enum(&field(prefix, "cloneProto"), &self.clone_proto, CLONE_PROTOCOLS)?;
        validate_enum(&field(prefix, "subgroupMode"), &self.subgroup_mode, SUBGROUP_MODES)?;
        validate_port(&field(prefix, "sshPort"), self.ssh_port, true)?;
        validate_non_negative(&field(prefix, "parallel"), self.parallel)?;
        self.commands.validate(prefix)
    }

    /// Expand `${VAR}` tokens in the token and base URL.
    pub fn expand_env(&mut self, prefix: &str, env: &EnvSource, warnings: &mut Vec<ConfigWarning>) {
        expand_field(&mut self.token, &field(prefix, "token"), env, warnings);
        expand_field(&mut self.base_url, &field(prefix, "baseURL"), env, warnings);
    }
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Commands run by the external hook runner around workspace operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hooks {
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub before: Vec<String>,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub after: Vec<String>,
}

unset_when_default!(Hooks);

impl Merge for Hooks {
    fn merge_from(&mut self, other: &Self) {
        overlay(&mut self.before, &other.before);
        overlay(&mut self.after, &other.after);
    }
}

impl Hooks {
    /// Reject commands with shell metacharacters.
    pub fn validate(&self) -> Result<()> {
        self.before
            .iter()
            .chain(self.after.iter())
            .try_for_each(|cmd| validate_hook_command(cmd))
    }
}

// ---------------------------------------------------------------------------
// Structured defaults groups
// ---------------------------------------------------------------------------

/// Clone defaults for a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloneDefaults {
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub proto: String,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub ssh_port: u32,
    /// Shallow clone depth; 0 means full history.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub depth: u32,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub branch: String,
}

/// Sync defaults for a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncDefaults {
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub strategy: String,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub max_retries: i32,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub timeout: String,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub parallel: i32,
}

/// Scan defaults for repository discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanDefaults {
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub depth: u32,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub include_hidden: Option<bool>,
}

/// Output defaults for commands run in this workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputDefaults {
    /// text or json.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub format: String,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub color: Option<bool>,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub verbose: Option<bool>,
}

/// Repository name filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterDefaults {
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub include: Vec<String>,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub exclude: Vec<String>,
}

/// The `defaults` block of a hierarchical config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub clone: CloneDefaults,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub sync: SyncDefaults,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub scan: ScanDefaults,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub output: OutputDefaults,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub filter: FilterDefaults,
}

unset_when_default!(
    CloneDefaults,
    SyncDefaults,
    ScanDefaults,
    OutputDefaults,
    FilterDefaults,
    DefaultsConfig,
);

impl Merge for CloneDefaults {
    fn merge_from(&mut self, other: &Self) {
        overlay(&mut self.proto, &other.proto);
        overlay(&mut self.ssh_port, &other.ssh_port);
        overlay(&mut self.depth, &other.depth);
        overlay(&mut self.branch, &other.branch);
    }
}

impl Merge for SyncDefaults {
    fn merge_from(&mut self, other: &Self) {
        overlay(&mut self.strategy, &other.strategy);
        overlay(&mut self.max_retries, &other.max_retries);
        overlay(&mut self.timeout, &other.timeout);
        overlay(&mut self.parallel, &other.parallel);
    }
}

impl Merge for ScanDefaults {
    fn merge_from(&mut self, other: &Self) {
        overlay(&mut self.depth, &other.depth);
        overlay(&mut self.include_hidden, &other.include_hidden);
    }
}

impl Merge for OutputDefaults {
    fn merge_from(&mut self, other: &Self) {
        overlay(&mut self.format, &other.format);
        overlay(&mut self.color, &other.color);
        overlay(&mut self.verbose, &other.verbose);
    }
}

impl Merge for FilterDefaults {
    fn merge_from(&mut self, other: &Self) {
        overlay(&mut self.include, &other.include);
        overlay(&mut self.exclude, &other.exclude);
    }
}

impl Merge for DefaultsConfig {
    fn merge_from(&mut self, other: &Self) {
        self.clone.merge_from(&other.clone);
        self.sync.merge_from(&other.sync);
        self.scan.merge_from(&other.scan);
        self.output.merge_from(&other.output);
        self.filter.merge_from(&other.filter);
    }
}

impl DefaultsConfig {
    pub fn validate(&self) -> Result<()> {
        validate_enum("defaults.clone.proto", &self.clone.proto, CLONE_PROTOCOLS)?;
        validate_port("defaults.clone.sshPort", self.clone.ssh_port, true)?;
        validate_enum("defaults.sync.strategy", &self.sync.strategy, SYNC_STRATEGIES)?;
        validate_non_negative("defaults.sync.maxRetries", self.sync.max_retries)?;
        validate_non_negative("defaults.sync.parallel", self.sync.parallel)?;
        validate_enum("defaults.output.format", &self.output.format, OUTPUT_FORMATS)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Profiles, global config, project config
// ---------------------------------------------------------------------------

/// A named, reusable bag of override values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Profile identity. Inline profiles take their name from the table key.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub name: String,

    #[serde(flatten)]
    pub settings: Settings,
}

impl Merge for Profile {
    fn merge_from(&mut self, other: &Self) {
        overlay(&mut self.name, &other.name);
        self.settings.merge_from(&other.settings);
    }
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: Settings::default(),
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Validate the name and every field.
    pub fn validate(&self) -> Result<()> {
        validate_profile_name(&self.name)?;
        self.settings.validate("")
    }

    pub fn expand_env(&mut self, env: &EnvSource, warnings: &mut Vec<ConfigWarning>) {
        self.settings.expand_env("", env, warnings);
    }

    /// Parse a profile from YAML. Empty documents parse as an empty profile.
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self> {
        parse_yaml(content, path)
    }

    pub fn to_yaml(&self) -> Result<String> {
        to_yaml(self, "profile")
    }
}

/// A named token environment in the global config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    /// Supports `${VAR}` expansion.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub token: String,
    #[serde(rename = "baseURL", skip_serializing_if = "Unset::is_unset")]
    pub base_url: String,
}

/// Installation-wide configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalConfig {
    /// Profile used when no state marker exists.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub active_profile: String,

    /// Generic defaults keyed by field name (e.g. `parallel`, `sync.strategy`).
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub defaults: BTreeMap<String, serde_yaml::Value>,

    /// Named token environments.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub environments: BTreeMap<String, Environment>,
}

impl GlobalConfig {
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self> {
        parse_yaml(content, path)
    }

    pub fn to_yaml(&self) -> Result<String> {
        to_yaml(self, "global config")
    }

    pub fn validate(&self) -> Result<()> {
        if !self.active_profile.is_empty() {
            validate_profile_name(&self.active_profile)
                .map_err(|_| ConfigError::validation("activeProfile", "invalid profile name"))?;
        }
        Ok(())
    }

    pub fn expand_env(&mut self, env: &EnvSource, warnings: &mut Vec<ConfigWarning>) {
        for (name, environment) in &mut self.environments {
            let prefix = format!("environments.{name}");
            expand_field(&mut environment.token, &field(&prefix, "token"), env, warnings);
            expand_field(&mut environment.base_url, &field(&prefix, "baseURL"), env, warnings);
        }
    }
}

/// Single-level project override found by walking up from the working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Profile to treat as active while resolving inside this project.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub profile: String,

    #[serde(flatten)]
    pub settings: Settings,
}

impl ProjectConfig {
    /// Read a project config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::io("reading", path, e))?;
        parse_yaml(&content, path)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.profile.is_empty() {
            validate_profile_name(&self.profile)?;
        }
        self.settings.validate("")
    }

    pub fn expand_env(&mut self, env: &EnvSource, warnings: &mut Vec<ConfigWarning>) {
        self.settings.expand_env("", env, warnings);
    }
}

// ---------------------------------------------------------------------------
// Hierarchical configs
// ---------------------------------------------------------------------------

/// How child nodes are found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Only declared children.
    #[default]
    Explicit,
    /// Scan the directory for children.
    Auto,
    /// Declared children, scanning only when none are declared.
    Hybrid,
}

impl DiscoveryMode {
    /// Whether a directory scan should run given the number of declared children.
    pub fn should_scan(self, explicit_children: usize) -> bool {
        match self {
            Self::Explicit => false,
            Self::Auto => true,
            Self::Hybrid => explicit_children == 0,
        }
    }
}

/// The `discovery` block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub mode: DiscoveryMode,
}

/// Descriptive metadata about a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub name: String,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub description: String,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub owner: String,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub tags: Vec<String>,
}

/// Effective kind of a child node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildType {
    /// Nested configuration scope with its own config file.
    Config,
    /// Leaf git repository.
    Git,
    /// Directory materialized from a forge organization by sync.
    Forge,
}

impl ChildType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "config" => Some(Self::Config),
            "git" => Some(Self::Git),
            "forge" => Some(Self::Forge),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Git => "git",
            Self::Forge => "forge",
        }
    }
}

impl std::fmt::Display for ChildType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forge organization that a `forge` child is synced from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForgeSource {
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub provider: String,
    /// Organization, group, or user to sync.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub org: String,
    #[serde(rename = "baseURL", skip_serializing_if = "Unset::is_unset")]
    pub base_url: String,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub token: String,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub include_subgroups: Option<bool>,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub subgroup_mode: String,
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub include_archived: Option<bool>,
}

impl ForgeSource {
    pub fn validate(&self, prefix: &str) -> Result<()> {
        if self.provider.is_empty() {
            return Err(ConfigError::validation(
                field(prefix, "source.provider"),
                "forge source requires a provider",
            ));
        }
        validate_enum(&field(prefix, "source.provider"), &self.provider, PROVIDERS)?;
        if self.org.is_empty() {
            return Err(ConfigError::validation(
                field(prefix, "source.org"),
                "forge source requires an org",
            ));
        }
        validate_enum(
            &field(prefix, "source.subgroupMode"),
            &self.subgroup_mode,
            SUBGROUP_MODES,
        )
    }

    pub fn expand_env(&mut self, prefix: &str, env: &EnvSource, warnings: &mut Vec<ConfigWarning>) {
        expand_field(&mut self.token, &field(prefix, "source.token"), env, warnings);
        expand_field(&mut self.base_url, &field(prefix, "source.baseURL"), env, warnings);
    }
}

/// Stable identifier of a child entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum ChildId {
    /// Key in `workspaces`, or explicit `name` in `children`.
    Name(String),
    /// Position in `children` when the entry has no name.
    Index(usize),
}

impl std::fmt::Display for ChildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(idx) => write!(f, "[{idx}]"),
        }
    }
}

/// Which inline override fields a child entry contributes to its loaded config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChildMergeScope {
    /// Every shared setting, the profile reference, and hooks.
    #[default]
    All,
    /// Only the per-command override groups.
    Commands,
}

/// A child node declaration, from either the `workspaces` map or the `children` list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChildEntry {
    /// Identifier for list entries.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub name: String,

    /// Directory of the child, resolved against the declaring config's directory.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub path: String,

    /// config, git, or forge. Inferred when empty.
    #[serde(rename = "type", skip_serializing_if = "Unset::is_unset")]
    pub kind: String,

    /// Forge organization for `forge` children.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub source: Option<ForgeSource>,

    /// Config file name inside a `config` child (defaults to `.gz-git.yaml`).
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub config_file: String,

    /// Profile reference applied to this child.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub profile: String,

    /// Inline overrides.
    #[serde(flatten)]
    pub settings: Settings,

    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub hooks: Hooks,
}

impl ChildEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, kind: ChildType) -> Self {
        self.kind = kind.as_str().to_string();
        self
    }

    /// Explicit type, else `forge` when a source is declared, else `git`.
    ///
    /// `None` when an explicit type is not recognized.
    pub fn effective_type(&self) -> Option<ChildType> {
        if self.kind.is_empty() {
            return Some(if self.source.is_some() {
                ChildType::Forge
            } else {
                ChildType::Git
            });
        }
        ChildType::parse(&self.kind)
    }

    /// Structural and value checks for this entry.
    pub fn validate(&self, prefix: &str) -> Result<()> {
        if self.path.trim().is_empty() {
            return Err(ConfigError::validation(
                field(prefix, "path"),
                "child path must not be empty",
            ));
        }
        let kind = self.effective_type().ok_or_else(|| {
            ConfigError::validation(
                field(prefix, "type"),
                format!("'{}' must be one of: config, git, forge", self.kind),
            )
        })?;
        if kind == ChildType::Forge {
            let source = self.source.as_ref().ok_or_else(|| {
                ConfigError::validation(
                    field(prefix, "source"),
                    "forge children require a source block",
                )
            })?;
            source.validate(prefix)?;
        }
        if !self.profile.is_empty() {
            validate_profile_name(&self.profile)?;
        }
        self.settings.validate(prefix)?;
        self.hooks.validate()
    }

    pub fn expand_env(&mut self, prefix: &str, env: &EnvSource, warnings: &mut Vec<ConfigWarning>) {
        self.settings.expand_env(prefix, env, warnings);
        if let Some(source) = &mut self.source {
            source.expand_env(prefix, env, warnings);
        }
    }

    /// Apply this entry's inline overrides to a loaded child config (inline wins).
    pub fn apply_inline(&self, config: &mut Config, scope: ChildMergeScope) {
        match scope {
            ChildMergeScope::Commands => config.settings.commands.merge_from(&self.settings.commands),
            ChildMergeScope::All => {
                overlay(&mut config.profile, &self.profile);
                config.settings.merge_from(&self.settings);
                config.hooks.merge_from(&self.hooks);
            }
        }
    }
}

/// Reference to a parent config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParentRef {
    /// Directory of the parent; its config file uses the default name.
    Path(String),
    /// Directory plus an explicit config file name.
    Detailed {
        path: String,
        #[serde(rename = "configFile", default, skip_serializing_if = "Unset::is_unset")]
        config_file: String,
    },
}

impl ParentRef {
    pub fn path(&self) -> &str {
        match self {
            Self::Path(path) | Self::Detailed { path, .. } => path,
        }
    }

    pub fn config_file(&self) -> Option<&str> {
        match self {
            Self::Detailed { config_file, .. } if !config_file.is_empty() => Some(config_file),
            _ => None,
        }
    }
}

/// One level of a hierarchical workspace configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Upward inheritance: settings are folded in from this config.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub parent: Option<ParentRef>,

    /// Profile applied at this level.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub profile: String,

    #[serde(flatten)]
    pub settings: Settings,

    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub hooks: Hooks,

    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub defaults: DefaultsConfig,

    /// Inline profiles visible to this level and its descendants.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub profiles: BTreeMap<String, Profile>,

    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub discovery: DiscoveryConfig,

    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub metadata: Option<Metadata>,

    /// Children keyed by name.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub workspaces: BTreeMap<String, ChildEntry>,

    /// Children as a list.
    #[serde(skip_serializing_if = "Unset::is_unset")]
    pub children: Vec<ChildEntry>,
}

unset_when_default!(DiscoveryConfig);

impl Config {
    /// Parse YAML. Empty documents parse as an empty config.
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self> {
        let mut config: Self = parse_yaml(content, path)?;
        for (name, profile) in &mut config.profiles {
            if profile.name.is_empty() {
                profile.name = name.clone();
            }
        }
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        to_yaml(self, "config")
    }

    /// All declared children with stable identifiers: `workspaces` first, then `children`.
    ///
    /// Map entries without a `path` use their key as the path.
    pub fn child_entries(&self) -> Vec<(ChildId, ChildEntry)> {
        let mapped = self.workspaces.iter().map(|(name, entry)| {
            let mut entry = entry.clone();
            if entry.path.is_empty() {
                entry.path = name.clone();
            }
            (ChildId::Name(name.clone()), entry)
        });
        let listed = self.children.iter().enumerate().map(|(idx, entry)| {
            let id = if entry.name.is_empty() {
                ChildId::Index(idx)
            } else {
                ChildId::Name(entry.name.clone())
            };
            (id, entry.clone())
        });
        mapped.chain(listed).collect()
    }

    /// Expand `${VAR}` tokens in every sensitive field at this level.
    pub fn expand_env(&mut self, env: &EnvSource, warnings: &mut Vec<ConfigWarning>) {
        self.settings.expand_env("", env, warnings);
        for (name, profile) in &mut self.profiles {
            profile
                .settings
                .expand_env(&format!("profiles.{name}"), env, warnings);
        }
        for (name, entry) in &mut self.workspaces {
            entry.expand_env(&format!("workspaces.{name}"), env, warnings);
        }
        for (idx, entry) in self.children.iter_mut().enumerate() {
            entry.expand_env(&format!("children[{idx}]"), env, warnings);
        }
    }

    /// Fold a parent config into this one; values set here win.
    ///
    /// Children, discovery, metadata, and the parent reference are not inherited.
    pub fn inherit_from_parent(&mut self, parent: &Config) {
        inherit(&mut self.profile, &parent.profile);
        self.settings.inherit_from(&parent.settings);
        inherit(&mut self.hooks, &parent.hooks);
        self.defaults.inherit_from(&parent.defaults);

        let mut profiles = parent.profiles.clone();
        merge_maps(&mut profiles, &self.profiles);
        self.profiles = profiles;
    }

    /// Validate this level without descending into child configs.
    pub fn validate(&self) -> Result<()> {
        if !self.profile.is_empty() {
            validate_profile_name(&self.profile)?;
        }
        self.settings.validate("")?;
        self.hooks.validate()?;
        self.defaults.validate()?;
        for (name, profile) in &self.profiles {
            validate_profile_name(name)?;
            profile.settings.validate(&format!("profiles.{name}"))?;
        }
        for (id, entry) in self.child_entries() {
            entry.validate(&child_prefix(&id))?;
        }
        Ok(())
    }
}

/// Field prefix used in validation messages for a child.
pub(crate) fn child_prefix(id: &ChildId) -> String {
    match id {
        ChildId::Name(name) => format!("workspaces.{name}"),
        ChildId::Index(idx) => format!("children[{idx}]"),
    }
}

fn parse_yaml<T: serde::de::DeserializeOwned + Default>(content: &str, path: &Path) -> Result<T> {
    // Empty or comment-only YAML parses as null.
    let parsed: Option<T> =
        serde_yaml::from_str(content).map_err(|e| ConfigError::parse(path, e))?;
    Ok(parsed.unwrap_or_default())
}

fn to_yaml<T: Serialize>(value: &T, what: &str) -> Result<String> {
    serde_yaml::to_string(value).map_err(|e| ConfigError::validation(what, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn parse(content: &str) -> Config {
        Config::from_yaml(content, Path::new("test.yaml")).unwrap()
    }

    #[test]
    fn test_branch_list_coercion() {
        for raw in [
            "protectedBranches: develop,master",
            "protectedBranches: develop, master",
            "protectedBranches: [develop, master]",
        ] {
            let branch: BranchOverrides = serde_yaml::from_str(raw).unwrap();
            assert_eq!(
                branch.protected_branches.as_slice(),
                &["develop".to_string(), "master".to_string()]
            );
            let out = serde_yaml::to_string(&branch).unwrap();
            assert_eq!(out.trim(), "protectedBranches: develop,master");
        }
    }

    #[test]
    fn test_branch_list_single() {
        let list: BranchList = serde_yaml::from_str("main").unwrap();
        assert_eq!(list.as_slice(), &["main".to_string()]);
        assert!(list.contains("main"));
    }

    #[test]
    fn test_settings_field_names() {
        let config = parse(
            r#"
provider: gitlab
baseURL: https://gitlab.example.com
cloneProto: https
sshPort: 2222
parallel: 8
includeSubgroups: true
subgroupMode: nested
sync:
  strategy: reset
  maxRetries: 5
  timeout: 1m
branch:
  defaultBranch: develop
fetch:
  allRemotes: true
pull:
  ffOnly: true
push:
  setUpstream: false
"#,
        );
        let s = &config.settings;
        assert_eq!(s.provider, "gitlab");
        assert_eq!(s.base_url, "https://gitlab.example.com");
        assert_eq!(s.clone_proto, "https");
        assert_eq!(s.ssh_port, 2222);
        assert_eq!(s.parallel, 8);
        assert_eq!(s.include_subgroups, Some(true));
        assert_eq!(s.subgroup_mode, "nested");
        assert_eq!(s.commands.sync.strategy, "reset");
        assert_eq!(s.commands.sync.max_retries, 5);
        assert_eq!(s.commands.branch.default_branch, "develop");
        assert_eq!(s.commands.fetch.all_remotes, Some(true));
        assert_eq!(s.commands.pull.ff_only, Some(true));
        assert_eq!(s.commands.push.set_upstream, Some(false));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(parse(""), Config::default());
        assert_eq!(parse("# only a comment\n"), Config::default());
    }

    #[test]
    fn test_child_type_inference() {
        let forge = ChildEntry {
            path: "org".into(),
            source: Some(ForgeSource {
                provider: "github".into(),
                org: "acme".into(),
                ..ForgeSource::default()
            }),
            ..ChildEntry::default()
        };
        assert_eq!(forge.effective_type(), Some(ChildType::Forge));

        let git = ChildEntry::new("repo");
        assert_eq!(git.effective_type(), Some(ChildType::Git));

        let explicit = ChildEntry::new("nested").with_type(ChildType::Config);
        assert_eq!(explicit.effective_type(), Some(ChildType::Config));

        let bogus = ChildEntry {
            kind: "svn".into(),
            ..ChildEntry::new("x")
        };
        assert_eq!(bogus.effective_type(), None);
        assert_eq!(bogus.validate("").unwrap_err().code(), ErrorCode::ValidationError);
    }

    #[test]
    fn test_child_entries_both_shapes() {
        let config = parse(
            r#"
workspaces:
  api:
    type: git
  web:
    path: frontend/web
children:
  - path: tools
    type: config
  - name: docs
    path: documentation
"#,
        );
        let entries = config.child_entries();
        let ids: Vec<String> = entries.iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(ids, vec!["api", "web", "[0]", "docs"]);
        assert_eq!(entries[0].1.path, "api");
        assert_eq!(entries[1].1.path, "frontend/web");
    }

    #[test]
    fn test_forge_requires_source() {
        let entry = ChildEntry::new("org").with_type(ChildType::Forge);
        let err = entry.validate("workspaces.org").unwrap_err();
        assert!(err.to_string().contains("workspaces.org.source"));
    }

    #[test]
    fn test_parent_ref_shapes() {
        let config = parse("parent: ..\n");
        assert_eq!(config.parent.as_ref().unwrap().path(), "..");
        assert_eq!(config.parent.as_ref().unwrap().config_file(), None);

        let config = parse("parent:\n  path: ../base\n  configFile: base.yaml\n");
        let parent = config.parent.unwrap();
        assert_eq!(parent.path(), "../base");
        assert_eq!(parent.config_file(), Some("base.yaml"));
    }

    #[test]
    fn test_inherit_from_parent_child_wins() {
        let parent = parse(
            r#"
provider: github
parallel: 4
sync:
  strategy: reset
  maxRetries: 2
defaults:
  clone:
    proto: https
    depth: 1
hooks:
  after: [make]
profiles:
  shared:
    provider: gitlab
"#,
        );
        let mut child = parse(
            r#"
parallel: 12
sync:
  maxRetries: 7
defaults:
  clone:
    depth: 5
profiles:
  local:
    provider: gitea
"#,
        );
        child.inherit_from_parent(&parent);

        assert_eq!(child.settings.provider, "github");
        assert_eq!(child.settings.parallel, 12);
        assert_eq!(child.settings.commands.sync.strategy, "reset");
        assert_eq!(child.settings.commands.sync.max_retries, 7);
        assert_eq!(child.defaults.clone.proto, "https");
        assert_eq!(child.defaults.clone.depth, 5);
        assert_eq!(child.hooks.after, vec!["make".to_string()]);
        assert!(child.profiles.contains_key("shared"));
        assert!(child.profiles.contains_key("local"));
        assert_eq!(child.profiles["shared"].name, "shared");
    }

    #[test]
    fn test_apply_inline_scopes() {
        let mut entry = ChildEntry::new("x");
        entry.settings.provider = "gitea".into();
        entry.settings.commands.pull.rebase = Some(true);

        let mut all = Config::default();
        entry.apply_inline(&mut all, ChildMergeScope::All);
        assert_eq!(all.settings.provider, "gitea");
        assert_eq!(all.settings.commands.pull.rebase, Some(true));

        let mut commands = Config::default();
        entry.apply_inline(&mut commands, ChildMergeScope::Commands);
        assert_eq!(commands.settings.provider, "");
        assert_eq!(commands.settings.commands.pull.rebase, Some(true));
    }

    #[test]
    fn test_validation_names_field() {
        let config = parse("sync:\n  strategy: merge\n");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sync.strategy"));

        let config = parse("sshPort: 70000\n");
        assert!(config.validate().is_err());

        let config = parse("parallel: -1\n");
        assert!(config.validate().is_err());

        let config = parse("hooks:\n  before: ['git pull | tee log']\n");
        assert_eq!(config.validate().unwrap_err().code(), ErrorCode::UnsafeCommand);
    }

    #[test]
    fn test_serialization_skips_unset() {
        let profile = Profile::new("work").with_settings(Settings {
            parallel: 15,
            ..Settings::default()
        });
        let yaml = profile.to_yaml().unwrap();
        assert!(yaml.contains("name: work"));
        assert!(yaml.contains("parallel: 15"));
        assert!(!yaml.contains("provider"));
        assert!(!yaml.contains("sync"));
    }

    #[test]
    fn test_discovery_should_scan() {
        assert!(!DiscoveryMode::Explicit.should_scan(0));
        assert!(DiscoveryMode::Auto.should_scan(3));
        assert!(DiscoveryMode::Hybrid.should_scan(0));
        assert!(!DiscoveryMode::Hybrid.should_scan(1));
    }
}
