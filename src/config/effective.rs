//! The resolved configuration and its field table.
//!
//! Every field that can be resolved is named by a [`FieldKey`]. The key table
//! maps each key to its YAML name, its value kind, and how to read it from or
//! write it into [`Settings`]; string lookups and generic maps go through it.

use super::types::{BranchList, CommandOverrides, Settings};
use crate::error::{ConfigError, Result};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Kind of value a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Int,
    Bool,
    List,
}

/// A resolvable configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKey {
    Provider,
    BaseUrl,
    Token,
    CloneProto,
    SshPort,
    Parallel,
    IncludeSubgroups,
    SubgroupMode,
    SyncStrategy,
    SyncMaxRetries,
    SyncTimeout,
    BranchDefaultBranch,
    BranchProtectedBranches,
    FetchAllRemotes,
    FetchPrune,
    PullRebase,
    PullFfOnly,
    PushSetUpstream,
}

impl FieldKey {
    /// Every field, in display order.
    pub const ALL: [FieldKey; 18] = [
        Self::Provider,
        Self::BaseUrl,
        Self::Token,
        Self::CloneProto,
        Self::SshPort,
        Self::Parallel,
        Self::IncludeSubgroups,
        Self::SubgroupMode,
        Self::SyncStrategy,
        Self::SyncMaxRetries,
        Self::SyncTimeout,
        Self::BranchDefaultBranch,
        Self::BranchProtectedBranches,
        Self::FetchAllRemotes,
        Self::FetchPrune,
        Self::PullRebase,
        Self::PullFfOnly,
        Self::PushSetUpstream,
    ];

    /// YAML name, dotted for command groups.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::BaseUrl => "baseURL",
            Self::Token => "token",
            Self::CloneProto => "cloneProto",
            Self::SshPort => "sshPort",
            Self::Parallel => "parallel",
            Self::IncludeSubgroups => "includeSubgroups",
            Self::SubgroupMode => "subgroupMode",
            Self::SyncStrategy => "sync.strategy",
            Self::SyncMaxRetries => "sync.maxRetries",
            Self::SyncTimeout => "sync.timeout",
            Self::BranchDefaultBranch => "branch.defaultBranch",
            Self::BranchProtectedBranches => "branch.protectedBranches",
            Self::FetchAllRemotes => "fetch.allRemotes",
            Self::FetchPrune => "fetch.prune",
            Self::PullRebase => "pull.rebase",
            Self::PullFfOnly => "pull.ffOnly",
            Self::PushSetUpstream => "push.setUpstream",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Self::SshPort | Self::Parallel | Self::SyncMaxRetries => FieldKind::Int,
            Self::IncludeSubgroups
            | Self::FetchAllRemotes
            | Self::FetchPrune
            | Self::PullRebase
            | Self::PullFfOnly
            | Self::PushSetUpstream => FieldKind::Bool,
            Self::BranchProtectedBranches => FieldKind::List,
            _ => FieldKind::Str,
        }
    }

    /// Whether the value is a secret and should be masked in output.
    pub fn is_secret(self) -> bool {
        self == Self::Token
    }

    /// Read the field; `None` when it holds its zero value.
    pub fn read(self, s: &Settings) -> Option<FieldValue> {
        let c = &s.commands;
        match self {
            Self::Provider => str_value(&s.provider),
            Self::BaseUrl => str_value(&s.base_url),
            Self::Token => str_value(&s.token),
            Self::CloneProto => str_value(&s.clone_proto),
            Self::SshPort => int_value(i64::from(s.ssh_port)),
            Self::Parallel => int_value(i64::from(s.parallel)),
            Self::IncludeSubgroups => s.include_subgroups.map(FieldValue::Bool),
            Self::SubgroupMode => str_value(&s.subgroup_mode),
            Self::SyncStrategy => str_value(&c.sync.strategy),
            Self::SyncMaxRetries => int_value(i64::from(c.sync.max_retries)),
            Self::SyncTimeout => str_value(&c.sync.timeout),
            Self::BranchDefaultBranch => str_value(&c.branch.default_branch),
            Self::BranchProtectedBranches => {
                let list = &c.branch.protected_branches;
                (!list.is_empty()).then(|| FieldValue::List(list.as_slice().to_vec()))
            }
            Self::FetchAllRemotes => c.fetch.all_remotes.map(FieldValue::Bool),
            Self::FetchPrune => c.fetch.prune.map(FieldValue::Bool),
            Self::PullRebase => c.pull.rebase.map(FieldValue::Bool),
            Self::PullFfOnly => c.pull.ff_only.map(FieldValue::Bool),
            Self::PushSetUpstream => c.push.set_upstream.map(FieldValue::Bool),
        }
    }

    /// Write a value of the matching kind into `s`.
    pub fn write(self, s: &mut Settings, value: FieldValue) -> Result<()> {
        let c = &mut s.commands;
        match (self, value) {
            (Self::Provider, FieldValue::Str(v)) => s.provider = v,
            (Self::BaseUrl, FieldValue::Str(v)) => s.base_url = v,
            (Self::Token, FieldValue::Str(v)) => s.token = v,
            (Self::CloneProto, FieldValue::Str(v)) => s.clone_proto = v,
            (Self::SubgroupMode, FieldValue::Str(v)) => s.subgroup_mode = v,
            (Self::SyncStrategy, FieldValue::Str(v)) => c.sync.strategy = v,
            (Self::SyncTimeout, FieldValue::Str(v)) => c.sync.timeout = v,
            (Self::BranchDefaultBranch, FieldValue::Str(v)) => c.branch.default_branch = v,
            (Self::SshPort, FieldValue::Int(v)) => {
                s.ssh_port = u32::try_from(v).map_err(|_| out_of_range(self, v))?;
            }
            (Self::Parallel, FieldValue::Int(v)) => {
                s.parallel = i32::try_from(v).map_err(|_| out_of_range(self, v))?;
            }
            (Self::SyncMaxRetries, FieldValue::Int(v)) => {
                c.sync.max_retries = i32::try_from(v).map_err(|_| out_of_range(self, v))?;
            }
            (Self::IncludeSubgroups, FieldValue::Bool(v)) => s.include_subgroups = Some(v),
            (Self::FetchAllRemotes, FieldValue::Bool(v)) => c.fetch.all_remotes = Some(v),
            (Self::FetchPrune, FieldValue::Bool(v)) => c.fetch.prune = Some(v),
            (Self::PullRebase, FieldValue::Bool(v)) => c.pull.rebase = Some(v),
            (Self::PullFfOnly, FieldValue::Bool(v)) => c.pull.ff_only = Some(v),
            (Self::PushSetUpstream, FieldValue::Bool(v)) => c.push.set_upstream = Some(v),
            (Self::BranchProtectedBranches, FieldValue::List(v)) => {
                c.branch.protected_branches = BranchList::new(v);
            }
            (key, value) => {
                return Err(ConfigError::validation(
                    key.as_str(),
                    format!("expected {} value, got {value}", key.kind_name()),
                ));
            }
        }
        Ok(())
    }

    /// Convert a JSON value from a generic map (flags, global defaults).
    ///
    /// Strings holding numbers or booleans are coerced; `null` is `None`.
    pub fn coerce(self, raw: &serde_json::Value) -> Result<Option<FieldValue>> {
        use serde_json::Value;

        let mismatch = || {
            ConfigError::validation(
                self.as_str(),
                format!("expected {} value, got {raw}", self.kind_name()),
            )
        };

        if raw.is_null() {
            return Ok(None);
        }

        let value = match self.kind() {
            FieldKind::Str => match raw {
                Value::String(s) => FieldValue::Str(s.clone()),
                _ => return Err(mismatch()),
            },
            FieldKind::Int => match raw {
                Value::Number(n) => FieldValue::Int(n.as_i64().ok_or_else(mismatch)?),
                Value::String(s) => FieldValue::Int(s.trim().parse().map_err(|_| mismatch())?),
                _ => return Err(mismatch()),
            },
            FieldKind::Bool => match raw {
                Value::Bool(b) => FieldValue::Bool(*b),
                Value::String(s) => FieldValue::Bool(s.trim().parse().map_err(|_| mismatch())?),
                _ => return Err(mismatch()),
            },
            FieldKind::List => match raw {
                Value::String(s) => FieldValue::List(BranchList::parse(s).as_slice().to_vec()),
                Value::Array(items) => {
                    let items = items
                        .iter()
                        .map(|item| item.as_str().map(str::to_string).ok_or_else(mismatch))
                        .collect::<Result<Vec<_>>>()?;
                    FieldValue::List(BranchList::new(items).as_slice().to_vec())
                }
                _ => return Err(mismatch()),
            },
        };
        Ok(Some(value))
    }

    fn kind_name(self) -> &'static str {
        match self.kind() {
            FieldKind::Str => "a string",
            FieldKind::Int => "an integer",
            FieldKind::Bool => "a boolean",
            FieldKind::List => "a list",
        }
    }
}

fn str_value(s: &str) -> Option<FieldValue> {
    (!s.is_empty()).then(|| FieldValue::Str(s.to_string()))
}

fn int_value(n: i64) -> Option<FieldValue> {
    (n != 0).then_some(FieldValue::Int(n))
}

fn out_of_range(key: FieldKey, value: i64) -> ConfigError {
    ConfigError::validation(key.as_str(), format!("{value} is out of range"))
}

/// Normalize a field name: case, `-`, and `_` are ignored.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for FieldKey {
    type Err = ConfigError;

    /// Accepts YAML names (`baseURL`), flag names (`base-url`), and dotted
    /// command keys (`sync.maxRetries`, `sync.max-retries`).
    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|key| normalize(key.as_str()) == wanted)
            .ok_or_else(|| ConfigError::validation(s, "unknown configuration field"))
    }
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::List(items) => f.write_str(&items.join(",")),
        }
    }
}

/// Precedence layer that supplied a field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Source {
    Default,
    Global,
    Profile(String),
    Project,
    Flag,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Global => f.write_str("global"),
            Self::Profile(name) => write!(f, "profile:{name}"),
            Self::Project => f.write_str("project"),
            Self::Flag => f.write_str("flag"),
        }
    }
}

impl Serialize for Source {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One row of [`EffectiveConfig::fields`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldEntry {
    pub key: FieldKey,
    pub value: FieldValue,
    pub source: Source,
}

/// Read-only result of precedence resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    settings: Settings,
    sources: BTreeMap<FieldKey, Source>,
    profile: Option<String>,
}

impl EffectiveConfig {
    pub(crate) fn new(
        settings: Settings,
        sources: BTreeMap<FieldKey, Source>,
        profile: Option<String>,
    ) -> Self {
        Self {
            settings,
            sources,
            profile,
        }
    }

    pub fn provider(&self) -> &str {
        &self.settings.provider
    }

    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    pub fn token(&self) -> &str {
        &self.settings.token
    }

    pub fn clone_proto(&self) -> &str {
        &self.settings.clone_proto
    }

    pub fn ssh_port(&self) -> u32 {
        self.settings.ssh_port
    }

    pub fn parallel(&self) -> i32 {
        self.settings.parallel
    }

    pub fn include_subgroups(&self) -> bool {
        self.settings.include_subgroups.unwrap_or(false)
    }

    pub fn subgroup_mode(&self) -> &str {
        &self.settings.subgroup_mode
    }

    /// Per-command override groups.
    pub fn commands(&self) -> &CommandOverrides {
        &self.settings.commands
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Name of the profile that took part in resolution, if any.
    pub fn active_profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    /// Value of a field; unset fields read as their zero value.
    pub fn get(&self, key: FieldKey) -> FieldValue {
        key.read(&self.settings).unwrap_or_else(|| match key.kind() {
            FieldKind::Str => FieldValue::Str(String::new()),
            FieldKind::Int => FieldValue::Int(0),
            FieldKind::Bool => FieldValue::Bool(false),
            FieldKind::List => FieldValue::List(Vec::new()),
        })
    }

    pub fn get_by_name(&self, name: &str) -> Result<FieldValue> {
        Ok(self.get(name.parse()?))
    }

    /// Layer that supplied `key`; `default` when no layer set it.
    pub fn source(&self, key: FieldKey) -> Source {
        self.sources.get(&key).cloned().unwrap_or(Source::Default)
    }

    /// Provenance by field name; unknown names report `default`.
    pub fn source_of(&self, name: &str) -> String {
        name.parse::<FieldKey>()
            .map(|key| self.source(key).to_string())
            .unwrap_or_else(|_| Source::Default.to_string())
    }

    /// Every field with its value and source, in display order.
    pub fn fields(&self) -> Vec<FieldEntry> {
        FieldKey::ALL
            .into_iter()
            .map(|key| FieldEntry {
                key,
                value: self.get(key),
                source: self.source(key),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_names_parse() {
        assert_eq!("baseURL".parse::<FieldKey>().unwrap(), FieldKey::BaseUrl);
        assert_eq!("base-url".parse::<FieldKey>().unwrap(), FieldKey::BaseUrl);
        assert_eq!("clone_proto".parse::<FieldKey>().unwrap(), FieldKey::CloneProto);
        assert_eq!("sync.max-retries".parse::<FieldKey>().unwrap(), FieldKey::SyncMaxRetries);
        assert_eq!("pull.ffOnly".parse::<FieldKey>().unwrap(), FieldKey::PullFfOnly);
        assert!("nonsense".parse::<FieldKey>().is_err());
    }

    #[test]
    fn test_every_key_round_trips_through_name() {
        for key in FieldKey::ALL {
            assert_eq!(key.as_str().parse::<FieldKey>().unwrap(), key);
        }
    }

    #[test]
    fn test_read_write_table() {
        let mut settings = Settings::default();
        assert_eq!(FieldKey::Parallel.read(&settings), None);

        FieldKey::Parallel.write(&mut settings, FieldValue::Int(7)).unwrap();
        FieldKey::PullRebase.write(&mut settings, FieldValue::Bool(false)).unwrap();
        FieldKey::BranchProtectedBranches
            .write(&mut settings, FieldValue::List(vec!["main".into()]))
            .unwrap();

        assert_eq!(settings.parallel, 7);
        assert_eq!(FieldKey::PullRebase.read(&settings), Some(FieldValue::Bool(false)));
        assert!(settings.commands.branch.protected_branches.contains("main"));

        let err = FieldKey::Provider.write(&mut settings, FieldValue::Int(1)).unwrap_err();
        assert!(err.to_string().contains("provider"));
    }

    #[test]
    fn test_coerce_generic_values() {
        assert_eq!(
            FieldKey::Parallel.coerce(&json!("12")).unwrap(),
            Some(FieldValue::Int(12))
        );
        assert_eq!(
            FieldKey::IncludeSubgroups.coerce(&json!("true")).unwrap(),
            Some(FieldValue::Bool(true))
        );
        assert_eq!(
            FieldKey::BranchProtectedBranches.coerce(&json!("a, b")).unwrap(),
            Some(FieldValue::List(vec!["a".into(), "b".into()]))
        );
        assert_eq!(FieldKey::Provider.coerce(&json!(null)).unwrap(), None);
        assert!(FieldKey::Parallel.coerce(&json!("many")).is_err());
        assert!(FieldKey::Provider.coerce(&json!(3)).is_err());
        assert!(FieldKey::SshPort.write(&mut Settings::default(), FieldValue::Int(-1)).is_err());
    }

    #[test]
    fn test_source_display() {
        assert_eq!(Source::Profile("work".into()).to_string(), "profile:work");
        assert_eq!(Source::Flag.to_string(), "flag");
        assert_eq!(serde_json::to_string(&Source::Global).unwrap(), "\"global\"");
    }

    #[test]
    fn test_unset_reads_as_zero() {
        let config = EffectiveConfig::new(Settings::default(), BTreeMap::new(), None);
        assert_eq!(config.get(FieldKey::FetchPrune), FieldValue::Bool(false));
        assert_eq!(config.get(FieldKey::Provider), FieldValue::Str(String::new()));
        assert_eq!(config.source_of("provider"), "default");
        assert_eq!(config.source_of("bogus"), "default");
    }
}
