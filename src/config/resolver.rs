//! Five-layer precedence resolution.
//!
//! Layers, lowest to highest:
//! 1. Built-in defaults
//! 2. Global config `defaults` map
//! 3. Active profile (or the profile a project config points at)
//! 4. Project config
//! 5. Command flags
//!
//! A layer sets a field only when its value is non-zero, and the layer is
//! recorded as that field's source.

use super::effective::{EffectiveConfig, FieldKey, FieldValue, Source};
use super::profile::Manager;
use super::types::{GlobalConfig, Profile, ProjectConfig, Settings};
use super::validate::{ConfigWarning, EnvSource, Loaded, WarningKind, expand_env, validate_port};
use crate::error::{ConfigError, Result};
use crate::paths::find_project_config;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Command flag values keyed by field name (`parallel`, `base-url`, `sync.strategy`).
pub type Flags = BTreeMap<String, serde_json::Value>;

/// Values used when no layer sets a field.
pub fn builtin_defaults() -> Settings {
    let mut settings = Settings {
        clone_proto: "ssh".to_string(),
        ssh_port: 22,
        parallel: 10,
        subgroup_mode: "flat".to_string(),
        ..Settings::default()
    };
    let commands = &mut settings.commands;
    commands.sync.strategy = "pull".to_string();
    commands.sync.max_retries = 3;
    commands.sync.timeout = "30s".to_string();
    commands.branch.default_branch = "main".to_string();
    settings
}

/// Holds the single-level inputs and merges them on demand.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    global: Option<GlobalConfig>,
    profile: Option<Profile>,
    project: Option<ProjectConfig>,
    store: Option<Manager>,
    env: EnvSource,
    warnings: Vec<ConfigWarning>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_global(mut self, global: GlobalConfig) -> Self {
        self.global = Some(global);
        self
    }

    /// Set the active profile.
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_project(mut self, project: ProjectConfig) -> Self {
        self.project = Some(project);
        self
    }

    /// Profile store used when a project config references another profile.
    pub fn with_store(mut self, store: Manager) -> Self {
        self.env = store.env().clone();
        self.store = Some(store);
        self
    }

    pub fn with_env(mut self, env: EnvSource) -> Self {
        self.env = env;
        self
    }

    /// Load every layer from disk.
    ///
    /// Missing global and project configs are skipped. A missing active
    /// profile is skipped with a warning.
    pub fn load(manager: &Manager, cwd: &Path, home: Option<&Path>) -> Result<Self> {
        let mut resolver = Self::new().with_store(manager.clone());

        resolver.global = manager.load_global_config()?;

        let active = manager.active_profile()?;
        match manager.load_profile(&active) {
            Ok(loaded) => {
                resolver.warnings.extend(loaded.warnings);
                resolver.profile = Some(loaded.value);
            }
            Err(ConfigError::ProfileNotFound { name }) => {
                resolver.warnings.push(ConfigWarning::new(
                    WarningKind::MissingProfile,
                    "activeProfile",
                    format!("active profile '{name}' does not exist; skipping profile layer"),
                ));
            }
            Err(e) => return Err(e),
        }

        if let Some(path) = find_project_config(cwd, home) {
            let mut project = ProjectConfig::load(&path)?;
            let mut warnings = Vec::new();
            project.expand_env(manager.env(), &mut warnings);
            resolver
                .warnings
                .extend(warnings.into_iter().map(|w| w.with_path(&path)));
            project.validate()?;
            debug!(path = %path.display(), "Using project config");
            resolver.project = Some(project);
        }

        Ok(resolver)
    }

    /// Merge all layers with `flags` on top.
    pub fn resolve(&self, flags: &Flags) -> Result<Loaded<EffectiveConfig>> {
        let mut warnings = self.warnings.clone();
        let mut merged = Merged::default();

        merged.apply(&builtin_defaults(), &Source::Default)?;

        if let Some(global) = &self.global {
            let mut raw = BTreeMap::new();
            for (name, value) in &global.defaults {
                let value = serde_json::to_value(value)
                    .map_err(|e| ConfigError::validation(format!("defaults.{name}"), e.to_string()))?;
                raw.insert(name.clone(), value);
            }
            let layer = self.settings_from_map(&raw, "defaults", &mut warnings)?;
            merged.apply(&layer, &Source::Global)?;
        }

        let profile = self.select_profile(&mut warnings)?;
        if let Some(profile) = &profile {
            merged.apply(&profile.settings, &Source::Profile(profile.name.clone()))?;
        }

        if let Some(project) = &self.project {
            merged.apply(&project.settings, &Source::Project)?;
        }

        let layer = self.settings_from_map(flags, "flags", &mut warnings)?;
        merged.apply(&layer, &Source::Flag)?;

        merged.settings.validate("")?;
        validate_port("sshPort", merged.settings.ssh_port, false)?;

        debug!(
            profile = profile.as_ref().map(|p| p.name.as_str()),
            flags = flags.len(),
            "Resolved effective configuration"
        );
        let effective =
            EffectiveConfig::new(merged.settings, merged.sources, profile.map(|p| p.name));
        Ok(Loaded::new(effective, warnings))
    }

    /// The profile layer: a project reference redirects the active profile.
    fn select_profile(&self, warnings: &mut Vec<ConfigWarning>) -> Result<Option<Profile>> {
        let redirect = self
            .project
            .as_ref()
            .map(|p| p.profile.as_str())
            .filter(|name| !name.is_empty());

        let Some(name) = redirect else {
            return Ok(self.profile.clone());
        };
        if let Some(active) = &self.profile
            && active.name == name
        {
            return Ok(Some(active.clone()));
        }

        let store = self
            .store
            .as_ref()
            .ok_or_else(|| ConfigError::profile_not_found(name))?;
        let loaded = store.load_profile(name)?;
        debug!(profile = name, "Project config selects profile");
        warnings.extend(loaded.warnings);
        Ok(Some(loaded.value))
    }

    /// Build a settings layer from a generic name/value map.
    fn settings_from_map(
        &self,
        map: &BTreeMap<String, serde_json::Value>,
        what: &str,
        warnings: &mut Vec<ConfigWarning>,
    ) -> Result<Settings> {
        let mut layer = Settings::default();
        for (name, raw) in map {
            let Ok(key) = name.parse::<FieldKey>() else {
                warnings.push(ConfigWarning::new(
                    WarningKind::UnknownKey,
                    format!("{what}.{name}"),
                    format!("unknown configuration key '{name}' ignored"),
                ));
                continue;
            };
            let Some(mut value) = key.coerce(raw)? else {
                continue;
            };
            if matches!(key, FieldKey::Token | FieldKey::BaseUrl)
                && let FieldValue::Str(s) = &value
            {
                value = FieldValue::Str(expand_env(s, key.as_str(), &self.env, warnings));
            }
            key.write(&mut layer, value)?;
        }
        Ok(layer)
    }
}

#[derive(Default)]
struct Merged {
    settings: Settings,
    sources: BTreeMap<FieldKey, Source>,
}

impl Merged {
    fn apply(&mut self, layer: &Settings, source: &Source) -> Result<()> {
        for key in FieldKey::ALL {
            if let Some(value) = key.read(layer) {
                key.write(&mut self.settings, value)?;
                self.sources.insert(key, source.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::BranchList;
    use crate::error::ErrorCode;
    use serde_json::json;

    fn flags(pairs: &[(&str, serde_json::Value)]) -> Flags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn work_profile() -> Profile {
        Profile::new("work").with_settings(Settings {
            parallel: 15,
            provider: "gitlab".into(),
            ..Settings::default()
        })
    }

    #[test]
    fn test_defaults_only() {
        let config = Resolver::new().resolve(&Flags::new()).unwrap().value;
        assert_eq!(config.parallel(), 10);
        assert_eq!(config.clone_proto(), "ssh");
        assert_eq!(config.ssh_port(), 22);
        assert_eq!(config.commands().sync.strategy, "pull");
        assert_eq!(config.commands().sync.max_retries, 3);
        assert_eq!(config.commands().branch.default_branch, "main");
        assert_eq!(config.source(FieldKey::Parallel), Source::Default);
        assert_eq!(config.active_profile(), None);
    }

    #[test]
    fn test_profile_then_flag() {
        let resolver = Resolver::new().with_profile(work_profile());

        let config = resolver.resolve(&Flags::new()).unwrap().value;
        assert_eq!(config.parallel(), 15);
        assert_eq!(config.source_of("parallel"), "profile:work");

        let config = resolver.resolve(&flags(&[("parallel", json!(20))])).unwrap().value;
        assert_eq!(config.parallel(), 20);
        assert_eq!(config.source_of("parallel"), "flag");
        assert_eq!(config.source_of("provider"), "profile:work");
    }

    #[test]
    fn test_global_defaults_layer() {
        let mut global = GlobalConfig::default();
        global
            .defaults
            .insert("parallel".into(), serde_yaml::Value::from(6));
        global
            .defaults
            .insert("bogus".into(), serde_yaml::Value::from("x"));

        let loaded = Resolver::new().with_global(global).resolve(&Flags::new()).unwrap();
        assert_eq!(loaded.value.parallel(), 6);
        assert_eq!(loaded.value.source(FieldKey::Parallel), Source::Global);
        assert_eq!(loaded.warnings.len(), 1);
        assert_eq!(loaded.warnings[0].kind, WarningKind::UnknownKey);
        assert_eq!(loaded.warnings[0].field, "defaults.bogus");
    }

    #[test]
    fn test_project_beats_profile() {
        let project = ProjectConfig {
            settings: Settings {
                parallel: 3,
                ..Settings::default()
            },
            ..ProjectConfig::default()
        };
        let config = Resolver::new()
            .with_profile(work_profile())
            .with_project(project)
            .resolve(&Flags::new())
            .unwrap()
            .value;
        assert_eq!(config.parallel(), 3);
        assert_eq!(config.source(FieldKey::Parallel), Source::Project);
        assert_eq!(config.provider(), "gitlab");
    }

    #[test]
    fn test_command_groups_merge_per_field() {
        let mut profile = work_profile();
        profile.settings.commands.sync.max_retries = 9;
        profile.settings.commands.branch.protected_branches = BranchList::parse("main,release");

        let config = Resolver::new()
            .with_profile(profile)
            .resolve(&flags(&[("sync.strategy", json!("reset"))]))
            .unwrap()
            .value;
        let sync = &config.commands().sync;
        assert_eq!(sync.strategy, "reset");
        assert_eq!(sync.max_retries, 9);
        assert_eq!(sync.timeout, "30s");
        assert_eq!(config.source(FieldKey::SyncStrategy), Source::Flag);
        assert_eq!(config.source(FieldKey::SyncTimeout), Source::Default);
        assert_eq!(
            config.get(FieldKey::BranchProtectedBranches),
            FieldValue::List(vec!["main".into(), "release".into()])
        );
    }

    #[test]
    fn test_flag_false_overrides() {
        let mut profile = work_profile();
        profile.settings.include_subgroups = Some(true);
        let config = Resolver::new()
            .with_profile(profile)
            .resolve(&flags(&[("include-subgroups", json!(false))]))
            .unwrap()
            .value;
        assert!(!config.include_subgroups());
        assert_eq!(config.source(FieldKey::IncludeSubgroups), Source::Flag);
    }

    #[test]
    fn test_invalid_values_fail() {
        let err = Resolver::new()
            .resolve(&flags(&[("clone-proto", json!("ftp"))]))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let err = Resolver::new()
            .resolve(&flags(&[("parallel", json!("lots"))]))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let err = Resolver::new()
            .resolve(&flags(&[("ssh-port", json!(70000))]))
            .unwrap_err();
        assert!(err.to_string().contains("sshPort"));
    }

    #[test]
    fn test_unknown_flag_warns() {
        let loaded = Resolver::new()
            .resolve(&flags(&[("colour", json!("blue"))]))
            .unwrap();
        assert_eq!(loaded.warnings[0].kind, WarningKind::UnknownKey);
    }

    #[test]
    fn test_flag_token_expansion() {
        let loaded = Resolver::new()
            .with_env(EnvSource::from_pairs([("GH_TOKEN", "ghp")]))
            .resolve(&flags(&[("token", json!("${GH_TOKEN}"))]))
            .unwrap();
        assert_eq!(loaded.value.token(), "ghp");
    }

    #[test]
    fn test_project_profile_without_store() {
        let project = ProjectConfig {
            profile: "elsewhere".into(),
            ..ProjectConfig::default()
        };
        let err = Resolver::new()
            .with_project(project)
            .resolve(&Flags::new())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProfileNotFound);
    }
}
