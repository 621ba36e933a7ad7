//! Profile store.
//!
//! Profiles live one per file under `<config-home>/profiles/`, next to the
//! global config and the active-profile marker. All files are written with
//! owner-only permissions.

use super::types::{DEFAULT_PROFILE, Environment, GlobalConfig, Profile};
use super::validate::{EnvSource, Loaded, validate_profile_name};
use crate::error::{ConfigError, Result};
use crate::paths::{ConfigPaths, write_file};
use std::io::ErrorKind;
use tracing::debug;

const FILE_MODE: u32 = 0o600;

/// CRUD over profiles, the global config, and the active-profile state.
#[derive(Debug, Clone)]
pub struct Manager {
    paths: ConfigPaths,
    env: EnvSource,
}

impl Manager {
    pub fn new(paths: ConfigPaths) -> Self {
        Self {
            paths,
            env: EnvSource::Process,
        }
    }

    /// Manager rooted at the discovered config home.
    pub fn discover() -> Result<Self> {
        Ok(Self::new(ConfigPaths::discover()?))
    }

    /// Use a fixed variable source for `${VAR}` expansion.
    pub fn with_env(mut self, env: EnvSource) -> Self {
        self.env = env;
        self
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn env(&self) -> &EnvSource {
        &self.env
    }

    /// Create the directory layout, the `default` profile, the global config,
    /// and the active-profile marker. Existing files are left alone.
    pub fn initialize(&self) -> Result<()> {
        self.paths.ensure_dirs()?;

        if !self.profile_exists(DEFAULT_PROFILE) {
            self.save_profile(&Profile::new(DEFAULT_PROFILE))?;
        }

        if !self.paths.global_config().exists() {
            self.save_global_config(&GlobalConfig {
                active_profile: DEFAULT_PROFILE.to_string(),
                ..GlobalConfig::default()
            })?;
        }

        let marker = self.paths.active_profile_file();
        if !marker.exists() {
            write_file(&marker, DEFAULT_PROFILE, FILE_MODE)?;
        }

        debug!(root = %self.paths.root().display(), "Initialized config home");
        Ok(())
    }

    /// Create a new profile. Fails if one with the same name exists.
    pub fn create_profile(&self, profile: &Profile) -> Result<()> {
        validate_profile_name(&profile.name)?;
        if self.profile_exists(&profile.name) {
            return Err(ConfigError::ProfileExists {
                name: profile.name.clone(),
            });
        }
        self.save_profile(profile)
    }

    /// Validate and write a profile, replacing any existing file.
    pub fn save_profile(&self, profile: &Profile) -> Result<()> {
        profile.validate()?;
        self.paths.ensure_dirs()?;

        let path = self.paths.profile_file(&profile.name);
        write_file(&path, &profile.to_yaml()?, FILE_MODE)?;
        debug!(profile = %profile.name, path = %path.display(), "Saved profile");
        Ok(())
    }

    /// Load a profile with `${VAR}` expansion applied, then validate it.
    pub fn load_profile(&self, name: &str) -> Result<Loaded<Profile>> {
        let mut profile = self.load_profile_raw(name)?;
        let mut warnings = Vec::new();
        profile.expand_env(&self.env, &mut warnings);
        for warning in &mut warnings {
            warning.path = Some(self.paths.profile_file(name));
        }
        profile.validate()?;
        Ok(Loaded::new(profile, warnings))
    }

    /// Load a profile exactly as stored, without expansion or validation.
    pub fn load_profile_raw(&self, name: &str) -> Result<Profile> {
        validate_profile_name(name)?;
        let path = self.paths.profile_file(name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ConfigError::profile_not_found(name));
            }
            Err(e) => return Err(ConfigError::io("reading", &path, e)),
        };

        let mut profile = Profile::from_yaml(&content, &path)?;
        if !profile.name.is_empty() && profile.name != name {
            debug!(file = name, stored = %profile.name, "Profile name differs from its file, using the file name");
        }
        profile.name = name.to_string();
        Ok(profile)
    }

    /// Delete a profile. `default` cannot be deleted.
    ///
    /// Deleting the active profile switches the marker back to `default`.
    pub fn delete_profile(&self, name: &str) -> Result<()> {
        validate_profile_name(name)?;
        if name == DEFAULT_PROFILE {
            return Err(ConfigError::ReservedProfile {
                name: name.to_string(),
            });
        }

        let was_active = self.active_profile()? == name;
        let path = self.paths.profile_file(name);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ConfigError::profile_not_found(name));
            }
            Err(e) => return Err(ConfigError::io("deleting", &path, e)),
        }

        if was_active {
            self.paths.ensure_dirs()?;
            write_file(&self.paths.active_profile_file(), DEFAULT_PROFILE, FILE_MODE)?;
            debug!(profile = name, "Deleted active profile, reverted to default");
        } else {
            debug!(profile = name, "Deleted profile");
        }
        Ok(())
    }

    /// Names of all stored profiles, sorted.
    pub fn list_profiles(&self) -> Result<Vec<String>> {
        let dir = self.paths.profiles_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ConfigError::io("listing", &dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ConfigError::io("listing", &dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && validate_profile_name(stem).is_ok()
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn profile_exists(&self, name: &str) -> bool {
        validate_profile_name(name).is_ok() && self.paths.profile_file(name).is_file()
    }

    /// Name of the active profile.
    ///
    /// The state marker wins, then the global config's `activeProfile`, then `default`.
    pub fn active_profile(&self) -> Result<String> {
        let marker = self.paths.active_profile_file();
        match std::fs::read_to_string(&marker) {
            Ok(content) => {
                let name = content.trim();
                if !name.is_empty() {
                    return Ok(name.to_string());
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(ConfigError::io("reading", &marker, e)),
        }

        if let Some(global) = self.load_global_config()?
            && !global.active_profile.is_empty()
        {
            return Ok(global.active_profile);
        }

        Ok(DEFAULT_PROFILE.to_string())
    }

    /// Switch the active profile. The profile must exist.
    pub fn set_active_profile(&self, name: &str) -> Result<()> {
        validate_profile_name(name)?;
        if !self.profile_exists(name) {
            return Err(ConfigError::profile_not_found(name));
        }
        self.paths.ensure_dirs()?;
        write_file(&self.paths.active_profile_file(), name, FILE_MODE)?;
        debug!(profile = name, "Switched active profile");
        Ok(())
    }

    /// Load the global config. A missing file is `Ok(None)`.
    pub fn load_global_config(&self) -> Result<Option<GlobalConfig>> {
        let path = self.paths.global_config();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfigError::io("reading", &path, e)),
        };
        let global = GlobalConfig::from_yaml(&content, &path)?;
        global.validate()?;
        Ok(Some(global))
    }

    pub fn save_global_config(&self, global: &GlobalConfig) -> Result<()> {
        global.validate()?;
        self.paths.ensure_dirs()?;
        let path = self.paths.global_config();
        write_file(&path, &global.to_yaml()?, FILE_MODE)?;
        debug!(path = %path.display(), "Saved global config");
        Ok(())
    }

    /// Look up a named token environment from the global config, expanded.
    pub fn environment(&self, name: &str) -> Result<Option<Loaded<Environment>>> {
        let Some(mut global) = self.load_global_config()? else {
            return Ok(None);
        };
        let mut warnings = Vec::new();
        global.expand_env(&self.env, &mut warnings);
        let path = self.paths.global_config();
        let prefix = format!("environments.{name}.");
        Ok(global.environments.remove(name).map(|environment| {
            let warnings = warnings
                .into_iter()
                .filter(|w| w.field.starts_with(&prefix))
                .map(|w| w.with_path(&path))
                .collect();
            Loaded::new(environment, warnings)
        }))
    }
}
