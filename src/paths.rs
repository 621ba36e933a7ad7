//! Filesystem locations for configuration files.
//!
//! This module provides:
//! - The config home layout (global config, profiles, state, active-profile marker)
//! - Idempotent directory bootstrap with owner-only permissions
//! - Upward search for a project config file
//! - The shared path-resolution rule used by hierarchical configs (`~/`, absolute, relative)

use crate::error::{ConfigError, Result};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// File name of project and hierarchical configs.
pub const PROJECT_CONFIG_FILE: &str = ".gz-git.yaml";

/// Directory name under the XDG config dir.
const APP_DIR: &str = "gz-git";

const GLOBAL_CONFIG_FILE: &str = "config.yaml";
const PROFILES_DIR: &str = "profiles";
const STATE_DIR: &str = "state";
const ACTIVE_PROFILE_FILE: &str = "active-profile.txt";

/// Paths for the configuration home.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    root: PathBuf,
}

impl ConfigPaths {
    /// Discover the config home from the environment.
    ///
    /// `GZ_GIT_CONFIG_HOME` wins, then `$XDG_CONFIG_HOME/gz-git`, then `~/.config/gz-git`.
    pub fn discover() -> Result<Self> {
        if let Ok(explicit) = std::env::var("GZ_GIT_CONFIG_HOME")
            && !explicit.is_empty()
        {
            return Ok(Self::with_root(explicit));
        }

        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME")
            && !xdg.is_empty()
        {
            return Ok(Self::with_root(PathBuf::from(xdg).join(APP_DIR)));
        }

        let home = dirs::home_dir().ok_or_else(|| ConfigError::HomeDirUnavailable {
            path: format!("~/.config/{APP_DIR}"),
        })?;
        Ok(Self::with_root(home.join(".config").join(APP_DIR)))
    }

    /// Create paths rooted at an explicit directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The config home directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the global config file.
    pub fn global_config(&self) -> PathBuf {
        self.root.join(GLOBAL_CONFIG_FILE)
    }

    /// Directory holding one YAML file per profile.
    pub fn profiles_dir(&self) -> PathBuf {
        self.root.join(PROFILES_DIR)
    }

    /// Path of a single profile file.
    pub fn profile_file(&self, name: &str) -> PathBuf {
        self.profiles_dir().join(format!("{name}.yaml"))
    }

    /// Directory for runtime state.
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    /// Marker file holding the active profile name.
    pub fn active_profile_file(&self) -> PathBuf {
        self.state_dir().join(ACTIVE_PROFILE_FILE)
    }

    /// Ensure the config, profile, and state directories exist with mode 0700.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.root.clone(), self.profiles_dir(), self.state_dir()] {
            std::fs::create_dir_all(&dir)
                .map_err(|e| ConfigError::io("creating directory", &dir, e))?;
            set_mode(&dir, 0o700)?;
        }
        Ok(())
    }
}

/// Search upward from `start` for the project config file.
///
/// The walk stops after checking `home`. When `start` is not below `home`,
/// the walk continues to the filesystem root. A missing file is `Ok(None)`.
pub fn find_project_config(start: &Path, home: Option<&Path>) -> Option<PathBuf> {
    let start = absolutize(start);
    let home = home.map(absolutize);

    for dir in start.ancestors() {
        let candidate = dir.join(PROJECT_CONFIG_FILE);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "Found project config");
            return Some(candidate);
        }
        if home.as_deref() == Some(dir) {
            break;
        }
    }
    None
}

/// Resolve a path declared inside a config file.
///
/// - `~` and `~/rest` expand against `home`
/// - absolute paths are used verbatim
/// - anything else is joined against `base`
///
/// The result is lexically normalized.
pub fn resolve_path(base: &Path, raw: &str, home: Option<&Path>) -> Result<PathBuf> {
    let resolved = if raw == "~" || raw.starts_with("~/") {
        let home = home.ok_or_else(|| ConfigError::HomeDirUnavailable {
            path: raw.to_string(),
        })?;
        match raw.strip_prefix("~/") {
            Some(rest) => home.join(rest),
            None => home.to_path_buf(),
        }
    } else {
        let path = Path::new(raw);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base.join(path)
        }
    };
    Ok(normalize_path_components(&resolved))
}

/// Canonical identity of a config file.
///
/// Uses `canonicalize` when the file exists so symlinked directories compare
/// equal; otherwise falls back to an absolute, lexically normalized path.
pub fn canonical_config_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| absolutize(path))
}

/// Make a path absolute against the current directory and normalize it.
pub fn absolutize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    normalize_path_components(&absolute)
}

/// Normalize path components without requiring the file to exist.
/// Handles `.` and `..` components.
pub fn normalize_path_components(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(p) => components.push(Component::Prefix(p)),
            Component::RootDir => components.push(Component::RootDir),
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                } else {
                    components.push(Component::ParentDir);
                }
            }
            Component::Normal(name) => components.push(Component::Normal(name)),
        }
    }

    components.iter().collect()
}

/// Apply a unix permission mode. No-op on other platforms.
#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| ConfigError::io("setting permissions on", path, e))
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Write a file restricted to `mode`.
///
/// New files are created with `mode`; existing files are truncated and then
/// narrowed to it.
pub(crate) fn write_file(path: &Path, content: &str, mode: u32) -> Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }

    let mut file = options
        .open(path)
        .map_err(|e| ConfigError::io("writing", path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| ConfigError::io("writing", path, e))?;
    set_mode(path, mode)
}
