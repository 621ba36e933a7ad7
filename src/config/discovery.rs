//! Auto-discovery of child workspaces by scanning a directory.

use super::types::{ChildEntry, ChildType};
use crate::error::{ConfigError, Result};
use std::path::Path;
use tracing::debug;

/// Scan the immediate subdirectories of `dir` for children.
///
/// A subdirectory holding `config_file` becomes a `config` child; one holding
/// `.git` (directory or file) becomes a `git` child. Hidden directories and
/// anything else are ignored. Entries are sorted by name.
pub fn discover_children(dir: &Path, config_file: &str) -> Result<Vec<ChildEntry>> {
    let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::io("scanning", dir, e))?;

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::io("scanning", dir, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }

        let kind = if path.join(config_file).is_file() {
            ChildType::Config
        } else if path.join(".git").exists() {
            ChildType::Git
        } else {
            continue;
        };

        debug!(child = %name, kind = %kind, "Discovered child");
        found.push(ChildEntry {
            name: name.clone(),
            ..ChildEntry::new(name).with_type(kind)
        });
    }

    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}
