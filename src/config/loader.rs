//! Recursive hierarchical configuration loader.
//!
//! A hierarchy is loaded depth-first from a root directory:
//!
//! 1. The level's config file is canonicalized and checked against the files
//!    already visited on its own parent chain and the configs that declared it,
//!    then against the depth ceiling.
//! 2. The file is parsed and `${VAR}` tokens are expanded.
//! 3. A declared `parent` is loaded (without its children) and folded in;
//!    values set at this level win.
//! 4. Child entries, declared or discovered, become nodes. `config` children
//!    recurse; `git` children are checked for a repository; `forge` children
//!    are taken as declared.

use super::discovery::discover_children;
use super::tree::{ConfigTree, NodeId};
use super::types::{ChildId, ChildMergeScope, ChildType, Config, child_prefix};
use super::validate::{ConfigWarning, EnvSource, Loaded, WarningKind};
use crate::error::{ConfigError, Result};
use crate::paths::{PROJECT_CONFIG_FILE, absolutize, canonical_config_path, resolve_path};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default recursion ceiling.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Options for [`load_tree`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Config file name looked up in each directory.
    pub config_file: String,
    /// Deepest level allowed; the root is level 0.
    pub max_depth: usize,
    /// Traverse child entries. When false only the root (and its parents) load.
    pub load_children: bool,
    /// Treat a `git` child without a repository as an error instead of a warning.
    pub strict_git_repos: bool,
    /// Which inline child fields override a loaded child config.
    pub child_merge: ChildMergeScope,
    /// Home directory for `~` expansion.
    pub home_dir: Option<PathBuf>,
    /// Variables for `${VAR}` expansion.
    pub env: EnvSource,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            config_file: PROJECT_CONFIG_FILE.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            load_children: true,
            strict_git_repos: false,
            child_merge: ChildMergeScope::All,
            home_dir: dirs::home_dir(),
            env: EnvSource::Process,
        }
    }
}

impl LoadOptions {
    pub fn with_config_file(mut self, name: impl Into<String>) -> Self {
        self.config_file = name.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_children(mut self, load_children: bool) -> Self {
        self.load_children = load_children;
        self
    }

    pub fn with_strict_git_repos(mut self, strict: bool) -> Self {
        self.strict_git_repos = strict;
        self
    }

    pub fn with_child_merge(mut self, scope: ChildMergeScope) -> Self {
        self.child_merge = scope;
        self
    }

    pub fn with_home_dir(mut self, home: Option<PathBuf>) -> Self {
        self.home_dir = home;
        self
    }

    pub fn with_env(mut self, env: EnvSource) -> Self {
        self.env = env;
        self
    }
}

/// Load the hierarchy rooted at `dir`.
///
/// The root config file must exist. Missing config files of `config` children
/// produce configless nodes; every other read or parse failure aborts.
pub fn load_tree(dir: &Path, options: &LoadOptions) -> Result<Loaded<ConfigTree>> {
    let dir = absolutize(dir);
    let mut loader = Loader {
        options,
        tree: ConfigTree::new(),
        warnings: Vec::new(),
    };

    let mut visited = HashSet::new();
    let level = loader.load_level(&dir.join(&options.config_file), 0, &mut visited)?;

    let root = loader.tree.push(None, None, None, ChildType::Config, dir.clone());
    if options.load_children {
        let declaring = HashSet::from([level.path.clone()]);
        loader.load_children(root, &level.config, &dir, 0, &declaring)?;
    }
    loader.attach(root, level);

    debug!(
        root = %dir.display(),
        nodes = loader.tree.len(),
        warnings = loader.warnings.len(),
        "Loaded configuration tree"
    );
    Ok(Loaded::new(loader.tree, loader.warnings))
}

/// One parsed level with its parents folded in.
struct Level {
    config: Config,
    path: PathBuf,
    parent_chain: Vec<PathBuf>,
}

struct Loader<'a> {
    options: &'a LoadOptions,
    tree: ConfigTree,
    warnings: Vec<ConfigWarning>,
}

impl Loader<'_> {
    fn load_level(
        &mut self,
        path: &Path,
        depth: usize,
        visited: &mut HashSet<PathBuf>,
    ) -> Result<Level> {
        let canonical = canonical_config_path(path);
        if !visited.insert(canonical.clone()) {
            return Err(ConfigError::CircularReference { path: canonical });
        }
        if depth > self.options.max_depth {
            return Err(ConfigError::RecursionDepthExceeded {
                max: self.options.max_depth,
                path: canonical,
            });
        }

        let content = match std::fs::read_to_string(&canonical) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ConfigError::ConfigNotFound { path: canonical });
            }
            Err(e) => return Err(ConfigError::io("reading", &canonical, e)),
        };
        let mut config = Config::from_yaml(&content, &canonical)?;

        let mut warnings = Vec::new();
        config.expand_env(&self.options.env, &mut warnings);
        self.warnings
            .extend(warnings.into_iter().map(|w| w.with_path(&canonical)));

        let mut parent_chain = Vec::new();
        if let Some(parent) = config.parent.clone() {
            let base = canonical.parent().unwrap_or(Path::new("/"));
            let target = resolve_path(base, parent.path(), self.options.home_dir.as_deref())?;
            let parent_file = if target.is_file() {
                target
            } else {
                target.join(parent.config_file().unwrap_or(&self.options.config_file))
            };

            debug!(child = %canonical.display(), parent = %parent_file.display(), "Loading parent config");
            let parent_level = self.load_level(&parent_file, depth + 1, visited)?;
            config.inherit_from_parent(&parent_level.config);
            parent_chain.push(parent_level.path);
            parent_chain.extend(parent_level.parent_chain);
        }

        Ok(Level {
            config,
            path: canonical,
            parent_chain,
        })
    }

    fn load_children(
        &mut self,
        node: NodeId,
        config: &Config,
        dir: &Path,
        depth: usize,
        declaring: &HashSet<PathBuf>,
    ) -> Result<()> {
        let home = self.options.home_dir.as_deref();
        let mut entries = config.child_entries();

        if config.discovery.mode.should_scan(entries.len()) {
            let mut declared = HashSet::new();
            for (_, entry) in &entries {
                declared.insert(resolve_path(dir, &entry.path, home)?);
            }
            for entry in discover_children(dir, &self.options.config_file)? {
                if !declared.contains(&dir.join(&entry.path)) {
                    entries.push((ChildId::Name(entry.name.clone()), entry));
                }
            }
        }

        for (id, entry) in entries {
            let kind = entry.effective_type().ok_or_else(|| {
                ConfigError::validation(
                    format!("{}.type", child_prefix(&id)),
                    format!("'{}' must be one of: config, git, forge", entry.kind),
                )
            })?;
            let child_dir = resolve_path(dir, &entry.path, home)?;

            match kind {
                ChildType::Config => {
                    let file = if entry.config_file.is_empty() {
                        self.options.config_file.as_str()
                    } else {
                        entry.config_file.as_str()
                    };
                    let path = child_dir.join(file);
                    let expected = canonical_config_path(&path);
                    // A child's parent chain is its own; only the configs
                    // that declared it are off limits.
                    let mut child_visited = declaring.clone();

                    match self.load_level(&path, depth + 1, &mut child_visited) {
                        Ok(mut level) => {
                            entry.apply_inline(&mut level.config, self.options.child_merge);
                            let mut child_declaring = declaring.clone();
                            child_declaring.insert(level.path.clone());
                            let child = self.tree.push(
                                Some(node),
                                Some(id),
                                Some(entry),
                                ChildType::Config,
                                child_dir.clone(),
                            );
                            self.load_children(
                                child,
                                &level.config,
                                &child_dir,
                                depth + 1,
                                &child_declaring,
                            )?;
                            self.attach(child, level);
                        }
                        Err(ConfigError::ConfigNotFound { path }) if path == expected => {
                            debug!(child = %id, path = %path.display(), "Child has no config file");
                            self.tree
                                .push(Some(node), Some(id), Some(entry), ChildType::Config, child_dir);
                        }
                        Err(e) => return Err(e),
                    }
                }
                ChildType::Git => {
                    if !child_dir.join(".git").exists() {
                        let field = format!("{}.path", child_prefix(&id));
                        let message = format!("{} is not a git repository", child_dir.display());
                        if self.options.strict_git_repos {
                            return Err(ConfigError::validation(field, message));
                        }
                        self.warnings.push(
                            ConfigWarning::new(WarningKind::MissingRepository, field, message)
                                .with_path(&child_dir),
                        );
                    }
                    self.tree
                        .push(Some(node), Some(id), Some(entry), ChildType::Git, child_dir);
                }
                ChildType::Forge => {
                    self.tree
                        .push(Some(node), Some(id), Some(entry), ChildType::Forge, child_dir);
                }
            }
        }
        Ok(())
    }

    fn attach(&mut self, id: NodeId, level: Level) {
        let node = self.tree.node_mut(id);
        node.config_path = Some(level.path);
        node.parent_chain = level.parent_chain;
        node.config = Some(level.config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn options() -> LoadOptions {
        LoadOptions::default()
            .with_home_dir(None)
            .with_env(EnvSource::from_pairs([("TEAM_TOKEN", "t0k")]))
    }

    #[test]
    fn test_root_must_exist() {
        let temp = TempDir::new().unwrap();
        let err = load_tree(temp.path(), &options()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigNotFound);
    }

    #[test]
    fn test_expands_tokens_with_warnings() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), ".gz-git.yaml", "token: ${TEAM_TOKEN}\nbaseURL: ${NOPE}\n");
        let loaded = load_tree(temp.path(), &options()).unwrap();
        let tree = loaded.value;
        let config = tree[tree.root()].config.as_ref().unwrap();
        assert_eq!(config.settings.token, "t0k");
        assert_eq!(config.settings.base_url, "");
        assert_eq!(loaded.warnings.len(), 1);
        assert_eq!(loaded.warnings[0].kind, WarningKind::MissingEnvVar);
        assert_eq!(loaded.warnings[0].field, "baseURL");
    }

    #[test]
    fn test_parent_inheritance() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), ".gz-git.yaml", "provider: gitlab\nparallel: 4\n");
        write(temp.path(), "child/.gz-git.yaml", "parent: ..\nparallel: 9\n");

        let tree = load_tree(&temp.path().join("child"), &options()).unwrap().value;
        let root = &tree[tree.root()];
        let config = root.config.as_ref().unwrap();
        assert_eq!(config.settings.provider, "gitlab");
        assert_eq!(config.settings.parallel, 9);
        assert_eq!(root.parent_chain.len(), 1);
    }

    #[test]
    fn test_parent_with_config_file() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "base/shared.yaml", "cloneProto: https\n");
        write(
            temp.path(),
            "ws/.gz-git.yaml",
            "parent:\n  path: ../base\n  configFile: shared.yaml\n",
        );
        let tree = load_tree(&temp.path().join("ws"), &options()).unwrap().value;
        let config = tree[tree.root()].config.as_ref().unwrap();
        assert_eq!(config.settings.clone_proto, "https");
    }

    #[test]
    fn test_self_parent_is_circular() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), ".gz-git.yaml", "parent: .\n");
        let err = load_tree(temp.path(), &options()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CircularReference);
    }

    #[test]
    fn test_children_skipped_when_disabled() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            ".gz-git.yaml",
            "workspaces:\n  repo:\n    type: git\n",
        );
        let tree = load_tree(temp.path(), &options().with_children(false))
            .unwrap()
            .value;
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_git_child_strictness() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), ".gz-git.yaml", "workspaces:\n  repo:\n    type: git\n");

        let loaded = load_tree(temp.path(), &options()).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert_eq!(loaded.warnings[0].kind, WarningKind::MissingRepository);

        let err = load_tree(temp.path(), &options().with_strict_git_repos(true)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        std::fs::create_dir_all(temp.path().join("repo/.git")).unwrap();
        let loaded = load_tree(temp.path(), &options().with_strict_git_repos(true)).unwrap();
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_unknown_child_type_fails() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), ".gz-git.yaml", "workspaces:\n  x:\n    type: svn\n");
        let err = load_tree(temp.path(), &options()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert!(err.to_string().contains("workspaces.x.type"));
    }

    #[test]
    fn test_child_parse_error_aborts() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            ".gz-git.yaml",
            "workspaces:\n  team:\n    type: config\n",
        );
        write(temp.path(), "team/.gz-git.yaml", "parallel: [not, a, number]\n");
        let err = load_tree(temp.path(), &options()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParseError);
    }

    #[test]
    fn test_root_and_child_share_a_base() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "base/.gz-git.yaml", "provider: gitlab\n");
        write(
            temp.path(),
            "ws/.gz-git.yaml",
            "parent: ../base\nworkspaces:\n  team:\n    type: config\n",
        );
        write(temp.path(), "ws/team/.gz-git.yaml", "parent: ../../base\nparallel: 3\n");

        let tree = load_tree(&temp.path().join("ws"), &options()).unwrap().value;
        let team = tree.children(tree.root()).next().unwrap();
        let config = team.config.as_ref().unwrap();
        assert_eq!(config.settings.provider, "gitlab");
        assert_eq!(config.settings.parallel, 3);
        assert_eq!(team.parent_chain.len(), 1);
        assert_eq!(tree[tree.root()].parent_chain, team.parent_chain);
    }

    #[test]
    fn test_child_parent_pointing_at_declarer_is_circular() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            ".gz-git.yaml",
            "workspaces:\n  team:\n    type: config\n",
        );
        write(temp.path(), "team/.gz-git.yaml", "parent: ..\n");
        let err = load_tree(temp.path(), &options()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CircularReference);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_child_config_aborts() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            ".gz-git.yaml",
            "workspaces:\n  team:\n    type: config\n",
        );
        let child = temp.path().join("team/.gz-git.yaml");
        write(temp.path(), "team/.gz-git.yaml", "parallel: 2\n");
        std::fs::set_permissions(&child, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores file modes.
        if std::fs::read_to_string(&child).is_ok() {
            return;
        }
        let err = load_tree(temp.path(), &options()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::IoError);
    }

    #[test]
    fn test_inline_overrides_scope() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            ".gz-git.yaml",
            r#"
workspaces:
  team:
    type: config
    provider: gitea
    pull:
      rebase: true
"#,
        );
        write(temp.path(), "team/.gz-git.yaml", "provider: gitlab\n");

        let tree = load_tree(temp.path(), &options()).unwrap().value;
        let team = tree.children(tree.root()).next().unwrap();
        let config = team.config.as_ref().unwrap();
        assert_eq!(config.settings.provider, "gitea");
        assert_eq!(config.settings.commands.pull.rebase, Some(true));

        let tree = load_tree(
            temp.path(),
            &options().with_child_merge(ChildMergeScope::Commands),
        )
        .unwrap()
        .value;
        let team = tree.children(tree.root()).next().unwrap();
        let config = team.config.as_ref().unwrap();
        assert_eq!(config.settings.provider, "gitlab");
        assert_eq!(config.settings.commands.pull.rebase, Some(true));
    }

    #[test]
    fn test_auto_discovery_adds_undeclared() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            ".gz-git.yaml",
            "discovery:\n  mode: auto\nworkspaces:\n  api:\n    type: git\n",
        );
        std::fs::create_dir_all(temp.path().join("api/.git")).unwrap();
        std::fs::create_dir_all(temp.path().join("web/.git")).unwrap();

        let tree = load_tree(temp.path(), &options()).unwrap().value;
        let names: Vec<_> = tree.children(tree.root()).map(|n| n.name()).collect();
        assert_eq!(names, vec!["api", "web"]);
    }

    #[test]
    fn test_forge_child_needs_no_directory() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            ".gz-git.yaml",
            "workspaces:\n  acme:\n    source:\n      provider: github\n      org: acme\n",
        );
        let loaded = load_tree(temp.path(), &options()).unwrap();
        assert!(loaded.warnings.is_empty());
        let tree = loaded.value;
        let acme = tree.children(tree.root()).next().unwrap();
        assert_eq!(acme.kind, ChildType::Forge);
        assert!(tree.validate().is_ok());
    }
}
