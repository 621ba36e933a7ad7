//! Arena storage for a loaded configuration hierarchy.

use super::merge::Merge;
use super::profile::Manager;
use super::types::{ChildEntry, ChildId, ChildType, Config, Profile, Settings, child_prefix};
use super::validate::Loaded;
use crate::error::Result;
use std::path::PathBuf;

/// Index of a node inside a [`ConfigTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One node of the hierarchy: the root, a nested config, a repository, or a forge directory.
#[derive(Debug, Clone)]
pub struct ConfigNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Identifier in the declaring config; `None` for the root.
    pub child_id: Option<ChildId>,
    /// Declaration that produced this node; `None` for the root.
    pub entry: Option<ChildEntry>,
    pub kind: ChildType,
    /// Directory this node represents.
    pub dir: PathBuf,
    /// Canonical path of the config file that was loaded.
    pub config_path: Option<PathBuf>,
    /// Loaded config with parent inheritance and inline overrides applied.
    /// `None` for repositories, forge directories, and configless children.
    pub config: Option<Config>,
    pub depth: usize,
    /// Config files inherited from through `parent`, nearest first.
    pub parent_chain: Vec<PathBuf>,
}

impl ConfigNode {
    /// Display name: the child identifier, or the directory name for the root.
    pub fn name(&self) -> String {
        match &self.child_id {
            Some(id) => id.to_string(),
            None => self
                .dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.dir.display().to_string()),
        }
    }

    /// A `config` child whose config file does not exist.
    pub fn is_configless(&self) -> bool {
        self.kind == ChildType::Config && self.config.is_none()
    }
}

/// A configuration hierarchy. Node 0 is the root.
#[derive(Debug, Clone, Default)]
pub struct ConfigTree {
    nodes: Vec<ConfigNode>,
}

impl ConfigTree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a node and link it under `parent`.
    pub(crate) fn push(
        &mut self,
        parent: Option<NodeId>,
        child_id: Option<ChildId>,
        entry: Option<ChildEntry>,
        kind: ChildType,
        dir: PathBuf,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let depth = parent.map_or(0, |p| self.nodes[p.0].depth + 1);
        self.nodes.push(ConfigNode {
            id,
            parent,
            children: Vec::new(),
            child_id,
            entry,
            kind,
            dir,
            config_path: None,
            config: None,
            depth,
            parent_chain: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ConfigNode {
        &mut self.nodes[id.0]
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn get(&self, id: NodeId) -> Option<&ConfigNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &ConfigNode> {
        self.nodes[id.0].children.iter().map(|c| &self.nodes[c.0])
    }

    /// `id` and its ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = &ConfigNode> {
        std::iter::successors(self.get(id), |node| node.parent.and_then(|p| self.get(p)))
    }

    /// Look up an inline profile on `id` or its ancestors, nearest first.
    pub fn find_profile(&self, id: NodeId, name: &str) -> Option<&Profile> {
        self.ancestors(id)
            .filter_map(|node| node.config.as_ref())
            .find_map(|config| config.profiles.get(name))
    }

    /// Resolve a profile: inline tables up the chain first, then the profile store.
    pub fn resolve_profile(
        &self,
        id: NodeId,
        name: &str,
        manager: &Manager,
    ) -> Result<Loaded<Profile>> {
        match self.find_profile(id, name) {
            Some(profile) => Ok(Loaded::new(profile.clone(), Vec::new())),
            None => manager.load_profile(name),
        }
    }

    /// Name of the profile in effect at `id`: the nearest non-empty reference.
    pub fn profile_name(&self, id: NodeId) -> Option<&str> {
        self.ancestors(id).find_map(|node| {
            let name = match (&node.config, &node.entry) {
                (Some(config), _) => config.profile.as_str(),
                (None, Some(entry)) => entry.profile.as_str(),
                (None, None) => "",
            };
            (!name.is_empty()).then_some(name)
        })
    }

    /// Settings folded from the root down to `id`; the deeper level wins.
    ///
    /// Nodes without a loaded config contribute their entry's inline overrides.
    pub fn effective_settings(&self, id: NodeId) -> Settings {
        let mut chain: Vec<&ConfigNode> = self.ancestors(id).collect();
        chain.reverse();

        let mut settings = Settings::default();
        for node in chain {
            match (&node.config, &node.entry) {
                (Some(config), _) => settings.merge_from(&config.settings),
                (None, Some(entry)) => settings.merge_from(&entry.settings),
                (None, None) => {}
            }
        }
        settings
    }

    /// Validate every node: declared entries, loaded configs, and hooks.
    pub fn validate(&self) -> Result<()> {
        for node in &self.nodes {
            match (&node.config, &node.entry, &node.child_id) {
                (Some(config), _, _) => config.validate()?,
                (None, Some(entry), Some(id)) => entry.validate(&child_prefix(id))?,
                _ => {}
            }
        }
        Ok(())
    }
}

impl std::ops::Index<NodeId> for ConfigTree {
    type Output = ConfigNode;

    fn index(&self, id: NodeId) -> &ConfigNode {
        &self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(yaml: &str) -> Config {
        Config::from_yaml(yaml, std::path::Path::new("t.yaml")).unwrap()
    }

    fn sample() -> (ConfigTree, NodeId, NodeId) {
        let mut tree = ConfigTree::new();
        let root = tree.push(None, None, None, ChildType::Config, PathBuf::from("/w"));
        tree.node_mut(root).config = Some(config(
            "provider: github\nparallel: 4\nprofile: team\nprofiles:\n  team:\n    parallel: 6\n",
        ));

        let team = tree.push(
            Some(root),
            Some(ChildId::Name("team".into())),
            Some(ChildEntry::new("team").with_type(ChildType::Config)),
            ChildType::Config,
            PathBuf::from("/w/team"),
        );
        tree.node_mut(team).config = Some(config("parallel: 8\n"));

        let mut entry = ChildEntry::new("repo");
        entry.settings.clone_proto = "https".into();
        let repo = tree.push(
            Some(team),
            Some(ChildId::Name("repo".into())),
            Some(entry),
            ChildType::Git,
            PathBuf::from("/w/team/repo"),
        );
        (tree, team, repo)
    }

    #[test]
    fn test_links_and_depth() {
        let (tree, team, repo) = sample();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree[repo].parent, Some(team));
        assert_eq!(tree[repo].depth, 2);
        assert_eq!(tree.children(tree.root()).count(), 1);
        let names: Vec<_> = tree.ancestors(repo).map(|n| n.name()).collect();
        assert_eq!(names, vec!["repo", "team", "w"]);
    }

    #[test]
    fn test_effective_settings_child_wins() {
        let (tree, _, repo) = sample();
        let settings = tree.effective_settings(repo);
        assert_eq!(settings.provider, "github");
        assert_eq!(settings.parallel, 8);
        assert_eq!(settings.clone_proto, "https");
    }

    #[test]
    fn test_find_profile_walks_up() {
        let (tree, _, repo) = sample();
        assert_eq!(tree.find_profile(repo, "team").unwrap().settings.parallel, 6);
        assert!(tree.find_profile(repo, "missing").is_none());
        assert_eq!(tree.profile_name(repo), Some("team"));
    }
}
