//! Configuration resolution engine.
//!
//! Two ways to get a configuration:
//! 1. **Precedence resolution** ([`Resolver`]) - merges built-in defaults, the
//!    global `defaults` map, the active profile, the project config, and
//!    command flags into one [`EffectiveConfig`] with per-field provenance.
//! 2. **Hierarchical loading** ([`load_tree`]) - loads a tree of workspace
//!    configs with upward `parent` inheritance and downward child traversal
//!    into a [`ConfigTree`].
//!
//! ## Merge Strategy
//! Every level merges field by field; zero values (empty strings, `0`, empty
//! lists, absent booleans) never override a lower level.
//!
//! ## Environment Variables
//! - `GZ_GIT_CONFIG_HOME` - Config home (default: `$XDG_CONFIG_HOME/gz-git` or `~/.config/gz-git`)
//! - `${NAME}` tokens inside `token` and `baseURL` values expand from the environment

mod discovery;
mod effective;
mod loader;
mod merge;
mod profile;
mod resolver;
mod tree;
mod types;
mod validate;

pub use discovery::discover_children;
pub use effective::{EffectiveConfig, FieldEntry, FieldKey, FieldKind, FieldValue, Source};
pub use loader::{DEFAULT_MAX_DEPTH, LoadOptions, load_tree};
pub use merge::{Merge, Unset};
pub use profile::Manager;
pub use resolver::{Flags, Resolver, builtin_defaults};
pub use tree::{ConfigNode, ConfigTree, NodeId};
pub use types::*;
pub use validate::{ConfigWarning, EnvSource, Loaded, WarningKind};
