//! Output formatting utilities for text and JSON.

use crate::config::{ConfigNode, ConfigTree, ConfigWarning, EffectiveConfig, FieldEntry, FieldValue, NodeId};
use serde_json::{Value, json};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Text }
    }
}

const MASK: &str = "********";

/// Display value of a field, with secrets masked.
fn display_value(entry: &FieldEntry) -> String {
    match &entry.value {
        FieldValue::Str(s) if entry.key.is_secret() && !s.is_empty() => MASK.to_string(),
        FieldValue::Str(s) if s.is_empty() => "-".to_string(),
        FieldValue::List(items) if items.is_empty() => "-".to_string(),
        value => value.to_string(),
    }
}

fn json_value(entry: &FieldEntry) -> Value {
    match &entry.value {
        FieldValue::Str(s) if entry.key.is_secret() && !s.is_empty() => json!(MASK),
        value => json!(value),
    }
}

/// Format one field as `key = value (source)`.
pub fn format_field_text(entry: &FieldEntry) -> String {
    format!("{} = {} ({})", entry.key, display_value(entry), entry.source)
}

/// Format every resolved field, aligned, with its source.
pub fn format_effective_text(config: &EffectiveConfig) -> String {
    let fields = config.fields();
    let width = fields.iter().map(|f| f.key.as_str().len()).max().unwrap_or(0);

    let mut out = String::new();
    if let Some(profile) = config.active_profile() {
        out.push_str(&format!("# profile: {profile}\n"));
    }
    for entry in &fields {
        out.push_str(&format!(
            "{:width$}  {}  ({})\n",
            entry.key.as_str(),
            display_value(entry),
            entry.source,
        ));
    }
    out
}

/// JSON document with the active profile and every field.
pub fn format_effective_json(config: &EffectiveConfig) -> Value {
    let fields: serde_json::Map<String, Value> = config
        .fields()
        .iter()
        .map(|entry| {
            (
                entry.key.to_string(),
                json!({ "value": json_value(entry), "source": entry.source }),
            )
        })
        .collect();

    json!({
        "profile": config.active_profile(),
        "fields": fields,
    })
}

/// JSON for a single field.
pub fn format_field_json(entry: &FieldEntry) -> Value {
    json!({
        "key": entry.key,
        "value": json_value(entry),
        "source": entry.source,
    })
}

fn node_label(node: &ConfigNode) -> String {
    let mut label = format!("{} [{}]", node.name(), node.kind);
    if node.is_configless() {
        label.push_str(" (no config)");
    }
    if let Some(config) = &node.config
        && !config.profile.is_empty()
    {
        label.push_str(&format!(" profile={}", config.profile));
    }
    label
}

/// Indented text rendering of a tree.
pub fn format_tree_text(tree: &ConfigTree) -> String {
    let mut out = String::new();
    if !tree.is_empty() {
        write_node_text(tree, tree.root(), &mut out);
    }
    out
}

fn write_node_text(tree: &ConfigTree, id: NodeId, out: &mut String) {
    let node = &tree[id];
    let indent = "  ".repeat(node.depth);
    out.push_str(&format!("{indent}{}  {}\n", node_label(node), node.dir.display()));
    for child in &node.children {
        write_node_text(tree, *child, out);
    }
}

/// Nested JSON rendering of a tree.
pub fn format_tree_json(tree: &ConfigTree) -> Value {
    if tree.is_empty() {
        return Value::Null;
    }
    node_json(tree, tree.root())
}

fn node_json(tree: &ConfigTree, id: NodeId) -> Value {
    let node = &tree[id];
    let settings = tree.effective_settings(id);
    let children: Vec<Value> = node.children.iter().map(|c| node_json(tree, *c)).collect();
    json!({
        "name": node.name(),
        "type": node.kind,
        "dir": node.dir,
        "configPath": node.config_path,
        "configless": node.is_configless(),
        "depth": node.depth,
        "parentChain": node.parent_chain,
        "profile": tree.profile_name(id),
        "provider": settings.provider,
        "parallel": settings.parallel,
        "children": children,
    })
}

/// One line per warning, prefixed with `warning:`.
pub fn format_warnings(warnings: &[ConfigWarning]) -> String {
    warnings
        .iter()
        .map(|w| format!("warning: {w}\n"))
        .collect()
}
