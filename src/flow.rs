//! Flow graph — the authored decision tree behind the help chat.
//!
//! DESIGN
//! ======
//! A graph is a map of node key -> node, authored as YAML. Validation runs
//! once in `FlowGraph::from_nodes`: a `FlowGraph` value that exists has a
//! `welcome` root, no dangling option targets, no silent dead ends, and
//! unique option ids per node. The engine never has to treat a missing node
//! as a runtime path.
//!
//! The built-in support script is embedded from `flows/support.yaml` and goes
//! through the same loader as user-supplied files.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ErrorCode;

/// Key of the node every conversation starts from.
pub const ROOT_NODE: &str = "welcome";

const BUILTIN_SCRIPT: &str = include_str!("../flows/support.yaml");

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Authoring defects found while loading a flow graph.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("flow file parse failed: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("flow file read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("flow graph has no `welcome` node")]
    MissingRoot,
    #[error("node `{node}` option `{option}` points at unknown node `{target}`")]
    DanglingTarget { node: String, option: String, target: String },
    #[error("terminal node `{node}` must not offer options")]
    TerminalWithOptions { node: String },
    #[error("node `{node}` offers no options and is not marked `end`")]
    DeadEnd { node: String },
    #[error("node `{node}` has duplicate option id `{option}`")]
    DuplicateOptionId { node: String, option: String },
    #[error("node `{node}` has an option with an empty id")]
    EmptyOptionId { node: String },
    #[error("node `{node}` has an empty message")]
    EmptyMessage { node: String },
}

impl ErrorCode for FlowError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "E_FLOW_PARSE",
            Self::Io(_) => "E_FLOW_IO",
            Self::MissingRoot => "E_MISSING_ROOT",
            Self::DanglingTarget { .. } => "E_DANGLING_TARGET",
            Self::TerminalWithOptions { .. } => "E_TERMINAL_WITH_OPTIONS",
            Self::DeadEnd { .. } => "E_DEAD_END",
            Self::DuplicateOptionId { .. } => "E_DUPLICATE_OPTION_ID",
            Self::EmptyOptionId { .. } => "E_EMPTY_OPTION_ID",
            Self::EmptyMessage { .. } => "E_EMPTY_MESSAGE",
        }
    }
}

// =============================================================================
// NODES AND OPTIONS
// =============================================================================

/// A selectable choice: shown as `label`, typed as `id`, leads to `next`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowOption {
    pub id: String,
    pub label: String,
    pub next: String,
}

/// One step of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowNode {
    /// Bot message shown on entry. May contain newlines.
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FlowOption>,
    /// Terminal nodes end automatic progression.
    #[serde(default)]
    pub end: bool,
}

impl FlowNode {
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.end
    }

    /// Find an option by its typed identifier.
    #[must_use]
    pub fn option(&self, id: &str) -> Option<&FlowOption> {
        self.options.iter().find(|o| o.id == id)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FlowFile {
    nodes: BTreeMap<String, FlowNode>,
}

// =============================================================================
// GRAPH
// =============================================================================

/// Immutable, validated conversation graph.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    nodes: BTreeMap<String, FlowNode>,
}

impl FlowGraph {
    /// The embedded Springing Stars support script.
    ///
    /// # Errors
    ///
    /// Returns an error only if the embedded script itself is malformed.
    pub fn builtin() -> Result<Self, FlowError> {
        Self::from_yaml(BUILTIN_SCRIPT)
    }

    /// Load and validate a YAML flow file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, FlowError> {
        let src = std::fs::read_to_string(path)?;
        Self::from_yaml(&src)
    }

    /// Parse and validate a YAML flow document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a flow file or fails validation.
    pub fn from_yaml(src: &str) -> Result<Self, FlowError> {
        let file: FlowFile = serde_yaml::from_str(src)?;
        Self::from_nodes(file.nodes)
    }

    /// Validate a node map and wrap it as a graph.
    ///
    /// # Errors
    ///
    /// Returns the first authoring defect found, in node-key order.
    pub fn from_nodes(nodes: BTreeMap<String, FlowNode>) -> Result<Self, FlowError> {
        validate(&nodes)?;
        let graph = Self { nodes };
        for key in graph.unreachable() {
            warn!(node = key, "flow node is unreachable from the root");
        }
        Ok(graph)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FlowNode> {
        self.nodes.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Keys of nodes no path from the root reaches. Harmless, but usually a typo.
    #[must_use]
    pub fn unreachable(&self) -> Vec<&str> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([ROOT_NODE]);
        while let Some(key) = queue.pop_front() {
            if !seen.insert(key) {
                continue;
            }
            if let Some(node) = self.nodes.get(key) {
                queue.extend(node.options.iter().map(|o| o.next.as_str()));
            }
        }
        self.keys().filter(|k| !seen.contains(k)).collect()
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

fn validate(nodes: &BTreeMap<String, FlowNode>) -> Result<(), FlowError> {
    if !nodes.contains_key(ROOT_NODE) {
        return Err(FlowError::MissingRoot);
    }

    for (key, node) in nodes {
        if node.message.trim().is_empty() {
            return Err(FlowError::EmptyMessage { node: key.clone() });
        }
        if node.end && !node.options.is_empty() {
            return Err(FlowError::TerminalWithOptions { node: key.clone() });
        }
        if !node.end && node.options.is_empty() {
            return Err(FlowError::DeadEnd { node: key.clone() });
        }

        let mut ids = HashSet::new();
        for option in &node.options {
            if option.id.trim().is_empty() {
                return Err(FlowError::EmptyOptionId { node: key.clone() });
            }
            if !ids.insert(option.id.as_str()) {
                return Err(FlowError::DuplicateOptionId { node: key.clone(), option: option.id.clone() });
            }
            if !nodes.contains_key(&option.next) {
                return Err(FlowError::DanglingTarget {
                    node: key.clone(),
                    option: option.id.clone(),
                    target: option.next.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "flow_test.rs"]
mod tests;
