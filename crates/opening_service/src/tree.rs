//! Immutable prefix tree over canonical opening move sequences.
//!
//! Built once at startup from ordered `OpeningDefinition`s and shared
//! read-only afterwards (`Arc<OpeningTree>`), so lookups need no
//! synchronization. Nodes live in an arena and are addressed by index.

use crate::error::{Error, Result};
use normalizer::OpeningDefinition;
use std::collections::HashMap;
use tracing::info;

/// Node id within the tree arena. The root is always `ROOT`.
pub type NodeId = usize;

/// Id of the root node (empty move sequence).
pub const ROOT: NodeId = 0;

/// Label attached to a node whose path spells out a named opening.
#[derive(Debug, Clone, PartialEq)]
pub struct OpeningLabel {
    /// ECO code.
    pub code: String,
    /// Canonical opening name.
    pub name: String,
    /// Synonyms merged from later identical definitions.
    pub aliases: Vec<String>,
    /// Whether the name denotes a variation of a parent line.
    pub is_variation: bool,
}

#[derive(Debug)]
struct Node {
    children: HashMap<String, NodeId>,
    label: Option<OpeningLabel>,
}

impl Node {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            label: None,
        }
    }
}

/// Reference tree of canonical move sequences.
#[derive(Debug)]
pub struct OpeningTree {
    nodes: Vec<Node>,
    label_count: usize,
}

impl OpeningTree {
    /// Build the tree from ordered definitions.
    ///
    /// The first label loaded for a sequence is canonical. A later
    /// definition with the same code and name merges its aliases into the
    /// existing label; one with a different code or name is a fatal
    /// conflict.
    pub fn build(definitions: impl IntoIterator<Item = OpeningDefinition>) -> Result<Self> {
        let mut tree = Self {
            nodes: vec![Node::new()],
            label_count: 0,
        };

        for def in definitions {
            tree.insert(def)?;
        }

        info!(
            "Opening tree built: {} nodes, {} labeled lines",
            tree.nodes.len(),
            tree.label_count
        );
        Ok(tree)
    }

    fn insert(&mut self, def: OpeningDefinition) -> Result<()> {
        if def.tokens.is_empty() {
            return Err(Error::EmptyDefinition { code: def.code });
        }

        let mut node = ROOT;
        for token in &def.tokens {
            node = match self.nodes[node].children.get(token) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::new());
                    self.nodes[node].children.insert(token.clone(), child);
                    child
                }
            };
        }

        match &mut self.nodes[node].label {
            None => {
                let is_variation = def.name.contains(':');
                self.nodes[node].label = Some(OpeningLabel {
                    code: def.code,
                    name: def.name,
                    aliases: def.aliases,
                    is_variation,
                });
                self.label_count += 1;
                Ok(())
            }
            Some(existing) if existing.code == def.code && existing.name == def.name => {
                // Same label loaded again: aliases merely add synonyms.
                for alias in def.aliases {
                    if !existing.aliases.contains(&alias) {
                        existing.aliases.push(alias);
                    }
                }
                Ok(())
            }
            Some(existing) => Err(Error::DefinitionConflict {
                sequence: def.tokens.join(" "),
                existing: format!("{} {}", existing.code, existing.name),
                incoming: format!("{} {}", def.code, def.name),
            }),
        }
    }

    /// Walk `tokens` from the root, returning the deepest label passed and
    /// the ply at which it was reached. `(None, 0)` when no labeled node
    /// was encountered.
    pub fn lookup_deepest<S: AsRef<str>>(&self, tokens: &[S]) -> (Option<&OpeningLabel>, usize) {
        let mut node = ROOT;
        let mut deepest = None;
        let mut matched_ply = 0;

        for (idx, token) in tokens.iter().enumerate() {
            match self.child(node, token.as_ref()) {
                Some(child) => {
                    node = child;
                    if self.nodes[node].label.is_some() {
                        deepest = self.nodes[node].label.as_ref();
                        matched_ply = idx + 1;
                    }
                }
                None => break,
            }
        }

        (deepest, matched_ply)
    }

    /// Child of `node` along `token`, if the tree knows that continuation.
    pub fn child(&self, node: NodeId, token: &str) -> Option<NodeId> {
        self.nodes[node].children.get(token).copied()
    }

    /// Label at `node`, if any.
    pub fn label(&self, node: NodeId) -> Option<&OpeningLabel> {
        self.nodes[node].label.as_ref()
    }

    /// All labels in the tree, for seeding the aggregate index.
    pub fn labels(&self) -> impl Iterator<Item = &OpeningLabel> {
        self.nodes.iter().filter_map(|n| n.label.as_ref())
    }

    /// Number of distinct labeled lines.
    pub fn label_count(&self) -> usize {
        self.label_count
    }

    /// Number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
