//! Draft and frozen flow graphs

use std::collections::{BTreeMap, HashMap};

use crate::action::{ActionNode, DraftNode, NodeId};
use crate::error::{SemanticWarning, StructuralError};

/// A jump or case target naming a label that was never bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMiss {
    /// Node whose exit refers to the label
    pub node_id: NodeId,
    /// The unknown label
    pub label: String,
}

/// Fall-through tails left open at the end of the flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenScope {
    /// Branch or input node that produced the tails
    pub origin: NodeId,
    /// Nodes with unassigned exits, first occurrence order
    pub tails: Vec<NodeId>,
}

/// Flow as the builder left it, before validation
///
/// Drafts can also be assembled by hand and passed to
/// [`Validator::validate`](crate::validator::Validator::validate).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowDraft {
    /// Document version
    pub version: String,
    /// Id of the first top-level node
    pub start_id: Option<NodeId>,
    /// Nodes in insertion order
    pub nodes: Vec<DraftNode>,
    /// Bound labels
    pub labels: BTreeMap<String, NodeId>,
    /// Label references that did not resolve
    pub unresolved_labels: Vec<LabelMiss>,
    /// Continuations nothing was placed after
    pub open_scopes: Vec<OpenScope>,
    /// Warnings recorded while building
    pub warnings: Vec<SemanticWarning>,
}

impl FlowDraft {
    /// Empty draft for a document version
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }

    /// Freeze into a graph with concrete targets
    ///
    /// Only checks what freezing needs; run the validator first for the full
    /// set of violations.
    pub fn freeze(self) -> Result<FlowGraph, StructuralError> {
        let start_id = self.start_id.ok_or(StructuralError::MissingStart)?;
        let nodes = self
            .nodes
            .into_iter()
            .map(DraftNode::freeze)
            .collect::<Result<Vec<_>, _>>()?;

        let mut index = HashMap::with_capacity(nodes.len());
        for (position, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), position).is_some() {
                return Err(StructuralError::DuplicateId {
                    node_id: node.id.clone(),
                });
            }
        }
        if !index.contains_key(&start_id) {
            return Err(StructuralError::UnknownStart { node_id: start_id });
        }

        Ok(FlowGraph {
            version: self.version,
            start_id,
            nodes,
            index,
            labels: self.labels,
            warnings: self.warnings,
        })
    }
}

/// Validated, immutable flow graph
#[derive(Debug, Clone)]
pub struct FlowGraph {
    version: String,
    start_id: NodeId,
    nodes: Vec<ActionNode>,
    index: HashMap<NodeId, usize>,
    labels: BTreeMap<String, NodeId>,
    pub(crate) warnings: Vec<SemanticWarning>,
}

impl FlowGraph {
    /// Document version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Id of the start action
    pub fn start_id(&self) -> &str {
        &self.start_id
    }

    /// The start action
    pub fn start(&self) -> Option<&ActionNode> {
        self.get(&self.start_id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> &[ActionNode] {
        &self.nodes
    }

    /// Look up a node by id
    pub fn get(&self, id: &str) -> Option<&ActionNode> {
        self.index.get(id).map(|&position| &self.nodes[position])
    }

    /// Node a label is bound to
    pub fn label(&self, name: &str) -> Option<&ActionNode> {
        self.labels.get(name).and_then(|id| self.get(id))
    }

    /// All bound labels
    pub fn labels(&self) -> &BTreeMap<String, NodeId> {
        &self.labels
    }

    /// Warnings that did not block the build
    pub fn warnings(&self) -> &[SemanticWarning] {
        &self.warnings
    }

    /// Number of actions
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no actions
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, Parameters};

    fn draft_node(id: &str, next: Option<&str>) -> DraftNode {
        let mut node = ActionNode::new(id, ActionKind::Prompt, Parameters::new().with("Text", id));
        node.transitions.next = next.map(str::to_string);
        node
    }

    #[test]
    fn test_freeze_indexes_nodes() {
        let mut draft = FlowDraft::new("2019-10-30");
        draft.start_id = Some("a".to_string());
        draft.nodes = vec![draft_node("a", Some("b")), draft_node("b", None)];
        draft.labels.insert("end".to_string(), "b".to_string());

        let graph = draft.freeze().unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.start().map(|n| n.id.as_str()), Some("a"));
        assert_eq!(graph.get("b").map(|n| n.id.as_str()), Some("b"));
        assert_eq!(graph.label("end").map(|n| n.id.as_str()), Some("b"));
        assert!(graph.get("c").is_none());
    }

    #[test]
    fn test_freeze_requires_start() {
        let mut draft = FlowDraft::new("2019-10-30");
        draft.nodes = vec![draft_node("a", None)];
        assert_eq!(draft.freeze().unwrap_err(), StructuralError::MissingStart);
    }

    #[test]
    fn test_freeze_rejects_duplicate_ids() {
        let mut draft = FlowDraft::new("2019-10-30");
        draft.start_id = Some("a".to_string());
        draft.nodes = vec![draft_node("a", None), draft_node("a", None)];
        assert_eq!(
            draft.freeze().unwrap_err(),
            StructuralError::DuplicateId {
                node_id: "a".to_string()
            }
        );
    }
}
