//! Flow document serialization
//!
//! The document lists actions in insertion order, never in traversal order,
//! and every value is already a string. Rendering the same graph twice
//! always yields the same bytes.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::action::{ActionNode, Parameters};
use crate::error::Result;
use crate::graph::FlowGraph;

/// Top-level flow document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlowDocument {
    /// Document version
    pub version: String,
    /// Id of the first action
    pub start_action: String,
    /// Actions in insertion order
    pub actions: Vec<ActionDocument>,
}

/// One action
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionDocument {
    /// Action id
    pub identifier: String,
    /// Runtime type name
    #[serde(rename = "Type")]
    pub action_type: String,
    /// String-valued parameters
    pub parameters: Parameters,
    /// Outgoing edges
    pub transitions: TransitionsDocument,
}

/// Outgoing edges of an action
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransitionsDocument {
    /// Unconditional successor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    /// Conditional edges
    pub conditions: Vec<ConditionDocument>,
    /// Error edges
    pub errors: Vec<ErrorDocument>,
}

/// A conditional edge
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConditionDocument {
    /// Target
    pub next_action: String,
    /// Predicate
    pub condition: PredicateDocument,
}

/// Predicate of a conditional edge
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PredicateDocument {
    /// Operator name
    pub operator: String,
    /// Operands
    pub operands: Vec<String>,
}

/// An error edge
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorDocument {
    /// Target
    pub next_action: String,
    /// Error outcome
    pub error_type: String,
}

impl From<&ActionNode> for ActionDocument {
    fn from(node: &ActionNode) -> Self {
        let transitions = &node.transitions;
        Self {
            identifier: node.id.clone(),
            action_type: node.kind.type_name().to_string(),
            parameters: node.parameters.clone(),
            transitions: TransitionsDocument {
                next_action: transitions.next.clone(),
                conditions: transitions
                    .conditions
                    .iter()
                    .map(|edge| ConditionDocument {
                        next_action: edge.target.clone(),
                        condition: PredicateDocument {
                            operator: edge.condition.operator.as_str().to_string(),
                            operands: edge.condition.operands.clone(),
                        },
                    })
                    .collect(),
                errors: transitions
                    .errors
                    .iter()
                    .map(|edge| ErrorDocument {
                        next_action: edge.target.clone(),
                        error_type: edge.error.as_str().to_string(),
                    })
                    .collect(),
            },
        }
    }
}

impl FlowDocument {
    /// Document for a built graph
    pub fn from_graph(graph: &FlowGraph) -> Self {
        Self {
            version: graph.version().to_string(),
            start_action: graph.start_id().to_string(),
            actions: graph.nodes().iter().map(ActionDocument::from).collect(),
        }
    }

    /// Compact JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Indented JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// SHA-256 of the indented JSON, for change detection
    pub fn content_hash(&self) -> Result<String> {
        Ok(digest(&self.to_json_pretty()?))
    }
}

/// Hex-encoded SHA-256 of a string
pub fn digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::Branch;
    use crate::builder::FlowBuilder;

    fn sample() -> FlowGraph {
        let mut flow = FlowBuilder::new();
        flow.prompt("Hi").unwrap();
        flow.branch(
            Branch::on("$.Attributes.choice")
                .when("1", |b| b.transfer("Sales").map(drop))
                .otherwise(|_| Ok(())),
        )
        .unwrap();
        flow.disconnect().unwrap();
        flow.build().unwrap()
    }

    #[test]
    fn test_document_shape() {
        let json = FlowDocument::from_graph(&sample()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["Version"], "2019-10-30");
        assert_eq!(value["StartAction"], "prompt-1");
        let actions = value["Actions"].as_array().unwrap();
        assert_eq!(actions.len(), 4);
        assert_eq!(actions[0]["Type"], "MessageParticipant");
        assert_eq!(actions[0]["Parameters"]["Text"], "Hi");
        assert_eq!(actions[0]["Transitions"]["NextAction"], "compare-2");
        assert_eq!(actions[1]["Transitions"]["Conditions"][0]["Condition"]["Operator"], "Equals");
        assert_eq!(actions[1]["Transitions"]["Conditions"][0]["Condition"]["Operands"][0], "1");
        assert_eq!(actions[1]["Transitions"]["Errors"][0]["ErrorType"], "NoMatchingCondition");
        assert_eq!(actions[1]["Transitions"]["Errors"][0]["NextAction"], "disconnect-4");
    }

    #[test]
    fn test_absent_next_is_omitted() {
        let json = FlowDocument::from_graph(&sample()).to_json().unwrap();
        assert!(json.contains(
            r#"{"Identifier":"disconnect-4","Type":"DisconnectParticipant","Parameters":{},"Transitions":{"Conditions":[],"Errors":[]}}"#
        ));
    }

    #[test]
    fn test_rendering_is_stable() {
        let first = FlowDocument::from_graph(&sample());
        let second = FlowDocument::from_graph(&sample());
        assert_eq!(first.to_json_pretty().unwrap(), second.to_json_pretty().unwrap());
        assert_eq!(first.content_hash().unwrap(), second.content_hash().unwrap());
        assert_eq!(first.content_hash().unwrap().len(), 64);
    }

    #[test]
    fn test_digest_known_value() {
        assert_eq!(
            digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
