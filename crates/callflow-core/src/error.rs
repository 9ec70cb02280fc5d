//! Error types for callflow-core
//!
//! Three families, matching when each problem can be detected:
//!
//! - [`UsageError`] is returned by the offending builder call itself.
//! - [`StructuralError`] is collected by the validator over the whole draft
//!   and always blocks serialization.
//! - [`SemanticWarning`] is collected alongside and only blocks a build in
//!   strict mode.

use thiserror::Error;

use crate::action::NodeId;
use crate::validator::ValidationReport;

/// Result type alias for callflow-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned by builder calls
pub type UsageResult<T> = std::result::Result<T, UsageError>;

/// Errors raised immediately at a builder call site
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UsageError {
    /// A branch was declared without any case
    #[error("branch on '{attribute}' declares no cases")]
    EmptyBranch {
        /// Attribute reference the branch compares
        attribute: String,
    },

    /// Attribute reference is not of the form `$.Segment.Segment`
    #[error("malformed attribute reference '{reference}'")]
    MalformedAttribute {
        /// The rejected reference
        reference: String,
    },

    /// Value type has no runtime string form
    #[error("unsupported value type: {found}")]
    UnsupportedValue {
        /// Description of the rejected value
        found: String,
    },

    /// NaN or infinite number
    #[error("number {value} has no runtime string form")]
    NonFiniteNumber {
        /// The rejected number
        value: f64,
    },

    /// Label name bound twice in one flow
    #[error("label '{label}' is already bound to node '{node_id}'")]
    DuplicateLabel {
        /// Label name
        label: String,
        /// Node the label is already bound to
        node_id: NodeId,
    },

    /// Empty label name
    #[error("label names must not be empty")]
    EmptyLabel,

    /// Empty explicit node identifier
    #[error("explicit node identifiers must not be empty")]
    EmptyIdentifier,

    /// Keypad input configured with a zero timeout
    #[error("input timeout must be at least one second")]
    ZeroTimeout,
}

/// Fatal violations found by the validator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    /// No node was ever placed at the top level
    #[error("flow has no start action")]
    MissingStart,

    /// Start id names a node that does not exist
    #[error("start action '{node_id}' does not exist")]
    UnknownStart {
        /// The missing start id
        node_id: NodeId,
    },

    /// A node with an empty identifier
    #[error("action at position {position} has an empty identifier")]
    EmptyId {
        /// Zero-based position in insertion order
        position: usize,
    },

    /// Two or more nodes share an identifier
    #[error("identifier '{node_id}' is used by more than one action")]
    DuplicateId {
        /// The shared identifier
        node_id: NodeId,
    },

    /// A transition points at a node that does not exist
    #[error("action '{node_id}' transitions to unknown action '{target}'")]
    DanglingReference {
        /// Node declaring the transition
        node_id: NodeId,
        /// The missing target
        target: NodeId,
    },

    /// More actions than the downstream runtime accepts
    #[error("flow has {count} actions, the limit is {limit}")]
    NodeLimitExceeded {
        /// Number of actions in the flow
        count: usize,
        /// Hard ceiling
        limit: usize,
    },

    /// Jump or case target names a label that was never bound
    #[error("action '{node_id}' refers to unknown label '{label}'")]
    UnresolvedLabel {
        /// Node whose exit refers to the label
        node_id: NodeId,
        /// The unknown label
        label: String,
    },

    /// Branch tails that fall through with no statement after the branch
    #[error("branch '{node_id}' falls through with nothing after it (open exits: {})", .tails.join(", "))]
    UnresolvedContinuation {
        /// Branch or input node that opened the scope
        node_id: NodeId,
        /// Nodes whose exits are still unassigned
        tails: Vec<NodeId>,
    },

    /// A transition target was never assigned
    #[error("action '{node_id}' has an exit with no target")]
    UnwiredTransition {
        /// Node with the unassigned exit
        node_id: NodeId,
    },
}

impl StructuralError {
    /// Node the violation originates from, where one is known
    pub fn node_id(&self) -> Option<&str> {
        match self {
            StructuralError::MissingStart
            | StructuralError::EmptyId { .. }
            | StructuralError::NodeLimitExceeded { .. } => None,
            StructuralError::UnknownStart { node_id }
            | StructuralError::DuplicateId { node_id }
            | StructuralError::DanglingReference { node_id, .. }
            | StructuralError::UnresolvedLabel { node_id, .. }
            | StructuralError::UnresolvedContinuation { node_id, .. }
            | StructuralError::UnwiredTransition { node_id } => Some(node_id),
        }
    }
}

/// Non-fatal findings, promoted to failures in strict mode
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticWarning {
    /// Branch has no `otherwise` fallback
    #[error("branch '{node_id}' has no otherwise case")]
    BranchWithoutOtherwise {
        /// The branch-marker node
        node_id: NodeId,
    },

    /// Sequential input with every fallback trigger disabled
    #[error("input '{node_id}' never falls back to keypad action '{fallback_node_id}'")]
    FallbackDisabled {
        /// The speech node
        node_id: NodeId,
        /// The keypad node nothing leads to
        fallback_node_id: NodeId,
    },

    /// Node cannot be reached from the start action
    #[error("action '{node_id}' is unreachable from the start action")]
    UnreachableNode {
        /// The unreachable node
        node_id: NodeId,
    },
}

impl SemanticWarning {
    /// Node the warning is attached to
    pub fn node_id(&self) -> &str {
        match self {
            SemanticWarning::BranchWithoutOtherwise { node_id }
            | SemanticWarning::FallbackDisabled { node_id, .. }
            | SemanticWarning::UnreachableNode { node_id } => node_id,
        }
    }
}

/// A build that did not produce a graph
#[derive(Error, Debug, Clone, PartialEq)]
#[error(
    "flow failed validation with {} error(s) and {} warning(s){}",
    .report.errors.len(),
    .report.warnings.len(),
    strict_suffix(.strict)
)]
pub struct BuildFailure {
    /// Everything the validator found
    pub report: ValidationReport,
    /// Whether warnings counted as failures
    pub strict: bool,
}

fn strict_suffix(strict: &bool) -> &'static str {
    if *strict { " in strict mode" } else { "" }
}

/// Errors that can occur in callflow-core
#[derive(Error, Debug)]
pub enum Error {
    /// Builder misuse
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// Validation failure
    #[error(transparent)]
    Build(#[from] BuildFailure),

    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Failed to parse YAML configuration
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_error_node_id() {
        let err = StructuralError::DanglingReference {
            node_id: "prompt-1".to_string(),
            target: "ghost".to_string(),
        };
        assert_eq!(err.node_id(), Some("prompt-1"));
        assert_eq!(StructuralError::MissingStart.node_id(), None);
    }

    #[test]
    fn test_unresolved_continuation_display_lists_tails() {
        let err = StructuralError::UnresolvedContinuation {
            node_id: "compare-2".to_string(),
            tails: vec!["prompt-3".to_string(), "compare-2".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("compare-2"));
        assert!(msg.contains("prompt-3, compare-2"));
    }

    #[test]
    fn test_build_failure_display() {
        let failure = BuildFailure {
            report: ValidationReport {
                errors: vec![StructuralError::MissingStart],
                warnings: vec![],
            },
            strict: true,
        };
        assert_eq!(
            failure.to_string(),
            "flow failed validation with 1 error(s) and 0 warning(s) in strict mode"
        );
    }

    #[test]
    fn test_usage_error_converts_into_error() {
        let err: Error = UsageError::EmptyLabel.into();
        assert!(matches!(err, Error::Usage(UsageError::EmptyLabel)));
    }
}
