//! Action-node model
//!
//! An action node is one step of a compiled flow: a [`ActionKind`], an
//! ordered parameter map and its outgoing [`Transitions`]. Nodes are generic
//! over the type of their conditional/error targets so that the same shape
//! serves both the builder's draft (`Option<NodeId>`, unknown until
//! backfilled) and the frozen graph (`NodeId`).

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{StructuralError, UsageResult};
use crate::value::Scalar;

/// Identifier of an action node
pub type NodeId = String;

/// Node whose exits may still be unassigned
pub type DraftNode = ActionNode<Option<NodeId>>;

/// Kind of action, read exhaustively by the serializer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Play a message
    Prompt,
    /// Keypad (DTMF) input
    Input,
    /// Speech / intent recognition
    Intent,
    /// Branch marker comparing an attribute
    Branch,
    /// Invoke an external function
    Invoke,
    /// Transfer to a queue (terminal)
    Transfer,
    /// Set contact attributes
    SetAttributes,
    /// Set the target queue
    SetQueue,
    /// End the contact (terminal)
    Disconnect,
    /// Any other runtime action type
    Custom(String),
}

impl ActionKind {
    /// The runtime's `Type` string
    pub fn type_name(&self) -> &str {
        match self {
            ActionKind::Prompt => "MessageParticipant",
            ActionKind::Input => "GetParticipantInput",
            ActionKind::Intent => "ConnectParticipantWithLexBot",
            ActionKind::Branch => "Compare",
            ActionKind::Invoke => "InvokeLambdaFunction",
            ActionKind::Transfer => "TransferContactToQueue",
            ActionKind::SetAttributes => "UpdateContactAttributes",
            ActionKind::SetQueue => "UpdateContactTargetQueue",
            ActionKind::Disconnect => "DisconnectParticipant",
            ActionKind::Custom(name) => name,
        }
    }

    /// Short prefix for generated identifiers
    pub fn slug(&self) -> &'static str {
        match self {
            ActionKind::Prompt => "prompt",
            ActionKind::Input => "input",
            ActionKind::Intent => "intent",
            ActionKind::Branch => "compare",
            ActionKind::Invoke => "invoke",
            ActionKind::Transfer => "transfer",
            ActionKind::SetAttributes => "set-attributes",
            ActionKind::SetQueue => "set-queue",
            ActionKind::Disconnect => "disconnect",
            ActionKind::Custom(_) => "action",
        }
    }

    /// Terminal actions never continue to a next action
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionKind::Transfer | ActionKind::Disconnect)
    }
}

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equal
    Equals,
    /// Not equal
    NotEquals,
    /// Greater than
    GreaterThan,
    /// Less than
    LessThan,
    /// Greater than or equal
    GreaterThanOrEquals,
    /// Less than or equal
    LessThanOrEquals,
    /// Contains
    Contains,
    /// Starts with
    StartsWith,
    /// Ends with
    EndsWith,
}

impl Operator {
    /// Runtime name of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "Equals",
            Operator::NotEquals => "NotEquals",
            Operator::GreaterThan => "GreaterThan",
            Operator::LessThan => "LessThan",
            Operator::GreaterThanOrEquals => "GreaterThanOrEquals",
            Operator::LessThanOrEquals => "LessThanOrEquals",
            Operator::Contains => "Contains",
            Operator::StartsWith => "StartsWith",
            Operator::EndsWith => "EndsWith",
        }
    }

    /// Parse `GreaterThan`, `greater_than` or `greaterthan`
    pub fn parse(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "equals" => Some(Operator::Equals),
            "notequals" => Some(Operator::NotEquals),
            "greaterthan" => Some(Operator::GreaterThan),
            "lessthan" => Some(Operator::LessThan),
            "greaterthanorequals" => Some(Operator::GreaterThanOrEquals),
            "lessthanorequals" => Some(Operator::LessThanOrEquals),
            "contains" => Some(Operator::Contains),
            "startswith" => Some(Operator::StartsWith),
            "endswith" => Some(Operator::EndsWith),
            _ => None,
        }
    }
}

/// Error outcome an error edge is taken on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No condition matched
    NoMatchingCondition,
    /// Generic failure
    NoMatchingError,
    /// Caller did not answer in time
    InputTimeLimitExceeded,
    /// Input was rejected
    InvalidInput,
    /// Recognition confidence below threshold
    LowConfidence,
    /// Retry budget exhausted
    MaxRetriesExceeded,
    /// Any other runtime error type
    Other(String),
}

impl ErrorKind {
    /// Runtime `ErrorType` string
    pub fn as_str(&self) -> &str {
        match self {
            ErrorKind::NoMatchingCondition => "NoMatchingCondition",
            ErrorKind::NoMatchingError => "NoMatchingError",
            ErrorKind::InputTimeLimitExceeded => "InputTimeLimitExceeded",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::LowConfidence => "LowConfidence",
            ErrorKind::MaxRetriesExceeded => "MaxRetriesExceeded",
            ErrorKind::Other(name) => name,
        }
    }
}

/// Predicate of a conditional transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// Comparison operator
    pub operator: Operator,
    /// Operands in runtime string form
    pub operands: Vec<String>,
}

impl Condition {
    /// Single-operand condition
    pub fn new(operator: Operator, value: &Scalar) -> Self {
        Self {
            operator,
            operands: vec![value.to_runtime_string()],
        }
    }
}

/// Ordered string-keyed parameter map
///
/// Insertion order is kept so the serialized document is stable.
/// Re-inserting a key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    entries: Vec<(String, Scalar)>,
}

impl Parameters {
    /// Empty parameter map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, builder style
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a parameter
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Look up a parameter
    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Runtime string form of a parameter
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).map(Scalar::to_runtime_string)
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no parameters
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn check(&self) -> UsageResult<()> {
        self.entries.iter().try_for_each(|(_, v)| v.check())
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<Scalar>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

impl Serialize for Parameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, &value.to_runtime_string())?;
        }
        map.end()
    }
}

/// Conditional edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionEdge<T = NodeId> {
    /// Predicate
    pub condition: Condition,
    /// Target taken when the predicate holds
    pub target: T,
}

/// Error edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEdge<T = NodeId> {
    /// Outcome the edge is taken on
    pub error: ErrorKind,
    /// Target taken on that outcome
    pub target: T,
}

/// Outgoing edges of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transitions<T = NodeId> {
    /// Unconditional successor
    pub next: Option<NodeId>,
    /// Conditions, tried in order
    pub conditions: Vec<ConditionEdge<T>>,
    /// Error edges, in declaration order
    pub errors: Vec<ErrorEdge<T>>,
}

impl<T> Default for Transitions<T> {
    fn default() -> Self {
        Self {
            next: None,
            conditions: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// One step of a flow
#[derive(Debug, Clone, PartialEq)]
pub struct ActionNode<T = NodeId> {
    /// Stable identifier
    pub id: NodeId,
    /// Action kind
    pub kind: ActionKind,
    /// Parameters
    pub parameters: Parameters,
    /// Outgoing edges
    pub transitions: Transitions<T>,
}

impl<T> ActionNode<T> {
    /// Node with no edges
    pub fn new(id: impl Into<NodeId>, kind: ActionKind, parameters: Parameters) -> Self {
        Self {
            id: id.into(),
            kind,
            parameters,
            transitions: Transitions::default(),
        }
    }
}

impl ActionNode {
    /// Every target this node can transition to, in document order
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.transitions
            .next
            .iter()
            .map(String::as_str)
            .chain(self.transitions.conditions.iter().map(|e| e.target.as_str()))
            .chain(self.transitions.errors.iter().map(|e| e.target.as_str()))
    }
}

impl DraftNode {
    /// Targets that have been assigned so far
    pub fn assigned_targets(&self) -> impl Iterator<Item = &str> {
        self.transitions
            .next
            .iter()
            .map(String::as_str)
            .chain(
                self.transitions
                    .conditions
                    .iter()
                    .filter_map(|e| e.target.as_deref()),
            )
            .chain(
                self.transitions
                    .errors
                    .iter()
                    .filter_map(|e| e.target.as_deref()),
            )
    }

    /// Convert into a frozen node, failing if any exit is unassigned
    pub fn freeze(self) -> Result<ActionNode, StructuralError> {
        let unwired = || StructuralError::UnwiredTransition {
            node_id: self.id.clone(),
        };
        let conditions = self
            .transitions
            .conditions
            .iter()
            .map(|edge| {
                edge.target.clone().map(|target| ConditionEdge {
                    condition: edge.condition.clone(),
                    target,
                })
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(unwired)?;
        let errors = self
            .transitions
            .errors
            .iter()
            .map(|edge| {
                edge.target.clone().map(|target| ErrorEdge {
                    error: edge.error.clone(),
                    target,
                })
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(unwired)?;

        Ok(ActionNode {
            id: self.id,
            kind: self.kind,
            parameters: self.parameters,
            transitions: Transitions {
                next: self.transitions.next,
                conditions,
                errors,
            },
        })
    }
}

/// Typed action record, lowered to a kind and parameters
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Play a message
    Prompt {
        /// Message text
        text: String,
    },
    /// Set contact attributes
    SetAttributes(Vec<(String, Scalar)>),
    /// Set the target queue
    SetQueue {
        /// Queue reference
        queue: String,
    },
    /// Invoke an external function
    Invoke {
        /// Function ARN
        function_arn: String,
        /// Invocation time limit
        timeout_seconds: Option<u32>,
    },
    /// Transfer to a queue
    Transfer {
        /// Queue reference
        queue: String,
    },
    /// End the contact
    Disconnect,
    /// Any other runtime action
    Custom {
        /// Runtime type name
        type_name: String,
        /// Parameters as given
        parameters: Parameters,
    },
}

impl Action {
    /// Kind and parameter map for this action
    pub fn into_parts(self) -> (ActionKind, Parameters) {
        match self {
            Action::Prompt { text } => (ActionKind::Prompt, Parameters::new().with("Text", text)),
            Action::SetAttributes(attributes) => {
                let mut params: Parameters = attributes
                    .into_iter()
                    .map(|(key, value)| (format!("Attributes.{key}"), value))
                    .collect();
                params.insert("TargetContact", "Current");
                (ActionKind::SetAttributes, params)
            }
            Action::SetQueue { queue } => {
                (ActionKind::SetQueue, Parameters::new().with("QueueId", queue))
            }
            Action::Invoke {
                function_arn,
                timeout_seconds,
            } => {
                let mut params = Parameters::new().with("LambdaFunctionARN", function_arn);
                if let Some(timeout) = timeout_seconds {
                    params.insert("InvocationTimeLimitSeconds", timeout);
                }
                (ActionKind::Invoke, params)
            }
            Action::Transfer { queue } => {
                (ActionKind::Transfer, Parameters::new().with("QueueId", queue))
            }
            Action::Disconnect => (ActionKind::Disconnect, Parameters::new()),
            Action::Custom {
                type_name,
                parameters,
            } => (ActionKind::Custom(type_name), parameters),
        }
    }
}
