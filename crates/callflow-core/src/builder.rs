//! Linear flow builder
//!
//! [`FlowBuilder`] is the single construction API every front-end targets.
//! Each call places nodes in insertion order and wires them from whatever
//! exits the current block left open:
//!
//! - after a linear node, its `next`
//! - after a branch or input, every fall-through tail of its cases
//! - after a terminal action or a jump, nothing
//!
//! Ids are derived from a counter shared by the whole flow, so the same
//! sequence of calls always yields the same graph.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut flow = FlowBuilder::new();
//! flow.prompt("Hi")?;
//! flow.branch(
//!     Branch::on("$.Attributes.choice")
//!         .when("1", |b| b.transfer("Sales").map(drop))
//!         .otherwise(|_| Ok(())),
//! )?;
//! flow.disconnect()?;
//! let graph = flow.build()?;
//! ```

use std::collections::BTreeMap;

use crate::action::{Action, ActionKind, ActionNode, DraftNode, NodeId, Parameters};
use crate::config::CompileOptions;
use crate::error::{BuildFailure, SemanticWarning, UsageError, UsageResult};
use crate::graph::{FlowDraft, FlowGraph, LabelMiss, OpenScope};
use crate::scope::{LabelRef, ScopeStack, Slot, Tail};
use crate::validator::{ValidationReport, Validator};
use crate::value::Scalar;

/// Reference to a placed node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandle {
    index: usize,
    id: NodeId,
}

impl NodeHandle {
    /// Id of the node
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Position of the node in insertion order
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Builder for one flow
#[derive(Debug)]
pub struct FlowBuilder {
    options: CompileOptions,
    nodes: Vec<DraftNode>,
    counter: usize,
    start: Option<usize>,
    labels: BTreeMap<String, NodeId>,
    label_refs: Vec<LabelRef>,
    pub(crate) scopes: ScopeStack,
    pub(crate) warnings: Vec<SemanticWarning>,
}

impl Default for FlowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowBuilder {
    /// Builder with default options
    pub fn new() -> Self {
        Self::with_options(CompileOptions::default())
    }

    /// Builder with explicit options
    pub fn with_options(options: CompileOptions) -> Self {
        Self {
            options,
            nodes: Vec::new(),
            counter: 0,
            start: None,
            labels: BTreeMap::new(),
            label_refs: Vec::new(),
            scopes: ScopeStack::new(),
            warnings: Vec::new(),
        }
    }

    /// Options this builder was created with
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Number of nodes placed so far
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes placed so far, in insertion order
    pub fn nodes(&self) -> &[DraftNode] {
        &self.nodes
    }

    /// Append a node and wire it from the open exits
    pub fn append(&mut self, kind: ActionKind, parameters: Parameters) -> UsageResult<NodeHandle> {
        self.append_with(None, kind, parameters)
    }

    /// Append a node with an explicit id
    pub fn append_as(
        &mut self,
        id: impl Into<NodeId>,
        kind: ActionKind,
        parameters: Parameters,
    ) -> UsageResult<NodeHandle> {
        self.append_with(Some(id.into()), kind, parameters)
    }

    /// Append a node and bind a label to it
    pub fn append_labeled(
        &mut self,
        kind: ActionKind,
        parameters: Parameters,
        label: impl Into<String>,
    ) -> UsageResult<NodeHandle> {
        let label = label.into();
        self.check_unbound(&label)?;
        let handle = self.append(kind, parameters)?;
        self.bind_label(label, &handle)?;
        Ok(handle)
    }

    /// Append a typed action
    pub fn action(&mut self, action: Action) -> UsageResult<NodeHandle> {
        let (kind, parameters) = action.into_parts();
        self.append(kind, parameters)
    }

    /// Append a typed action with an explicit id
    pub fn action_as(&mut self, id: impl Into<NodeId>, action: Action) -> UsageResult<NodeHandle> {
        let (kind, parameters) = action.into_parts();
        self.append_as(id, kind, parameters)
    }

    /// Bind a label to a placed node
    ///
    /// Labels can be referenced before they are bound; references resolve
    /// when the flow is finished.
    pub fn bind_label(&mut self, label: impl Into<String>, handle: &NodeHandle) -> UsageResult<()> {
        let label = label.into();
        self.check_unbound(&label)?;
        tracing::debug!("Bound label '{}' to {}", label, handle.id);
        self.labels.insert(label, handle.id.clone());
        Ok(())
    }

    /// Continue at a label and end the current block
    pub fn jump_to(&mut self, label: impl Into<String>) -> UsageResult<()> {
        let label = label.into();
        check_label(&label)?;
        let frame = self.scopes.current_mut();
        let tails = frame.take();
        frame.terminate();
        tracing::debug!("Jump to '{}' from {} open exit(s)", label, tails.len());
        self.refer_to_label(tails, label)
    }

    /// Play a message
    pub fn prompt(&mut self, text: impl Into<String>) -> UsageResult<NodeHandle> {
        self.action(Action::Prompt { text: text.into() })
    }

    /// Set contact attributes
    pub fn set_attributes<I, K, V>(&mut self, attributes: I) -> UsageResult<NodeHandle>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Scalar>,
    {
        self.action(Action::SetAttributes(
            attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// Set the queue a later transfer goes to
    pub fn set_queue(&mut self, queue: impl Into<String>) -> UsageResult<NodeHandle> {
        self.action(Action::SetQueue {
            queue: queue.into(),
        })
    }

    /// Invoke an external function
    pub fn invoke(
        &mut self,
        function_arn: impl Into<String>,
        timeout_seconds: Option<u32>,
    ) -> UsageResult<NodeHandle> {
        self.action(Action::Invoke {
            function_arn: function_arn.into(),
            timeout_seconds,
        })
    }

    /// Transfer to a queue and end the block
    pub fn transfer(&mut self, queue: impl Into<String>) -> UsageResult<NodeHandle> {
        self.action(Action::Transfer {
            queue: queue.into(),
        })
    }

    /// End the contact and the block
    pub fn disconnect(&mut self) -> UsageResult<NodeHandle> {
        self.action(Action::Disconnect)
    }

    /// Finish the flow without validating it
    pub fn into_draft(self) -> FlowDraft {
        let mut nodes = self.nodes;
        let mut unresolved_labels = Vec::new();
        for LabelRef { tail, label } in self.label_refs {
            match self.labels.get(&label) {
                Some(target) => assign(&mut nodes, tail, Some(target.clone())),
                None => {
                    if let Some(node) = nodes.get(tail.node) {
                        unresolved_labels.push(LabelMiss {
                            node_id: node.id.clone(),
                            label,
                        });
                    }
                }
            }
        }

        let root = self.scopes.into_root();
        let mut open_scopes = Vec::new();
        if let (Some(origin), false) = (root.origin(), root.pending().is_empty()) {
            let mut tails: Vec<NodeId> = Vec::new();
            for tail in root.pending() {
                if let Some(node) = nodes.get(tail.node)
                    && !tails.contains(&node.id)
                {
                    tails.push(node.id.clone());
                }
            }
            if let Some(node) = nodes.get(origin) {
                open_scopes.push(OpenScope {
                    origin: node.id.clone(),
                    tails,
                });
            }
        }

        FlowDraft {
            version: self.options.version,
            start_id: self
                .start
                .and_then(|index| nodes.get(index))
                .map(|node| node.id.clone()),
            nodes,
            labels: self.labels,
            unresolved_labels,
            open_scopes,
            warnings: self.warnings,
        }
    }

    /// Validate and freeze the flow
    pub fn build(self) -> Result<FlowGraph, BuildFailure> {
        let strict = self.options.strict;
        let draft = self.into_draft();
        let report = Validator::validate(&draft);

        for warning in &report.warnings {
            tracing::warn!("{}", warning);
        }
        if report.fails(strict) {
            return Err(BuildFailure { report, strict });
        }

        let mut graph = draft.freeze().map_err(|error| BuildFailure {
            report: ValidationReport {
                errors: vec![error],
                warnings: report.warnings.clone(),
            },
            strict,
        })?;
        graph.warnings = report.warnings;

        tracing::info!(
            "Built flow with {} action(s) and {} warning(s)",
            graph.len(),
            graph.warnings().len()
        );
        Ok(graph)
    }

    fn append_with(
        &mut self,
        id: Option<NodeId>,
        kind: ActionKind,
        parameters: Parameters,
    ) -> UsageResult<NodeHandle> {
        parameters.check()?;
        let id = self.allocate_id(&kind, id)?;
        let terminal = kind.is_terminal();
        let handle = self.place(id, kind, parameters);

        let frame = self.scopes.current_mut();
        if terminal {
            frame.terminate();
        } else {
            frame.advance(Tail::next(handle.index));
        }
        Ok(handle)
    }

    /// Next id, explicit or derived from the counter
    pub(crate) fn allocate_id(
        &mut self,
        kind: &ActionKind,
        explicit: Option<NodeId>,
    ) -> UsageResult<NodeId> {
        if explicit.as_ref().is_some_and(|id| id.is_empty()) {
            return Err(UsageError::EmptyIdentifier);
        }
        self.counter += 1;
        Ok(explicit.unwrap_or_else(|| format!("{}-{}", kind.slug(), self.counter)))
    }

    /// Run a multi-node placement, undoing all of it if it fails
    ///
    /// A failed call leaves the builder exactly as it was before the call.
    pub(crate) fn atomically<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> UsageResult<T>,
    ) -> UsageResult<T> {
        let checkpoint = self.checkpoint();
        let result = op(self);
        if result.is_err() {
            self.rollback(checkpoint);
        }
        result
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            node_count: self.nodes.len(),
            counter: self.counter,
            start: self.start,
            labels: self.labels.clone(),
            label_refs: self.label_refs.len(),
            warnings: self.warnings.len(),
            scopes: self.scopes.clone(),
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        tracing::debug!(
            "Rolling back {} node(s)",
            self.nodes.len().saturating_sub(checkpoint.node_count)
        );
        self.nodes.truncate(checkpoint.node_count);
        // exits taken by the first placed node point past the truncation
        for tail in checkpoint.scopes.current().pending() {
            assign(&mut self.nodes, *tail, None);
        }
        self.counter = checkpoint.counter;
        self.start = checkpoint.start;
        self.labels = checkpoint.labels;
        self.label_refs.truncate(checkpoint.label_refs);
        self.warnings.truncate(checkpoint.warnings);
        self.scopes = checkpoint.scopes;
    }

    /// Place a node in the current block, consuming its open exits
    ///
    /// Leaves the block with no open exits; the caller records what the new
    /// node leaves behind.
    pub(crate) fn place(&mut self, id: NodeId, kind: ActionKind, parameters: Parameters) -> NodeHandle {
        let tails = self.scopes.current_mut().take();
        let handle = self.push_detached(id, kind, parameters);
        if !tails.is_empty() {
            tracing::debug!("Joined {} open exit(s) to {}", tails.len(), handle.id);
        }
        for tail in tails {
            assign(&mut self.nodes, tail, Some(handle.id.clone()));
        }
        if self.scopes.is_root() && self.start.is_none() {
            self.start = Some(handle.index);
        }
        handle
    }

    /// Place a node without wiring anything to it
    pub(crate) fn push_detached(
        &mut self,
        id: NodeId,
        kind: ActionKind,
        parameters: Parameters,
    ) -> NodeHandle {
        tracing::debug!("Placed {} ({})", id, kind.type_name());
        let index = self.nodes.len();
        self.nodes.push(ActionNode::new(id.clone(), kind, parameters));
        NodeHandle { index, id }
    }

    pub(crate) fn node_mut(&mut self, handle: &NodeHandle) -> Option<&mut DraftNode> {
        self.nodes.get_mut(handle.index)
    }

    /// Route exits to a label once the flow is finished
    pub(crate) fn refer_to_label(&mut self, tails: Vec<Tail>, label: String) -> UsageResult<()> {
        check_label(&label)?;
        self.label_refs.extend(tails.into_iter().map(|tail| LabelRef {
            tail,
            label: label.clone(),
        }));
        Ok(())
    }

    fn check_unbound(&self, label: &str) -> UsageResult<()> {
        check_label(label)?;
        match self.labels.get(label) {
            Some(existing) => Err(UsageError::DuplicateLabel {
                label: label.to_string(),
                node_id: existing.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Builder state a failed placement is rolled back to
#[derive(Debug)]
struct Checkpoint {
    node_count: usize,
    counter: usize,
    start: Option<usize>,
    labels: BTreeMap<String, NodeId>,
    label_refs: usize,
    warnings: usize,
    scopes: ScopeStack,
}

fn check_label(label: &str) -> UsageResult<()> {
    if label.is_empty() {
        Err(UsageError::EmptyLabel)
    } else {
        Ok(())
    }
}

fn assign(nodes: &mut [DraftNode], tail: Tail, target: Option<NodeId>) {
    let Some(node) = nodes.get_mut(tail.node) else {
        return;
    };
    match tail.slot {
        Slot::Next => node.transitions.next = target,
        Slot::Condition(i) => {
            if let Some(edge) = node.transitions.conditions.get_mut(i) {
                edge.target = target;
            }
        }
        Slot::Error(i) => {
            if let Some(edge) = node.transitions.errors.get_mut(i) {
                edge.target = target;
            }
        }
    }
}
