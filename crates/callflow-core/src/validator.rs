//! Structural validation of a flow draft
//!
//! The validator runs once over a finished [`FlowDraft`] and collects every
//! violation it finds instead of stopping at the first one. Errors always
//! block freezing; warnings only do so in strict mode.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{SemanticWarning, StructuralError};
use crate::graph::FlowDraft;

/// Maximum number of actions the runtime accepts in one flow
pub const MAX_ACTIONS: usize = 250;

/// What happens to branch tails nothing was placed after
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DanglingTailPolicy {
    /// Report one `UnresolvedContinuation` error per open scope
    Reject,
}

/// Policy applied by [`Validator::validate`]
pub const DANGLING_TAIL_POLICY: DanglingTailPolicy = DanglingTailPolicy::Reject;

/// Everything the validator found
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Fatal violations
    pub errors: Vec<StructuralError>,
    /// Non-fatal findings
    pub warnings: Vec<SemanticWarning>,
}

impl ValidationReport {
    /// No errors and no warnings
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Whether any fatal violation was found
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether any warning was found
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Whether a build with this report must fail
    pub fn fails(&self, strict: bool) -> bool {
        self.has_errors() || (strict && self.has_warnings())
    }
}

/// Structural validator
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    /// Validate a draft
    pub fn validate(draft: &FlowDraft) -> ValidationReport {
        let mut report = ValidationReport::default();

        let mut index: HashMap<&str, usize> = HashMap::with_capacity(draft.nodes.len());
        let mut duplicates = HashSet::new();
        for (position, node) in draft.nodes.iter().enumerate() {
            if node.id.is_empty() {
                report.errors.push(StructuralError::EmptyId { position });
                continue;
            }
            if index.insert(node.id.as_str(), position).is_some()
                && duplicates.insert(node.id.as_str())
            {
                report.errors.push(StructuralError::DuplicateId {
                    node_id: node.id.clone(),
                });
            }
        }

        match &draft.start_id {
            None => report.errors.push(StructuralError::MissingStart),
            Some(start) if !index.contains_key(start.as_str()) => {
                report.errors.push(StructuralError::UnknownStart {
                    node_id: start.clone(),
                });
            }
            Some(_) => {}
        }

        for node in &draft.nodes {
            for target in node.assigned_targets() {
                if !index.contains_key(target) {
                    report.errors.push(StructuralError::DanglingReference {
                        node_id: node.id.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }

        if draft.nodes.len() > MAX_ACTIONS {
            report.errors.push(StructuralError::NodeLimitExceeded {
                count: draft.nodes.len(),
                limit: MAX_ACTIONS,
            });
        }

        for miss in &draft.unresolved_labels {
            report.errors.push(StructuralError::UnresolvedLabel {
                node_id: miss.node_id.clone(),
                label: miss.label.clone(),
            });
        }

        match DANGLING_TAIL_POLICY {
            DanglingTailPolicy::Reject => {
                for scope in &draft.open_scopes {
                    report.errors.push(StructuralError::UnresolvedContinuation {
                        node_id: scope.origin.clone(),
                        tails: scope.tails.clone(),
                    });
                }
            }
        }

        // Unassigned exits not already explained by a label miss or open scope
        let explained: HashSet<&str> = draft
            .unresolved_labels
            .iter()
            .map(|miss| miss.node_id.as_str())
            .chain(
                draft
                    .open_scopes
                    .iter()
                    .flat_map(|scope| scope.tails.iter().map(String::as_str)),
            )
            .collect();
        for node in &draft.nodes {
            let unwired = node.transitions.conditions.iter().any(|e| e.target.is_none())
                || node.transitions.errors.iter().any(|e| e.target.is_none());
            if unwired && !explained.contains(node.id.as_str()) {
                report.errors.push(StructuralError::UnwiredTransition {
                    node_id: node.id.clone(),
                });
            }
        }

        report.warnings.extend(draft.warnings.iter().cloned());
        if let Some(start) = draft.start_id.as_deref().filter(|s| index.contains_key(s)) {
            Self::check_reachability(draft, &index, start, &mut report);
        }

        tracing::debug!(
            "Validated {} action(s): {} error(s), {} warning(s)",
            draft.nodes.len(),
            report.errors.len(),
            report.warnings.len()
        );
        report
    }

    fn check_reachability(
        draft: &FlowDraft,
        index: &HashMap<&str, usize>,
        start: &str,
        report: &mut ValidationReport,
    ) {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::from([start]);
        visited.insert(start);

        while let Some(id) = queue.pop_front() {
            let Some(&position) = index.get(id) else {
                continue;
            };
            for target in draft.nodes[position].assigned_targets() {
                if index.contains_key(target) && visited.insert(target) {
                    queue.push_back(target);
                }
            }
        }

        // A disabled fallback is harmless once a jump reaches the keypad node
        report.warnings.retain(|w| match w {
            SemanticWarning::FallbackDisabled {
                fallback_node_id, ..
            } => !visited.contains(fallback_node_id.as_str()),
            _ => true,
        });

        // Keypad nodes behind a disabled fallback are already reported
        let flagged: HashSet<&str> = report
            .warnings
            .iter()
            .filter_map(|w| match w {
                SemanticWarning::FallbackDisabled {
                    fallback_node_id, ..
                } => Some(fallback_node_id.as_str()),
                _ => None,
            })
            .collect();

        let mut reported = HashSet::new();
        let unreachable: Vec<_> = draft
            .nodes
            .iter()
            .map(|node| node.id.as_str())
            .filter(|id| !id.is_empty() && !visited.contains(id) && !flagged.contains(id))
            .filter(|id| reported.insert(*id))
            .map(|id| SemanticWarning::UnreachableNode {
                node_id: id.to_string(),
            })
            .collect();
        report.warnings.extend(unreachable);
    }
}
