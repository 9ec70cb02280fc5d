//! Branch resolver
//!
//! A branch places one `Compare` marker node and runs each case body in its
//! own scope frame. Tails that fall out of a body are joined into the
//! enclosing block and wired to whatever statement follows the branch.

use crate::action::{
    ActionKind, Condition, ConditionEdge, ErrorEdge, ErrorKind, NodeId, Operator, Parameters,
};
use crate::builder::{FlowBuilder, NodeHandle};
use crate::error::{SemanticWarning, UsageError, UsageResult};
use crate::scope::Tail;
use crate::value::Scalar;

/// Case body run against the enclosing builder
pub type Body<'f> = Box<dyn FnOnce(&mut FlowBuilder) -> UsageResult<()> + 'f>;

/// Where a case continues
pub enum CaseTarget<'f> {
    /// Inline steps
    Steps(Body<'f>),
    /// A label bound anywhere in the flow
    Goto(String),
}

impl<'f> CaseTarget<'f> {
    /// Inline steps
    pub fn steps(body: impl FnOnce(&mut FlowBuilder) -> UsageResult<()> + 'f) -> Self {
        CaseTarget::Steps(Box::new(body))
    }

    /// Jump to a label
    pub fn goto(label: impl Into<String>) -> Self {
        CaseTarget::Goto(label.into())
    }
}

impl std::fmt::Debug for CaseTarget<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaseTarget::Steps(_) => f.write_str("Steps(..)"),
            CaseTarget::Goto(label) => f.debug_tuple("Goto").field(label).finish(),
        }
    }
}

/// One case of a branch
#[derive(Debug)]
pub struct Case<'f> {
    /// Comparison operator
    pub operator: Operator,
    /// Value compared against the attribute
    pub value: Scalar,
    /// Where the case continues
    pub target: CaseTarget<'f>,
}

/// Branch on a contact attribute
#[derive(Debug)]
pub struct Branch<'f> {
    attribute: String,
    id: Option<NodeId>,
    cases: Vec<Case<'f>>,
    otherwise: Option<CaseTarget<'f>>,
}

impl<'f> Branch<'f> {
    /// Branch comparing `attribute`, e.g. `$.Attributes.choice`
    pub fn on(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            id: None,
            cases: Vec::new(),
            otherwise: None,
        }
    }

    /// Explicit id for the marker node
    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Equality case with inline steps
    pub fn when(
        self,
        value: impl Into<Scalar>,
        body: impl FnOnce(&mut FlowBuilder) -> UsageResult<()> + 'f,
    ) -> Self {
        self.when_op(Operator::Equals, value, body)
    }

    /// Case with any operator and inline steps
    pub fn when_op(
        self,
        operator: Operator,
        value: impl Into<Scalar>,
        body: impl FnOnce(&mut FlowBuilder) -> UsageResult<()> + 'f,
    ) -> Self {
        self.case(Case {
            operator,
            value: value.into(),
            target: CaseTarget::steps(body),
        })
    }

    /// Equality case jumping to a label
    pub fn when_goto(self, value: impl Into<Scalar>, label: impl Into<String>) -> Self {
        self.case(Case {
            operator: Operator::Equals,
            value: value.into(),
            target: CaseTarget::goto(label),
        })
    }

    /// Add a prepared case
    pub fn case(mut self, case: Case<'f>) -> Self {
        self.cases.push(case);
        self
    }

    /// Fallback with inline steps
    pub fn otherwise(mut self, body: impl FnOnce(&mut FlowBuilder) -> UsageResult<()> + 'f) -> Self {
        self.otherwise = Some(CaseTarget::steps(body));
        self
    }

    /// Fallback jumping to a label
    pub fn otherwise_goto(mut self, label: impl Into<String>) -> Self {
        self.otherwise = Some(CaseTarget::goto(label));
        self
    }

    /// Fallback from a prepared target
    pub fn otherwise_target(mut self, target: CaseTarget<'f>) -> Self {
        self.otherwise = Some(target);
        self
    }
}

impl FlowBuilder {
    /// Place a branch and run its case bodies
    ///
    /// Returns the handle of the `Compare` marker. Case bodies that fall
    /// through continue at the next statement placed after the branch.
    /// If the branch or any of its case bodies fails, nothing is placed.
    pub fn branch(&mut self, branch: Branch<'_>) -> UsageResult<NodeHandle> {
        self.atomically(|flow| flow.place_branch(branch))
    }

    fn place_branch(&mut self, branch: Branch<'_>) -> UsageResult<NodeHandle> {
        let Branch {
            attribute,
            id,
            cases,
            otherwise,
        } = branch;

        check_attribute(&attribute)?;
        if cases.is_empty() {
            return Err(UsageError::EmptyBranch { attribute });
        }
        for case in &cases {
            case.value.check()?;
        }

        let id = self.allocate_id(&ActionKind::Branch, id)?;
        let parameters = Parameters::new().with("ComparisonValue", attribute);
        let marker = self.place(id, ActionKind::Branch, parameters);

        let mut targets = Vec::with_capacity(cases.len());
        if let Some(node) = self.node_mut(&marker) {
            for case in cases {
                node.transitions.conditions.push(ConditionEdge {
                    condition: Condition::new(case.operator, &case.value),
                    target: None,
                });
                targets.push(case.target);
            }
            if otherwise.is_some() {
                node.transitions.errors.push(ErrorEdge {
                    error: ErrorKind::NoMatchingCondition,
                    target: None,
                });
            }
        }

        let mut tails = Vec::new();
        for (i, target) in targets.into_iter().enumerate() {
            tails.extend(self.resolve_target(vec![Tail::condition(marker.index(), i)], target)?);
        }
        match otherwise {
            Some(target) => {
                tails.extend(self.resolve_target(vec![Tail::error(marker.index(), 0)], target)?);
            }
            None => self.warnings.push(SemanticWarning::BranchWithoutOtherwise {
                node_id: marker.id().to_string(),
            }),
        }

        tracing::debug!("Branch {} leaves {} open exit(s)", marker.id(), tails.len());
        self.scopes.current_mut().join(marker.index(), tails);
        Ok(marker)
    }

    /// Run a case target from `entry`, returning the exits it leaves open
    pub(crate) fn resolve_target(
        &mut self,
        entry: Vec<Tail>,
        target: CaseTarget<'_>,
    ) -> UsageResult<Vec<Tail>> {
        match target {
            CaseTarget::Goto(label) => {
                self.refer_to_label(entry, label)?;
                Ok(Vec::new())
            }
            CaseTarget::Steps(body) => {
                self.scopes.push_case(entry);
                let outcome = body(self);
                let tails = self.scopes.pop_case();
                outcome.map(|()| tails)
            }
        }
    }
}

/// `$.` followed by dot-separated segments of word characters or `-`
pub fn check_attribute(reference: &str) -> UsageResult<()> {
    let well_formed = reference.strip_prefix("$.").is_some_and(|path| {
        path.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        })
    });
    if well_formed {
        Ok(())
    } else {
        Err(UsageError::MalformedAttribute {
            reference: reference.to_string(),
        })
    }
}
