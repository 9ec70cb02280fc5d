//! Intermediate representation of a declarative flow
//!
//! The IR mirrors the YAML definition after every value has been checked
//! and converted into core types. Lowering it only issues builder calls.

use callflow_core::{Action, FallbackTriggers, Operator, Scalar};

/// Intermediate representation of a complete flow
#[derive(Debug, Clone, PartialEq)]
pub struct FlowIR {
    /// Flow name
    pub name: String,

    /// Flow description
    pub description: Option<String>,

    /// Document version overriding the compile options
    pub version: Option<String>,

    /// Top-level steps in order
    pub steps: Vec<StepIR>,
}

impl FlowIR {
    /// Create an empty flow
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            version: None,
            steps: Vec::new(),
        }
    }

    /// Number of steps, nested ones included
    pub fn step_count(&self) -> usize {
        count_steps(&self.steps)
    }
}

fn count_steps(steps: &[StepIR]) -> usize {
    steps
        .iter()
        .map(|step| {
            1 + match &step.kind {
                StepKind::Branch(branch) => {
                    branch
                        .cases
                        .iter()
                        .map(|case| case.target.step_count())
                        .sum::<usize>()
                        + branch.otherwise.as_ref().map_or(0, TargetIR::step_count)
                }
                StepKind::Ask(ask) => {
                    ask.intents
                        .iter()
                        .chain(&ask.digits)
                        .map(|choice| choice.target.step_count())
                        .sum::<usize>()
                        + ask.otherwise.as_ref().map_or(0, TargetIR::step_count)
                }
                StepKind::Action(_) | StepKind::Goto(_) => 0,
            }
        })
        .sum()
}

/// One step with its optional label and explicit id
#[derive(Debug, Clone, PartialEq)]
pub struct StepIR {
    /// Explicit node id
    pub id: Option<String>,

    /// Label bound to the step's node
    pub label: Option<String>,

    /// What the step does
    pub kind: StepKind,
}

impl StepIR {
    /// Unlabelled step with a generated id
    pub fn new(kind: StepKind) -> Self {
        Self {
            id: None,
            label: None,
            kind,
        }
    }
}

/// Step variants
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    /// Single action (prompt, attributes, queue, invoke, transfer, custom, disconnect)
    Action(Action),

    /// Branch on an attribute
    Branch(BranchIR),

    /// Speech input with keypad fallback
    Ask(AskIR),

    /// Jump to a label
    Goto(String),
}

/// Branch step
#[derive(Debug, Clone, PartialEq)]
pub struct BranchIR {
    /// Attribute reference compared by every case
    pub attribute: String,

    /// Cases in declaration order
    pub cases: Vec<CaseIR>,

    /// Fallback
    pub otherwise: Option<TargetIR>,
}

/// One branch case
#[derive(Debug, Clone, PartialEq)]
pub struct CaseIR {
    /// Comparison operator
    pub operator: Operator,

    /// Compared value
    pub value: Scalar,

    /// Where the case continues
    pub target: TargetIR,
}

/// Continuation of a case
#[derive(Debug, Clone, PartialEq)]
pub enum TargetIR {
    /// Inline steps
    Steps(Vec<StepIR>),

    /// Label
    Goto(String),
}

impl TargetIR {
    fn step_count(&self) -> usize {
        match self {
            TargetIR::Steps(steps) => count_steps(steps),
            TargetIR::Goto(_) => 0,
        }
    }
}

/// Intent or digit match
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceIR {
    /// Intent name or digit string
    pub value: String,

    /// Where the match continues
    pub target: TargetIR,
}

/// Ask step
#[derive(Debug, Clone, PartialEq)]
pub struct AskIR {
    /// Speech prompt
    pub prompt: String,

    /// Bot alias ARN
    pub bot: String,

    /// Locale
    pub locale: Option<String>,

    /// Confidence threshold
    pub confidence: Option<f64>,

    /// Keypad input timeout in seconds
    pub timeout: u32,

    /// Maximum keypad digits
    pub max_digits: Option<u32>,

    /// Keypad prompt, defaults to the speech prompt
    pub reprompt: Option<String>,

    /// Speech outcomes that fall back to keypad
    pub fallback: FallbackTriggers,

    /// Label bound to the keypad node
    pub fallback_label: Option<String>,

    /// Intent matches
    pub intents: Vec<ChoiceIR>,

    /// Digit matches
    pub digits: Vec<ChoiceIR>,

    /// Failed keypad input
    pub otherwise: Option<TargetIR>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_ir_new() {
        let ir = FlowIR::new("main_menu");
        assert_eq!(ir.name, "main_menu");
        assert!(ir.steps.is_empty());
        assert_eq!(ir.step_count(), 0);
    }

    #[test]
    fn test_step_count_includes_nested_steps() {
        let mut ir = FlowIR::new("nested");
        ir.steps.push(StepIR::new(StepKind::Branch(BranchIR {
            attribute: "$.Attributes.x".to_string(),
            cases: vec![CaseIR {
                operator: Operator::Equals,
                value: Scalar::from("1"),
                target: TargetIR::Steps(vec![
                    StepIR::new(StepKind::Action(Action::Prompt {
                        text: "one".to_string(),
                    })),
                    StepIR::new(StepKind::Action(Action::Disconnect)),
                ]),
            }],
            otherwise: Some(TargetIR::Goto("start".to_string())),
        })));
        ir.steps.push(StepIR::new(StepKind::Goto("start".to_string())));
        assert_eq!(ir.step_count(), 4);
    }
}
