//! YAML to IR parser
//!
//! Parses flow definitions into the intermediate representation, converting
//! every YAML value into its core type on the way.

use std::path::Path;

use callflow_core::{
    Action, DtmfConfig, FallbackTriggers, Operator, Parameters, Scalar, UsageError,
};
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};
use crate::ir::*;

/// Parser for flow YAML files
#[derive(Debug, Clone, Copy, Default)]
pub struct Parser;

impl Parser {
    /// Create a new parser
    pub fn new() -> Self {
        Self
    }

    /// Parse a flow YAML file into IR
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<FlowIR> {
        let content = std::fs::read_to_string(path.as_ref())?;
        self.parse_yaml(&content)
    }

    /// Parse YAML string into IR
    pub fn parse_yaml(&self, yaml: &str) -> Result<FlowIR> {
        let raw: RawFlow = serde_yaml::from_str(yaml)?;
        Converter { flow: &raw.name }.flow(&raw)
    }
}

/// Raw-to-IR conversion for one flow
struct Converter<'a> {
    flow: &'a str,
}

impl Converter<'_> {
    fn invalid(&self, message: impl Into<String>) -> Error {
        Error::InvalidStep {
            flow: self.flow.to_string(),
            message: message.into(),
        }
    }

    fn flow(&self, raw: &RawFlow) -> Result<FlowIR> {
        let mut ir = FlowIR::new(&raw.name);
        ir.description = raw.description.clone();
        ir.version = raw.version.clone();
        ir.steps = self.steps(&raw.steps)?;
        Ok(ir)
    }

    fn steps(&self, raw: &[RawStep]) -> Result<Vec<StepIR>> {
        raw.iter().map(|step| self.step(step)).collect()
    }

    fn step(&self, raw: &RawStep) -> Result<StepIR> {
        let op = match raw.ops().as_slice() {
            [] => return Err(self.invalid("step has no operation")),
            [(_, op)] => *op,
            [(first, _), (second, _), ..] => {
                return Err(self.invalid(format!(
                    "step cannot combine '{}' and '{}'",
                    first, second
                )));
            }
        };

        let kind = match op {
            RawOp::Prompt(prompt) => StepKind::Action(Action::Prompt {
                text: prompt.to_string(),
            }),
            RawOp::SetAttributes(attributes) => {
                StepKind::Action(Action::SetAttributes(self.pairs(attributes)?))
            }
            RawOp::SetQueue(queue) => StepKind::Action(Action::SetQueue {
                queue: queue.to_string(),
            }),
            RawOp::Invoke(invoke) => StepKind::Action(Action::Invoke {
                function_arn: invoke.function.clone(),
                timeout_seconds: invoke.timeout,
            }),
            RawOp::Transfer(queue) => StepKind::Action(Action::Transfer {
                queue: queue.to_string(),
            }),
            RawOp::Disconnect => StepKind::Action(Action::Disconnect),
            RawOp::Action(action) => StepKind::Action(Action::Custom {
                type_name: action.action_type.clone(),
                parameters: self.pairs(&action.parameters)?.into_iter().collect::<Parameters>(),
            }),
            RawOp::Branch(branch) => StepKind::Branch(self.branch(branch)?),
            RawOp::Ask(ask) => StepKind::Ask(self.ask(ask)?),
            RawOp::Goto(goto) => {
                if raw.label.is_some() || raw.id.is_some() {
                    return Err(self.invalid(format!(
                        "goto '{}' cannot carry a label or id",
                        goto
                    )));
                }
                StepKind::Goto(goto.to_string())
            }
        };

        Ok(StepIR {
            id: raw.id.clone(),
            label: raw.label.clone(),
            kind,
        })
    }

    fn branch(&self, raw: &RawBranch) -> Result<BranchIR> {
        let cases = raw
            .cases
            .iter()
            .map(|case| {
                let (operator, value) = match (&case.equals, &case.value, &case.op) {
                    (Some(value), None, None) => (Operator::Equals, value),
                    (None, Some(value), op) => (self.operator(op.as_deref())?, value),
                    (Some(_), _, _) => {
                        return Err(self.invalid(
                            "a case with 'equals' cannot also set 'value' or 'op'",
                        ));
                    }
                    (None, None, _) => {
                        return Err(self.invalid(format!(
                            "case on '{}' needs 'equals' or 'value'",
                            raw.on
                        )));
                    }
                };
                Ok(CaseIR {
                    operator,
                    value: self.scalar(value)?,
                    target: self.target(case.steps.as_deref(), case.goto.as_deref())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(BranchIR {
            attribute: raw.on.clone(),
            cases,
            otherwise: raw
                .otherwise
                .as_ref()
                .map(|t| self.target(t.steps.as_deref(), t.goto.as_deref()))
                .transpose()?,
        })
    }

    fn ask(&self, raw: &RawAsk) -> Result<AskIR> {
        let mut fallback = FallbackTriggers::NONE;
        for name in &raw.fallback {
            fallback |= FallbackTriggers::from_name(name)
                .ok_or_else(|| self.invalid(format!("unknown fallback trigger '{}'", name)))?;
        }

        Ok(AskIR {
            prompt: raw.prompt.clone(),
            bot: raw.bot.clone(),
            locale: raw.locale.clone(),
            confidence: raw.confidence,
            timeout: raw.timeout,
            max_digits: raw.max_digits,
            reprompt: raw.reprompt.clone(),
            fallback,
            fallback_label: raw.fallback_label.clone(),
            intents: self.choices(&raw.intents)?,
            digits: self.choices(&raw.digits)?,
            otherwise: raw
                .otherwise
                .as_ref()
                .map(|t| self.target(t.steps.as_deref(), t.goto.as_deref()))
                .transpose()?,
        })
    }

    fn choices(&self, raw: &[RawChoice]) -> Result<Vec<ChoiceIR>> {
        raw.iter()
            .map(|choice| {
                Ok(ChoiceIR {
                    value: self.scalar(&choice.value)?.to_runtime_string(),
                    target: self.target(choice.steps.as_deref(), choice.goto.as_deref())?,
                })
            })
            .collect()
    }

    fn target(&self, steps: Option<&[RawStep]>, goto: Option<&str>) -> Result<TargetIR> {
        match (steps, goto) {
            (Some(steps), None) => Ok(TargetIR::Steps(self.steps(steps)?)),
            (None, Some(label)) => Ok(TargetIR::Goto(label.to_string())),
            (Some(_), Some(_)) => Err(self.invalid("a case cannot have both 'steps' and 'goto'")),
            (None, None) => Err(self.invalid("a case needs 'steps' or 'goto'")),
        }
    }

    fn operator(&self, name: Option<&str>) -> Result<Operator> {
        match name {
            None => Ok(Operator::Equals),
            Some(name) => Operator::parse(name)
                .ok_or_else(|| self.invalid(format!("unknown operator '{}'", name))),
        }
    }

    fn pairs(&self, mapping: &Mapping) -> Result<Vec<(String, Scalar)>> {
        mapping
            .iter()
            .map(|(key, value)| {
                let key = key
                    .as_str()
                    .ok_or_else(|| self.invalid("parameter names must be strings"))?;
                Ok((key.to_string(), self.scalar(value)?))
            })
            .collect()
    }

    fn scalar(&self, value: &Value) -> Result<Scalar> {
        scalar_from_yaml(value).map_err(|e| self.invalid(e.to_string()))
    }
}

/// Convert a YAML scalar into a core value
pub fn scalar_from_yaml(value: &Value) -> std::result::Result<Scalar, UsageError> {
    let scalar = match value {
        Value::Bool(b) => Scalar::Bool(*b),
        Value::String(s) => Scalar::Str(s.clone()),
        Value::Number(n) => match (n.as_i64(), n.is_u64()) {
            (Some(i), _) => Scalar::Int(i),
            (None, true) => return Err(unsupported("integer above i64::MAX")),
            (None, false) => Scalar::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::Null => return Err(unsupported("null")),
        Value::Sequence(_) => return Err(unsupported("sequence")),
        Value::Mapping(_) => return Err(unsupported("mapping")),
        Value::Tagged(_) => return Err(unsupported("tagged value")),
    };
    scalar.check()?;
    Ok(scalar)
}

fn unsupported(found: &str) -> UsageError {
    UsageError::UnsupportedValue {
        found: found.to_string(),
    }
}

// ============================================================================
// Raw YAML structures (for serde deserialization)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFlow {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    steps: Vec<RawStep>,
}

/// One step; exactly one operation key must be set
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    set_attributes: Option<Mapping>,
    #[serde(default)]
    set_queue: Option<String>,
    #[serde(default)]
    invoke: Option<RawInvoke>,
    #[serde(default)]
    branch: Option<RawBranch>,
    #[serde(default)]
    ask: Option<RawAsk>,
    #[serde(default)]
    action: Option<RawAction>,
    #[serde(default)]
    transfer: Option<String>,
    #[serde(default)]
    goto: Option<String>,
    #[serde(default, deserialize_with = "present")]
    disconnect: Option<Value>,
}

/// Any value, including null, marks the key as present
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy)]
enum RawOp<'a> {
    Prompt(&'a str),
    SetAttributes(&'a Mapping),
    SetQueue(&'a str),
    Invoke(&'a RawInvoke),
    Branch(&'a RawBranch),
    Ask(&'a RawAsk),
    Action(&'a RawAction),
    Transfer(&'a str),
    Goto(&'a str),
    Disconnect,
}

impl RawStep {
    /// Operation keys set on this step, in declaration order
    fn ops(&self) -> Vec<(&'static str, RawOp<'_>)> {
        let mut ops = Vec::new();
        if let Some(v) = &self.prompt {
            ops.push(("prompt", RawOp::Prompt(v)));
        }
        if let Some(v) = &self.set_attributes {
            ops.push(("set_attributes", RawOp::SetAttributes(v)));
        }
        if let Some(v) = &self.set_queue {
            ops.push(("set_queue", RawOp::SetQueue(v)));
        }
        if let Some(v) = &self.invoke {
            ops.push(("invoke", RawOp::Invoke(v)));
        }
        if let Some(v) = &self.branch {
            ops.push(("branch", RawOp::Branch(v)));
        }
        if let Some(v) = &self.ask {
            ops.push(("ask", RawOp::Ask(v)));
        }
        if let Some(v) = &self.action {
            ops.push(("action", RawOp::Action(v)));
        }
        if let Some(v) = &self.transfer {
            ops.push(("transfer", RawOp::Transfer(v)));
        }
        if let Some(v) = &self.goto {
            ops.push(("goto", RawOp::Goto(v)));
        }
        if self.disconnect.is_some() {
            ops.push(("disconnect", RawOp::Disconnect));
        }
        ops
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInvoke {
    function: String,
    #[serde(default)]
    timeout: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAction {
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default)]
    parameters: Mapping,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBranch {
    on: String,
    cases: Vec<RawCase>,
    #[serde(default)]
    otherwise: Option<RawTarget>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCase {
    #[serde(default)]
    equals: Option<Value>,
    #[serde(default)]
    op: Option<String>,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    steps: Option<Vec<RawStep>>,
    #[serde(default)]
    goto: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTarget {
    #[serde(default)]
    steps: Option<Vec<RawStep>>,
    #[serde(default)]
    goto: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawChoice {
    value: Value,
    #[serde(default)]
    steps: Option<Vec<RawStep>>,
    #[serde(default)]
    goto: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAsk {
    prompt: String,
    bot: String,
    #[serde(default)]
    locale: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default = "default_timeout")]
    timeout: u32,
    #[serde(default)]
    max_digits: Option<u32>,
    #[serde(default)]
    reprompt: Option<String>,
    #[serde(default)]
    fallback: Vec<String>,
    #[serde(default)]
    fallback_label: Option<String>,
    #[serde(default)]
    intents: Vec<RawChoice>,
    #[serde(default)]
    digits: Vec<RawChoice>,
    #[serde(default)]
    otherwise: Option<RawTarget>,
}

fn default_timeout() -> u32 {
    DtmfConfig::default().timeout_seconds
}
