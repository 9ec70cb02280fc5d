//! Sequential input: speech first, keypad as fallback
//!
//! One logical "ask" always expands to exactly two nodes:
//!
//! ```text
//!  ┌────────────┐  intents   ┌─────────────┐
//!  │  speech    │───────────▶│ case bodies │───┐
//!  └─────┬──────┘            └─────────────┘   │
//!        │ one error edge per enabled trigger  ├──▶ continuation
//!  ┌─────▼──────┐  digits    ┌─────────────┐   │
//!  │  keypad    │───────────▶│ case bodies │───┤
//!  └─────┬──────┘            └─────────────┘   │
//!        │ no match, timeout, error            │
//!        └──────────▶ otherwise ───────────────┘
//! ```

use std::ops::{BitOr, BitOrAssign};

use crate::action::{
    ActionKind, Condition, ConditionEdge, ErrorEdge, ErrorKind, NodeId, Operator, Parameters,
};
use crate::branch::CaseTarget;
use crate::builder::{FlowBuilder, NodeHandle};
use crate::error::{SemanticWarning, UsageError, UsageResult};
use crate::scope::Tail;
use crate::value::Scalar;

/// Speech outcomes that fall back to keypad input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FallbackTriggers(u8);

impl FallbackTriggers {
    /// No fallback
    pub const NONE: Self = Self(0);
    /// Caller did not answer in time
    pub const TIMEOUT: Self = Self(1);
    /// No intent matched
    pub const NO_MATCH: Self = Self(1 << 1);
    /// Recognition confidence too low
    pub const LOW_CONFIDENCE: Self = Self(1 << 2);
    /// Input was rejected
    pub const INVALID_INPUT: Self = Self(1 << 3);
    /// Generic failure
    pub const ERROR: Self = Self(1 << 4);
    /// Retry budget exhausted
    pub const MAX_RETRIES_EXCEEDED: Self = Self(1 << 5);
    /// Every trigger
    pub const ALL: Self = Self(0b11_1111);

    const ORDER: [(Self, ErrorKind, &'static str); 6] = [
        (Self::TIMEOUT, ErrorKind::InputTimeLimitExceeded, "timeout"),
        (Self::NO_MATCH, ErrorKind::NoMatchingCondition, "no_match"),
        (Self::LOW_CONFIDENCE, ErrorKind::LowConfidence, "low_confidence"),
        (Self::INVALID_INPUT, ErrorKind::InvalidInput, "invalid_input"),
        (Self::ERROR, ErrorKind::NoMatchingError, "error"),
        (
            Self::MAX_RETRIES_EXCEEDED,
            ErrorKind::MaxRetriesExceeded,
            "max_retries_exceeded",
        ),
    ];

    /// Raw bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every trigger of `other` is enabled
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no trigger is enabled
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Enable the triggers of `other`
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Error kinds of the enabled triggers, in bit order
    pub fn error_kinds(self) -> Vec<ErrorKind> {
        Self::ORDER
            .into_iter()
            .filter(|(flag, _, _)| self.contains(*flag))
            .map(|(_, kind, _)| kind)
            .collect()
    }

    /// Trigger for a snake_case name such as `no_match`
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ORDER
            .into_iter()
            .find(|(_, _, n)| *n == name)
            .map(|(flag, _, _)| flag)
    }
}

impl BitOr for FallbackTriggers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FallbackTriggers {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

/// Speech recognition settings
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechConfig {
    /// Bot alias ARN
    pub bot_alias_arn: String,
    /// Locale, e.g. `en_US`
    pub locale: Option<String>,
    /// Minimum intent confidence
    pub confidence_threshold: Option<f64>,
}

impl SpeechConfig {
    /// Settings for a bot alias
    pub fn new(bot_alias_arn: impl Into<String>) -> Self {
        Self {
            bot_alias_arn: bot_alias_arn.into(),
            locale: None,
            confidence_threshold: None,
        }
    }

    /// Set the locale
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Set the confidence threshold
    pub fn with_confidence(mut self, threshold: f64) -> Self {
        self.confidence_threshold = Some(threshold);
        self
    }
}

/// Keypad input settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtmfConfig {
    /// Text played before keypad input; defaults to the speech prompt
    pub reprompt: Option<String>,
    /// Seconds to wait for input
    pub timeout_seconds: u32,
    /// Maximum number of digits
    pub max_digits: Option<u32>,
}

impl Default for DtmfConfig {
    fn default() -> Self {
        Self {
            reprompt: None,
            timeout_seconds: 5,
            max_digits: None,
        }
    }
}

impl DtmfConfig {
    /// Default keypad settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the re-prompt text
    pub fn with_reprompt(mut self, text: impl Into<String>) -> Self {
        self.reprompt = Some(text.into());
        self
    }

    /// Set the input timeout
    pub fn with_timeout(mut self, seconds: u32) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Set the maximum digit count
    pub fn with_max_digits(mut self, digits: u32) -> Self {
        self.max_digits = Some(digits);
        self
    }
}

/// An ask with speech recognition and keypad fallback
#[derive(Debug)]
pub struct SequentialInput<'f> {
    prompt: String,
    speech: SpeechConfig,
    dtmf: DtmfConfig,
    triggers: FallbackTriggers,
    id: Option<NodeId>,
    fallback_label: Option<String>,
    intents: Vec<(String, CaseTarget<'f>)>,
    digits: Vec<(String, CaseTarget<'f>)>,
    otherwise: Option<CaseTarget<'f>>,
}

impl<'f> SequentialInput<'f> {
    /// New ask
    pub fn new(
        prompt: impl Into<String>,
        speech: SpeechConfig,
        dtmf: DtmfConfig,
        triggers: FallbackTriggers,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            speech,
            dtmf,
            triggers,
            id: None,
            fallback_label: None,
            intents: Vec::new(),
            digits: Vec::new(),
            otherwise: None,
        }
    }

    /// Explicit id for the speech node; the keypad node gets `<id>-dtmf`
    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Bind a label to the keypad node
    ///
    /// With no fallback triggers the keypad node is reachable only by jumping
    /// to this label.
    pub fn with_fallback_label(mut self, label: impl Into<String>) -> Self {
        self.fallback_label = Some(label.into());
        self
    }

    /// Steps for a matched intent
    pub fn on_intent(
        self,
        intent: impl Into<String>,
        body: impl FnOnce(&mut FlowBuilder) -> UsageResult<()> + 'f,
    ) -> Self {
        self.intent_target(intent, CaseTarget::steps(body))
    }

    /// Jump to a label on a matched intent
    pub fn on_intent_goto(self, intent: impl Into<String>, label: impl Into<String>) -> Self {
        self.intent_target(intent, CaseTarget::goto(label))
    }

    /// Prepared target for a matched intent
    pub fn intent_target(mut self, intent: impl Into<String>, target: CaseTarget<'f>) -> Self {
        self.intents.push((intent.into(), target));
        self
    }

    /// Steps for keyed digits
    pub fn on_digits(
        self,
        digits: impl Into<String>,
        body: impl FnOnce(&mut FlowBuilder) -> UsageResult<()> + 'f,
    ) -> Self {
        self.digits_target(digits, CaseTarget::steps(body))
    }

    /// Jump to a label on keyed digits
    pub fn on_digits_goto(self, digits: impl Into<String>, label: impl Into<String>) -> Self {
        self.digits_target(digits, CaseTarget::goto(label))
    }

    /// Prepared target for keyed digits
    pub fn digits_target(mut self, digits: impl Into<String>, target: CaseTarget<'f>) -> Self {
        self.digits.push((digits.into(), target));
        self
    }

    /// Steps when keypad input fails
    pub fn otherwise(mut self, body: impl FnOnce(&mut FlowBuilder) -> UsageResult<()> + 'f) -> Self {
        self.otherwise = Some(CaseTarget::steps(body));
        self
    }

    /// Jump to a label when keypad input fails
    pub fn otherwise_goto(mut self, label: impl Into<String>) -> Self {
        self.otherwise = Some(CaseTarget::goto(label));
        self
    }

    /// Prepared target for failed keypad input
    pub fn otherwise_target(mut self, target: CaseTarget<'f>) -> Self {
        self.otherwise = Some(target);
        self
    }
}

/// Keypad outcomes routed to `otherwise`
const DTMF_EXITS: [ErrorKind; 3] = [
    ErrorKind::NoMatchingCondition,
    ErrorKind::InputTimeLimitExceeded,
    ErrorKind::NoMatchingError,
];

impl FlowBuilder {
    /// Place a speech node and its keypad fallback
    ///
    /// Returns the speech node's handle. If the input or any of its case
    /// bodies fails, nothing is placed.
    pub fn sequential_input(&mut self, input: SequentialInput<'_>) -> UsageResult<NodeHandle> {
        self.atomically(|flow| flow.place_input(input))
    }

    fn place_input(&mut self, input: SequentialInput<'_>) -> UsageResult<NodeHandle> {
        let SequentialInput {
            prompt,
            speech,
            dtmf,
            triggers,
            id,
            fallback_label,
            intents,
            digits,
            otherwise,
        } = input;

        if dtmf.timeout_seconds == 0 {
            return Err(UsageError::ZeroTimeout);
        }

        let mut speech_params = Parameters::new()
            .with("Text", prompt.as_str())
            .with("LexV2Bot.AliasArn", speech.bot_alias_arn);
        if let Some(locale) = speech.locale {
            speech_params.insert("LocaleId", locale);
        }
        if let Some(threshold) = speech.confidence_threshold {
            speech_params.insert("ConfidenceThreshold", threshold);
        }
        speech_params.check()?;

        let mut dtmf_params = Parameters::new()
            .with("Text", dtmf.reprompt.unwrap_or(prompt))
            .with("StoreInput", "False")
            .with("InputTimeLimitSeconds", dtmf.timeout_seconds);
        if let Some(max) = dtmf.max_digits {
            dtmf_params.insert("MaxDigits", max);
        }

        let dtmf_id = id.as_ref().map(|id| format!("{id}-dtmf"));
        let speech_id = self.allocate_id(&ActionKind::Intent, id)?;
        let dtmf_id = self.allocate_id(&ActionKind::Input, dtmf_id)?;

        let speech_node = self.place(speech_id, ActionKind::Intent, speech_params);
        let dtmf_node = self.push_detached(dtmf_id, ActionKind::Input, dtmf_params);
        if let Some(label) = fallback_label {
            self.bind_label(label, &dtmf_node)?;
        }

        if triggers.is_empty() {
            self.warnings.push(SemanticWarning::FallbackDisabled {
                node_id: speech_node.id().to_string(),
                fallback_node_id: dtmf_node.id().to_string(),
            });
        }

        let mut intent_targets = Vec::with_capacity(intents.len());
        if let Some(node) = self.node_mut(&speech_node) {
            for kind in triggers.error_kinds() {
                node.transitions.errors.push(ErrorEdge {
                    error: kind,
                    target: Some(dtmf_node.id().to_string()),
                });
            }
            for (intent, target) in intents {
                node.transitions.conditions.push(ConditionEdge {
                    condition: Condition::new(Operator::Equals, &Scalar::from(intent)),
                    target: None,
                });
                intent_targets.push(target);
            }
        }

        let mut digit_targets = Vec::with_capacity(digits.len());
        if let Some(node) = self.node_mut(&dtmf_node) {
            for (value, target) in digits {
                node.transitions.conditions.push(ConditionEdge {
                    condition: Condition::new(Operator::Equals, &Scalar::from(value)),
                    target: None,
                });
                digit_targets.push(target);
            }
            for kind in DTMF_EXITS {
                node.transitions.errors.push(ErrorEdge {
                    error: kind,
                    target: None,
                });
            }
        }

        let mut tails = Vec::new();
        for (i, target) in intent_targets.into_iter().enumerate() {
            tails.extend(self.resolve_target(vec![Tail::condition(speech_node.index(), i)], target)?);
        }
        for (i, target) in digit_targets.into_iter().enumerate() {
            tails.extend(self.resolve_target(vec![Tail::condition(dtmf_node.index(), i)], target)?);
        }
        let exits: Vec<Tail> = (0..DTMF_EXITS.len())
            .map(|i| Tail::error(dtmf_node.index(), i))
            .collect();
        match otherwise {
            Some(target) => tails.extend(self.resolve_target(exits, target)?),
            None => tails.extend(exits),
        }

        tracing::debug!(
            "Input {} with fallback {} leaves {} open exit(s)",
            speech_node.id(),
            dtmf_node.id(),
            tails.len()
        );
        self.scopes.current_mut().join(speech_node.index(), tails);
        Ok(speech_node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StructuralError;

    fn speech() -> SpeechConfig {
        SpeechConfig::new("arn:aws:lex:bot-alias/menu")
    }

    #[test]
    fn test_trigger_names_and_order() {
        assert_eq!(FallbackTriggers::from_name("no_match"), Some(FallbackTriggers::NO_MATCH));
        assert_eq!(FallbackTriggers::from_name("sometimes"), None);
        assert_eq!(
            (FallbackTriggers::ERROR | FallbackTriggers::TIMEOUT).error_kinds(),
            vec![ErrorKind::InputTimeLimitExceeded, ErrorKind::NoMatchingError]
        );
        assert_eq!(FallbackTriggers::ALL.error_kinds().len(), 6);
        assert!(FallbackTriggers::NONE.is_empty());
    }

    #[test]
    fn test_always_two_nodes() {
        let mut flow = FlowBuilder::new();
        flow.sequential_input(SequentialInput::new(
            "How can I help?",
            speech(),
            DtmfConfig::new(),
            FallbackTriggers::TIMEOUT | FallbackTriggers::NO_MATCH,
        ))
        .unwrap();
        flow.disconnect().unwrap();
        let graph = flow.build().unwrap();

        assert_eq!(graph.len(), 3);
        let speech_node = &graph.nodes()[0];
        let dtmf_node = &graph.nodes()[1];
        assert_eq!(speech_node.kind, ActionKind::Intent);
        assert_eq!(dtmf_node.kind, ActionKind::Input);
        let errors: Vec<_> = speech_node
            .transitions
            .errors
            .iter()
            .map(|e| (e.error.clone(), e.target.as_str()))
            .collect();
        assert_eq!(
            errors,
            vec![
                (ErrorKind::InputTimeLimitExceeded, dtmf_node.id.as_str()),
                (ErrorKind::NoMatchingCondition, dtmf_node.id.as_str()),
            ]
        );
        assert!(dtmf_node.transitions.errors.iter().all(|e| e.target == "disconnect-3"));
        assert_eq!(dtmf_node.parameters.get_str("Text").as_deref(), Some("How can I help?"));
        assert_eq!(dtmf_node.parameters.get_str("InputTimeLimitSeconds").as_deref(), Some("5"));
    }

    #[test]
    fn test_no_triggers_warns() {
        let mut flow = FlowBuilder::new();
        flow.sequential_input(
            SequentialInput::new("Hi", speech(), DtmfConfig::new(), FallbackTriggers::NONE)
                .on_intent("Help", |_| Ok(())),
        )
        .unwrap();
        flow.disconnect().unwrap();
        let graph = flow.build().unwrap();

        assert_eq!(graph.nodes()[0].transitions.errors.len(), 0);
        assert_eq!(
            graph.warnings(),
            &[SemanticWarning::FallbackDisabled {
                node_id: "intent-1".to_string(),
                fallback_node_id: "input-2".to_string(),
            }]
        );
    }

    #[test]
    fn test_cases_and_otherwise() {
        let mut flow = FlowBuilder::new();
        let operator = flow.prompt("Operator").unwrap();
        flow.bind_label("operator", &operator).unwrap();
        flow.jump_to("operator").unwrap();
        flow.sequential_input(
            SequentialInput::new(
                "Say sales or press 1",
                speech().with_locale("en_US").with_confidence(0.6),
                DtmfConfig::new().with_max_digits(1),
                FallbackTriggers::ALL,
            )
            .with_id("menu")
            .on_intent("Sales", |b| b.transfer("Sales").map(drop))
            .on_digits("1", |b| b.transfer("Sales").map(drop))
            .otherwise_goto("operator"),
        )
        .unwrap();
        let draft = flow.into_draft();

        let speech_node = &draft.nodes[1];
        assert_eq!(speech_node.id, "menu");
        assert_eq!(draft.nodes[2].id, "menu-dtmf");
        assert_eq!(
            speech_node.parameters.get_str("ConfidenceThreshold").as_deref(),
            Some("0.6")
        );
        assert_eq!(speech_node.transitions.conditions[0].target.as_deref(), Some("transfer-4"));
        assert_eq!(draft.nodes[2].transitions.conditions[0].target.as_deref(), Some("transfer-5"));
        assert!(draft.nodes[2]
            .transitions
            .errors
            .iter()
            .all(|e| e.target.as_deref() == Some("prompt-1")));
        assert!(draft.open_scopes.is_empty());
    }

    #[test]
    fn test_ask_as_last_statement_is_rejected() {
        let mut flow = FlowBuilder::new();
        flow.sequential_input(SequentialInput::new(
            "Hi",
            speech(),
            DtmfConfig::new(),
            FallbackTriggers::ALL,
        ))
        .unwrap();
        let failure = flow.build().unwrap_err();
        assert_eq!(
            failure.report.errors,
            vec![StructuralError::UnresolvedContinuation {
                node_id: "intent-1".to_string(),
                tails: vec!["input-2".to_string()],
            }]
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut flow = FlowBuilder::new();
        let err = flow
            .sequential_input(SequentialInput::new(
                "Hi",
                speech(),
                DtmfConfig::new().with_timeout(0),
                FallbackTriggers::ALL,
            ))
            .unwrap_err();
        assert_eq!(err, UsageError::ZeroTimeout);
    }

    #[test]
    fn test_fallback_label_reaches_keypad() {
        let mut flow = FlowBuilder::new();
        flow.sequential_input(
            SequentialInput::new("Hi", speech(), DtmfConfig::new(), FallbackTriggers::NONE)
                .with_fallback_label("keypad")
                .on_intent("Help", |b| b.jump_to("keypad")),
        )
        .unwrap();
        flow.disconnect().unwrap();
        let graph = flow.build().unwrap();

        assert_eq!(graph.label("keypad").map(|n| n.id.as_str()), Some("input-2"));
        assert_eq!(graph.nodes()[0].transitions.conditions[0].target, "input-2");
        assert!(graph.warnings().is_empty());
    }

    #[test]
    fn test_failed_input_leaves_flow_untouched() {
        let mut flow = FlowBuilder::new();
        let greeting = flow.prompt("Hi").unwrap();
        flow.bind_label("top", &greeting).unwrap();

        let err = flow
            .sequential_input(
                SequentialInput::new("Ask", speech(), DtmfConfig::new(), FallbackTriggers::ALL)
                    .with_fallback_label("top"),
            )
            .unwrap_err();
        assert!(matches!(err, UsageError::DuplicateLabel { .. }));

        let err = flow
            .sequential_input(
                SequentialInput::new("Ask", speech(), DtmfConfig::new(), FallbackTriggers::ALL)
                    .on_digits("1", |b| {
                        b.prompt("one")?;
                        b.jump_to("")
                    }),
            )
            .unwrap_err();
        assert_eq!(err, UsageError::EmptyLabel);
        assert_eq!(flow.node_count(), 1);

        flow.disconnect().unwrap();
        let graph = flow.build().unwrap();
        assert_eq!(graph.nodes()[0].transitions.next.as_deref(), Some("disconnect-2"));
        assert!(graph.warnings().is_empty());
    }
}
