//! IR lowering
//!
//! Walks the IR and issues the same [`FlowBuilder`] calls a fluent definition
//! would. Continuation and validation are entirely the builder's business.

use callflow_core::error::UsageResult;
use callflow_core::{
    Branch, Case, CaseTarget, DtmfConfig, FlowBuilder, SequentialInput, SpeechConfig,
};

use crate::ir::{AskIR, BranchIR, StepIR, StepKind, TargetIR};

/// Lower a sequence of steps into the current block of `builder`
pub fn lower_steps(builder: &mut FlowBuilder, steps: &[StepIR]) -> UsageResult<()> {
    steps.iter().try_for_each(|step| lower_step(builder, step))
}

fn lower_step(builder: &mut FlowBuilder, step: &StepIR) -> UsageResult<()> {
    let handle = match &step.kind {
        StepKind::Action(action) => match &step.id {
            Some(id) => builder.action_as(id.clone(), action.clone())?,
            None => builder.action(action.clone())?,
        },
        StepKind::Branch(branch) => builder.branch(to_branch(branch, step.id.as_deref()))?,
        StepKind::Ask(ask) => builder.sequential_input(to_input(ask, step.id.as_deref()))?,
        StepKind::Goto(label) => return builder.jump_to(label.clone()),
    };

    if let Some(label) = &step.label {
        builder.bind_label(label.clone(), &handle)?;
    }
    Ok(())
}

fn to_target(target: &TargetIR) -> CaseTarget<'_> {
    match target {
        TargetIR::Steps(steps) => CaseTarget::steps(move |b| lower_steps(b, steps)),
        TargetIR::Goto(label) => CaseTarget::goto(label.clone()),
    }
}

fn to_branch<'a>(ir: &'a BranchIR, id: Option<&str>) -> Branch<'a> {
    let mut branch = Branch::on(ir.attribute.clone());
    if let Some(id) = id {
        branch = branch.with_id(id);
    }
    for case in &ir.cases {
        branch = branch.case(Case {
            operator: case.operator,
            value: case.value.clone(),
            target: to_target(&case.target),
        });
    }
    match &ir.otherwise {
        Some(target) => branch.otherwise_target(to_target(target)),
        None => branch,
    }
}

fn to_input<'a>(ir: &'a AskIR, id: Option<&str>) -> SequentialInput<'a> {
    let mut speech = SpeechConfig::new(ir.bot.clone());
    if let Some(locale) = &ir.locale {
        speech = speech.with_locale(locale.clone());
    }
    if let Some(threshold) = ir.confidence {
        speech = speech.with_confidence(threshold);
    }

    let dtmf = DtmfConfig {
        reprompt: ir.reprompt.clone(),
        timeout_seconds: ir.timeout,
        max_digits: ir.max_digits,
    };

    let mut input = SequentialInput::new(ir.prompt.clone(), speech, dtmf, ir.fallback);
    if let Some(id) = id {
        input = input.with_id(id);
    }
    if let Some(label) = &ir.fallback_label {
        input = input.with_fallback_label(label.clone());
    }
    for choice in &ir.intents {
        input = input.intent_target(choice.value.clone(), to_target(&choice.target));
    }
    for choice in &ir.digits {
        input = input.digits_target(choice.value.clone(), to_target(&choice.target));
    }
    match &ir.otherwise {
        Some(target) => input.otherwise_target(to_target(target)),
        None => input,
    }
}
