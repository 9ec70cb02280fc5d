//! Integration tests for the YAML compile pipeline
//!
//! Tests use temporary directories with real flow files to verify:
//! - Parsing, lowering and rendering of complete flows
//! - Equivalence with fluent builder definitions
//! - Directory compilation order and options handling
//! - Error reporting with flow names

use callflow_codegen::{Compiler, Error};
use callflow_core::{
    Branch, CompileOptions, DtmfConfig, FallbackTriggers, FlowBuilder, FlowDocument,
    Scalar, SemanticWarning, SequentialInput, SpeechConfig, StructuralError,
};
use tempfile::TempDir;

const MENU_FLOW: &str = r#"
name: main_menu
description: Front door
steps:
  - prompt: "Hi"
  - branch:
      on: $.Attributes.choice
      cases:
        - equals: "1"
          steps:
            - transfer: Sales
      otherwise:
        steps: []
  - disconnect: {}
"#;

const SUPPORT_FLOW: &str = r#"
name: support
steps:
  - set_attributes:
      language: en
      vip: true
  - invoke:
      function: "arn:aws:lambda:us-east-1:123456789012:function:lookup"
      timeout: 8
  - ask:
      prompt: "How can I help?"
      bot: "arn:aws:lex:us-east-1:123456789012:bot-alias/help"
      locale: en_US
      confidence: 0.6
      max_digits: 1
      fallback: [timeout, no_match]
      intents:
        - value: Sales
          goto: sales
      digits:
        - value: "1"
          steps:
            - prompt: "Connecting you to sales"
            - goto: sales
      otherwise:
        goto: operator
  - prompt: "Thanks for calling"
  - disconnect: {}
  - set_queue: "arn:aws:connect:queue/Sales"
    label: sales
  - transfer: Sales
  - transfer: Operator
    label: operator
"#;

fn support_fluent() -> FlowBuilder {
    let mut flow = FlowBuilder::new();
    flow.set_attributes([("language", Scalar::from("en")), ("vip", Scalar::from(true))])
        .unwrap();
    flow.invoke("arn:aws:lambda:us-east-1:123456789012:function:lookup", Some(8))
        .unwrap();
    flow.sequential_input(
        SequentialInput::new(
            "How can I help?",
            SpeechConfig::new("arn:aws:lex:us-east-1:123456789012:bot-alias/help")
                .with_locale("en_US")
                .with_confidence(0.6),
            DtmfConfig::new().with_max_digits(1),
            FallbackTriggers::TIMEOUT | FallbackTriggers::NO_MATCH,
        )
        .on_intent_goto("Sales", "sales")
        .on_digits("1", |b| {
            b.prompt("Connecting you to sales")?;
            b.jump_to("sales")
        })
        .otherwise_goto("operator"),
    )
    .unwrap();
    flow.prompt("Thanks for calling").unwrap();
    flow.disconnect().unwrap();
    let queue = flow.set_queue("arn:aws:connect:queue/Sales").unwrap();
    flow.bind_label("sales", &queue).unwrap();
    flow.transfer("Sales").unwrap();
    let operator = flow.transfer("Operator").unwrap();
    flow.bind_label("operator", &operator).unwrap();
    flow
}

// =============================================================================
// Single Flow Compilation
// =============================================================================

#[test]
fn test_compile_menu_flow() {
    let compiled = Compiler::default().compile_str(MENU_FLOW).unwrap();
    let value: serde_json::Value = serde_json::from_str(&compiled.json).unwrap();

    assert_eq!(compiled.name, "main_menu");
    assert_eq!(value["StartAction"], "prompt-1");
    let actions = value["Actions"].as_array().unwrap();
    assert_eq!(actions.len(), 4);
    assert_eq!(actions[2]["Type"], "TransferContactToQueue");
    assert!(actions[2]["Transitions"].get("NextAction").is_none());
    assert_eq!(actions[1]["Transitions"]["Errors"][0]["NextAction"], "disconnect-4");
}

#[test]
fn test_yaml_and_fluent_render_identically() {
    let mut fluent = FlowBuilder::new();
    fluent.prompt("Hi").unwrap();
    fluent
        .branch(
            Branch::on("$.Attributes.choice")
                .when("1", |b| b.transfer("Sales").map(drop))
                .otherwise(|_| Ok(())),
        )
        .unwrap();
    fluent.disconnect().unwrap();
    let fluent_json = FlowDocument::from_graph(&fluent.build().unwrap())
        .to_json_pretty()
        .unwrap();

    let compiled = Compiler::default().compile_str(MENU_FLOW).unwrap();
    assert_eq!(compiled.json, fluent_json);
}

#[test]
fn test_support_flow_wiring() {
    let compiled = Compiler::default().compile_str(SUPPORT_FLOW).unwrap();
    let actions = &compiled.document.actions;

    let ids: Vec<_> = actions.iter().map(|a| a.identifier.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "set-attributes-1",
            "invoke-2",
            "intent-3",
            "input-4",
            "prompt-5",
            "prompt-6",
            "disconnect-7",
            "set-queue-8",
            "transfer-9",
            "transfer-10",
        ]
    );

    let speech = &actions[2];
    assert_eq!(speech.action_type, "ConnectParticipantWithLexBot");
    assert_eq!(speech.transitions.conditions[0].next_action, "set-queue-8");
    assert_eq!(speech.transitions.errors.len(), 2);
    assert!(speech
        .transitions
        .errors
        .iter()
        .all(|e| e.next_action == "input-4"));

    let keypad = &actions[3];
    assert_eq!(keypad.transitions.conditions[0].next_action, "prompt-5");
    assert!(keypad
        .transitions
        .errors
        .iter()
        .all(|e| e.next_action == "transfer-10"));

    // every ask exit jumps to a label, so nothing reaches the closing prompt
    assert_eq!(
        compiled.warnings,
        vec![
            SemanticWarning::UnreachableNode {
                node_id: "prompt-6".to_string()
            },
            SemanticWarning::UnreachableNode {
                node_id: "disconnect-7".to_string()
            },
        ]
    );
}

#[test]
fn test_support_flow_matches_fluent() {
    let compiled = Compiler::default().compile_str(SUPPORT_FLOW).unwrap();
    let fluent_json = FlowDocument::from_graph(&support_fluent().build().unwrap())
        .to_json_pretty()
        .unwrap();
    assert_eq!(compiled.json, fluent_json);
}

#[test]
fn test_keypad_reachable_through_fallback_label() {
    let yaml = r#"
name: keypad_only
steps:
  - ask:
      prompt: "Say help or wait"
      bot: "arn:aws:lex:us-east-1:123456789012:bot-alias/help"
      fallback_label: keypad
      intents:
        - value: Help
          goto: keypad
  - disconnect: {}
"#;
    let strict = Compiler::new(CompileOptions::default().with_strict(true));
    let compiled = strict.compile_str(yaml).unwrap();
    assert!(compiled.warnings.is_empty());

    let mut fluent = FlowBuilder::new();
    fluent
        .sequential_input(
            SequentialInput::new(
                "Say help or wait",
                SpeechConfig::new("arn:aws:lex:us-east-1:123456789012:bot-alias/help"),
                DtmfConfig::new(),
                FallbackTriggers::NONE,
            )
            .with_fallback_label("keypad")
            .on_intent_goto("Help", "keypad"),
        )
        .unwrap();
    fluent.disconnect().unwrap();
    let fluent_json = FlowDocument::from_graph(&fluent.build().unwrap())
        .to_json_pretty()
        .unwrap();
    assert_eq!(compiled.json, fluent_json);
}

#[test]
fn test_strict_mode_rejects_warnings() {
    let compiler = Compiler::new(CompileOptions::default().with_strict(true));
    let err = compiler.compile_str(SUPPORT_FLOW).unwrap_err();
    match err {
        Error::Build { flow, source } => {
            assert_eq!(flow, "support");
            assert!(source.strict);
            assert_eq!(source.report.warnings.len(), 2);
        }
        other => panic!("Expected build failure, got {other:?}"),
    }
}

#[test]
fn test_dangling_branch_reports_continuation() {
    let yaml = r#"
name: open_end
steps:
  - branch:
      on: $.Attributes.x
      cases:
        - equals: 1
          steps:
            - prompt: "one"
      otherwise:
        steps:
          - disconnect: {}
"#;
    let err = Compiler::default().compile_str(yaml).unwrap_err();
    let report = err.report().unwrap();
    assert_eq!(
        report.errors,
        vec![StructuralError::UnresolvedContinuation {
            node_id: "compare-1".to_string(),
            tails: vec!["prompt-2".to_string()],
        }]
    );
}

#[test]
fn test_usage_error_names_flow() {
    let yaml = r#"
name: broken
steps:
  - prompt: "Hi"
    label: again
  - prompt: "Hello"
    label: again
"#;
    let err = Compiler::default().compile_str(yaml).unwrap_err();
    assert!(matches!(err, Error::Usage { ref flow, .. } if flow == "broken"));
    assert!(err.to_string().contains("label 'again' is already bound"));
}

// =============================================================================
// Directory Compilation
// =============================================================================

#[test]
fn test_compile_all_sorted_and_skips_options() {
    let dir = TempDir::new().unwrap();
    let flows = dir.path().join("flows");
    std::fs::create_dir_all(&flows).unwrap();
    std::fs::write(dir.path().join("callflow.yaml"), "strict: false\n").unwrap();
    std::fs::write(flows.join("b_menu.yaml"), MENU_FLOW).unwrap();
    std::fs::write(
        flows.join("a_goodbye.yml"),
        "name: goodbye\nsteps:\n  - prompt: Bye\n  - disconnect: {}\n",
    )
    .unwrap();
    std::fs::write(flows.join("notes.txt"), "not a flow").unwrap();

    let options = CompileOptions::load(dir.path()).unwrap();
    let compiled = Compiler::new(options).compile_all(dir.path()).unwrap();

    let names: Vec<_> = compiled.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["goodbye", "main_menu"]);
}

#[test]
fn test_compile_all_is_deterministic() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("menu.yaml"), MENU_FLOW).unwrap();
    std::fs::write(dir.path().join("support.yaml"), SUPPORT_FLOW).unwrap();

    let compiler = Compiler::default();
    let first = compiler.compile_all(dir.path()).unwrap();
    let second = compiler.compile_all(dir.path()).unwrap();

    let hashes = |flows: &[callflow_codegen::CompiledFlow]| {
        flows.iter().map(|f| f.hash.clone()).collect::<Vec<_>>()
    };
    assert_eq!(hashes(&first), hashes(&second));
    assert_eq!(first[0].json, second[0].json);
}

#[test]
fn test_compile_file_missing() {
    let err = Compiler::default()
        .compile_file("/nonexistent/flow.yaml")
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
