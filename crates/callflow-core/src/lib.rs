//! Callflow Core Library
//!
//! This crate compiles contact flows into the document an IVR runtime loads:
//! - Action-node model and graph containers
//! - Flow builder with branch resolution and speech/keypad fallback
//! - Structural validation against the runtime's limits
//! - Deterministic JSON serialization
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ FlowBuilder │────▶│  FlowDraft  │────▶│  Validator  │────▶│  FlowGraph  │
//! │ (+ scopes)  │     │             │     │             │     │             │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    │
//!                                                             ┌──────▼──────┐
//!                                                             │FlowDocument │
//!                                                             │   (JSON)    │
//!                                                             └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use callflow_core::{Branch, FlowBuilder, FlowDocument};
//!
//! let mut flow = FlowBuilder::new();
//! flow.prompt("Hi")?;
//! flow.branch(
//!     Branch::on("$.Attributes.choice")
//!         .when("1", |b| b.transfer("Sales").map(drop))
//!         .otherwise(|_| Ok(())),
//! )?;
//! flow.disconnect()?;
//!
//! let json = FlowDocument::from_graph(&flow.build()?).to_json_pretty()?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod action;
pub mod branch;
pub mod builder;
pub mod config;
pub mod document;
pub mod error;
pub mod graph;
pub mod input;
pub mod scope;
pub mod validator;
pub mod value;

pub use action::{Action, ActionKind, ActionNode, ErrorKind, NodeId, Operator, Parameters};
pub use branch::{Branch, Case, CaseTarget};
pub use builder::{FlowBuilder, NodeHandle};
pub use config::CompileOptions;
pub use document::FlowDocument;
pub use error::{BuildFailure, Error, Result, SemanticWarning, StructuralError, UsageError};
pub use graph::{FlowDraft, FlowGraph};
pub use input::{DtmfConfig, FallbackTriggers, SequentialInput, SpeechConfig};
pub use validator::{MAX_ACTIONS, ValidationReport, Validator};
pub use value::Scalar;
