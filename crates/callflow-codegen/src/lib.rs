//! Callflow Code Generation
//!
//! This crate handles the YAML → flow document compilation pipeline.
//!
//! # Pipeline Overview
//!
//! ```text
//! ┌─────────┐     ┌─────────┐     ┌─────────┐     ┌──────────┐
//! │  YAML   │────▶│   IR    │────▶│  Graph  │────▶│   JSON   │
//! │  Flow   │     │ (Parse) │     │ (Lower) │     │(Document)│
//! └─────────┘     └─────────┘     └─────────┘     └──────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use callflow_codegen::Compiler;
//! use callflow_core::CompileOptions;
//!
//! let compiler = Compiler::new(CompileOptions::load("./ivr")?);
//! for flow in compiler.compile_all("./ivr/flows")? {
//!     println!("{}: {}", flow.name, flow.hash);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod compiler;
pub mod error;
pub mod ir;
pub mod lower;
pub mod parser;

pub use compiler::{CompiledFlow, Compiler};
pub use error::{Error, Result};
pub use ir::FlowIR;
pub use parser::Parser;
