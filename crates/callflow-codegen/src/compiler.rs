//! Flow compiler
//!
//! Parses flow definitions, lowers them through the builder and renders the
//! flow document. Compiled flows stay in memory; writing them anywhere is up
//! to the caller.

use std::path::Path;

use callflow_core::config::CONFIG_FILE;
use callflow_core::document::digest;
use callflow_core::{CompileOptions, FlowBuilder, FlowDocument, SemanticWarning};

use crate::error::{Error, Result};
use crate::ir::FlowIR;
use crate::lower::lower_steps;
use crate::parser::Parser;

/// Flow compiler
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
    parser: Parser,
}

impl Compiler {
    /// Create a new compiler with the given options
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            parser: Parser::new(),
        }
    }

    /// Options every flow is compiled with
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile a flow YAML file
    pub fn compile_file(&self, flow_path: impl AsRef<Path>) -> Result<CompiledFlow> {
        let flow_path = flow_path.as_ref();
        tracing::info!("Compiling flow: {}", flow_path.display());

        let ir = self.parser.parse_file(flow_path)?;
        self.compile_ir(&ir)
    }

    /// Compile a flow from YAML text
    pub fn compile_str(&self, yaml: &str) -> Result<CompiledFlow> {
        let ir = self.parser.parse_yaml(yaml)?;
        self.compile_ir(&ir)
    }

    /// Compile parsed IR
    pub fn compile_ir(&self, ir: &FlowIR) -> Result<CompiledFlow> {
        let mut options = self.options.clone();
        if let Some(version) = &ir.version {
            options.version = version.clone();
        }

        let mut builder = FlowBuilder::with_options(options);
        lower_steps(&mut builder, &ir.steps).map_err(|source| Error::Usage {
            flow: ir.name.clone(),
            source,
        })?;
        let graph = builder.build().map_err(|source| Error::Build {
            flow: ir.name.clone(),
            source,
        })?;

        let document = FlowDocument::from_graph(&graph);
        let json = document.to_json_pretty()?;
        let hash = digest(&json);
        tracing::info!(
            "Compiled flow '{}': {} action(s), {} warning(s)",
            ir.name,
            graph.len(),
            graph.warnings().len()
        );

        Ok(CompiledFlow {
            name: ir.name.clone(),
            document,
            json,
            hash,
            warnings: graph.warnings().to_vec(),
        })
    }

    /// Compile all flows in a directory, in path order
    ///
    /// Picks up `*.yaml` and `*.yml` files recursively and skips the options
    /// file. A directory that cannot be walked is an I/O error.
    pub fn compile_all(&self, flows_dir: impl AsRef<Path>) -> Result<Vec<CompiledFlow>> {
        let flows_dir = flows_dir.as_ref();
        let mut results = Vec::new();

        for entry in walkdir::WalkDir::new(flows_dir).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            let is_flow = entry.file_type().is_file()
                && entry.file_name() != CONFIG_FILE
                && entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == "yaml" || ext == "yml");
            if is_flow {
                results.push(self.compile_file(entry.path())?);
            }
        }

        tracing::debug!("Compiled {} flow(s) from {}", results.len(), flows_dir.display());
        Ok(results)
    }
}

/// A compiled flow document
#[derive(Debug, Clone)]
pub struct CompiledFlow {
    /// Flow name
    pub name: String,

    /// Document model
    pub document: FlowDocument,

    /// Indented JSON rendering of the document
    pub json: String,

    /// SHA-256 of `json`
    pub hash: String,

    /// Warnings that did not block the build
    pub warnings: Vec<SemanticWarning>,
}

impl CompiledFlow {
    /// Size of the rendered document in bytes
    pub fn size(&self) -> usize {
        self.json.len()
    }
}
