//! Tern - a tree-walking execution engine
//!
//! Tern runs syntax trees of a small dynamically-typed language with
//! first-class closures, aliasing containers and loop `else` clauses. The
//! trees come from a front end outside this crate, either built in Rust (see
//! [`builder`]) or loaded from JSON/YAML.

pub mod ast;
pub mod builder;
pub mod config;
pub mod control;
pub mod driver;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod numeric;
pub mod operators;
pub mod output;
pub mod stack;
pub mod value;

use std::path::Path;

use anyhow::{bail, Context, Result};

// Re-export commonly used types
pub use ast::{Expression, Module, Statement};
pub use config::RuntimeConfig;
pub use driver::{exit_status, run_program, RunOutcome};
pub use error::{ErrorKind, EvalResult, RuntimeError};
pub use evaluator::Interpreter;
pub use output::{BufferOutput, Output, StdoutOutput};
pub use value::Value;

/// Tern version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Serialized program formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramFormat {
    Json,
    Yaml,
}

impl ProgramFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(ProgramFormat::Json),
            Some("yaml") | Some("yml") => Ok(ProgramFormat::Yaml),
            Some(other) => bail!("Unsupported program format: .{}", other),
            None => bail!("Cannot tell program format of {}", path.display()),
        }
    }
}

/// Parse a serialized program
pub fn parse_program(input: &str, format: ProgramFormat) -> Result<Module> {
    match format {
        ProgramFormat::Json => serde_json::from_str(input).context("Invalid JSON program"),
        ProgramFormat::Yaml => serde_yaml::from_str(input).context("Invalid YAML program"),
    }
}

/// Load a program from a `.json`, `.yaml` or `.yml` file
pub fn load_program<P: AsRef<Path>>(path: P) -> Result<Module> {
    let path = path.as_ref();
    let format = ProgramFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    parse_program(&content, format).with_context(|| format!("Failed to load {}", path.display()))
}

/// Serialize a program
pub fn dump_program(module: &Module, format: ProgramFormat) -> Result<String> {
    match format {
        ProgramFormat::Json => {
            serde_json::to_string_pretty(module).context("Failed to serialize program")
        }
        ProgramFormat::Yaml => serde_yaml::to_string(module).context("Failed to serialize program"),
    }
}
