//! Parley: an indentation-sensitive dialogue scripting language
//!
//! Source text flows through [`lexer`] → [`parser`] → [`analyzer`] before it
//! reaches the [`interpreter`], which evaluates against host state
//! registered in a [`runtime::DialogueContext`].

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod init;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod suggest;
pub mod types;

// Re-export main types
pub use analyzer::{symbols::HostSymbols, SemanticAnalyzer};
pub use diagnostics::{Diagnostic, DiagnosticCode, SemanticReport, Severity};
pub use errors::{ErrorKind, RegistryError, RuntimeError, RuntimeResult};
pub use interpreter::{ChoiceOption, DialogueEvent, DialogueRunner, Interpreter};
pub use parser::{parse_script, parse_source, ParseError, Parsed};
pub use runtime::{DialogueContext, RuntimeValue, Snapshot};
pub use types::TypeInfo;

// Re-export init API for convenience
pub use init::{initialize, InitBuilder, InitOptions};
