//! Runtime and registry errors

use thiserror::Error;

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::parser::ast::Span;

/// What went wrong while evaluating or executing
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    #[error("Undefined variable '${0}'")]
    UndefinedVariable(String),

    #[error("Unknown name '{0}'")]
    UndefinedName(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Unknown node '{0}'")]
    UnknownNode(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Index {index} is out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("Key {key} not found (key type is {key_type})")]
    KeyNotFound { key: String, key_type: String },

    #[error("'{type_name}' has no member '{member}'")]
    UnknownMember { type_name: String, member: String },

    #[error("Member '{member}' of '{type_name}' is read-only")]
    ReadOnlyMember { type_name: String, member: String },

    #[error("{0} is not callable")]
    NotCallable(String),

    #[error("{0} is not indexable")]
    NotIndexable(String),

    #[error("'{name}' expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("Variable '${0}' is already declared")]
    Redeclared(String),

    #[error("Variable '${0}' is read-only")]
    ReadOnlyVariable(String),

    #[error("Invalid wait duration: {0}")]
    InvalidDuration(String),

    #[error("Execution cancelled")]
    Cancelled,

    #[error("{0}")]
    ChoiceState(String),

    #[error("Host error: {0}")]
    Host(String),
}

impl ErrorKind {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            ErrorKind::UndefinedVariable(_) => DiagnosticCode::UndefinedVariable,
            ErrorKind::UndefinedName(_) => DiagnosticCode::UndefinedSymbol,
            ErrorKind::UnknownFunction(_) => DiagnosticCode::UnknownFunction,
            ErrorKind::UnknownNode(_) => DiagnosticCode::UnknownJumpTarget,
            ErrorKind::TypeMismatch(_) => DiagnosticCode::TypeMismatch,
            ErrorKind::DivisionByZero => DiagnosticCode::DivisionByZero,
            ErrorKind::IndexOutOfBounds { .. } => DiagnosticCode::IndexOutOfBounds,
            ErrorKind::KeyNotFound { .. } => DiagnosticCode::KeyNotFound,
            ErrorKind::UnknownMember { .. } => DiagnosticCode::UnknownMember,
            ErrorKind::ReadOnlyMember { .. } | ErrorKind::ReadOnlyVariable(_) => {
                DiagnosticCode::ReadOnlyVariable
            }
            ErrorKind::NotCallable(_) => DiagnosticCode::NotCallable,
            ErrorKind::NotIndexable(_) => DiagnosticCode::NotIndexable,
            ErrorKind::ArityMismatch { .. } => DiagnosticCode::ArityMismatch,
            ErrorKind::Redeclared(_) => DiagnosticCode::RedeclaredVariable,
            ErrorKind::InvalidDuration(_) => DiagnosticCode::InvalidDuration,
            ErrorKind::Cancelled => DiagnosticCode::Cancelled,
            ErrorKind::ChoiceState(_) => DiagnosticCode::ChoiceState,
            ErrorKind::Host(_) => DiagnosticCode::HostFailure,
        }
    }
}

/// A coded runtime error with an optional source position and fix
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}{}", location(.span))]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub span: Option<Span>,
    pub suggestion: Option<String>,
}

fn location(span: &Option<Span>) -> String {
    match span {
        Some(span) => format!(" (line {}, col {})", span.line, span.column),
        None => String::new(),
    }
}

impl RuntimeError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            span: None,
            suggestion: None,
        }
    }

    /// Attach a position unless a more precise one is already set
    pub fn at(mut self, span: Span) -> Self {
        self.span.get_or_insert(span);
        self
    }

    pub fn with_suggestion(mut self, suggestion: Option<String>) -> Self {
        if suggestion.is_some() {
            self.suggestion = suggestion;
        }
        self
    }

    pub fn code(&self) -> DiagnosticCode {
        self.kind.code()
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }

    /// A name that could not be resolved at all, as opposed to a value
    /// of the wrong shape
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::UndefinedVariable(_)
                | ErrorKind::UndefinedName(_)
                | ErrorKind::UnknownFunction(_)
                | ErrorKind::UnknownMember { .. }
        )
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch(message.into()))
    }

    pub fn host(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Host(message.into()))
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(
            self.code(),
            self.span.unwrap_or_default(),
            self.kind.to_string(),
        )
        .with_suggestion(self.suggestion.clone())
    }
}

impl From<ErrorKind> for RuntimeError {
    fn from(kind: ErrorKind) -> Self {
        RuntimeError::new(kind)
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Registration conflicts. Names are never silently overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("function '{name}' is already registered as {existing}")]
    DuplicateFunction { name: String, existing: String },

    #[error("variable '{name}' is already registered")]
    DuplicateVariable { name: String },

    #[error("node '{name}' is already registered")]
    DuplicateNode { name: String },

    #[error("invalid signature for '{name}': {reason}")]
    InvalidSignature { name: String, reason: String },
}
