//! Diagnostics shared by every stage of the pipeline
//!
//! The lexer, parser and semantic analyzer never abort on bad input. They
//! record [`Diagnostic`]s instead and keep going. Analysis results are
//! gathered into an immutable [`SemanticReport`].

use serde::{Deserialize, Serialize};

use crate::parser::ast::Span;

// ============================================================================
// Severity
// ============================================================================

/// Severity levels for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational notice (e.g. a check deferred to runtime)
    Info,
    /// Should probably be fixed - potential bug
    Warning,
    /// Must be fixed - the script will misbehave
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

// ============================================================================
// Diagnostic Codes
// ============================================================================

/// Stable identifier for every kind of finding.
///
/// Codes are part of the public contract: hosts filter and suppress on them,
/// so variants are only ever added, never renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticCode {
    // Lexical
    BadIndentation,
    MixedIndentation,
    UnterminatedString,
    UnterminatedCommand,
    UnterminatedInterpolation,
    InvalidMetadata,
    InvalidEscape,
    UnexpectedCharacter,
    UnterminatedNode,

    // Syntactic
    UnexpectedToken,
    UnterminatedBlock,
    MissingNodeTitle,
    UnknownCommand,

    // Semantic
    DuplicateNode,
    UndefinedVariable,
    UndefinedSymbol,
    RedeclaredVariable,
    ShadowedHostVariable,
    ReadOnlyVariable,
    NonNumericOperand,
    DivisionByZero,
    ConditionType,
    NumericCondition,
    Unverified,
    OperatorType,
    EqualityMismatch,
    UnknownMember,
    UnknownFunction,
    ArityMismatch,
    ArgumentType,
    NotCallable,
    NotIndexable,
    UnknownJumpTarget,
    JumpCaseMismatch,
    SelfJump,

    // Runtime
    TypeMismatch,
    IndexOutOfBounds,
    KeyNotFound,
    InvalidDuration,
    Cancelled,
    ChoiceState,
    HostFailure,
}

impl DiagnosticCode {
    /// The kebab-case spelling used in reports and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::BadIndentation => "bad-indentation",
            DiagnosticCode::MixedIndentation => "mixed-indentation",
            DiagnosticCode::UnterminatedString => "unterminated-string",
            DiagnosticCode::UnterminatedCommand => "unterminated-command",
            DiagnosticCode::UnterminatedInterpolation => "unterminated-interpolation",
            DiagnosticCode::InvalidMetadata => "invalid-metadata",
            DiagnosticCode::InvalidEscape => "invalid-escape",
            DiagnosticCode::UnexpectedCharacter => "unexpected-character",
            DiagnosticCode::UnterminatedNode => "unterminated-node",
            DiagnosticCode::UnexpectedToken => "unexpected-token",
            DiagnosticCode::UnterminatedBlock => "unterminated-block",
            DiagnosticCode::MissingNodeTitle => "missing-node-title",
            DiagnosticCode::UnknownCommand => "unknown-command",
            DiagnosticCode::DuplicateNode => "duplicate-node",
            DiagnosticCode::UndefinedVariable => "undefined-variable",
            DiagnosticCode::UndefinedSymbol => "undefined-symbol",
            DiagnosticCode::RedeclaredVariable => "redeclared-variable",
            DiagnosticCode::ShadowedHostVariable => "shadowed-host-variable",
            DiagnosticCode::ReadOnlyVariable => "read-only-variable",
            DiagnosticCode::NonNumericOperand => "non-numeric-operand",
            DiagnosticCode::DivisionByZero => "division-by-zero",
            DiagnosticCode::ConditionType => "condition-type",
            DiagnosticCode::NumericCondition => "numeric-condition",
            DiagnosticCode::Unverified => "unverified",
            DiagnosticCode::OperatorType => "operator-type",
            DiagnosticCode::EqualityMismatch => "equality-mismatch",
            DiagnosticCode::UnknownMember => "unknown-member",
            DiagnosticCode::UnknownFunction => "unknown-function",
            DiagnosticCode::ArityMismatch => "arity-mismatch",
            DiagnosticCode::ArgumentType => "argument-type",
            DiagnosticCode::NotCallable => "not-callable",
            DiagnosticCode::NotIndexable => "not-indexable",
            DiagnosticCode::UnknownJumpTarget => "unknown-jump-target",
            DiagnosticCode::JumpCaseMismatch => "jump-case-mismatch",
            DiagnosticCode::SelfJump => "self-jump",
            DiagnosticCode::TypeMismatch => "type-mismatch",
            DiagnosticCode::IndexOutOfBounds => "index-out-of-bounds",
            DiagnosticCode::KeyNotFound => "key-not-found",
            DiagnosticCode::InvalidDuration => "invalid-duration",
            DiagnosticCode::Cancelled => "cancelled",
            DiagnosticCode::ChoiceState => "choice-state",
            DiagnosticCode::HostFailure => "host-failure",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Diagnostic
// ============================================================================

/// A single finding produced by lexing, parsing or analysis.
///
/// This type is independent of any output format (CLI, JSON, editor) so it
/// can be used by both the runtime and tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    /// Optional human-readable fix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new(
        code: DiagnosticCode,
        severity: Severity,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            span,
            suggestion: None,
        }
    }

    /// Create a new error
    pub fn error(code: DiagnosticCode, span: Span, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, span, message)
    }

    /// Create a new warning
    pub fn warning(code: DiagnosticCode, span: Span, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warning, span, message)
    }

    /// Create a new informational notice
    pub fn info(code: DiagnosticCode, span: Span, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Info, span, message)
    }

    /// Attach a fix suggestion
    pub fn with_suggestion(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }

    /// Check if this is an error (not a warning or notice)
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at line {}, col {}: {} [{}]",
            self.severity, self.span.line, self.span.column, self.message, self.code
        )?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

// ============================================================================
// Semantic Report
// ============================================================================

/// Ordered, append-only collection of diagnostics from one analysis run.
///
/// Once [`SemanticReport::from_diagnostics`] returns, the report is frozen:
/// there are no mutating methods, only queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticReport {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
    info_count: usize,
}

impl SemanticReport {
    pub fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        let count = |severity| diagnostics.iter().filter(|d| d.severity == severity).count();
        Self {
            error_count: count(Severity::Error),
            warning_count: count(Severity::Warning),
            info_count: count(Severity::Info),
            diagnostics,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.warning_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn info_count(&self) -> usize {
        self.info_count
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Diagnostics carrying a specific code
    pub fn with_code(&self, code: DiagnosticCode) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.code == code).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }
}

impl std::fmt::Display for SemanticReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for diagnostic in &self.diagnostics {
            writeln!(f, "{}", diagnostic)?;
        }
        write!(
            f,
            "{} error(s), {} warning(s), {} notice(s)",
            self.error_count, self.warning_count, self.info_count
        )
    }
}
