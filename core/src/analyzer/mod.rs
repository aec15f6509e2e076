//! Semantic analysis for dialogue scripts
//!
//! Runs after parsing to catch what the grammar can't: undefined
//! variables, operand type errors, bad jump targets and so on.
//!
//! # Usage
//!
//! ```ignore
//! use parley_core::analyzer::{SemanticAnalyzer, HostSymbols};
//!
//! let script = parse_script(source)?;
//! let report = SemanticAnalyzer::default().analyze(&script, Some(&HostSymbols::builtins()));
//! if report.has_errors() {
//!     // refuse to run
//! }
//! ```
//!
//! # Architecture
//!
//! Analysis is two passes over an immutable [`Script`]:
//!
//! 1. **Collect** every node name into the node table (duplicates are
//!    reported) and every variable declared at the top level of a node body.
//! 2. **Check** each node body with a [`ScopeStack`]: one scope for the body,
//!    nested scopes for branches and indented children. Each content kind is
//!    handed to the matching rule in [`rules`]; expression types come from
//!    the inference in `infer.rs`.
//!
//! Analysis never fails. Everything it finds goes into one
//! [`SemanticReport`] and the host decides what is blocking.

pub mod cache;
mod infer;
pub mod rules;
pub mod scope;
pub mod symbols;

#[cfg(test)]
mod tests;

use std::collections::HashSet;

use tracing::debug;

use crate::config::AnalyzerConfig;
use crate::diagnostics::{Diagnostic, DiagnosticCode, SemanticReport, Severity};
use crate::parser::ast::{Command, Content, NodeDefinition, Script, Span, TextSegment, VarOp};
use crate::suggest::{did_you_mean, SuggestionSearch};
use crate::types::TypeInfo;

pub use cache::AnalysisCache;
pub use rules::jumps::NodeTable;
pub use scope::{ScopeStack, VarInfo};
pub use symbols::{HostSymbols, VariableSymbol};

// ============================================================================
// SemanticAnalyzer
// ============================================================================

/// Analyzer with its configuration and report cache
pub struct SemanticAnalyzer {
    config: AnalyzerConfig,
    cache: AnalysisCache,
}

impl SemanticAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let cache = AnalysisCache::new(config.cache_capacity);
        Self { config, cache }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    /// Analyze against a host symbol snapshot; `None` means only the
    /// built-in functions are known. Results are memoized.
    pub fn analyze(&self, script: &Script, symbols: Option<&HostSymbols>) -> SemanticReport {
        let builtins;
        let symbols = match symbols {
            Some(symbols) => symbols,
            None => {
                builtins = HostSymbols::builtins();
                &builtins
            }
        };

        let key = cache::fingerprint(script, symbols, &self.config);
        if let Some(report) = key.as_ref().and_then(|key| self.cache.get(key)) {
            debug!(nodes = script.nodes.len(), "Analysis cache hit");
            return report;
        }

        let report = self.analyze_uncached(script, symbols);
        if let Some(key) = key {
            self.cache.insert(key, report.clone());
        }
        report
    }

    /// Analyze without consulting or filling the cache
    pub fn analyze_uncached(&self, script: &Script, symbols: &HostSymbols) -> SemanticReport {
        debug!(nodes = script.nodes.len(), "Starting semantic analysis");

        // Pass 1: node names and cross-node declarations
        let mut diagnostics = Vec::new();
        let nodes = NodeTable::collect(script, symbols, &mut diagnostics);
        let globals: Vec<Vec<VarInfo>> = script.nodes.iter().map(top_level_declarations).collect();

        // Pass 2: per-node checks
        for (index, node) in script.nodes.iter().enumerate() {
            let visible = globals
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != index)
                .flat_map(|(_, vars)| vars.iter().cloned());

            let mut checker = Checker {
                config: &self.config,
                symbols,
                nodes: &nodes,
                scopes: ScopeStack::with_globals(visible),
                current_node: node.name.clone(),
                diagnostics: Vec::new(),
            };
            checker.check_node(node);
            diagnostics.append(&mut checker.diagnostics);
        }

        let report = SemanticReport::from_diagnostics(diagnostics);
        debug!(
            errors = report.error_count(),
            warnings = report.warning_count(),
            notices = report.info_count(),
            "Semantic analysis finished"
        );
        report
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

/// Analyze with the default configuration and no cache
pub fn analyze(script: &Script, symbols: &HostSymbols) -> SemanticReport {
    SemanticAnalyzer::new(AnalyzerConfig {
        cache_capacity: 0,
        ..AnalyzerConfig::default()
    })
    .analyze_uncached(script, symbols)
}

/// Variables declared directly in a node body (not in branches or children)
fn top_level_declarations(node: &NodeDefinition) -> Vec<VarInfo> {
    node.content
        .iter()
        .filter_map(|item| match item {
            Content::Command {
                command:
                    Command::Var {
                        op: VarOp::Declare,
                        name,
                        value,
                        span,
                    },
            } => Some(VarInfo {
                name: name.clone(),
                type_info: declared_type(infer::shallow_type(value)),
                span: *span,
            }),
            _ => None,
        })
        .collect()
}

/// Type recorded for a declaration: unknowns and `null` start out as Any
fn declared_type(inferred: TypeInfo) -> TypeInfo {
    match inferred {
        TypeInfo::Null | TypeInfo::Error => TypeInfo::Any,
        other => other,
    }
}

// ============================================================================
// Checker - walks one node body
// ============================================================================

/// A variable reference resolved against scopes and host bindings
#[derive(Debug, Clone)]
pub(crate) enum Resolved {
    Script(VarInfo),
    Host(VariableSymbol),
}

impl Resolved {
    pub(crate) fn type_info(&self) -> TypeInfo {
        match self {
            Resolved::Script(info) => info.type_info.clone(),
            Resolved::Host(symbol) => symbol.type_info.clone(),
        }
    }
}

pub(crate) struct Checker<'a> {
    pub(crate) config: &'a AnalyzerConfig,
    pub(crate) symbols: &'a HostSymbols,
    pub(crate) nodes: &'a NodeTable,
    pub(crate) scopes: ScopeStack,
    pub(crate) current_node: String,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl<'a> Checker<'a> {
    fn check_node(&mut self, node: &NodeDefinition) {
        self.scopes.push();
        self.check_block(&node.content);
        self.scopes.pop();
    }

    fn check_block(&mut self, items: &[Content]) {
        for item in items {
            self.check_content(item);
        }
    }

    fn check_scoped(&mut self, items: &[Content]) {
        if items.is_empty() {
            return;
        }
        self.scopes.push();
        self.check_block(items);
        self.scopes.pop();
    }

    fn check_content(&mut self, item: &Content) {
        match item {
            Content::Dialogue { text, children, .. } => {
                self.check_segments(text);
                self.check_scoped(children);
            }
            Content::Choice {
                text,
                condition,
                children,
                ..
            } => {
                self.check_segments(text);
                if let Some(condition) = condition {
                    self.check_condition(condition);
                }
                self.check_scoped(children);
            }
            Content::Condition {
                cond,
                then,
                elifs,
                else_branch,
                ..
            } => {
                self.check_condition(cond);
                self.check_scoped(then);
                for (elif_cond, branch) in elifs {
                    self.check_condition(elif_cond);
                    self.check_scoped(branch);
                }
                if let Some(branch) = else_branch {
                    self.check_scoped(branch);
                }
            }
            Content::Command { command } => self.check_command(command),
        }
    }

    fn check_command(&mut self, command: &Command) {
        match command {
            Command::Var {
                op,
                name,
                value,
                span,
            } => self.check_var_command(*op, name, value, *span),
            Command::Call { name, args, span } => {
                self.infer_named_call(name, args, *span);
            }
            Command::Wait { duration, span } => self.check_wait(duration, *span),
            Command::Jump { target, span } => self.check_jump(target, *span),
        }
    }

    pub(crate) fn check_segments(&mut self, segments: &[TextSegment]) {
        for segment in segments {
            if let TextSegment::Interpolation { expr, .. } = segment {
                self.infer(expr);
            }
        }
    }

    /* ===================== Shared helpers ===================== */

    pub(crate) fn search(&self) -> SuggestionSearch {
        SuggestionSearch::within(self.config.suggestion_distance)
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn error(&mut self, code: DiagnosticCode, span: Span, message: impl Into<String>) {
        self.report(Diagnostic::error(code, span, message));
    }

    /// Report at a configured severity
    pub(crate) fn report_at(
        &mut self,
        severity: Severity,
        code: DiagnosticCode,
        span: Span,
        message: impl Into<String>,
    ) {
        self.report(Diagnostic::new(code, severity, span, message));
    }

    pub(crate) fn unverified(&mut self, span: Span, message: impl Into<String>) {
        let severity = self.config.unverified;
        self.report_at(severity, DiagnosticCode::Unverified, span, message);
    }

    pub(crate) fn resolve_variable(&self, name: &str) -> Option<Resolved> {
        if let Some(info) = self.scopes.lookup(name) {
            return Some(Resolved::Script(info.clone()));
        }
        self.symbols
            .lookup_variable(name)
            .map(|symbol| Resolved::Host(symbol.clone()))
    }

    /// "did you mean" over every visible variable
    pub(crate) fn variable_suggestion(&self, name: &str) -> Option<String> {
        let mut candidates: Vec<&str> = self.scopes.names();
        candidates.extend(self.symbols.variables.values().map(|s| s.name.as_str()));
        let mut seen = HashSet::new();
        candidates.retain(|c| seen.insert(c.to_lowercase()));
        did_you_mean(name, candidates, self.search())
    }

    pub(crate) fn function_suggestion(&self, name: &str) -> Option<String> {
        did_you_mean(
            name,
            self.symbols.functions.values().map(|s| s.name.as_str()),
            self.search(),
        )
    }
}
