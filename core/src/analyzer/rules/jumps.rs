//! Rule: nodes and jumps
//!
//! Node titles are exact and case-sensitive. A jump whose target matches a
//! title only when case is ignored still resolves at runtime, but is
//! reported at the configured severity.

use std::collections::BTreeSet;

use super::super::symbols::HostSymbols;
use super::super::Checker;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::parser::ast::{Script, Span};
use crate::suggest::did_you_mean;

/// Every node name visible to jumps: script nodes plus host-registered ones
#[derive(Debug, Clone, Default)]
pub struct NodeTable {
    exact: BTreeSet<String>,
}

impl NodeTable {
    /// Collect node names, reporting titles that appear more than once
    pub fn collect(script: &Script, symbols: &HostSymbols, diagnostics: &mut Vec<Diagnostic>) -> Self {
        let mut first_seen: Vec<(&str, Span)> = Vec::new();
        let mut exact = BTreeSet::new();

        for node in &script.nodes {
            if let Some((_, span)) = first_seen.iter().find(|(name, _)| *name == node.name) {
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::DuplicateNode,
                    node.span,
                    format!("Node '{}' is already defined at line {}", node.name, span.line),
                ));
                continue;
            }
            first_seen.push((&node.name, node.span));
            exact.insert(node.name.clone());
        }

        exact.extend(symbols.nodes.iter().cloned());
        Self { exact }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.exact.contains(name)
    }

    /// The one node whose title equals `name` ignoring case
    pub fn case_insensitive(&self, name: &str) -> Option<&str> {
        let mut matches = self.exact.iter().filter(|n| n.eq_ignore_ascii_case(name));
        match (matches.next(), matches.next()) {
            (Some(found), None) => Some(found.as_str()),
            _ => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.exact.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}

impl<'a> Checker<'a> {
    pub(crate) fn check_jump(&mut self, target: &str, span: Span) {
        let nodes = self.nodes;

        if nodes.contains(target) {
            if target == self.current_node {
                let severity = self.config.self_jump;
                self.report_at(
                    severity,
                    DiagnosticCode::SelfJump,
                    span,
                    format!("Node '{}' jumps to itself", target),
                );
            }
            return;
        }

        if let Some(actual) = nodes.case_insensitive(target) {
            let severity = self.config.jump_case_mismatch;
            self.report(
                Diagnostic::new(
                    DiagnosticCode::JumpCaseMismatch,
                    severity,
                    span,
                    format!("Jump target '{}' differs in case from node '{}'", target, actual),
                )
                .with_suggestion(Some(format!("did you mean '{}'?", actual))),
            );
            return;
        }

        let suggestion = did_you_mean(target, nodes.names(), self.search().with_containment());
        self.report(
            Diagnostic::error(
                DiagnosticCode::UnknownJumpTarget,
                span,
                format!("Unknown node '{}'", target),
            )
            .with_suggestion(suggestion),
        );
    }
}
