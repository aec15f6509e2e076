//! Rule: variable commands
//!
//! ```text
//! <<var $gold = 0>>        // declares in the current scope
//! <<var $gold = 1>>        // error: already declared in this scope
//! <<set $gld = 5>>         // error: undefined, did you mean 'gold'?
//! <<add $name = 1>>        // error: $name is a String
//! <<div $gold = 0>>        // error: literal zero divisor
//! ```

use super::super::{declared_type, Checker, Resolved, VarInfo};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::parser::ast::{Expr, Span, VarOp};
use crate::types::TypeInfo;

impl<'a> Checker<'a> {
    pub(crate) fn check_var_command(&mut self, op: VarOp, name: &str, value: &Expr, span: Span) {
        // The value is checked before the target so `<<var $x = $x>>` is caught
        let value_type = self.infer(value);

        match op {
            VarOp::Declare => self.check_declare(name, value_type, span),
            VarOp::Set => self.check_set(name, value_type, span),
            _ => self.check_arithmetic(op, name, value, value_type, span),
        }
    }

    fn check_declare(&mut self, name: &str, value_type: TypeInfo, span: Span) {
        if self.symbols.lookup_variable(name).is_some() {
            self.error(
                DiagnosticCode::ShadowedHostVariable,
                span,
                format!("Variable '${}' shadows a host variable", name),
            );
            return;
        }

        let info = VarInfo {
            name: name.to_string(),
            type_info: declared_type(value_type),
            span,
        };
        if let Err(existing) = self.scopes.declare(info) {
            self.error(
                DiagnosticCode::RedeclaredVariable,
                span,
                format!(
                    "Variable '${}' is already declared at line {}",
                    name, existing.span.line
                ),
            );
        }
    }

    /// Resolve an assignment target, reporting undefined and read-only names
    fn assignment_target(&mut self, name: &str, span: Span) -> Option<Resolved> {
        let Some(resolved) = self.resolve_variable(name) else {
            let suggestion = self.variable_suggestion(name);
            self.report(
                Diagnostic::error(
                    DiagnosticCode::UndefinedVariable,
                    span,
                    format!("Undefined variable '${}'", name),
                )
                .with_suggestion(suggestion),
            );
            return None;
        };

        if let Resolved::Host(symbol) = &resolved {
            if !symbol.writable {
                self.error(
                    DiagnosticCode::ReadOnlyVariable,
                    span,
                    format!("Variable '${}' is read-only", symbol.name),
                );
                return None;
            }
        }
        Some(resolved)
    }

    fn check_set(&mut self, name: &str, value_type: TypeInfo, span: Span) {
        let Some(target) = self.assignment_target(name, span) else {
            return;
        };
        // Script variables are dynamically typed; once a different type is
        // assigned, stop assuming the declared one
        if let Resolved::Script(info) = target {
            if info.type_info.definitely_differs(&value_type) {
                self.scopes.widen(name);
            }
        }
    }

    fn check_arithmetic(
        &mut self,
        op: VarOp,
        name: &str,
        value: &Expr,
        value_type: TypeInfo,
        span: Span,
    ) {
        if matches!(op, VarOp::Div | VarOp::Mod) && value.is_literal_zero() {
            self.error(
                DiagnosticCode::DivisionByZero,
                value.span(),
                format!("'{}' by a literal zero", op.keyword()),
            );
        }

        let Some(target) = self.assignment_target(name, span) else {
            return;
        };

        let target_type = target.type_info();
        if !target_type.may_be_number() {
            self.error(
                DiagnosticCode::NonNumericOperand,
                span,
                format!(
                    "'{}' needs a Number variable, but '${}' is {}",
                    op.keyword(),
                    name,
                    target_type
                ),
            );
        }
        if !value_type.may_be_number() {
            self.error(
                DiagnosticCode::NonNumericOperand,
                value.span(),
                format!("'{}' needs a Number value, got {}", op.keyword(), value_type),
            );
        }
    }
}
