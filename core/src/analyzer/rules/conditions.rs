//! Rule: conditions
//!
//! `if`/`elif` blocks and choice guards must be Boolean. A Number is
//! accepted with a configurable diagnostic (zero is false), and a value of
//! unknown type is deferred to runtime with an "unverified" notice.

use super::super::Checker;
use crate::diagnostics::DiagnosticCode;
use crate::parser::ast::Expr;
use crate::types::TypeInfo;

impl<'a> Checker<'a> {
    pub(crate) fn check_condition(&mut self, cond: &Expr) {
        let span = cond.span();
        match self.infer(cond) {
            TypeInfo::Boolean | TypeInfo::Error => {}
            TypeInfo::Number => {
                let severity = self.config.numeric_condition;
                self.report_at(
                    severity,
                    DiagnosticCode::NumericCondition,
                    span,
                    "Condition is a Number; 0 is false and anything else is true",
                );
            }
            TypeInfo::Any => {
                self.unverified(span, "Condition type is unknown; checked at runtime");
            }
            other => {
                self.error(
                    DiagnosticCode::ConditionType,
                    span,
                    format!("Condition must be Boolean, got {}", other),
                );
            }
        }
    }
}
