//! Static type inference for expressions
//!
//! `Any` is contagious: an arithmetic operator with an `Any` operand yields
//! `Any`, so an expression over unknown host values never infers to
//! `Error`. Comparisons and connectives stay `Boolean`, since they can
//! produce nothing else at runtime. `Error`
//! is reported once where it arises and then passes through silently.

use super::Checker;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::suggest::did_you_mean;
use crate::parser::ast::{BinaryOp, Expr, OpClass, Span, TextSegment, UnaryOp};
use crate::types::TypeInfo;

/// Type of an expression without a symbol table or diagnostics: literal
/// shapes only, everything else is `Any`
pub(crate) fn shallow_type(expr: &Expr) -> TypeInfo {
    match expr {
        Expr::Number { .. } => TypeInfo::Number,
        Expr::Boolean { .. } => TypeInfo::Boolean,
        Expr::Null { .. } => TypeInfo::Null,
        Expr::StringInterp { .. } => TypeInfo::String,
        Expr::Unary { op, operand, .. } => match (op, shallow_type(operand)) {
            (UnaryOp::Neg, TypeInfo::Number) => TypeInfo::Number,
            (UnaryOp::Not, TypeInfo::Boolean) => TypeInfo::Boolean,
            _ => TypeInfo::Any,
        },
        Expr::Binary {
            op, left, right, ..
        } => {
            let (l, r) = (shallow_type(left), shallow_type(right));
            match op.class() {
                OpClass::Arithmetic if *op == BinaryOp::Add && (l == TypeInfo::String || r == TypeInfo::String) => {
                    TypeInfo::String
                }
                OpClass::Arithmetic if l == TypeInfo::Number && r == TypeInfo::Number => TypeInfo::Number,
                OpClass::Relational | OpClass::Equality | OpClass::Logical => TypeInfo::Boolean,
                _ => TypeInfo::Any,
            }
        }
        _ => TypeInfo::Any,
    }
}

fn any_of(a: &TypeInfo, b: &TypeInfo) -> bool {
    a.is_any() || b.is_any()
}

impl<'a> Checker<'a> {
    pub(crate) fn infer(&mut self, expr: &Expr) -> TypeInfo {
        match expr {
            Expr::Number { .. } => TypeInfo::Number,
            Expr::Boolean { .. } => TypeInfo::Boolean,
            Expr::Null { .. } => TypeInfo::Null,
            Expr::StringInterp { segments, .. } => {
                for segment in segments {
                    if let TextSegment::Interpolation { expr, .. } = segment {
                        self.infer(expr);
                    }
                }
                TypeInfo::String
            }
            Expr::Variable { name, span } => self.infer_variable(name, *span),
            Expr::Identifier { name, span } => self.infer_identifier(name, *span),
            Expr::Unary { op, operand, span } => {
                let operand_type = self.infer(operand);
                self.unary_type(*op, operand_type, *span)
            }
            Expr::Binary {
                op,
                left,
                right,
                span,
            } => {
                let l = self.infer(left);
                let r = self.infer(right);
                self.binary_type(*op, l, r, right, *span)
            }
            Expr::Call { callee, args, span } => self.infer_call(callee, args, *span),
            Expr::Member {
                target,
                member,
                span,
            } => self.infer_member(target, member, *span),
            Expr::Index {
                target,
                index,
                span,
            } => self.infer_index(target, index, *span),
        }
    }

    fn infer_variable(&mut self, name: &str, span: Span) -> TypeInfo {
        if let Some(resolved) = self.resolve_variable(name) {
            return resolved.type_info();
        }
        let suggestion = self.variable_suggestion(name);
        self.report(
            Diagnostic::error(
                DiagnosticCode::UndefinedVariable,
                span,
                format!("Undefined variable '${}'", name),
            )
            .with_suggestion(suggestion),
        );
        TypeInfo::Error
    }

    /// Bare names resolve to host bindings first, then functions
    fn infer_identifier(&mut self, name: &str, span: Span) -> TypeInfo {
        if let Some(resolved) = self.resolve_variable(name) {
            return resolved.type_info();
        }
        if self.symbols.lookup_function(name).is_some() {
            return TypeInfo::Function;
        }
        let suggestion = self
            .variable_suggestion(name)
            .or_else(|| self.function_suggestion(name));
        self.report(
            Diagnostic::error(
                DiagnosticCode::UndefinedSymbol,
                span,
                format!("Unknown name '{}'", name),
            )
            .with_suggestion(suggestion),
        );
        TypeInfo::Error
    }

    fn unary_type(&mut self, op: UnaryOp, operand: TypeInfo, span: Span) -> TypeInfo {
        if !operand.is_concrete() {
            return operand;
        }
        match op {
            UnaryOp::Neg if operand == TypeInfo::Number => TypeInfo::Number,
            UnaryOp::Not if operand == TypeInfo::Boolean => TypeInfo::Boolean,
            UnaryOp::Neg => {
                self.error(
                    DiagnosticCode::OperatorType,
                    span,
                    format!("Operator '-' requires a Number, got {}", operand),
                );
                TypeInfo::Error
            }
            UnaryOp::Not => {
                self.error(
                    DiagnosticCode::OperatorType,
                    span,
                    format!("Operator '!' requires a Boolean, got {}", operand),
                );
                TypeInfo::Error
            }
        }
    }

    fn binary_type(
        &mut self,
        op: BinaryOp,
        l: TypeInfo,
        r: TypeInfo,
        right: &Expr,
        span: Span,
    ) -> TypeInfo {
        if matches!(op, BinaryOp::Div | BinaryOp::Mod) && right.is_literal_zero() {
            self.error(
                DiagnosticCode::DivisionByZero,
                right.span(),
                format!("Operator '{}' with a literal zero divisor", op.symbol()),
            );
        }

        if l.is_error() || r.is_error() {
            return TypeInfo::Error;
        }

        match op.class() {
            OpClass::Arithmetic => {
                if op == BinaryOp::Add && (l == TypeInfo::String || r == TypeInfo::String) {
                    return TypeInfo::String;
                }
                if op == BinaryOp::Add && any_of(&l, &r) {
                    return TypeInfo::Any;
                }
                self.require_operands(op, &l, &r, TypeInfo::Number, span)
            }
            // Comparisons and connectives yield a Boolean or fail at runtime
            OpClass::Relational => {
                match self.require_operands(op, &l, &r, TypeInfo::Number, span) {
                    TypeInfo::Error => TypeInfo::Error,
                    _ => TypeInfo::Boolean,
                }
            }
            OpClass::Logical => {
                match self.require_operands(op, &l, &r, TypeInfo::Boolean, span) {
                    TypeInfo::Error => TypeInfo::Error,
                    _ => TypeInfo::Boolean,
                }
            }
            OpClass::Equality => {
                if l.definitely_differs(&r) {
                    self.report(Diagnostic::warning(
                        DiagnosticCode::EqualityMismatch,
                        span,
                        format!(
                            "Comparing {} with {} with '{}' is always {}",
                            l,
                            r,
                            op.symbol(),
                            op == BinaryOp::Ne
                        ),
                    ));
                }
                TypeInfo::Boolean
            }
        }
    }

    /// Both operands must be `expected` (or unknown); the result is
    /// `expected`, or `Any` when an operand is unknown
    fn require_operands(
        &mut self,
        op: BinaryOp,
        l: &TypeInfo,
        r: &TypeInfo,
        expected: TypeInfo,
        span: Span,
    ) -> TypeInfo {
        let fits = |t: &TypeInfo| t.is_any() || *t == expected;
        if !fits(l) || !fits(r) {
            self.error(
                DiagnosticCode::OperatorType,
                span,
                format!(
                    "Operator '{}' requires {} operands, got {} and {}",
                    op.symbol(),
                    expected,
                    l,
                    r
                ),
            );
            return TypeInfo::Error;
        }
        if any_of(l, r) {
            TypeInfo::Any
        } else {
            expected
        }
    }

    fn infer_member(&mut self, target: &Expr, member: &str, span: Span) -> TypeInfo {
        let target_type = self.infer(target);
        match &target_type {
            TypeInfo::Error => TypeInfo::Error,
            TypeInfo::Any => {
                self.unverified(
                    span,
                    format!("Member '{}' of an unknown type is checked at runtime", member),
                );
                TypeInfo::Any
            }
            TypeInfo::Object(type_name) => {
                let symbols = self.symbols;
                let Some(members) = symbols.members_of(type_name) else {
                    self.unverified(
                        span,
                        format!(
                            "Type '{}' is not declared; member '{}' is checked at runtime",
                            type_name, member
                        ),
                    );
                    return TypeInfo::Any;
                };
                match members.iter().find(|m| m.name.eq_ignore_ascii_case(member)) {
                    Some(info) if info.is_method() => TypeInfo::Function,
                    Some(info) => TypeInfo::from_name(&info.type_name),
                    None => {
                        let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
                        let suggestion = did_you_mean(member, names, self.search());
                        self.unknown_member(&target_type, member, span, suggestion)
                    }
                }
            }
            TypeInfo::Array(_) | TypeInfo::Dictionary(_, _) => {
                let method = if matches!(target_type, TypeInfo::Array(_)) {
                    "contains"
                } else {
                    "contains_key"
                };
                if member.eq_ignore_ascii_case("count") {
                    TypeInfo::Number
                } else if member.eq_ignore_ascii_case(method) {
                    TypeInfo::Function
                } else {
                    let suggestion =
                        did_you_mean(member, ["count", method], self.search());
                    self.unknown_member(&target_type, member, span, suggestion)
                }
            }
            _ => self.unknown_member(&target_type, member, span, None),
        }
    }

    pub(crate) fn unknown_member(
        &mut self,
        target_type: &TypeInfo,
        member: &str,
        span: Span,
        suggestion: Option<String>,
    ) -> TypeInfo {
        self.report(
            Diagnostic::error(
                DiagnosticCode::UnknownMember,
                span,
                format!("'{}' has no member '{}'", target_type, member),
            )
            .with_suggestion(suggestion),
        );
        TypeInfo::Error
    }

    fn infer_index(&mut self, target: &Expr, index: &Expr, span: Span) -> TypeInfo {
        let target_type = self.infer(target);
        let index_type = self.infer(index);
        if target_type.is_error() || index_type.is_error() {
            return TypeInfo::Error;
        }
        if target_type.is_any() {
            self.unverified(span, "Indexing a value of unknown type is checked at runtime");
            return TypeInfo::Any;
        }

        let Some(element) = target_type.element_type() else {
            self.error(
                DiagnosticCode::NotIndexable,
                span,
                format!("{} is not indexable", target_type),
            );
            return TypeInfo::Error;
        };

        if let Some(key) = target_type.key_type() {
            if key.is_concrete() && index_type.is_concrete() && !index_type.is_compatible_with(&key) {
                self.error(
                    DiagnosticCode::TypeMismatch,
                    index.span(),
                    format!("{} index must be {}, got {}", target_type, key, index_type),
                );
                return TypeInfo::Error;
            }
        }
        element
    }
}
