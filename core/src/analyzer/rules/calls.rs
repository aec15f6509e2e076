//! Rule: calls and waits
//!
//! Named calls resolve against the host function table; method calls
//! against the declared members of the target's host type. Arity is checked
//! against the signature and argument types against parameter types when
//! both are known.

use super::super::Checker;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::parser::ast::{Expr, Span, UnaryOp};
use crate::runtime::registry::FunctionSignature;
use crate::suggest::did_you_mean;
use crate::types::TypeInfo;

impl<'a> Checker<'a> {
    pub(crate) fn infer_call(&mut self, callee: &Expr, args: &[Expr], span: Span) -> TypeInfo {
        match callee {
            // Plain names go straight to the function table
            Expr::Identifier { name, .. } => self.infer_named_call(name, args, span),
            Expr::Member { target, member, .. } => self.infer_method_call(target, member, args, span),
            other => {
                let callee_type = self.infer(other);
                self.infer_args(args);
                match callee_type {
                    TypeInfo::Error => TypeInfo::Error,
                    TypeInfo::Any => {
                        self.unverified(span, "Callee of unknown type is checked at runtime");
                        TypeInfo::Any
                    }
                    TypeInfo::Function => TypeInfo::Any,
                    not_callable => {
                        self.error(
                            DiagnosticCode::NotCallable,
                            span,
                            format!("{} is not callable", not_callable),
                        );
                        TypeInfo::Error
                    }
                }
            }
        }
    }

    pub(crate) fn infer_named_call(&mut self, name: &str, args: &[Expr], span: Span) -> TypeInfo {
        let symbols = self.symbols;
        if let Some(signature) = symbols.lookup_function(name) {
            return self.check_arguments(signature, args, span);
        }

        self.infer_args(args);
        if let Some(resolved) = self.resolve_variable(name) {
            return match resolved.type_info() {
                TypeInfo::Any | TypeInfo::Function => {
                    self.unverified(span, format!("Call through '{}' is checked at runtime", name));
                    TypeInfo::Any
                }
                other => {
                    self.error(
                        DiagnosticCode::NotCallable,
                        span,
                        format!("'{}' is {} and not callable", name, other),
                    );
                    TypeInfo::Error
                }
            };
        }

        let suggestion = self.function_suggestion(name);
        self.report(
            Diagnostic::error(
                DiagnosticCode::UnknownFunction,
                span,
                format!("Unknown function '{}'", name),
            )
            .with_suggestion(suggestion),
        );
        TypeInfo::Error
    }

    fn infer_method_call(
        &mut self,
        target: &Expr,
        member: &str,
        args: &[Expr],
        span: Span,
    ) -> TypeInfo {
        let target_type = self.infer(target);
        let symbols = self.symbols;

        match &target_type {
            TypeInfo::Object(type_name) => {
                let Some(members) = symbols.members_of(type_name) else {
                    self.infer_args(args);
                    self.unverified(
                        span,
                        format!("Type '{}' is not declared; '{}' is checked at runtime", type_name, member),
                    );
                    return TypeInfo::Any;
                };
                match members.iter().find(|m| m.name.eq_ignore_ascii_case(member)) {
                    Some(info) => match &info.signature {
                        Some(signature) if info.is_method() => {
                            self.check_arguments(signature, args, span)
                        }
                        _ => {
                            self.infer_args(args);
                            self.error(
                                DiagnosticCode::NotCallable,
                                span,
                                format!("'{}.{}' is a field, not a method", type_name, info.name),
                            );
                            TypeInfo::Error
                        }
                    },
                    None => {
                        self.infer_args(args);
                        let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
                        let suggestion = did_you_mean(member, names, self.search());
                        self.unknown_member(&target_type, member, span, suggestion)
                    }
                }
            }
            TypeInfo::Array(_) if member.eq_ignore_ascii_case("contains") => {
                self.infer_args(args);
                self.check_arity("contains", 1, args.len(), span)
            }
            TypeInfo::Dictionary(_, _) if member.eq_ignore_ascii_case("contains_key") => {
                self.infer_args(args);
                self.check_arity("contains_key", 1, args.len(), span)
            }
            _ => {
                let member_type = self.method_on(&target_type, member, span);
                self.infer_args(args);
                match member_type {
                    TypeInfo::Error => TypeInfo::Error,
                    _ => TypeInfo::Any,
                }
            }
        }
    }

    /// Method lookup on anything that is not a declared host object
    fn method_on(&mut self, target_type: &TypeInfo, member: &str, span: Span) -> TypeInfo {
        match target_type {
            TypeInfo::Error => TypeInfo::Error,
            TypeInfo::Any => {
                self.unverified(
                    span,
                    format!("Method '{}' of an unknown type is checked at runtime", member),
                );
                TypeInfo::Any
            }
            _ => self.unknown_member(target_type, member, span, None),
        }
    }

    fn check_arity(&mut self, name: &str, expected: usize, got: usize, span: Span) -> TypeInfo {
        if got != expected {
            self.error(
                DiagnosticCode::ArityMismatch,
                span,
                format!("'{}' expects {} argument(s), got {}", name, expected, got),
            );
            return TypeInfo::Error;
        }
        TypeInfo::Boolean
    }

    fn infer_args(&mut self, args: &[Expr]) -> Vec<TypeInfo> {
        args.iter().map(|arg| self.infer(arg)).collect()
    }

    /// Check a call against a signature; yields the declared return type
    fn check_arguments(&mut self, signature: &FunctionSignature, args: &[Expr], span: Span) -> TypeInfo {
        let arg_types = self.infer_args(args);

        if !signature.accepts(args.len()) {
            self.error(
                DiagnosticCode::ArityMismatch,
                span,
                format!(
                    "'{}' expects {} argument(s), got {}",
                    signature.name,
                    signature.expected_arity(),
                    args.len()
                ),
            );
            return TypeInfo::Error;
        }

        for (position, (arg, arg_type)) in args.iter().zip(&arg_types).enumerate() {
            let expected = signature.param_type(position);
            if arg_type.definitely_differs(&expected) {
                let param = signature
                    .params
                    .get(position)
                    .map(|p| p.name.as_str())
                    .unwrap_or("argument");
                self.error(
                    DiagnosticCode::ArgumentType,
                    arg.span(),
                    format!(
                        "Argument '{}' of '{}' must be {}, got {}",
                        param, signature.name, expected, arg_type
                    ),
                );
            }
        }

        signature.return_type_info()
    }

    pub(crate) fn check_wait(&mut self, duration: &Expr, span: Span) {
        match self.infer(duration) {
            TypeInfo::Number => {
                if is_negative_literal(duration) {
                    self.error(
                        DiagnosticCode::InvalidDuration,
                        duration.span(),
                        "Wait duration must not be negative",
                    );
                }
            }
            TypeInfo::Error => {}
            TypeInfo::Any => self.unverified(span, "Wait duration type is checked at runtime"),
            other => self.error(
                DiagnosticCode::ArgumentType,
                duration.span(),
                format!("Wait duration must be a Number of seconds, got {}", other),
            ),
        }
    }
}

fn is_negative_literal(expr: &Expr) -> bool {
    match expr {
        Expr::Number { value, .. } => *value < 0.0,
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
            ..
        } => matches!(operand.as_ref(), Expr::Number { value, .. } if *value > 0.0),
        _ => false,
    }
}
