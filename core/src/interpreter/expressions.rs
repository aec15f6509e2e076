//! Expression evaluation
//!
//! Direct structural recursion over [`Expr`]. Both operands of a binary
//! operator are always evaluated, logical ones included. Subtrees with no
//! names or calls take a synchronous constant fold instead of the boxed
//! async path.

use std::sync::Arc;

use super::{EvalFuture, Interpreter};
use crate::errors::{ErrorKind, RuntimeError, RuntimeResult};
use crate::parser::ast::{BinaryOp, Expr, OpClass, Span, TextSegment, UnaryOp};
use crate::runtime::host::HostFunction;
use crate::runtime::value::HostHandle;
use crate::runtime::RuntimeValue;
use crate::suggest::{did_you_mean, SuggestionSearch};

// ============================================================================
// Operators
// ============================================================================

pub fn apply_unary(op: UnaryOp, value: &RuntimeValue) -> RuntimeResult<RuntimeValue> {
    match (op, value) {
        (UnaryOp::Neg, RuntimeValue::Number(n)) => Ok(RuntimeValue::Number(-n)),
        (UnaryOp::Not, RuntimeValue::Boolean(b)) => Ok(RuntimeValue::Boolean(!b)),
        (UnaryOp::Neg, other) => Err(RuntimeError::type_mismatch(format!(
            "operator '-' requires a Number, got {}",
            other.type_name()
        ))),
        (UnaryOp::Not, other) => Err(RuntimeError::type_mismatch(format!(
            "operator '!' requires a Boolean, got {}",
            other.type_name()
        ))),
    }
}

fn operand_error(op: BinaryOp, expected: &str, left: &RuntimeValue, right: &RuntimeValue) -> RuntimeError {
    RuntimeError::type_mismatch(format!(
        "operator '{}' requires {} operands, got {} and {}",
        op.symbol(),
        expected,
        left.type_name(),
        right.type_name()
    ))
}

pub fn apply_binary(op: BinaryOp, left: &RuntimeValue, right: &RuntimeValue) -> RuntimeResult<RuntimeValue> {
    use RuntimeValue::{Boolean, Number};

    match op.class() {
        OpClass::Equality => {
            let equal = left == right;
            Ok(Boolean(if op == BinaryOp::Eq { equal } else { !equal }))
        }
        OpClass::Arithmetic => {
            // `+` with a string on either side concatenates display forms
            if op == BinaryOp::Add
                && (matches!(left, RuntimeValue::String(_)) || matches!(right, RuntimeValue::String(_)))
            {
                return Ok(RuntimeValue::String(format!("{}{}", left, right)));
            }
            let (Number(a), Number(b)) = (left, right) else {
                return Err(operand_error(op, "Number", left, right));
            };
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div | BinaryOp::Mod if *b == 0.0 => {
                    return Err(ErrorKind::DivisionByZero.into())
                }
                BinaryOp::Div => a / b,
                _ => a % b,
            };
            Ok(Number(result))
        }
        OpClass::Relational => {
            let (Number(a), Number(b)) = (left, right) else {
                return Err(operand_error(op, "Number", left, right));
            };
            let result = match op {
                BinaryOp::Lt => a < b,
                BinaryOp::Lte => a <= b,
                BinaryOp::Gt => a > b,
                _ => a >= b,
            };
            Ok(Boolean(result))
        }
        OpClass::Logical => {
            let (Boolean(a), Boolean(b)) = (left, right) else {
                return Err(operand_error(op, "Boolean", left, right));
            };
            let result = match op {
                BinaryOp::And => *a && *b,
                BinaryOp::Or => *a || *b,
                _ => a ^ b,
            };
            Ok(Boolean(result))
        }
    }
}

/// Condition truthiness: Booleans, or Numbers where zero is false
pub fn truthy(value: &RuntimeValue) -> RuntimeResult<bool> {
    match value {
        RuntimeValue::Boolean(b) => Ok(*b),
        RuntimeValue::Number(n) => Ok(*n != 0.0),
        other => Err(RuntimeError::type_mismatch(format!(
            "condition must be Boolean, got {}",
            other.type_name()
        ))),
    }
}

/// Evaluate a constant subtree without touching the context
fn fold(expr: &Expr) -> RuntimeResult<RuntimeValue> {
    let value = match expr {
        Expr::Number { value, .. } => RuntimeValue::Number(*value),
        Expr::Boolean { value, .. } => RuntimeValue::Boolean(*value),
        Expr::Null { .. } => RuntimeValue::Null,
        Expr::StringInterp { segments, .. } => {
            let mut out = String::new();
            for segment in segments {
                match segment {
                    TextSegment::Literal { text } => out.push_str(text),
                    TextSegment::Interpolation { expr, .. } => out.push_str(&fold(expr)?.to_string()),
                }
            }
            RuntimeValue::String(out)
        }
        Expr::Unary { op, operand, span } => {
            apply_unary(*op, &fold(operand)?).map_err(|e| e.at(*span))?
        }
        Expr::Binary {
            op,
            left,
            right,
            span,
        } => apply_binary(*op, &fold(left)?, &fold(right)?).map_err(|e| e.at(*span))?,
        other => {
            return Err(RuntimeError::host(format!(
                "expression at line {} is not constant",
                other.span().line
            )))
        }
    };
    Ok(value)
}

// ============================================================================
// Evaluation
// ============================================================================

impl Interpreter {
    pub fn evaluate<'a>(&'a self, expr: &'a Expr) -> EvalFuture<'a> {
        Box::pin(async move {
            if expr.is_constant() {
                return fold(expr);
            }

            match expr {
                Expr::Number { value, .. } => Ok(RuntimeValue::Number(*value)),
                Expr::Boolean { value, .. } => Ok(RuntimeValue::Boolean(*value)),
                Expr::Null { .. } => Ok(RuntimeValue::Null),
                Expr::StringInterp { segments, .. } => {
                    Ok(RuntimeValue::String(self.render_strict(segments).await?))
                }
                Expr::Variable { name, span } => {
                    self.ctx.variables().get(name).map_err(|e| e.at(*span))
                }
                Expr::Identifier { name, span } => self.resolve_identifier(name).map_err(|e| e.at(*span)),
                Expr::Unary { op, operand, span } => {
                    let value = self.evaluate(operand).await?;
                    apply_unary(*op, &value).map_err(|e| e.at(*span))
                }
                Expr::Binary {
                    op,
                    left,
                    right,
                    span,
                } => {
                    let l = self.evaluate(left).await?;
                    let r = self.evaluate(right).await?;
                    apply_binary(*op, &l, &r).map_err(|e| e.at(*span))
                }
                Expr::Call { callee, args, span } => self.evaluate_call(callee, args, *span).await,
                Expr::Member {
                    target,
                    member,
                    span,
                } => {
                    let value = self.evaluate(target).await?;
                    self.member(&value, member).map_err(|e| e.at(*span))
                }
                Expr::Index {
                    target,
                    index,
                    span,
                } => {
                    let value = self.evaluate(target).await?;
                    let key = self.evaluate(index).await?;
                    index_value(&value, &key).map_err(|e| e.at(*span))
                }
            }
        })
    }

    /// Bare names: host bindings first, then functions as values
    fn resolve_identifier(&self, name: &str) -> RuntimeResult<RuntimeValue> {
        let variables = self.ctx.variables();
        if variables.contains(name) {
            return variables.get(name);
        }
        if let Some(entry) = self.ctx.functions().get(name) {
            return Ok(entry.to_value());
        }

        let mut candidates = variables.names();
        candidates.extend(self.ctx.functions().names());
        Err(RuntimeError::new(ErrorKind::UndefinedName(name.to_string())).with_suggestion(
            did_you_mean(
                name,
                candidates.iter().map(String::as_str),
                SuggestionSearch::default(),
            ),
        ))
    }

    async fn evaluate_args(&self, args: &[Expr]) -> RuntimeResult<Vec<RuntimeValue>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.evaluate(arg).await?);
        }
        Ok(values)
    }

    async fn evaluate_call(&self, callee: &Expr, args: &[Expr], span: Span) -> RuntimeResult<RuntimeValue> {
        match callee {
            Expr::Identifier { name, .. } => self.call_named(name, args, span).await,
            Expr::Member { target, member, .. } => {
                let target = self.evaluate(target).await?;
                let args = self.evaluate_args(args).await?;
                self.call_method(&target, member, args).await.map_err(|e| e.at(span))
            }
            other => {
                let callee = self.evaluate(other).await?;
                let args = self.evaluate_args(args).await?;
                self.call_value(&callee, args).await.map_err(|e| e.at(span))
            }
        }
    }

    /// Call by name: registered functions first, then a callable variable
    pub(crate) async fn call_named(&self, name: &str, args: &[Expr], span: Span) -> RuntimeResult<RuntimeValue> {
        let functions = self.ctx.functions();
        let variables = self.ctx.variables();

        if !functions.contains(name) && variables.contains(name) {
            let callee = variables.get(name).map_err(|e| e.at(span))?;
            let args = self.evaluate_args(args).await?;
            return self.call_value(&callee, args).await.map_err(|e| e.at(span));
        }

        let entry = functions.resolve(name).map_err(|e| e.at(span))?;
        let args = self.evaluate_args(args).await?;
        let call = entry.invoke(args).map_err(|e| e.at(span))?;
        self.await_host(call).await.map_err(|e| e.at(span))
    }

    async fn call_value(&self, callee: &RuntimeValue, args: Vec<RuntimeValue>) -> RuntimeResult<RuntimeValue> {
        match callee {
            RuntimeValue::Object(handle) if handle.object().is_callable() => {
                self.await_host(handle.object().invoke(args)).await
            }
            other => Err(ErrorKind::NotCallable(other.type_name()).into()),
        }
    }

    async fn call_method(
        &self,
        target: &RuntimeValue,
        method: &str,
        args: Vec<RuntimeValue>,
    ) -> RuntimeResult<RuntimeValue> {
        let handle = object_of(target, method)?;
        let members = self.ctx.members().members_of(handle.object());
        let info = members.resolve(method)?;
        if info.is_method() {
            self.await_host(handle.object().call(&info.name, args)).await
        } else {
            // A field holding a function value
            let field = handle.object().get(&info.name)?;
            self.call_value(&field, args).await
        }
    }

    /// Member read; methods come back bound to their object
    fn member(&self, target: &RuntimeValue, member: &str) -> RuntimeResult<RuntimeValue> {
        let handle = object_of(target, member)?;
        let members = self.ctx.members().members_of(handle.object());
        let info = members.resolve(member)?;

        match &info.signature {
            Some(signature) if info.is_method() => {
                let object = Arc::clone(&handle.0);
                let name = info.name.clone();
                let bound = HostFunction::new(
                    signature.clone(),
                    Arc::new(move |args| object.call(&name, args)),
                );
                Ok(bound.into_value())
            }
            _ => handle.object().get(&info.name),
        }
    }
}

fn object_of<'v>(target: &'v RuntimeValue, member: &str) -> RuntimeResult<&'v HostHandle> {
    target.as_object().ok_or_else(|| {
        ErrorKind::UnknownMember {
            type_name: target.type_name(),
            member: member.to_string(),
        }
        .into()
    })
}

/// Strings index to one-character strings; host collections do their own
fn index_value(target: &RuntimeValue, key: &RuntimeValue) -> RuntimeResult<RuntimeValue> {
    match target {
        RuntimeValue::String(s) => {
            let n = key.as_number().ok_or_else(|| {
                RuntimeError::type_mismatch(format!(
                    "string index must be a Number, got {}",
                    key.type_name()
                ))
            })?;
            let len = s.chars().count();
            if n.fract() != 0.0 || n < 0.0 || n >= len as f64 {
                return Err(ErrorKind::IndexOutOfBounds {
                    index: n as i64,
                    len,
                }
                .into());
            }
            Ok(s.chars()
                .nth(n as usize)
                .map(|c| RuntimeValue::String(c.to_string()))
                .unwrap_or(RuntimeValue::Null))
        }
        RuntimeValue::Object(handle) => handle.object().index(key),
        other => Err(ErrorKind::NotIndexable(other.type_name()).into()),
    }
}
