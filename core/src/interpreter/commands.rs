//! Command execution
//!
//! Every command computes its result before touching the variable table,
//! so a failing command leaves the table exactly as it was. `jump` is the
//! only command with an output: the resolved target node name.

use std::time::Duration;

use tracing::debug;

use super::expressions::apply_binary;
use super::Interpreter;
use crate::errors::{ErrorKind, RuntimeError, RuntimeResult};
use crate::parser::ast::{BinaryOp, Command, Expr, VarOp};
use crate::runtime::RuntimeValue;
use crate::suggest::{did_you_mean, SuggestionSearch};

fn arithmetic_op(op: VarOp) -> Option<BinaryOp> {
    match op {
        VarOp::Add => Some(BinaryOp::Add),
        VarOp::Sub => Some(BinaryOp::Sub),
        VarOp::Mul => Some(BinaryOp::Mul),
        VarOp::Div => Some(BinaryOp::Div),
        VarOp::Mod => Some(BinaryOp::Mod),
        VarOp::Declare | VarOp::Set => None,
    }
}

impl Interpreter {
    pub async fn execute(&self, command: &Command) -> RuntimeResult<Option<String>> {
        match command {
            Command::Var {
                op,
                name,
                value,
                span,
            } => {
                self.execute_var(*op, name, value).await.map_err(|e| e.at(*span))?;
                Ok(None)
            }
            Command::Call { name, args, span } => {
                self.call_named(name, args, *span).await?;
                Ok(None)
            }
            Command::Wait { duration, span } => {
                let value = self.evaluate(duration).await?;
                let seconds = self.wait_seconds(&value).map_err(|e| e.at(*span))?;
                self.wait(seconds).await.map_err(|e| e.at(*span))?;
                Ok(None)
            }
            Command::Jump { target, span } => {
                let node = self.resolve_node(target).map_err(|e| e.at(*span))?;
                Ok(Some(node))
            }
        }
    }

    async fn execute_var(&self, op: VarOp, name: &str, value: &Expr) -> RuntimeResult<()> {
        let variables = self.ctx.variables();

        let Some(binary) = arithmetic_op(op) else {
            if op == VarOp::Declare {
                // Re-entering a node keeps the value it already has
                if variables.contains(name) {
                    return Ok(());
                }
                let value = self.evaluate(value).await?;
                variables.declare(name, value);
                return Ok(());
            }
            let value = self.evaluate(value).await?;
            return variables.set(name, value);
        };

        let current = variables.get(name)?;
        let operand = self.evaluate(value).await?;
        if current.as_number().is_none() || operand.as_number().is_none() {
            return Err(RuntimeError::type_mismatch(format!(
                "'{}' requires Number operands, got {} and {}",
                op.keyword(),
                current.type_name(),
                operand.type_name()
            )));
        }
        let updated = apply_binary(binary, &current, &operand)?;
        variables.set(name, updated)
    }

    fn wait_seconds(&self, value: &RuntimeValue) -> RuntimeResult<f64> {
        let seconds = value.as_number().ok_or_else(|| {
            RuntimeError::type_mismatch(format!(
                "wait duration must be a Number, got {}",
                value.type_name()
            ))
        })?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ErrorKind::InvalidDuration(format!("{} seconds", value)).into());
        }
        if seconds > self.config.max_wait_seconds {
            return Err(ErrorKind::InvalidDuration(format!(
                "{} seconds exceeds the limit of {}",
                value, self.config.max_wait_seconds
            ))
            .into());
        }
        Ok(seconds)
    }

    /// Sleep unless cancelled first
    async fn wait(&self, seconds: f64) -> RuntimeResult<()> {
        debug!(seconds, "Waiting");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ErrorKind::Cancelled.into()),
            _ = tokio::time::sleep(Duration::from_secs_f64(seconds)) => Ok(()),
        }
    }

    /// Exact node name, else a unique case-insensitive match
    pub(crate) fn resolve_node(&self, target: &str) -> RuntimeResult<String> {
        if let Some(node) = self.ctx.node(target) {
            return Ok(node.name.clone());
        }
        let names = self.ctx.node_names();
        Err(RuntimeError::new(ErrorKind::UnknownNode(target.to_string())).with_suggestion(
            did_you_mean(
                target,
                names.iter().map(String::as_str),
                SuggestionSearch::default().with_containment(),
            ),
        ))
    }
}
