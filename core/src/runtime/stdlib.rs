//! Built-in functions available to every script
//!
//! Registered by [`DialogueContext::with_builtins`](super::DialogueContext::with_builtins).
//! Argument counts are checked against the signatures before these run, so
//! the bodies only validate argument kinds.

use super::context::VisitCounter;
use super::registry::{FunctionSignature, FunctionTable};
use super::value::RuntimeValue;
use crate::errors::{RegistryError, RuntimeError, RuntimeResult};

/// Signatures of every built-in, in registration order
pub fn signatures() -> Vec<FunctionSignature> {
    let unary = |name: &str| {
        FunctionSignature::new(name)
            .param("x", "Number")
            .returns("Number")
    };
    let binary = |name: &str| {
        FunctionSignature::new(name)
            .param("a", "Number")
            .param("b", "Number")
            .returns("Number")
    };
    vec![
        FunctionSignature::new("visited")
            .param("node", "String")
            .returns("Boolean"),
        FunctionSignature::new("visit_count")
            .param("node", "String")
            .returns("Number"),
        FunctionSignature::new("string").param("x", "Any").returns("String"),
        FunctionSignature::new("number").param("x", "Any").returns("Number"),
        FunctionSignature::new("bool").param("x", "Any").returns("Boolean"),
        unary("round"),
        unary("floor"),
        unary("ceil"),
        unary("abs"),
        binary("min"),
        binary("max"),
        FunctionSignature::new("len").param("x", "Any").returns("Number"),
    ]
}

/// Register every built-in into `functions`
pub fn register(functions: &FunctionTable, visits: &VisitCounter) -> Result<(), RegistryError> {
    for signature in signatures() {
        let name = signature.name.clone();
        match name.as_str() {
            "visited" => {
                let visits = visits.clone();
                functions.register_sync(signature, move |args| {
                    let node = string_arg("visited", &args[0])?;
                    Ok(RuntimeValue::Boolean(visits.count(node) > 0))
                })?;
            }
            "visit_count" => {
                let visits = visits.clone();
                functions.register_sync(signature, move |args| {
                    let node = string_arg("visit_count", &args[0])?;
                    Ok(RuntimeValue::Number(visits.count(node) as f64))
                })?;
            }
            "string" => {
                functions.register_sync(signature, |args| Ok(args[0].to_string().into()))?;
            }
            "number" => functions.register_sync(signature, |args| to_number(&args[0]))?,
            "bool" => functions.register_sync(signature, |args| to_bool(&args[0]))?,
            "round" => functions.register_sync(signature, |args| map_number("round", &args[0], f64::round))?,
            "floor" => functions.register_sync(signature, |args| map_number("floor", &args[0], f64::floor))?,
            "ceil" => functions.register_sync(signature, |args| map_number("ceil", &args[0], f64::ceil))?,
            "abs" => functions.register_sync(signature, |args| map_number("abs", &args[0], f64::abs))?,
            "min" => functions.register_sync(signature, |args| {
                let (a, b) = (number_arg("min", &args[0])?, number_arg("min", &args[1])?);
                Ok(RuntimeValue::Number(a.min(b)))
            })?,
            "max" => functions.register_sync(signature, |args| {
                let (a, b) = (number_arg("max", &args[0])?, number_arg("max", &args[1])?);
                Ok(RuntimeValue::Number(a.max(b)))
            })?,
            "len" => functions.register_sync(signature, |args| length(&args[0]))?,
            _ => {}
        }
    }
    Ok(())
}

fn string_arg<'a>(function: &str, value: &'a RuntimeValue) -> RuntimeResult<&'a str> {
    value.as_str().ok_or_else(|| {
        RuntimeError::type_mismatch(format!(
            "{}() expects a String, got {}",
            function,
            value.type_name()
        ))
    })
}

fn number_arg(function: &str, value: &RuntimeValue) -> RuntimeResult<f64> {
    value.as_number().ok_or_else(|| {
        RuntimeError::type_mismatch(format!(
            "{}() expects a Number, got {}",
            function,
            value.type_name()
        ))
    })
}

fn map_number(function: &str, value: &RuntimeValue, f: fn(f64) -> f64) -> RuntimeResult<RuntimeValue> {
    Ok(RuntimeValue::Number(f(number_arg(function, value)?)))
}

fn to_number(value: &RuntimeValue) -> RuntimeResult<RuntimeValue> {
    match value {
        RuntimeValue::Number(n) => Ok(RuntimeValue::Number(*n)),
        RuntimeValue::Boolean(b) => Ok(RuntimeValue::Number(if *b { 1.0 } else { 0.0 })),
        RuntimeValue::String(s) => s.trim().parse::<f64>().map(RuntimeValue::Number).map_err(|_| {
            RuntimeError::type_mismatch(format!("number() cannot convert \"{}\"", s))
        }),
        other => Err(RuntimeError::type_mismatch(format!(
            "number() cannot convert {}",
            other.type_name()
        ))),
    }
}

fn to_bool(value: &RuntimeValue) -> RuntimeResult<RuntimeValue> {
    match value {
        RuntimeValue::Boolean(b) => Ok(RuntimeValue::Boolean(*b)),
        RuntimeValue::Number(n) => Ok(RuntimeValue::Boolean(*n != 0.0)),
        RuntimeValue::Null => Ok(RuntimeValue::Boolean(false)),
        RuntimeValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(RuntimeValue::Boolean(true)),
            "false" => Ok(RuntimeValue::Boolean(false)),
            _ => Err(RuntimeError::type_mismatch(format!(
                "bool() cannot convert \"{}\"",
                s
            ))),
        },
        RuntimeValue::Object(_) => Err(RuntimeError::type_mismatch(format!(
            "bool() cannot convert {}",
            value.type_name()
        ))),
    }
}

fn length(value: &RuntimeValue) -> RuntimeResult<RuntimeValue> {
    let len = match value {
        RuntimeValue::String(s) => Some(s.chars().count()),
        RuntimeValue::Object(handle) => handle.object().len(),
        _ => None,
    };
    len.map(|n| RuntimeValue::Number(n as f64)).ok_or_else(|| {
        RuntimeError::type_mismatch(format!(
            "len() expects a String or collection, got {}",
            value.type_name()
        ))
    })
}
