//! Tests for expression evaluation

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::helpers::{context, eval};
use crate::errors::ErrorKind;
use crate::interpreter::{apply_binary, truthy, Interpreter};
use crate::parser::ast::BinaryOp;
use crate::runtime::registry::FunctionSignature;
use crate::runtime::{HostRecord, RuntimeValue};

fn interpreter() -> Interpreter {
    Interpreter::new(context())
}

/* ===================== Arithmetic ===================== */

#[tokio::test]
async fn test_precedence() {
    let interp = interpreter();
    assert_eq!(eval(&interp, "2 + 3 * 4").await.unwrap(), RuntimeValue::Number(14.0));
    assert_eq!(eval(&interp, "(2 + 3) * 4").await.unwrap(), RuntimeValue::Number(20.0));
    assert_eq!(eval(&interp, "10 % 4 - 1").await.unwrap(), RuntimeValue::Number(1.0));
}

#[tokio::test]
async fn test_variables_in_arithmetic() {
    let interp = interpreter();
    interp.context().variables().declare("gold", RuntimeValue::Number(7.0));

    assert_eq!(eval(&interp, "$gold * 2").await.unwrap(), RuntimeValue::Number(14.0));
    // Names are case-insensitive
    assert_eq!(eval(&interp, "$GOLD + 1").await.unwrap(), RuntimeValue::Number(8.0));
}

#[tokio::test]
async fn test_string_concatenation_uses_display_form() {
    let interp = interpreter();
    assert_eq!(
        eval(&interp, "\"a\" + 1").await.unwrap(),
        RuntimeValue::String("a1".to_string())
    );
    assert_eq!(
        eval(&interp, "2.5 + \" coins\"").await.unwrap(),
        RuntimeValue::String("2.5 coins".to_string())
    );
}

#[tokio::test]
async fn test_division_by_zero() {
    let interp = interpreter();
    interp.context().variables().declare("zero", RuntimeValue::Number(0.0));

    let err = eval(&interp, "10 / $zero").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::DivisionByZero);
    assert!(err.span.is_some());

    let err = eval(&interp, "10 % 0").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::DivisionByZero);
}

#[tokio::test]
async fn test_arithmetic_type_mismatch() {
    let interp = interpreter();
    let err = eval(&interp, "true * 2").await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TypeMismatch(_)), "got {:?}", err.kind);

    let err = eval(&interp, "-\"text\"").await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TypeMismatch(_)));
}

/* ===================== Comparison and logic ===================== */

#[tokio::test]
async fn test_relational_and_word_operators() {
    let interp = interpreter();
    interp.context().variables().declare("gold", RuntimeValue::Number(12.0));

    assert_eq!(eval(&interp, "$gold gte 10").await.unwrap(), RuntimeValue::Boolean(true));
    assert_eq!(eval(&interp, "$gold lt 10").await.unwrap(), RuntimeValue::Boolean(false));
    assert_eq!(eval(&interp, "$gold is 12").await.unwrap(), RuntimeValue::Boolean(true));
    assert_eq!(
        eval(&interp, "$gold > 1 and $gold < 20").await.unwrap(),
        RuntimeValue::Boolean(true)
    );
    assert_eq!(eval(&interp, "true xor true").await.unwrap(), RuntimeValue::Boolean(false));
}

#[tokio::test]
async fn test_cross_type_equality_is_false() {
    let interp = interpreter();
    assert_eq!(eval(&interp, "1 == \"1\"").await.unwrap(), RuntimeValue::Boolean(false));
    assert_eq!(eval(&interp, "null != 0").await.unwrap(), RuntimeValue::Boolean(true));
    assert_eq!(eval(&interp, "null == null").await.unwrap(), RuntimeValue::Boolean(true));
}

#[tokio::test]
async fn test_logical_operators_evaluate_both_sides() {
    let interp = interpreter();
    interp.context().variables().declare("flag", RuntimeValue::Boolean(false));

    // No short circuit: the right side still has to resolve
    let err = eval(&interp, "$flag and $missing").await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UndefinedVariable(ref name) if name == "missing"));

    let err = eval(&interp, "true or 1").await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TypeMismatch(_)));
}

#[test]
fn test_apply_binary_and_truthy() {
    let five = RuntimeValue::Number(5.0);
    let two = RuntimeValue::Number(2.0);
    assert_eq!(
        apply_binary(BinaryOp::Sub, &five, &two).unwrap(),
        RuntimeValue::Number(3.0)
    );
    assert_eq!(
        apply_binary(BinaryOp::Ne, &five, &two).unwrap(),
        RuntimeValue::Boolean(true)
    );

    assert!(truthy(&RuntimeValue::Number(2.0)).unwrap());
    assert!(!truthy(&RuntimeValue::Number(0.0)).unwrap());
    assert!(!truthy(&RuntimeValue::Boolean(false)).unwrap());
    assert!(truthy(&RuntimeValue::String("yes".into())).is_err());
    assert!(truthy(&RuntimeValue::Null).is_err());
}

/* ===================== Names and calls ===================== */

#[tokio::test]
async fn test_undefined_variable_suggests_nearest() {
    let interp = interpreter();
    interp.context().variables().declare("gold", RuntimeValue::Number(1.0));

    let err = eval(&interp, "$gld + 1").await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UndefinedVariable(_)));
    assert_eq!(err.suggestion.as_deref(), Some("did you mean 'gold'?"));
}

#[tokio::test]
async fn test_host_variable_by_bare_name() {
    let ctx = context();
    ctx.register_value("day", RuntimeValue::Number(3.0)).unwrap();
    let interp = Interpreter::new(ctx);

    assert_eq!(eval(&interp, "day + 1").await.unwrap(), RuntimeValue::Number(4.0));
    assert_eq!(eval(&interp, "$day").await.unwrap(), RuntimeValue::Number(3.0));

    let err = eval(&interp, "dya").await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UndefinedName(_)));
    assert_eq!(err.suggestion.as_deref(), Some("did you mean 'day'?"));
}

#[tokio::test]
async fn test_builtin_functions() {
    let interp = interpreter();
    assert_eq!(eval(&interp, "round(2.6)").await.unwrap(), RuntimeValue::Number(3.0));
    assert_eq!(eval(&interp, "max(2, 9)").await.unwrap(), RuntimeValue::Number(9.0));
    assert_eq!(eval(&interp, "number(\"42\")").await.unwrap(), RuntimeValue::Number(42.0));
    assert_eq!(eval(&interp, "len(\"four\")").await.unwrap(), RuntimeValue::Number(4.0));
    assert_eq!(
        eval(&interp, "visited(\"Start\")").await.unwrap(),
        RuntimeValue::Boolean(false)
    );
}

#[tokio::test]
async fn test_host_function_called_once_per_evaluation() {
    let ctx = context();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    ctx.register_sync(
        FunctionSignature::new("roll").param("sides", "Number").returns("Number"),
        move |args| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(args[0].clone())
        },
    )
    .unwrap();
    let interp = Interpreter::new(ctx);

    assert_eq!(eval(&interp, "roll(6) + 1").await.unwrap(), RuntimeValue::Number(7.0));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_arity_and_unknown_function() {
    let interp = interpreter();

    let err = eval(&interp, "round(1, 2)").await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ArityMismatch { .. }), "got {:?}", err.kind);

    let err = eval(&interp, "rond(1)").await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownFunction(_)));
    assert_eq!(err.suggestion.as_deref(), Some("did you mean 'round'?"));
}

#[tokio::test]
async fn test_async_host_function() {
    let ctx = context();
    ctx.register_async(
        FunctionSignature::new("fetch_name").returns("String"),
        |_args| async {
            tokio::task::yield_now().await;
            Ok(RuntimeValue::String("Ada".to_string()))
        },
    )
    .unwrap();
    let interp = Interpreter::new(ctx);

    assert_eq!(
        eval(&interp, "\"Hi \" + fetch_name()").await.unwrap(),
        RuntimeValue::String("Hi Ada".to_string())
    );
}

#[tokio::test]
async fn test_host_function_pending_is_cancelled() {
    let ctx = context();
    ctx.register_async(FunctionSignature::new("forever"), |_args| async {
        std::future::pending::<()>().await;
        Ok(RuntimeValue::Null)
    })
    .unwrap();
    let interp = Interpreter::new(ctx);

    let token = interp.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        token.cancel();
    });

    let err = eval(&interp, "forever()").await.unwrap_err();
    assert!(err.is_cancelled());
}

/* ===================== Members and indexing ===================== */

fn player() -> RuntimeValue {
    HostRecord::new("Player")
        .field("name", "Ada")
        .field_mut("level", 3)
        .method(
            FunctionSignature::new("heal").param("amount", "Number").returns("Number"),
            |args| Ok(RuntimeValue::Number(args[0].as_number().unwrap_or(0.0) * 2.0)),
        )
        .into_value()
}

#[tokio::test]
async fn test_member_access_and_method_call() {
    let ctx = context();
    ctx.register_value("player", player()).unwrap();
    let interp = Interpreter::new(ctx);

    assert_eq!(
        eval(&interp, "player.name").await.unwrap(),
        RuntimeValue::String("Ada".to_string())
    );
    assert_eq!(eval(&interp, "player.level + 1").await.unwrap(), RuntimeValue::Number(4.0));
    assert_eq!(eval(&interp, "player.heal(5)").await.unwrap(), RuntimeValue::Number(10.0));

    let err = eval(&interp, "player.nmae").await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownMember { .. }), "got {:?}", err.kind);
    assert_eq!(err.suggestion.as_deref(), Some("did you mean 'name'?"));
}

#[tokio::test]
async fn test_member_on_non_object() {
    let interp = interpreter();
    interp.context().variables().declare("gold", RuntimeValue::Number(1.0));

    let err = eval(&interp, "$gold.amount").await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownMember { .. }));
}

#[tokio::test]
async fn test_string_indexing() {
    let interp = interpreter();
    interp.context().variables().declare("word", RuntimeValue::String("abc".into()));
    interp.context().variables().declare("gold", RuntimeValue::Number(1.0));

    assert_eq!(
        eval(&interp, "$word[1]").await.unwrap(),
        RuntimeValue::String("b".to_string())
    );

    let err = eval(&interp, "$word[5]").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::IndexOutOfBounds { index: 5, len: 3 });

    let err = eval(&interp, "$gold[0]").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotIndexable("Number".to_string()));
}
