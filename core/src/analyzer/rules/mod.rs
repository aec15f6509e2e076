//! Analysis rules
//!
//! Each file checks one kind of content:
//!
//! - `variables.rs` - `var`/`set`/arithmetic commands
//! - `conditions.rs` - `if`/`elif` and choice conditions
//! - `calls.rs` - function and method calls, `call` and `wait` commands
//! - `jumps.rs` - node table, duplicate nodes and `jump` targets
//!
//! Rules are methods on the checker so they share its scope stack and
//! type inference. The table below is what `parley check --rules` prints.

pub mod calls;
pub mod conditions;
pub mod jumps;
pub mod variables;

use crate::diagnostics::DiagnosticCode;

/// Every code the analyzer can emit, with a one-line description
pub const RULES: &[(DiagnosticCode, &str)] = &[
    (DiagnosticCode::DuplicateNode, "Node titles must be unique"),
    (DiagnosticCode::UndefinedVariable, "Variables must be declared before use"),
    (DiagnosticCode::UndefinedSymbol, "Bare names must be host variables or functions"),
    (DiagnosticCode::RedeclaredVariable, "A scope may declare a variable only once"),
    (DiagnosticCode::ShadowedHostVariable, "Script variables may not reuse host variable names"),
    (DiagnosticCode::ReadOnlyVariable, "Read-only host variables cannot be assigned"),
    (DiagnosticCode::NonNumericOperand, "Arithmetic commands need numeric targets and values"),
    (DiagnosticCode::DivisionByZero, "Division or modulus by a literal zero"),
    (DiagnosticCode::ConditionType, "Conditions must be Boolean"),
    (DiagnosticCode::NumericCondition, "Condition relies on numeric truthiness"),
    (DiagnosticCode::Unverified, "Check deferred to runtime because a type is unknown"),
    (DiagnosticCode::OperatorType, "Operator applied to operands of the wrong type"),
    (DiagnosticCode::EqualityMismatch, "Equality between types that can never match"),
    (DiagnosticCode::UnknownMember, "Member does not exist on the host type"),
    (DiagnosticCode::UnknownFunction, "Function is not registered"),
    (DiagnosticCode::ArityMismatch, "Wrong number of arguments"),
    (DiagnosticCode::ArgumentType, "Argument type does not match the parameter"),
    (DiagnosticCode::NotCallable, "Callee is not a function"),
    (DiagnosticCode::NotIndexable, "Indexed value is not a collection or string"),
    (DiagnosticCode::TypeMismatch, "Index type does not match the collection's key type"),
    (DiagnosticCode::InvalidDuration, "Wait duration is negative"),
    (DiagnosticCode::UnknownJumpTarget, "Jump target node does not exist"),
    (DiagnosticCode::JumpCaseMismatch, "Jump target differs from a node title only in case"),
    (DiagnosticCode::SelfJump, "Jump to the node that is currently running"),
];
