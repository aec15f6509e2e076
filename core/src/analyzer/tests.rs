//! Tests for the semantic analyzer

use super::*;
use crate::diagnostics::{Diagnostic, DiagnosticCode, SemanticReport, Severity};
use crate::parser::parse_script;
use crate::runtime::host::MemberInfo;
use crate::runtime::registry::FunctionSignature;
use crate::types::TypeInfo;

// ============================================================================
// Helper Functions
// ============================================================================

/// Wrap content lines in a single `Start` node
fn node(body: &str) -> String {
    format!("title: Start\n---\n{}\n===\n", body)
}

fn analyze_with(source: &str, symbols: &HostSymbols) -> SemanticReport {
    let script = parse_script(source).expect("Parse should succeed");
    analyze(&script, symbols)
}

fn analyze_source(source: &str) -> SemanticReport {
    analyze_with(source, &HostSymbols::builtins())
}

/// Check if the report contains a specific code
fn has_code(report: &SemanticReport, code: DiagnosticCode) -> bool {
    report.iter().any(|d| d.code == code)
}

/// Get diagnostics for a specific code
fn for_code(report: &SemanticReport, code: DiagnosticCode) -> Vec<&Diagnostic> {
    report.with_code(code)
}

fn game_symbols() -> HostSymbols {
    HostSymbols::builtins()
        .variable("health", TypeInfo::Number, true)
        .variable("day", TypeInfo::Number, false)
        .variable("mood", TypeInfo::Any, true)
        .variable("player", TypeInfo::Object("Player".to_string()), false)
        .function(
            FunctionSignature::new("give")
                .param("item", "String")
                .optional("count", "Number", None),
        )
        .object_type(
            "Player",
            vec![
                MemberInfo::field("name", "String", false),
                MemberInfo::field("level", "Number", true),
                MemberInfo::method(
                    FunctionSignature::new("heal")
                        .param("amount", "Number")
                        .returns("Number"),
                ),
            ],
        )
}

// ============================================================================
// Variables
// ============================================================================

#[test]
fn test_clean_script() {
    let report = analyze_source(&node(
        "<<var $gold = 10>>\n<<add $gold = 5>>\nMerchant: You have {$gold} coins.",
    ));
    assert!(report.is_clean(), "unexpected: {}", report);
}

#[test]
fn test_misspelled_set_target_reports_once_with_suggestion() {
    let report = analyze_source(&node("<<var $gold = 0>>\n<<set $gld = 5>>"));

    assert_eq!(report.error_count(), 1);
    let errors = for_code(&report, DiagnosticCode::UndefinedVariable);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].span.line, 4);
    assert_eq!(errors[0].suggestion.as_deref(), Some("did you mean 'gold'?"));
}

#[test]
fn test_undefined_variable_in_text() {
    let report = analyze_source(&node("<<var $name = \"Ann\">>\nHello, {$nme}!"));
    let errors = for_code(&report, DiagnosticCode::UndefinedVariable);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].suggestion.as_deref(), Some("did you mean 'name'?"));
}

#[test]
fn test_use_before_declaration() {
    let report = analyze_source(&node("<<set $x = 1>>\n<<var $x = 0>>"));
    assert!(has_code(&report, DiagnosticCode::UndefinedVariable));
}

#[test]
fn test_self_reference_in_declaration() {
    let report = analyze_source(&node("<<var $x = $x + 1>>"));
    assert!(has_code(&report, DiagnosticCode::UndefinedVariable));
}

#[test]
fn test_redeclaration_in_same_scope() {
    let report = analyze_source(&node("<<var $x = 1>>\n<<var $x = 2>>"));
    let errors = for_code(&report, DiagnosticCode::RedeclaredVariable);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("line 3"));
}

#[test]
fn test_branch_scope_ends_with_branch() {
    let source = node("<<if true>>\n    <<var $inner = 1>>\n<<endif>>\n<<set $inner = 2>>");
    let report = analyze_source(&source);
    assert_eq!(for_code(&report, DiagnosticCode::UndefinedVariable).len(), 1);
}

#[test]
fn test_inner_scope_may_redeclare_outer_name() {
    let source = node("<<var $x = 1>>\n<<if true>>\n    <<var $x = 2>>\n<<endif>>");
    let report = analyze_source(&source);
    assert!(!has_code(&report, DiagnosticCode::RedeclaredVariable));
}

#[test]
fn test_shadowing_host_variable() {
    let report = analyze_with(&node("<<var $Health = 3>>"), &game_symbols());
    assert_eq!(for_code(&report, DiagnosticCode::ShadowedHostVariable).len(), 1);
}

#[test]
fn test_read_only_host_variable() {
    let symbols = game_symbols();
    let report = analyze_with(&node("<<set $day = 2>>"), &symbols);
    assert_eq!(for_code(&report, DiagnosticCode::ReadOnlyVariable).len(), 1);

    let report = analyze_with(&node("<<set $health = 2>>"), &symbols);
    assert!(report.is_clean(), "unexpected: {}", report);
}

#[test]
fn test_arithmetic_needs_numbers() {
    let report = analyze_source(&node("<<var $name = \"Ann\">>\n<<add $name = 1>>"));
    assert_eq!(for_code(&report, DiagnosticCode::NonNumericOperand).len(), 1);

    let report = analyze_source(&node("<<var $n = 1>>\n<<mul $n = true>>"));
    assert_eq!(for_code(&report, DiagnosticCode::NonNumericOperand).len(), 1);
}

#[test]
fn test_literal_zero_divisor() {
    let report = analyze_source(&node("<<var $n = 10>>\n<<div $n = 0>>\n<<set $n = $n % 0>>"));
    assert_eq!(for_code(&report, DiagnosticCode::DivisionByZero).len(), 2);
}

#[test]
fn test_set_with_new_type_widens() {
    // After the string assignment the declared Number type no longer holds
    let source = node("<<var $x = 1>>\n<<set $x = \"one\">>\n<<var $y = $x - 1>>");
    let report = analyze_source(&source);
    assert!(!has_code(&report, DiagnosticCode::OperatorType));
}

#[test]
fn test_top_level_declarations_are_visible_in_other_nodes() {
    let source = "title: Start\n---\n<<var $gold = 0>>\n<<jump Shop>>\n===\n\ntitle: Shop\n---\n<<add $gold = 5>>\n===\n";
    let report = analyze_source(source);
    assert!(report.is_clean(), "unexpected: {}", report);
}

#[test]
fn test_branch_declarations_stay_local_to_node() {
    let source = "title: Start\n---\n<<if true>>\n    <<var $gold = 0>>\n<<endif>>\n===\n\ntitle: Shop\n---\n<<add $gold = 5>>\n===\n";
    let report = analyze_source(source);
    assert!(has_code(&report, DiagnosticCode::UndefinedVariable));
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_operator_types() {
    let report = analyze_source(&node("<<var $s = \"a\">>\n<<var $y = $s - 1>>"));
    assert_eq!(for_code(&report, DiagnosticCode::OperatorType).len(), 1);

    let report = analyze_source(&node("<<var $z = -\"a\">>"));
    assert_eq!(for_code(&report, DiagnosticCode::OperatorType).len(), 1);

    let report = analyze_source(&node("<<var $b = 1 and true>>"));
    assert_eq!(for_code(&report, DiagnosticCode::OperatorType).len(), 1);
}

#[test]
fn test_string_concatenation_is_allowed() {
    let report = analyze_source(&node("<<var $s = \"a\" + 1>>"));
    assert!(report.is_clean(), "unexpected: {}", report);
}

#[test]
fn test_errors_do_not_cascade() {
    // One undefined variable, no follow-on operator or condition errors
    let report = analyze_source(&node("<<if $missing + 1 > 2>>\n    Hi\n<<endif>>"));
    assert_eq!(report.error_count(), 1);
    assert!(has_code(&report, DiagnosticCode::UndefinedVariable));
}

#[test]
fn test_unknown_types_are_never_errors() {
    let source = node("<<var $x = $mood + 1>>\n<<var $y = $mood.anything[3]>>\n<<if $mood > $x>>\n    Hi\n<<endif>>");
    let report = analyze_with(&source, &game_symbols());
    assert!(!report.has_errors(), "unexpected: {}", report);
    assert!(has_code(&report, DiagnosticCode::Unverified));
}

#[test]
fn test_equality_mismatch_warns() {
    let report = analyze_source(&node("<<if \"a\" == 1>>\n    Hi\n<<endif>>"));
    let warnings = for_code(&report, DiagnosticCode::EqualityMismatch);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity, Severity::Warning);
}

#[test]
fn test_comparison_with_null_is_fine() {
    let report = analyze_source(&node("<<var $x = 1>>\n<<if $x == null>>\n    Hi\n<<endif>>"));
    assert!(!has_code(&report, DiagnosticCode::EqualityMismatch));
}

#[test]
fn test_unknown_bare_name() {
    let report = analyze_with(&node("<<var $x = helth>>"), &game_symbols());
    let errors = for_code(&report, DiagnosticCode::UndefinedSymbol);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].suggestion.as_deref(), Some("did you mean 'health'?"));
}

#[test]
fn test_host_members() {
    let symbols = game_symbols();

    let report = analyze_with(&node("<<var $n = $player.name + \"!\">>"), &symbols);
    assert!(report.is_clean(), "unexpected: {}", report);

    let report = analyze_with(&node("<<var $n = $player.nmae>>"), &symbols);
    let errors = for_code(&report, DiagnosticCode::UnknownMember);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].suggestion.as_deref(), Some("did you mean 'name'?"));
}

#[test]
fn test_not_indexable() {
    let report = analyze_source(&node("<<var $n = 5>>\n<<var $m = $n[0]>>"));
    assert_eq!(for_code(&report, DiagnosticCode::NotIndexable).len(), 1);
}

// ============================================================================
// Conditions
// ============================================================================

#[test]
fn test_numeric_condition_uses_configured_severity() {
    let source = node("<<var $n = 1>>\n<<if $n>>\n    Hi\n<<endif>>");
    let report = analyze_source(&source);
    let found = for_code(&report, DiagnosticCode::NumericCondition);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].severity, Severity::Warning);

    let strict = SemanticAnalyzer::new(AnalyzerConfig {
        numeric_condition: Severity::Error,
        ..AnalyzerConfig::default()
    });
    let script = parse_script(&source).expect("Parse should succeed");
    let report = strict.analyze(&script, None);
    assert!(report.has_errors());
}

#[test]
fn test_unknown_condition_is_unverified() {
    let report = analyze_with(&node("<<if $mood>>\n    Hi\n<<endif>>"), &game_symbols());
    let notices = for_code(&report, DiagnosticCode::Unverified);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].severity, Severity::Info);
    assert!(!report.has_errors());
}

#[test]
fn test_comparisons_of_unknown_values_are_boolean() {
    let symbols = game_symbols();
    for condition in ["$mood == 1", "$mood neq \"calm\"", "$mood > 1", "$mood and true"] {
        let source = node(&format!("<<if {}>>\n    Hi\n<<endif>>", condition));
        let report = analyze_with(&source, &symbols);
        assert!(report.is_clean(), "{}: {}", condition, report);
    }

    // Operand types are still checked
    let report = analyze_with(&node("<<if $mood > \"a\">>\n    Hi\n<<endif>>"), &symbols);
    assert!(has_code(&report, DiagnosticCode::OperatorType));
}

#[test]
fn test_string_condition_is_an_error() {
    let report = analyze_source(&node("-> Go <<if \"yes\">>\n-> Stay"));
    assert_eq!(for_code(&report, DiagnosticCode::ConditionType).len(), 1);
}

#[test]
fn test_elif_conditions_are_checked() {
    let source = node("<<if true>>\n    A\n<<elif \"no\">>\n    B\n<<endif>>");
    let report = analyze_source(&source);
    assert_eq!(for_code(&report, DiagnosticCode::ConditionType).len(), 1);
}

// ============================================================================
// Calls
// ============================================================================

#[test]
fn test_builtin_calls() {
    let source = node("<<var $x = round(2.5) + max(1, 2)>>\n<<if visited(\"Start\")>>\n    Again\n<<endif>>");
    let report = analyze_source(&source);
    assert!(report.is_clean(), "unexpected: {}", report);
}

#[test]
fn test_unknown_function_suggestion() {
    let report = analyze_with(&node("<<call gvie(\"sword\")>>"), &game_symbols());
    let errors = for_code(&report, DiagnosticCode::UnknownFunction);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].suggestion.as_deref(), Some("did you mean 'give'?"));
}

#[test]
fn test_arity_mismatch() {
    let symbols = game_symbols();

    let report = analyze_with(&node("<<var $x = round(1, 2)>>"), &symbols);
    let errors = for_code(&report, DiagnosticCode::ArityMismatch);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("expects 1"));

    // Optional parameter
    let report = analyze_with(&node("<<call give(\"sword\")>>\n<<call give(\"sword\", 2)>>"), &symbols);
    assert!(report.is_clean(), "unexpected: {}", report);

    let report = analyze_with(&node("<<call give()>>"), &symbols);
    let errors = for_code(&report, DiagnosticCode::ArityMismatch);
    assert!(errors[0].message.contains("1 to 2"));
}

#[test]
fn test_argument_types() {
    let report = analyze_source(&node("<<var $x = round(\"a\")>>"));
    assert_eq!(for_code(&report, DiagnosticCode::ArgumentType).len(), 1);

    let report = analyze_with(&node("<<var $x = $player.heal(\"lots\")>>"), &game_symbols());
    assert_eq!(for_code(&report, DiagnosticCode::ArgumentType).len(), 1);
}

#[test]
fn test_method_return_type_flows() {
    let source = node("<<var $hp = $player.heal(5)>>\n<<if $hp>>\n    Healed\n<<endif>>");
    let report = analyze_with(&source, &game_symbols());
    assert!(has_code(&report, DiagnosticCode::NumericCondition));
}

#[test]
fn test_calling_a_number() {
    let report = analyze_with(&node("<<call health()>>"), &game_symbols());
    assert_eq!(for_code(&report, DiagnosticCode::NotCallable).len(), 1);
}

#[test]
fn test_wait_duration() {
    let report = analyze_source(&node("<<wait -1>>"));
    assert_eq!(for_code(&report, DiagnosticCode::InvalidDuration).len(), 1);

    let report = analyze_source(&node("<<wait \"soon\">>"));
    assert_eq!(for_code(&report, DiagnosticCode::ArgumentType).len(), 1);

    let report = analyze_source(&node("<<wait 0.5>>"));
    assert!(report.is_clean(), "unexpected: {}", report);
}

// ============================================================================
// Nodes and jumps
// ============================================================================

#[test]
fn test_unknown_jump_suggests_containing_name() {
    let source = "title: Start\n---\n<<jump Missing>>\n===\n\ntitle: MissingNode\n---\nHere.\n===\n";
    let report = analyze_source(source);
    let errors = for_code(&report, DiagnosticCode::UnknownJumpTarget);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].suggestion.as_deref(), Some("did you mean 'MissingNode'?"));
}

#[test]
fn test_jump_case_mismatch() {
    let source = "title: Start\n---\n<<jump shop>>\n===\n\ntitle: Shop\n---\nHi\n===\n";
    let report = analyze_source(source);
    let found = for_code(&report, DiagnosticCode::JumpCaseMismatch);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].severity, Severity::Warning);
    assert!(!has_code(&report, DiagnosticCode::UnknownJumpTarget));
}

#[test]
fn test_self_jump() {
    let report = analyze_source(&node("Again?\n<<jump Start>>"));
    assert_eq!(for_code(&report, DiagnosticCode::SelfJump).len(), 1);
}

#[test]
fn test_host_nodes_are_jump_targets() {
    let symbols = HostSymbols::builtins().node("Credits");
    let report = analyze_with(&node("<<jump Credits>>"), &symbols);
    assert!(report.is_clean(), "unexpected: {}", report);
}

#[test]
fn test_duplicate_node() {
    let source = "title: Start\n---\nA\n===\n\ntitle: Start\n---\nB\n===\n";
    let report = analyze_source(source);
    let errors = for_code(&report, DiagnosticCode::DuplicateNode);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("line 1"));
}

// ============================================================================
// Analyzer
// ============================================================================

#[test]
fn test_analysis_is_cached() {
    let analyzer = SemanticAnalyzer::default();
    let script = parse_script(&node("<<set $gld = 5>>")).expect("Parse should succeed");

    let first = analyzer.analyze(&script, None);
    let second = analyzer.analyze(&script, None);
    assert_eq!(first, second);
    assert_eq!(analyzer.cache().len(), 1);

    // Different host symbols are a different key
    let symbols = HostSymbols::builtins().variable("gld", TypeInfo::Number, true);
    let third = analyzer.analyze(&script, Some(&symbols));
    assert!(third.is_clean());
    assert_eq!(analyzer.cache().len(), 2);
}

#[test]
fn test_rule_table_lists_every_semantic_code() {
    assert!(rules::RULES
        .iter()
        .any(|(code, _)| *code == DiagnosticCode::UnknownJumpTarget));
    assert_eq!(rules::RULES.len(), 24);
}
