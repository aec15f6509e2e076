//! Tests for the parser

use super::ast::*;
use super::*;

// ============================================================================
// Helper Functions
// ============================================================================

const SAMPLE: &str = r#"title: Start
tags: intro
---
Alice: Hello, {$name}! #greeting
-> Ask about the weather <<if $curious>> #q
    Alice: It's sunny.
-> Leave
<<if $gold gte 10>>
    Bob: Rich!
<<elif $gold > 0>>
    Bob: Some.
<<else>>
    Bob: Broke.
<<endif>>
<<set $gold = $gold - 1>>
<<call give("sword", 2)>>
<<wait 1.5>>
<<jump End>>
===

title: End
---
The end.
===
"#;

fn parse_ok(source: &str) -> Script {
    parse_script(source).expect("Parse should succeed")
}

/// Parse a single expression through a `set` command
fn expr(source: &str) -> Expr {
    let script = parse_ok(&format!("title: T\n---\n<<set $x = {}>>\n===", source));
    match &script.nodes[0].content[0] {
        Content::Command {
            command: Command::Var { value, .. },
        } => value.clone(),
        other => panic!("expected a set command, got {:?}", other),
    }
}

fn codes(parsed: &Parsed) -> Vec<DiagnosticCode> {
    parsed.diagnostics.iter().map(|d| d.code).collect()
}

fn literal(text: &str) -> TextSegment {
    TextSegment::Literal {
        text: text.to_string(),
    }
}

// ============================================================================
// Nodes and content
// ============================================================================

#[test]
fn test_nodes_and_metadata() {
    let script = parse_ok(SAMPLE);
    assert_eq!(script.nodes.len(), 2);

    let start = &script.nodes[0];
    assert_eq!(start.name, "Start");
    assert_eq!(start.meta("tags"), Some("intro"));
    assert_eq!(start.metadata[0], ("title".to_string(), "Start".to_string()));
    assert_eq!(start.span, Span::new(1, 1));
    assert_eq!(start.content.len(), 8);

    assert!(script.node("End").is_some());
}

#[test]
fn test_dialogue_line() {
    let script = parse_ok(SAMPLE);
    match &script.nodes[0].content[0] {
        Content::Dialogue {
            speaker,
            text,
            tags,
            children,
            span,
        } => {
            assert_eq!(speaker.as_deref(), Some("Alice"));
            assert_eq!(text.len(), 3);
            assert_eq!(text[0], literal("Hello, "));
            assert!(matches!(
                &text[1],
                TextSegment::Interpolation { expr: Expr::Variable { name, .. }, .. } if name == "name"
            ));
            assert_eq!(text[2], literal("!"));
            assert_eq!(tags, &vec!["greeting".to_string()]);
            assert!(children.is_empty());
            assert_eq!(*span, Span::new(4, 1));
        }
        other => panic!("expected dialogue, got {:?}", other),
    }
}

#[test]
fn test_choices() {
    let script = parse_ok(SAMPLE);
    let content = &script.nodes[0].content;

    match &content[1] {
        Content::Choice {
            text,
            condition,
            tags,
            children,
            ..
        } => {
            assert_eq!(text, &vec![literal("Ask about the weather")]);
            assert!(matches!(condition, Some(Expr::Variable { name, .. }) if name == "curious"));
            assert_eq!(tags, &vec!["q".to_string()]);
            assert_eq!(children.len(), 1);
            assert!(matches!(
                &children[0],
                Content::Dialogue { speaker: Some(s), .. } if s == "Alice"
            ));
        }
        other => panic!("expected choice, got {:?}", other),
    }

    match &content[2] {
        Content::Choice {
            text,
            condition,
            children,
            ..
        } => {
            assert_eq!(text, &vec![literal("Leave")]);
            assert!(condition.is_none());
            assert!(children.is_empty());
        }
        other => panic!("expected choice, got {:?}", other),
    }
}

#[test]
fn test_condition_block() {
    let script = parse_ok(SAMPLE);
    match &script.nodes[0].content[3] {
        Content::Condition {
            cond,
            then,
            elifs,
            else_branch,
            ..
        } => {
            assert!(matches!(cond, Expr::Binary { op: BinaryOp::Gte, .. }));
            assert_eq!(then.len(), 1);
            assert_eq!(elifs.len(), 1);
            assert!(matches!(elifs[0].0, Expr::Binary { op: BinaryOp::Gt, .. }));
            assert_eq!(else_branch.as_ref().map(|b| b.len()), Some(1));
        }
        other => panic!("expected condition, got {:?}", other),
    }
}

#[test]
fn test_commands() {
    let script = parse_ok(SAMPLE);
    let content = &script.nodes[0].content;

    assert!(matches!(
        &content[4],
        Content::Command { command: Command::Var { op: VarOp::Set, name, value: Expr::Binary { op: BinaryOp::Sub, .. }, .. } }
            if name == "gold"
    ));
    match &content[5] {
        Content::Command {
            command: Command::Call { name, args, .. },
        } => {
            assert_eq!(name, "give");
            assert_eq!(args.len(), 2);
            assert!(matches!(&args[0], Expr::StringInterp { segments, .. } if segments == &vec![literal("sword")]));
        }
        other => panic!("expected call, got {:?}", other),
    }
    assert!(matches!(
        &content[6],
        Content::Command { command: Command::Wait { duration: Expr::Number { value, .. }, .. } }
            if *value == 1.5
    ));
    assert!(matches!(
        &content[7],
        Content::Command { command: Command::Jump { target, .. } } if target == "End"
    ));
}

#[test]
fn test_var_operations() {
    let source = "title: T\n---\n<<var $a = 1>>\n<<add $a 2>>\n<<sub $a = 1>>\n<<mul $a = 3>>\n<<div $a = 2>>\n<<mod $a = 5>>\n===";
    let script = parse_ok(source);
    let ops: Vec<VarOp> = script.nodes[0]
        .content
        .iter()
        .filter_map(|c| match c {
            Content::Command {
                command: Command::Var { op, .. },
            } => Some(*op),
            _ => None,
        })
        .collect();
    assert_eq!(
        ops,
        vec![
            VarOp::Declare,
            VarOp::Add,
            VarOp::Sub,
            VarOp::Mul,
            VarOp::Div,
            VarOp::Mod
        ]
    );
}

#[test]
fn test_nested_children() {
    let source = "title: T\n---\nA\n    B\n        C\n    D\nE\n===";
    let script = parse_ok(source);
    let content = &script.nodes[0].content;
    assert_eq!(content.len(), 2);

    match &content[0] {
        Content::Dialogue { children, .. } => {
            assert_eq!(children.len(), 2);
            match &children[0] {
                Content::Dialogue { children, .. } => assert_eq!(children.len(), 1),
                other => panic!("expected dialogue, got {:?}", other),
            }
        }
        other => panic!("expected dialogue, got {:?}", other),
    }
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_multiplication_binds_tighter() {
    match expr("2 + 3 * 4") {
        Expr::Binary {
            op: BinaryOp::Add,
            left,
            right,
            ..
        } => {
            assert!(matches!(*left, Expr::Number { value, .. } if value == 2.0));
            assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_left_associativity() {
    match expr("10 - 4 - 3") {
        Expr::Binary {
            op: BinaryOp::Sub,
            left,
            right,
            ..
        } => {
            assert!(matches!(*left, Expr::Binary { op: BinaryOp::Sub, .. }));
            assert!(matches!(*right, Expr::Number { value, .. } if value == 3.0));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_logical_precedence_and_word_aliases() {
    // or < and < equality < comparison
    match expr("$a or $b and $c eq 1 lt 2") {
        Expr::Binary {
            op: BinaryOp::Or,
            right,
            ..
        } => match *right {
            Expr::Binary {
                op: BinaryOp::And,
                right,
                ..
            } => match *right {
                Expr::Binary {
                    op: BinaryOp::Eq,
                    right,
                    ..
                } => assert!(matches!(*right, Expr::Binary { op: BinaryOp::Lt, .. })),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_unary_binds_tighter_than_binary() {
    match expr("not $a and -$b < 3") {
        Expr::Binary {
            op: BinaryOp::And,
            left,
            right,
            ..
        } => {
            assert!(matches!(*left, Expr::Unary { op: UnaryOp::Not, .. }));
            match *right {
                Expr::Binary {
                    op: BinaryOp::Lt,
                    left,
                    ..
                } => assert!(matches!(*left, Expr::Unary { op: UnaryOp::Neg, .. })),
                other => panic!("unexpected {:?}", other),
            }
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_postfix_chain() {
    match expr("player.items[0].name") {
        Expr::Member { target, member, .. } => {
            assert_eq!(member, "name");
            match *target {
                Expr::Index { target, index, .. } => {
                    assert!(matches!(*index, Expr::Number { value, .. } if value == 0.0));
                    assert!(matches!(*target, Expr::Member { ref member, .. } if member == "items"));
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_call_expression() {
    match expr("max(1, $b)") {
        Expr::Call { callee, args, .. } => {
            assert!(matches!(*callee, Expr::Identifier { ref name, .. } if name == "max"));
            assert_eq!(args.len(), 2);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_string_with_interpolation() {
    match expr("\"Hi {$name}\"") {
        Expr::StringInterp { segments, .. } => {
            assert_eq!(segments.len(), 2);
            assert_eq!(segments[0], literal("Hi "));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(expr("\"\""), Expr::StringInterp { segments, .. } if segments.is_empty()));
}

#[test]
fn test_literals() {
    assert!(matches!(expr("true"), Expr::Boolean { value: true, .. }));
    assert!(matches!(expr("False"), Expr::Boolean { value: false, .. }));
    assert!(matches!(expr("null"), Expr::Null { .. }));
    assert!(matches!(expr("(7)"), Expr::Number { value, .. } if value == 7.0));
}

// ============================================================================
// Recovery
// ============================================================================

#[test]
fn test_missing_title_skips_node() {
    let parsed = parse_source("---\nOrphan\n===\ntitle: Kept\n---\nHi\n===");
    assert_eq!(parsed.script.nodes.len(), 1);
    assert_eq!(parsed.script.nodes[0].name, "Kept");
    assert_eq!(codes(&parsed), vec![DiagnosticCode::MissingNodeTitle]);
}

#[test]
fn test_unknown_command_skips_line() {
    let parsed = parse_source("title: T\n---\n<<dance $x>>\nStill here\n===");
    assert_eq!(codes(&parsed), vec![DiagnosticCode::UnknownCommand]);
    assert_eq!(parsed.script.nodes[0].content.len(), 1);
}

#[test]
fn test_bad_expression_reports_position() {
    let parsed = parse_source("title: T\n---\n<<set $x = 1 +>>\nok\n===");
    assert!(parsed.has_errors());
    let diagnostic = &parsed.diagnostics[0];
    assert_eq!(diagnostic.code, DiagnosticCode::UnexpectedToken);
    assert_eq!(diagnostic.span.line, 3);
    assert_eq!(parsed.script.nodes[0].content.len(), 1);
}

#[test]
fn test_deep_nesting_is_reported_not_overflowed() {
    let unary = format!("title: T\n---\n<<set $x = {}1>>\nok\n===", "-".repeat(5000));
    let parens = format!(
        "title: T\n---\n<<set $x = {}1{}>>\nok\n===",
        "(".repeat(5000),
        ")".repeat(5000)
    );
    let negated = format!("title: T\n---\n<<if {}true>>\n<<endif>>\nok\n===", "not ".repeat(5000));

    for source in [unary, parens, negated] {
        let parsed = parse_source(&source);
        assert!(parsed.has_errors());
        let diagnostic = &parsed.diagnostics[0];
        assert_eq!(diagnostic.code, DiagnosticCode::UnexpectedToken);
        assert!(diagnostic.message.contains("nested too deeply"), "{}", diagnostic.message);
        assert_eq!(diagnostic.span.line, 3);
        // The rest of the node still parses
        assert!(parsed.script.nodes[0]
            .content
            .iter()
            .any(|item| matches!(item, Content::Dialogue { .. })));
    }
}

#[test]
fn test_nesting_below_the_limit_parses() {
    let depth = MAX_EXPRESSION_DEPTH - 2;
    let source = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
    assert!(matches!(expr(&source), Expr::Number { value, .. } if value == 1.0));
    let negated = format!("{}1", "-".repeat(depth - 1));
    assert!(matches!(expr(&negated), Expr::Unary { .. }));
}

#[test]
fn test_missing_endif() {
    let parsed = parse_source("title: T\n---\n<<if true>>\n    A\n===");
    assert!(codes(&parsed).contains(&DiagnosticCode::UnterminatedBlock));
    assert!(matches!(
        &parsed.script.nodes[0].content[0],
        Content::Condition { then, .. } if then.len() == 1
    ));
}

#[test]
fn test_stray_else() {
    let parsed = parse_source("title: T\n---\n<<else>>\nA\n===");
    assert_eq!(codes(&parsed), vec![DiagnosticCode::UnexpectedToken]);
    assert_eq!(parsed.script.nodes[0].content.len(), 1);
}

#[test]
fn test_missing_node_end_is_isolated() {
    let parsed = parse_source("title: A\n---\nHi\ntitle: B\n---\nYo\n===");
    let names: Vec<&str> = parsed.script.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);
    assert!(codes(&parsed).contains(&DiagnosticCode::UnterminatedNode));
}

#[test]
fn test_parse_script_error() {
    let err = parse_script("title: T\n---\n<<jump>>\n===").unwrap_err();
    assert_eq!(err.diagnostics().len(), 1);
    assert!(err.to_string().starts_with("1 syntax error(s)"));
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn test_render_round_trip() {
    let script = parse_ok(SAMPLE);
    let rendered = render_script(&script);
    let reparsed = parse_ok(&rendered);
    assert!(
        script.same_structure(&reparsed),
        "round trip changed the tree:\n{}",
        rendered
    );
}

#[test]
fn test_render_escapes_syntax_in_text() {
    let source = "title: T\n---\nNote\\: 5 \\{x\\} \\#1 \\<\\< a//b\n\\-> not a choice\n===";
    let script = parse_ok(source);
    let reparsed = parse_ok(&render_script(&script));
    assert!(script.same_structure(&reparsed));
}
