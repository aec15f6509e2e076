//! Property tests for the lexer, parser, values and the analyzer

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use proptest::prelude::*;

use parley_core::analyzer::analyze;
use parley_core::lexer::{tokenize, TokenKind};
use parley_core::parser::{parse_script, parse_source, render_script};
use parley_core::{HostSymbols, RuntimeValue, TypeInfo};

/* ===================== Script generation ===================== */

#[derive(Debug, Clone)]
enum Item {
    Line(Option<String>, String),
    Choice(String, Vec<Item>),
    If(u32, Vec<Item>),
    Set(u32),
}

fn words() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z]{1,8}", 1..5).prop_map(|w| w.join(" "))
}

fn item() -> impl Strategy<Value = Item> {
    let leaf = prop_oneof![
        (prop::option::of(prop_oneof![Just("Alice".to_string()), Just("Bob".to_string())]), words())
            .prop_map(|(speaker, text)| Item::Line(speaker, text)),
        (0u32..100).prop_map(Item::Set),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            (words(), prop::collection::vec(inner.clone(), 0..3))
                .prop_map(|(text, children)| Item::Choice(text, children)),
            (0u32..100, prop::collection::vec(inner, 1..3))
                .prop_map(|(n, children)| Item::If(n, children)),
        ]
    })
}

fn write_items(items: &[Item], depth: usize, out: &mut String) {
    let indent = "    ".repeat(depth);
    for item in items {
        match item {
            Item::Line(Some(speaker), text) => out.push_str(&format!("{}{}: {}\n", indent, speaker, text)),
            Item::Line(None, text) => out.push_str(&format!("{}{}\n", indent, text)),
            Item::Set(n) => out.push_str(&format!("{}<<set $n = {}>>\n", indent, n)),
            Item::Choice(text, children) => {
                out.push_str(&format!("{}-> {}\n", indent, text));
                write_items(children, depth + 1, out);
            }
            Item::If(n, children) => {
                out.push_str(&format!("{}<<if $n > {}>>\n", indent, n));
                write_items(children, depth + 1, out);
                out.push_str(&format!("{}<<endif>>\n", indent));
            }
        }
    }
}

fn script_source(nodes: &[Vec<Item>]) -> String {
    let mut out = String::new();
    for (i, body) in nodes.iter().enumerate() {
        out.push_str(&format!("title: Node{}\n---\n", i));
        write_items(body, 0, &mut out);
        out.push_str("===\n\n");
    }
    out
}

/* ===================== Indentation ===================== */

/// Line depths where each line nests at most one level below the previous
fn depths() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..4, 1..20).prop_map(|steps| {
        let mut out = Vec::with_capacity(steps.len());
        let mut depth = 0usize;
        for step in steps {
            depth = match step {
                0 => depth + 1,
                1 => depth,
                _ => depth.saturating_sub(step - 1),
            };
            if out.is_empty() {
                depth = 0;
            }
            out.push(depth);
        }
        out
    })
}

/* ===================== Expression generation ===================== */

fn operand() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("$a".to_string()),
        Just("$b".to_string()),
        (0u32..5).prop_map(|n| n.to_string()),
        Just("\"s\"".to_string()),
        Just("true".to_string()),
    ]
}

fn expression() -> impl Strategy<Value = String> {
    operand().prop_recursive(4, 16, 2, |inner| {
        (
            inner.clone(),
            prop_oneof![
                Just("+"),
                Just("-"),
                Just("*"),
                Just("/"),
                Just(">"),
                Just("=="),
                Just("and"),
            ],
            inner,
        )
            .prop_map(|(l, op, r)| format!("({} {} {})", l, op, r))
    })
}

/* ===================== Values ===================== */

fn value() -> impl Strategy<Value = RuntimeValue> {
    prop_oneof![
        Just(RuntimeValue::Null),
        any::<f64>().prop_map(RuntimeValue::Number),
        Just(RuntimeValue::Number(0.0)),
        Just(RuntimeValue::Number(-0.0)),
        Just(RuntimeValue::Number(f64::NAN)),
        any::<bool>().prop_map(RuntimeValue::Boolean),
        "[a-c]{0,3}".prop_map(RuntimeValue::String),
    ]
}

fn hash_of(value: &RuntimeValue) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

proptest! {
    #[test]
    fn prop_render_round_trip(nodes in prop::collection::vec(prop::collection::vec(item(), 1..5), 1..3)) {
        let source = script_source(&nodes);
        let script = parse_script(&source).expect("Generated script should parse");

        let rendered = render_script(&script);
        let reparsed = parse_script(&rendered).expect("Rendered script should parse");
        prop_assert!(
            script.same_structure(&reparsed),
            "source:\n{}\nrendered:\n{}",
            source,
            rendered
        );
    }

    #[test]
    fn prop_indentation_round_trip(depths in depths()) {
        let mut source = String::from("---\n");
        for (i, depth) in depths.iter().enumerate() {
            source.push_str(&format!("{}line{}\n", "    ".repeat(*depth), i));
        }
        source.push_str("===\n");

        let tokens = tokenize(&source);
        let mut depth = 0usize;
        let mut seen = Vec::new();
        let (mut indents, mut dedents) = (0usize, 0usize);
        for token in &tokens {
            match token.kind {
                TokenKind::Indent => {
                    depth += 1;
                    indents += 1;
                }
                TokenKind::Dedent => {
                    prop_assert!(depth > 0, "dedent below the base level in {:?}", source);
                    depth -= 1;
                    dedents += 1;
                }
                TokenKind::Text => seen.push(depth),
                _ => {}
            }
        }
        prop_assert_eq!(seen, depths);
        prop_assert_eq!(indents, dedents);
        prop_assert_eq!(depth, 0);
    }

    #[test]
    fn prop_parser_never_panics(source in "\\PC{0,200}") {
        let _ = parse_source(&source);
    }

    #[test]
    fn prop_parser_never_panics_on_dialogue_like_input(
        source in "(title: [A-Za-z]{1,5}\n---\n)?([ a-z$<>{}#:=\\-\"]{0,20}\n){0,10}(===)?"
    ) {
        let _ = parse_source(&source);
    }

    #[test]
    fn prop_value_equality_is_reflexive_and_symmetric(a in value(), b in value()) {
        prop_assert_eq!(&a, &a);
        prop_assert_eq!(a == b, b == a);
    }

    #[test]
    fn prop_equal_values_hash_equal(a in value(), b in value()) {
        if a == b {
            prop_assert_eq!(hash_of(&a), hash_of(&b));
        }
    }

    #[test]
    fn prop_unknown_types_never_add_errors(expr in expression()) {
        let source = format!("title: Start\n---\n<<var $r = {}>>\n===\n", expr);
        let script = parse_script(&source).expect("Generated expression should parse");

        let typed = HostSymbols::builtins()
            .variable("a", TypeInfo::Number, true)
            .variable("b", TypeInfo::String, true);
        let unknown = HostSymbols::builtins()
            .variable("a", TypeInfo::Any, true)
            .variable("b", TypeInfo::Any, true);

        let typed_report = analyze(&script, &typed);
        let unknown_report = analyze(&script, &unknown);
        if !typed_report.has_errors() {
            prop_assert!(
                !unknown_report.has_errors(),
                "{} is clean when typed but not with Any:\n{}",
                expr,
                unknown_report
            );
        }
    }
}

#[test]
fn test_zero_signs_and_nan_hash_alike() {
    assert_eq!(RuntimeValue::Number(0.0), RuntimeValue::Number(-0.0));
    assert_eq!(hash_of(&RuntimeValue::Number(0.0)), hash_of(&RuntimeValue::Number(-0.0)));
    assert_eq!(RuntimeValue::Number(f64::NAN), RuntimeValue::Number(f64::NAN));
}
