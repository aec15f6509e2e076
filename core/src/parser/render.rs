//! Render an AST back to script source
//!
//! The output is canonical rather than faithful: binary expressions are
//! fully parenthesised, indentation is four spaces and literal text is
//! escaped wherever the lexer would otherwise treat it as syntax. Parsing
//! the rendered text yields a structurally equal tree.

use std::fmt::Write;

use super::ast::{Command, Content, Expr, NodeDefinition, Script, TextSegment, UnaryOp};

const INDENT: &str = "    ";

pub fn render_script(script: &Script) -> String {
    let mut out = String::new();
    for (i, node) in script.nodes.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        render_node(node, &mut out);
    }
    out
}

pub fn render_node(node: &NodeDefinition, out: &mut String) {
    let has_title = node
        .metadata
        .iter()
        .any(|(key, _)| key.eq_ignore_ascii_case("title"));
    if !has_title {
        let _ = writeln!(out, "title: {}", node.name);
    }
    for (key, value) in &node.metadata {
        let _ = writeln!(out, "{}: {}", key, value);
    }
    out.push_str("---\n");
    render_block(&node.content, 0, out);
    out.push_str("===\n");
}

fn render_block(items: &[Content], depth: usize, out: &mut String) {
    for item in items {
        render_content(item, depth, out);
    }
}

fn render_content(item: &Content, depth: usize, out: &mut String) {
    let pad = INDENT.repeat(depth);

    match item {
        Content::Dialogue {
            speaker,
            text,
            tags,
            children,
            ..
        } => {
            out.push_str(&pad);
            if let Some(speaker) = speaker {
                out.push_str(&escape_text(speaker, true));
                out.push_str(": ");
            }
            out.push_str(&render_line_text(text, speaker.is_none()));
            render_tags(tags, out);
            out.push('\n');
            render_block(children, depth + 1, out);
        }
        Content::Choice {
            text,
            condition,
            tags,
            children,
            ..
        } => {
            out.push_str(&pad);
            out.push_str("-> ");
            out.push_str(&render_line_text(text, false));
            if let Some(cond) = condition {
                let _ = write!(out, " <<if {}>>", render_expr(cond));
            }
            render_tags(tags, out);
            out.push('\n');
            render_block(children, depth + 1, out);
        }
        Content::Condition {
            cond,
            then,
            elifs,
            else_branch,
            ..
        } => {
            let _ = writeln!(out, "{}<<if {}>>", pad, render_expr(cond));
            render_block(then, depth + 1, out);
            for (elif_cond, branch) in elifs {
                let _ = writeln!(out, "{}<<elif {}>>", pad, render_expr(elif_cond));
                render_block(branch, depth + 1, out);
            }
            if let Some(branch) = else_branch {
                let _ = writeln!(out, "{}<<else>>", pad);
                render_block(branch, depth + 1, out);
            }
            let _ = writeln!(out, "{}<<endif>>", pad);
        }
        Content::Command { command } => {
            let _ = writeln!(out, "{}{}", pad, render_command(command));
        }
    }
}

fn render_tags(tags: &[String], out: &mut String) {
    for tag in tags {
        out.push_str(" #");
        out.push_str(tag);
    }
}

pub fn render_command(command: &Command) -> String {
    match command {
        Command::Var {
            op, name, value, ..
        } => format!("<<{} ${} = {}>>", op.keyword(), name, render_expr(value)),
        Command::Call { name, args, .. } => format!("<<call {}({})>>", name, render_args(args)),
        Command::Wait { duration, .. } => format!("<<wait {}>>", render_expr(duration)),
        Command::Jump { target, .. } => format!("<<jump {}>>", target),
    }
}

fn render_line_text(segments: &[TextSegment], line_start: bool) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        match segment {
            TextSegment::Literal { text } => {
                out.push_str(&escape_text(text, line_start && i == 0));
            }
            TextSegment::Interpolation { expr, .. } => {
                let _ = write!(out, "{{{}}}", render_expr(expr));
            }
        }
    }
    out
}

/// Escape literal text for a dialogue or choice line
fn escape_text(text: &str, line_start: bool) -> String {
    let mut out = String::with_capacity(text.len());

    if line_start && ["---", "===", "->"].iter().any(|m| text.starts_with(m)) {
        out.push('\\');
    }

    for c in text.chars() {
        match c {
            '\\' | '{' | '}' | '#' | ':' | '<' | '/' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '"' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

fn render_args(args: &[Expr]) -> String {
    args.iter().map(render_expr).collect::<Vec<_>>().join(", ")
}

pub fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::Number { value, .. } => {
            if *value < 0.0 {
                format!("(-{})", -value)
            } else {
                format!("{}", value)
            }
        }
        Expr::Boolean { value, .. } => value.to_string(),
        Expr::Null { .. } => "null".to_string(),
        Expr::StringInterp { segments, .. } => {
            let mut out = String::from("\"");
            for segment in segments {
                match segment {
                    TextSegment::Literal { text } => out.push_str(&escape_string(text)),
                    TextSegment::Interpolation { expr, .. } => {
                        let _ = write!(out, "{{{}}}", render_expr(expr));
                    }
                }
            }
            out.push('"');
            out
        }
        Expr::Variable { name, .. } => format!("${}", name),
        Expr::Identifier { name, .. } => name.clone(),
        Expr::Unary { op, operand, .. } => {
            let symbol = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => "!",
            };
            format!("{}{}", symbol, render_operand(operand))
        }
        Expr::Binary {
            op, left, right, ..
        } => format!(
            "({} {} {})",
            render_expr(left),
            op.symbol(),
            render_expr(right)
        ),
        Expr::Call { callee, args, .. } => {
            format!("{}({})", render_operand(callee), render_args(args))
        }
        Expr::Member { target, member, .. } => format!("{}.{}", render_operand(target), member),
        Expr::Index { target, index, .. } => {
            format!("{}[{}]", render_operand(target), render_expr(index))
        }
    }
}

/// Unary results must be wrapped when they appear as a postfix target
fn render_operand(expr: &Expr) -> String {
    match expr {
        Expr::Unary { .. } => format!("({})", render_expr(expr)),
        _ => render_expr(expr),
    }
}
