//! Test helpers for interpreter tests
//!
//! Builds contexts from script source and pulls single expressions or
//! commands out of a parsed `Start` node.

use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::errors::RuntimeResult;
use crate::interpreter::{DialogueEvent, DialogueRunner, Interpreter};
use crate::parser::ast::{Command, Content, Expr, TextSegment};
use crate::parser::parse_script;
use crate::runtime::{DialogueContext, RuntimeValue};

/// Wrap content lines in a single `Start` node
pub fn node(body: &str) -> String {
    format!("title: Start\n---\n{}\n===\n", body)
}

pub fn context() -> Arc<DialogueContext> {
    Arc::new(DialogueContext::with_builtins())
}

/// Context with every node of `source` loaded
pub fn context_with(source: &str) -> Arc<DialogueContext> {
    let ctx = context();
    let script = parse_script(source).expect("Parse should succeed");
    ctx.load_script(&script).expect("Nodes should register");
    ctx
}

/// Parse `text` as the right-hand side of a `set` command
pub fn expr(text: &str) -> Expr {
    match command(&format!("<<set $result = {}>>", text)) {
        Command::Var { value, .. } => value,
        other => panic!("Expected a variable command, got {:?}", other),
    }
}

/// Parse a single command line
pub fn command(line: &str) -> Command {
    let script = parse_script(&node(line)).expect("Parse should succeed");
    match script.nodes[0].content.first() {
        Some(Content::Command { command }) => command.clone(),
        other => panic!("Expected a command, got {:?}", other),
    }
}

/// Parse a dialogue line and return its text segments
pub fn line_text(line: &str) -> Vec<TextSegment> {
    let script = parse_script(&node(line)).expect("Parse should succeed");
    match script.nodes[0].content.first() {
        Some(Content::Dialogue { text, .. }) => text.clone(),
        other => panic!("Expected a dialogue line, got {:?}", other),
    }
}

pub async fn eval(interpreter: &Interpreter, text: &str) -> RuntimeResult<RuntimeValue> {
    let parsed = expr(text);
    interpreter.evaluate(&parsed).await
}

pub fn runner_for(source: &str) -> DialogueRunner {
    runner_with(source, RuntimeConfig::default())
}

pub fn runner_with(source: &str, config: RuntimeConfig) -> DialogueRunner {
    let ctx = context_with(source);
    let mut runner = DialogueRunner::new(Interpreter::with_config(ctx, config));
    runner.start("Start").expect("Start node should exist");
    runner
}

/// Texts of every line until the dialogue ends or stops on a choice
pub async fn lines_until_stop(runner: &mut DialogueRunner) -> Vec<String> {
    let mut lines = Vec::new();
    loop {
        match runner.next_event().await.expect("Event should be produced") {
            DialogueEvent::Line { text, .. } => lines.push(text),
            DialogueEvent::Jump { .. } => {}
            DialogueEvent::Choices { .. } | DialogueEvent::End { .. } => return lines,
        }
    }
}
