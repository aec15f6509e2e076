//! Dialogue runner: the host loop state machine
//!
//! The runner walks node content in written order and hands the host one
//! [`DialogueEvent`] at a time. Nested content (children of a line or a
//! chosen option, a taken branch) runs to completion before the next
//! sibling. Consecutive choice lines form one group; the runner stops on a
//! group until the host calls [`DialogueRunner::select`].
//!
//! ```text
//!   start ──► Running ──next_event──► Line / Jump ──► Running
//!                │
//!                ├──next_event──► Choices ──► AwaitingChoice ──select──► Running
//!                │
//!                └──content exhausted──► End ──► Finished
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::expressions::truthy;
use super::Interpreter;
use crate::errors::{ErrorKind, RuntimeError, RuntimeResult};
use crate::parser::ast::{Command, Content, Expr, NodeDefinition};

/// What the host should present next
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DialogueEvent {
    Line {
        node: String,
        speaker: Option<String>,
        text: String,
        tags: Vec<String>,
    },
    Choices { options: Vec<ChoiceOption> },
    Jump { from: String, to: String },
    End { node: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    /// Position within the group; pass to [`DialogueRunner::select`]
    pub index: usize,
    pub text: String,
    pub tags: Vec<String>,
    /// False when the option's condition did not hold
    pub available: bool,
}

/// Which nested block of an item a route step descends into
#[derive(Debug, Clone, Copy, PartialEq)]
enum Branch {
    Children,
    Then,
    Elif(usize),
    Else,
}

/// Item indices from a node's top-level content down to a nested block
type Route = Vec<(usize, Branch)>;

/// A block of the current node being walked
struct Frame {
    route: Route,
    position: usize,
}

impl Frame {
    fn at(route: Route) -> Self {
        Self { route, position: 0 }
    }
}

/// Route extended by one step
fn descend(route: &[(usize, Branch)], index: usize, branch: Branch) -> Route {
    let mut route = route.to_vec();
    route.push((index, branch));
    route
}

/// The block a route leads to; empty if the route no longer matches
fn block<'n>(content: &'n [Content], route: &[(usize, Branch)]) -> &'n [Content] {
    let mut items = content;
    for &(index, branch) in route {
        items = match (items.get(index), branch) {
            (Some(Content::Dialogue { children, .. }), Branch::Children)
            | (Some(Content::Choice { children, .. }), Branch::Children) => children.as_slice(),
            (Some(Content::Condition { then, .. }), Branch::Then) => then.as_slice(),
            (Some(Content::Condition { elifs, .. }), Branch::Elif(i)) => match elifs.get(i) {
                Some((_, body)) => body.as_slice(),
                None => return &[],
            },
            (Some(Content::Condition { else_branch: Some(body), .. }), Branch::Else) => {
                body.as_slice()
            }
            _ => return &[],
        };
    }
    items
}

struct PendingChoice {
    option: ChoiceOption,
    /// Route to the option's children, if it has any
    children: Option<Route>,
}

enum RunnerState {
    Idle,
    Running,
    AwaitingChoice(Vec<PendingChoice>),
    Finished,
}

pub struct DialogueRunner {
    interpreter: Interpreter,
    node: Option<Arc<NodeDefinition>>,
    stack: Vec<Frame>,
    state: RunnerState,
}

impl DialogueRunner {
    pub fn new(interpreter: Interpreter) -> Self {
        Self {
            interpreter,
            node: None,
            stack: Vec::new(),
            state: RunnerState::Idle,
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn current_node(&self) -> Option<&str> {
        self.node.as_ref().map(|node| node.name.as_str())
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, RunnerState::Finished)
    }

    pub fn is_awaiting_choice(&self) -> bool {
        matches!(self.state, RunnerState::AwaitingChoice(_))
    }

    /// Begin (or restart) at a node
    pub fn start(&mut self, node: &str) -> RuntimeResult<()> {
        let name = self.interpreter.resolve_node(node)?;
        info!(node = %name, "Starting dialogue");
        self.enter(&name)
    }

    fn enter(&mut self, name: &str) -> RuntimeResult<()> {
        let node = self
            .interpreter
            .context()
            .node(name)
            .ok_or_else(|| RuntimeError::new(ErrorKind::UnknownNode(name.to_string())))?;

        let visits = self.interpreter.context().mark_visited(&node.name);
        debug!(node = %node.name, visits, "Entering node");

        self.stack.clear();
        self.stack.push(Frame::at(Route::new()));
        self.node = Some(node);
        self.state = RunnerState::Running;
        Ok(())
    }

    fn node_name(&self) -> String {
        self.current_node().unwrap_or_default().to_string()
    }

    /// Advance to the next event
    pub async fn next_event(&mut self) -> RuntimeResult<DialogueEvent> {
        match self.state {
            RunnerState::Idle => {
                return Err(ErrorKind::ChoiceState("the runner has not been started".to_string()).into())
            }
            RunnerState::AwaitingChoice(_) => {
                return Err(ErrorKind::ChoiceState("a choice must be selected first".to_string()).into())
            }
            RunnerState::Finished => return Ok(DialogueEvent::End { node: self.node_name() }),
            RunnerState::Running => {}
        }

        loop {
            let Some(node) = self.node.clone() else {
                return Ok(self.finish());
            };
            let Some(frame) = self.stack.last_mut() else {
                return Ok(self.finish());
            };
            let items = block(&node.content, &frame.route);
            if frame.position >= items.len() {
                self.stack.pop();
                continue;
            }

            let route = frame.route.clone();
            let position = frame.position;

            if matches!(items[position], Content::Choice { .. }) {
                let end = items[position..]
                    .iter()
                    .position(|item| !matches!(item, Content::Choice { .. }))
                    .map_or(items.len(), |offset| position + offset);
                frame.position = end;

                let pending = self
                    .offer_choices(&items[position..end], &route, position)
                    .await?;
                if pending.iter().any(|p| p.option.available) {
                    let options = pending.iter().map(|p| p.option.clone()).collect();
                    self.state = RunnerState::AwaitingChoice(pending);
                    return Ok(DialogueEvent::Choices { options });
                }
                debug!(node = %self.node_name(), "No available choices; skipping group");
                continue;
            }

            frame.position += 1;
            match self.step(&items[position], &route, position).await {
                Ok(Some(event)) => return Ok(event),
                Ok(None) => {}
                Err(err) => self.recover(err)?,
            }
        }
    }

    fn finish(&mut self) -> DialogueEvent {
        self.state = RunnerState::Finished;
        let node = self.node_name();
        debug!(node = %node, "Dialogue finished");
        DialogueEvent::End { node }
    }

    /// Swallow a content failure when configured to, otherwise pass it on
    fn recover(&self, err: RuntimeError) -> RuntimeResult<()> {
        if err.is_cancelled() || !self.interpreter.config().continue_on_error {
            return Err(err);
        }
        error!(
            node = %self.node_name(),
            code = %err.code(),
            error = %err,
            "Skipping content that failed at runtime"
        );
        Ok(())
    }

    /// Run one non-choice item found at `position` in the block `route`
    /// leads to; returns an event when the host must see it
    async fn step(
        &mut self,
        item: &Content,
        route: &[(usize, Branch)],
        position: usize,
    ) -> RuntimeResult<Option<DialogueEvent>> {
        match item {
            Content::Dialogue {
                speaker,
                text,
                tags,
                children,
                ..
            } => {
                let text = self.interpreter.render_text(text).await?;
                if !children.is_empty() {
                    self.stack
                        .push(Frame::at(descend(route, position, Branch::Children)));
                }
                Ok(Some(DialogueEvent::Line {
                    node: self.node_name(),
                    speaker: speaker.clone(),
                    text,
                    tags: tags.clone(),
                }))
            }
            Content::Condition {
                cond,
                then,
                elifs,
                else_branch,
                span,
            } => {
                let mut taken = None;
                if self.condition(cond).await.map_err(|e| e.at(*span))? {
                    taken = Some((Branch::Then, then));
                } else {
                    for (i, (elif, body)) in elifs.iter().enumerate() {
                        if self.condition(elif).await.map_err(|e| e.at(*span))? {
                            taken = Some((Branch::Elif(i), body));
                            break;
                        }
                    }
                }
                let taken = taken.or_else(|| else_branch.as_ref().map(|body| (Branch::Else, body)));
                if let Some((branch, body)) = taken {
                    if !body.is_empty() {
                        self.stack.push(Frame::at(descend(route, position, branch)));
                    }
                }
                Ok(None)
            }
            Content::Command { command } => {
                let target = self.interpreter.execute(command).await?;
                match (command, target) {
                    (Command::Jump { .. }, Some(to)) => {
                        let from = self.node_name();
                        info!(from = %from, to = %to, "Jump");
                        self.enter(&to)?;
                        Ok(Some(DialogueEvent::Jump { from, to }))
                    }
                    _ => Ok(None),
                }
            }
            // Grouped by the caller
            Content::Choice { .. } => Ok(None),
        }
    }

    async fn condition(&self, expr: &Expr) -> RuntimeResult<bool> {
        let value = self.interpreter.evaluate(expr).await?;
        truthy(&value).map_err(|e| e.at(expr.span()))
    }

    /// Evaluate a choice group starting at `start` in the block `route`
    /// leads to. A failing condition makes that option unavailable when
    /// errors are being skipped.
    async fn offer_choices(
        &self,
        group: &[Content],
        route: &[(usize, Branch)],
        start: usize,
    ) -> RuntimeResult<Vec<PendingChoice>> {
        let mut pending = Vec::with_capacity(group.len());
        for (index, item) in group.iter().enumerate() {
            let Content::Choice {
                text,
                condition,
                tags,
                children,
                ..
            } = item
            else {
                continue;
            };

            let available = match condition {
                Some(cond) => match self.condition(cond).await {
                    Ok(available) => available,
                    Err(err) => {
                        self.recover(err)?;
                        false
                    }
                },
                None => true,
            };
            let text = match self.interpreter.render_text(text).await {
                Ok(text) => text,
                Err(err) => {
                    self.recover(err)?;
                    warn!(index, "Choice text could not be rendered");
                    String::new()
                }
            };

            pending.push(PendingChoice {
                option: ChoiceOption {
                    index,
                    text,
                    tags: tags.clone(),
                    available,
                },
                children: (!children.is_empty())
                    .then(|| descend(route, start + index, Branch::Children)),
            });
        }
        Ok(pending)
    }

    /// Pick an option from the last `Choices` event
    pub fn select(&mut self, index: usize) -> RuntimeResult<()> {
        let RunnerState::AwaitingChoice(pending) = &self.state else {
            return Err(ErrorKind::ChoiceState("no choice is pending".to_string()).into());
        };
        let Some(choice) = pending.iter().find(|p| p.option.index == index) else {
            return Err(ErrorKind::ChoiceState(format!(
                "choice {} does not exist; {} option(s) offered",
                index,
                pending.len()
            ))
            .into());
        };
        if !choice.option.available {
            return Err(ErrorKind::ChoiceState(format!("choice {} is not available", index)).into());
        }

        debug!(node = %self.node_name(), index, "Choice selected");
        if let Some(route) = choice.children.clone() {
            self.stack.push(Frame::at(route));
        }
        self.state = RunnerState::Running;
        Ok(())
    }
}
