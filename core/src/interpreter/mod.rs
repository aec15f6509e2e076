//! Dialogue interpreter
//!
//! Evaluates expressions, executes commands and renders text against a
//! [`DialogueContext`]. The [`DialogueRunner`] drives a whole node graph on
//! top of it and turns content into [`DialogueEvent`]s for the host.
//!
//! Everything that can suspend is async: `<<wait>>` sleeps on the tokio
//! timer and host functions may return pending futures. Both race the
//! interpreter's cancellation token, so cancelling stops a suspended step
//! with [`ErrorKind::Cancelled`] instead of leaving it hanging.
//!
//! # Usage
//!
//! ```ignore
//! let ctx = Arc::new(DialogueContext::with_builtins());
//! ctx.load_script(&parse_script(source)?)?;
//!
//! let mut runner = DialogueRunner::new(Interpreter::new(ctx));
//! runner.start("Start")?;
//! loop {
//!     match runner.next_event().await? {
//!         DialogueEvent::Line { text, .. } => println!("{}", text),
//!         DialogueEvent::Choices { options } => runner.select(options[0].index)?,
//!         DialogueEvent::Jump { .. } => {}
//!         DialogueEvent::End { .. } => break,
//!     }
//! }
//! ```

mod commands;
mod expressions;
mod runner;
mod text;

#[cfg(test)]
mod tests;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::RuntimeConfig;
use crate::errors::{ErrorKind, RuntimeResult};
use crate::runtime::host::HostFuture;
use crate::runtime::{DialogueContext, RuntimeValue};

pub use expressions::{apply_binary, apply_unary, truthy};
pub use runner::{ChoiceOption, DialogueEvent, DialogueRunner};

/// Boxed evaluation future; boxing is what lets evaluation recurse
pub type EvalFuture<'a> = Pin<Box<dyn Future<Output = RuntimeResult<RuntimeValue>> + Send + 'a>>;

pub struct Interpreter {
    ctx: Arc<DialogueContext>,
    config: RuntimeConfig,
    cancel: CancellationToken,
}

impl Interpreter {
    pub fn new(ctx: Arc<DialogueContext>) -> Self {
        Self::with_config(ctx, RuntimeConfig::default())
    }

    pub fn with_config(ctx: Arc<DialogueContext>, config: RuntimeConfig) -> Self {
        Self {
            ctx,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use a token owned by the host (e.g. a child of a shutdown token)
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn context(&self) -> &Arc<DialogueContext> {
        &self.ctx
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel any suspended wait or host call, and every later one
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Await a host call unless cancellation wins first
    async fn await_host(&self, call: HostFuture) -> RuntimeResult<RuntimeValue> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ErrorKind::Cancelled.into()),
            result = call => result,
        }
    }
}
