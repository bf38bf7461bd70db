//! Lifecycle hooks for the agent loop.
//!
//! A [`Hook`] observes (and at two points mutates) one agent-loop run.
//! All methods default to no-ops, so adapters implement only the lifecycle
//! points they care about. A [`HookSet`] folds several hooks into one unit
//! with fixed dispatch rules:
//!
//! - every hook runs sequentially, in installation order;
//! - an error from any hook propagates out of the loop (via `on_error`);
//! - `on_tool_end` threads the (possibly replaced) result through the chain;
//! - `on_text_delta` is synchronous and must not block;
//! - the loop switches to the streaming provider call iff
//!   [`HookSet::has_text_delta`] reports a delta handler anywhere in the set.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::llm::OnText;
use crate::llm::types::{Message, ToolCall, ToolResult};

pub type HookFuture<'a, T = ()> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send + 'a>>;

/// What an `on_tool_end` handler wants done with the result.
#[derive(Debug, Clone)]
pub enum ToolEndAction {
    /// Keep the result as-is.
    Keep,
    /// Substitute a replacement, visible to later handlers and to history.
    Replace(ToolResult),
}

pub trait Hook: Send + Sync {
    /// Once, before the first provider call.
    fn on_loop_start(&self) -> HookFuture<'_> {
        Box::pin(async { Ok(()) })
    }

    /// Once, after the loop exits normally.
    fn on_loop_end(&self, _turns: usize) -> HookFuture<'_> {
        Box::pin(async { Ok(()) })
    }

    /// Before each provider call.
    fn on_llm_start<'a>(&'a self, _messages: &'a [Message]) -> HookFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    /// After each provider call returns.
    fn on_llm_end<'a>(&'a self, _message: &'a Message, _duration: Duration) -> HookFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    /// Before each tool execution.
    fn on_tool_start<'a>(&'a self, _call: &'a ToolCall) -> HookFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    /// After each tool execution. May replace the result.
    fn on_tool_end<'a>(
        &'a self,
        _call: &'a ToolCall,
        _result: &'a ToolResult,
        _duration: Duration,
    ) -> HookFuture<'a, ToolEndAction> {
        Box::pin(async { Ok(ToolEndAction::Keep) })
    }

    /// After all tool results of a turn are appended, before the next
    /// provider call. May rewrite the history.
    fn on_turn_end<'a>(&'a self, _messages: &'a mut Vec<Message>) -> HookFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    /// A streamed text fragment arrived. Synchronous; must not block.
    fn on_text_delta(&self, _text: &str) {}

    /// Whether this hook consumes text deltas. Controls streaming selection.
    fn has_text_delta(&self) -> bool {
        false
    }

    /// An error is propagating out of the loop. Must not fail.
    fn on_error<'a>(&'a self, _error: &'a Error) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async {})
    }
}

/// An ordered collection of hooks dispatched as one unit.
#[derive(Clone, Default)]
pub struct HookSet {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn push(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.push(hook);
    }

    /// Fold another set's hooks after this set's, preserving order.
    pub fn combine(mut self, other: HookSet) -> HookSet {
        self.hooks.extend(other.hooks);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// True when any installed hook consumes text deltas.
    pub fn has_text_delta(&self) -> bool {
        self.hooks.iter().any(|h| h.has_text_delta())
    }

    pub(crate) async fn loop_start(&self) -> Result<(), Error> {
        for hook in &self.hooks {
            hook.on_loop_start().await?;
        }
        Ok(())
    }

    pub(crate) async fn loop_end(&self, turns: usize) -> Result<(), Error> {
        for hook in &self.hooks {
            hook.on_loop_end(turns).await?;
        }
        Ok(())
    }

    pub(crate) async fn llm_start(&self, messages: &[Message]) -> Result<(), Error> {
        for hook in &self.hooks {
            hook.on_llm_start(messages).await?;
        }
        Ok(())
    }

    pub(crate) async fn llm_end(&self, message: &Message, duration: Duration) -> Result<(), Error> {
        for hook in &self.hooks {
            hook.on_llm_end(message, duration).await?;
        }
        Ok(())
    }

    pub(crate) async fn tool_start(&self, call: &ToolCall) -> Result<(), Error> {
        for hook in &self.hooks {
            hook.on_tool_start(call).await?;
        }
        Ok(())
    }

    /// Run the `on_tool_end` chain, threading replacements through.
    pub(crate) async fn tool_end(
        &self,
        call: &ToolCall,
        result: ToolResult,
        duration: Duration,
    ) -> Result<ToolResult, Error> {
        let mut current = result;
        for hook in &self.hooks {
            let action = hook.on_tool_end(call, &current, duration).await?;
            if let ToolEndAction::Replace(replacement) = action {
                current = replacement;
            }
        }
        Ok(current)
    }

    pub(crate) async fn turn_end(&self, messages: &mut Vec<Message>) -> Result<(), Error> {
        for hook in &self.hooks {
            hook.on_turn_end(messages).await?;
        }
        Ok(())
    }

    /// Synchronous fan-out, in installation order.
    pub(crate) fn text_delta(&self, text: &str) {
        for hook in &self.hooks {
            hook.on_text_delta(text);
        }
    }

    /// Error notification. Infallible so it can never displace the original.
    pub(crate) async fn error(&self, error: &Error) {
        for hook in &self.hooks {
            hook.on_error(error).await;
        }
    }
}

/// Adapter wrapping a plain text-delta callback as a hook.
pub struct TextDeltaHook {
    callback: Arc<OnText>,
}

impl TextDeltaHook {
    pub fn new(callback: Arc<OnText>) -> Self {
        Self { callback }
    }
}

impl Hook for TextDeltaHook {
    fn on_text_delta(&self, text: &str) {
        (self.callback)(text);
    }

    fn has_text_delta(&self) -> bool {
        true
    }
}
