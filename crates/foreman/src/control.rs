//! In-memory control handles for live workers: an abort flag plus a FIFO
//! queue of steer messages, written by the main agent's tools and read by
//! the worker's control hook.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::Error;
use crate::hook::{Hook, HookFuture, ToolEndAction};
use crate::llm::types::{Message, ToolCall, ToolResult};

#[derive(Default)]
struct ControlState {
    aborted: bool,
    steers: VecDeque<String>,
}

/// Control handle for one live worker.
///
/// Mutated on the main agent's execution unit, read on the worker's; all
/// access goes through one lock.
#[derive(Default)]
pub struct WorkerControl {
    state: Mutex<ControlState>,
}

impl WorkerControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag the worker for abort. Checked between tool executions, never
    /// preemptive: an in-flight tool or provider call runs to completion.
    pub fn abort(&self) {
        self.state.lock().expect("control lock poisoned").aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.state.lock().expect("control lock poisoned").aborted
    }

    /// Queue a steer message for delivery at the worker's next turn boundary.
    pub fn steer(&self, message: impl Into<String>) {
        self.state
            .lock()
            .expect("control lock poisoned")
            .steers
            .push_back(message.into());
    }

    /// Drain all queued steer messages, oldest first.
    pub fn drain_steers(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("control lock poisoned")
            .steers
            .drain(..)
            .collect()
    }
}

/// Hook adapter that surfaces a control handle inside the worker's loop:
/// aborts are raised after each tool execution, steers are delivered as
/// user messages at each turn boundary.
pub struct WorkerControlHook {
    control: Arc<WorkerControl>,
    task_id: String,
}

impl WorkerControlHook {
    pub fn new(control: Arc<WorkerControl>, task_id: impl Into<String>) -> Self {
        Self {
            control,
            task_id: task_id.into(),
        }
    }
}

impl Hook for WorkerControlHook {
    fn on_tool_end<'a>(
        &'a self,
        _call: &'a ToolCall,
        _result: &'a ToolResult,
        _duration: Duration,
    ) -> HookFuture<'a, ToolEndAction> {
        let aborted = self.control.is_aborted();
        Box::pin(async move {
            if aborted {
                Err(Error::Aborted(self.task_id.clone()))
            } else {
                Ok(ToolEndAction::Keep)
            }
        })
    }

    fn on_turn_end<'a>(&'a self, messages: &'a mut Vec<Message>) -> HookFuture<'a> {
        for steer in self.control.drain_steers() {
            messages.push(Message::user(format!("[Steer] {steer}")));
        }
        Box::pin(async { Ok(()) })
    }
}
