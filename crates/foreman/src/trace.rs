//! JSONL span-tree tracing for agent-loop runs.
//!
//! One file per loop at `<trace-dir>/<trace-id>.jsonl`, one event per line.
//! Emission is best-effort: a failed write is logged and dropped, never
//! surfaced to the loop.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::error::Error;
use crate::hook::{Hook, HookFuture, ToolEndAction};
use crate::llm::types::{Message, ToolCall, ToolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEventKind {
    AgentStart,
    AgentEnd,
    LlmStart,
    LlmEnd,
    ToolStart,
    ToolEnd,
    Error,
}

/// One timed span event in a trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub trace_id: Uuid,
    pub span_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub kind: TraceEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Appends trace events to `<dir>/<trace-id>.jsonl`, created lazily on the
/// first emit.
pub struct Tracer {
    trace_id: Uuid,
    dir: PathBuf,
    file: Mutex<Option<File>>,
}

impl Tracer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            dir: dir.into(),
            file: Mutex::new(None),
        }
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.jsonl", self.trace_id))
    }

    /// Write one event as a JSON line. Failures are swallowed per event.
    pub fn emit(&self, event: &TraceEvent) {
        if let Err(e) = self.try_emit(event) {
            warn!(error = %e, trace_id = %self.trace_id, "failed to write trace event");
        }
    }

    fn try_emit(&self, event: &TraceEvent) -> Result<(), Error> {
        let mut guard = self.file.lock().expect("trace file lock poisoned");
        if guard.is_none() {
            std::fs::create_dir_all(&self.dir)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path())?;
            *guard = Some(file);
        }
        let line = serde_json::to_string(event)?;
        if let Some(file) = guard.as_mut() {
            writeln!(file, "{line}")?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct SpanState {
    agent_span: Option<Uuid>,
    llm_span: Option<Uuid>,
    tool_spans: HashMap<String, Uuid>,
}

/// Hook adapter that renders one loop run as a span tree.
///
/// The agent span parents each LLM span; the current LLM span parents the
/// tool spans of its turn.
pub struct TraceHook {
    tracer: Tracer,
    model: Option<String>,
    state: Mutex<SpanState>,
}

impl TraceHook {
    pub fn new(tracer: Tracer, model: Option<String>) -> Self {
        Self {
            tracer,
            model,
            state: Mutex::new(SpanState::default()),
        }
    }

    pub fn trace_id(&self) -> Uuid {
        self.tracer.trace_id()
    }

    fn event(
        &self,
        span_id: Uuid,
        parent: Option<Uuid>,
        kind: TraceEventKind,
        data: Option<serde_json::Value>,
        duration: Option<Duration>,
    ) -> TraceEvent {
        TraceEvent {
            trace_id: self.tracer.trace_id(),
            span_id,
            parent_span_id: parent,
            timestamp: Utc::now(),
            kind,
            data,
            duration_ms: duration.map(|d| d.as_millis() as u64),
        }
    }
}

impl Hook for TraceHook {
    fn on_loop_start(&self) -> HookFuture<'_> {
        let span = Uuid::new_v4();
        let mut state = self.state.lock().expect("trace state lock poisoned");
        state.agent_span = Some(span);
        drop(state);
        self.tracer.emit(&self.event(
            span,
            None,
            TraceEventKind::AgentStart,
            Some(json!({"model": self.model})),
            None,
        ));
        Box::pin(async { Ok(()) })
    }

    fn on_loop_end(&self, turns: usize) -> HookFuture<'_> {
        let state = self.state.lock().expect("trace state lock poisoned");
        let span = state.agent_span.unwrap_or_else(Uuid::new_v4);
        drop(state);
        self.tracer.emit(&self.event(
            span,
            None,
            TraceEventKind::AgentEnd,
            Some(json!({"total_turns": turns})),
            None,
        ));
        Box::pin(async { Ok(()) })
    }

    fn on_llm_start<'a>(&'a self, messages: &'a [Message]) -> HookFuture<'a> {
        let span = Uuid::new_v4();
        let mut state = self.state.lock().expect("trace state lock poisoned");
        state.llm_span = Some(span);
        let parent = state.agent_span;
        drop(state);
        self.tracer.emit(&self.event(
            span,
            parent,
            TraceEventKind::LlmStart,
            Some(json!({"message_count": messages.len()})),
            None,
        ));
        Box::pin(async { Ok(()) })
    }

    fn on_llm_end<'a>(&'a self, _message: &'a Message, duration: Duration) -> HookFuture<'a> {
        let state = self.state.lock().expect("trace state lock poisoned");
        let span = state.llm_span.unwrap_or_else(Uuid::new_v4);
        let parent = state.agent_span;
        drop(state);
        self.tracer.emit(&self.event(
            span,
            parent,
            TraceEventKind::LlmEnd,
            None,
            Some(duration),
        ));
        Box::pin(async { Ok(()) })
    }

    fn on_tool_start<'a>(&'a self, call: &'a ToolCall) -> HookFuture<'a> {
        let span = Uuid::new_v4();
        let mut state = self.state.lock().expect("trace state lock poisoned");
        state.tool_spans.insert(call.id.clone(), span);
        let parent = state.llm_span;
        drop(state);
        self.tracer.emit(&self.event(
            span,
            parent,
            TraceEventKind::ToolStart,
            Some(json!({"tool": call.name, "arguments": call.input})),
            None,
        ));
        Box::pin(async { Ok(()) })
    }

    fn on_tool_end<'a>(
        &'a self,
        call: &'a ToolCall,
        result: &'a ToolResult,
        duration: Duration,
    ) -> HookFuture<'a, ToolEndAction> {
        let mut state = self.state.lock().expect("trace state lock poisoned");
        let span = state
            .tool_spans
            .remove(&call.id)
            .unwrap_or_else(Uuid::new_v4);
        let parent = state.llm_span;
        drop(state);
        self.tracer.emit(&self.event(
            span,
            parent,
            TraceEventKind::ToolEnd,
            Some(json!({
                "tool": call.name,
                "result_length": result.content.len(),
                "is_error": result.is_error,
            })),
            Some(duration),
        ));
        Box::pin(async { Ok(ToolEndAction::Keep) })
    }

    fn on_error<'a>(&'a self, error: &'a Error) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        let state = self.state.lock().expect("trace state lock poisoned");
        let parent = state.agent_span;
        drop(state);
        self.tracer.emit(&self.event(
            Uuid::new_v4(),
            parent,
            TraceEventKind::Error,
            Some(json!({"message": error.to_string()})),
            None,
        ));
        Box::pin(async {})
    }
}
