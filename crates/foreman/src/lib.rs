//! Foreman: a personal AI-assistant runtime.
//!
//! An interactive main agent converses with the operator while dispatching
//! long-running background workers. Each worker runs its own tool-calling
//! loop against the same provider, persists its state into a task directory,
//! and can be steered or aborted mid-flight. Lifecycle hooks layer tracing,
//! context compaction and worker control onto the loop without the loop
//! knowing about them.

pub mod agent;
pub mod compact;
pub mod config;
pub mod control;
pub mod error;
pub mod hook;
pub mod llm;
pub mod runtime;
pub mod schema;
pub mod task;
pub mod tool;
pub mod trace;
pub mod worker;

// --- Core re-exports ---
pub use agent::run_agent_loop;
pub use error::Error;
pub use hook::{Hook, HookSet, TextDeltaHook, ToolEndAction};
pub use llm::types::{
    CompletionRequest, ContentBlock, Message, ToolCall, ToolDefinition, ToolResult,
};
pub use llm::{EventStream, OnText, Provider, StreamEvent};
pub use runtime::{Runtime, RuntimeBuilder};
pub use schema::{ParamKind, ToolSchema, ValidationError};
pub use tool::{Tool, ToolContext, ToolOutput, ToolSpec};
pub use worker::{WorkerOutcome, WorkerStatus, run_worker};

// --- Adapter re-exports ---
pub use compact::{CompactionConfig, CompactionHook};
pub use config::ForemanConfig;
pub use control::{WorkerControl, WorkerControlHook};
pub use task::{TaskRecord, TaskStatus};
pub use trace::{TraceEvent, TraceEventKind, TraceHook, Tracer};
