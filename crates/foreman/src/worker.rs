//! The worker driver: runs one agent loop inside a task directory and
//! records the terminal state on disk.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::agent::run_agent_loop;
use crate::error::Error;
use crate::hook::HookSet;
use crate::llm::Provider;
use crate::llm::types::Message;
use crate::task::{self, TaskStatus};
use crate::tool::{Tool, ToolContext};

/// Terminal driver status. The on-disk status may differ for aborts: the
/// abort tool records `aborted` on disk while the driver reports `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Completed,
    Failed,
}

impl WorkerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Outcome of one worker run.
#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    pub task_id: String,
    pub status: WorkerStatus,
    pub result: Option<String>,
    pub error: Option<String>,
}

/// Run the worker for `task_dir` to a terminal state.
///
/// On every exit path the task's frontmatter status is terminal and
/// `result.md` exists. Errors are absorbed into the outcome; the returned
/// value is what the runtime turns into a completion notification.
pub async fn run_worker<P: Provider>(
    task_dir: &Path,
    tools: &[Arc<dyn Tool>],
    provider: &P,
    base_ctx: &ToolContext,
    system_prompt: &str,
    hooks: &HookSet,
) -> WorkerOutcome {
    let task_id = task::task_id_from_dir(task_dir);

    let record = match task::load_task(task_dir) {
        Ok(record) => record,
        Err(e) => {
            return finish_failed(task_dir, &task_id, &format!("Error: {e}"));
        }
    };

    if let Err(e) = task::set_status(task_dir, TaskStatus::Running) {
        return finish_failed(task_dir, &task_id, &format!("Error: {e}"));
    }
    if let Err(e) = task::append_progress(task_dir, "worker started") {
        warn!(task = %task_id, error = %e, "cannot write progress log");
    }

    let ctx = base_ctx.for_worker(task_dir);
    let mut messages = vec![Message::user(record.instructions.clone())];

    debug!(task = %task_id, "running worker loop");
    match run_agent_loop(
        &mut messages,
        tools,
        provider,
        &ctx,
        Some(system_prompt),
        hooks,
    )
    .await
    {
        Ok(final_message) => {
            let result = final_message.text();
            if let Err(e) = task::write_result(task_dir, &result) {
                return finish_failed(task_dir, &task_id, &format!("Error: {e}"));
            }
            if let Err(e) = task::set_status(task_dir, TaskStatus::Completed) {
                warn!(task = %task_id, error = %e, "cannot record completed status");
            }
            let _ = task::append_progress(task_dir, "worker completed");
            WorkerOutcome {
                task_id,
                status: WorkerStatus::Completed,
                result: Some(result),
                error: None,
            }
        }
        Err(Error::Aborted(_)) => {
            // The abort tool already recorded the user's intent on disk;
            // electing `aborted` here keeps that intent over a plain failure.
            let message = format!("Error: Task {task_id} was aborted");
            if let Err(e) = task::write_result(task_dir, &message) {
                warn!(task = %task_id, error = %e, "cannot write abort result");
            }
            if let Err(e) = task::set_status(task_dir, TaskStatus::Aborted) {
                warn!(task = %task_id, error = %e, "cannot record aborted status");
            }
            let _ = task::append_progress(task_dir, "worker aborted");
            WorkerOutcome {
                task_id,
                status: WorkerStatus::Failed,
                result: None,
                error: Some(message),
            }
        }
        Err(e) => finish_failed(task_dir, &task_id, &format!("Error: {e}")),
    }
}

fn finish_failed(task_dir: &Path, task_id: &str, message: &str) -> WorkerOutcome {
    if let Err(e) = task::write_result(task_dir, message) {
        warn!(task = %task_id, error = %e, "cannot write failure result");
    }
    if let Err(e) = task::set_status(task_dir, TaskStatus::Failed) {
        warn!(task = %task_id, error = %e, "cannot record failed status");
    }
    let _ = task::append_progress(task_dir, "worker failed");
    WorkerOutcome {
        task_id: task_id.to_string(),
        status: WorkerStatus::Failed,
        result: None,
        error: Some(message.to_string()),
    }
}
