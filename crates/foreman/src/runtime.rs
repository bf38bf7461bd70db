//! The runtime orchestrator: owns the main agent's history, spawns workers
//! as fire-and-forget background tasks, holds their control handles, and
//! injects completion notifications back into the main conversation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::agent::run_agent_loop;
use crate::compact::{CompactionConfig, CompactionHook};
use crate::control::{WorkerControl, WorkerControlHook};
use crate::error::Error;
use crate::hook::{HookSet, TextDeltaHook};
use crate::llm::types::Message;
use crate::llm::{OnText, Provider};
use crate::task::{self, TaskRecord};
use crate::trace::{TraceHook, Tracer};
use crate::tool::{Tool, ToolContext};
use crate::worker::{WorkerStatus, run_worker};

struct RuntimeInner<P: Provider> {
    provider: Arc<P>,
    main_tools: Vec<Arc<dyn Tool>>,
    worker_tools: Vec<Arc<dyn Tool>>,
    base_ctx: ToolContext,
    system_prompt: String,
    trace_dir: Option<PathBuf>,
    compaction: CompactionConfig,
    /// Default delta sink for turns the runtime starts itself (completion
    /// notifications). Injected rather than writing to stdout directly.
    delta_sink: Option<Arc<OnText>>,
    /// Live worker control handles, keyed by task id.
    controls: Mutex<HashMap<String, Arc<WorkerControl>>>,
    /// The main conversation. The async lock serializes main-agent loop
    /// invocations: completion notifications queue behind the current turn.
    history: tokio::sync::Mutex<Vec<Message>>,
}

/// Handle to the assistant runtime. Cheap to clone; clones share state.
pub struct Runtime<P: Provider> {
    inner: Arc<RuntimeInner<P>>,
}

impl<P: Provider> Clone for Runtime<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: Provider + 'static> Runtime<P> {
    pub fn builder(provider: Arc<P>) -> RuntimeBuilder<P> {
        RuntimeBuilder {
            provider,
            main_tools: Vec::new(),
            worker_tools: Vec::new(),
            cwd: None,
            tasks_root: None,
            system_prompt: String::new(),
            trace_dir: None,
            compaction: CompactionConfig::default(),
            delta_sink: None,
        }
    }

    /// Handle one user utterance: append it to the main history, run the
    /// agent loop over the main tools, and return the final assistant
    /// message. Invocations are serialized on the history lock.
    pub async fn on_user_message(
        &self,
        text: &str,
        on_delta: Option<Arc<OnText>>,
    ) -> Result<Message, Error> {
        let mut history = self.inner.history.lock().await;
        history.push(Message::user(text));

        let mut hooks = HookSet::new().with(Arc::new(CompactionHook::new(
            self.inner.provider.clone(),
            self.inner.compaction.clone(),
        )));
        if let Some(trace_dir) = &self.inner.trace_dir {
            hooks.push(Arc::new(TraceHook::new(
                Tracer::new(trace_dir),
                self.model_name(),
            )));
        }
        if let Some(on_delta) = on_delta {
            hooks.push(Arc::new(TextDeltaHook::new(on_delta)));
        }

        let ctx = self.wired_context();
        run_agent_loop(
            &mut history,
            &self.inner.main_tools,
            self.inner.provider.as_ref(),
            &ctx,
            Some(&self.inner.system_prompt),
            &hooks,
        )
        .await
    }

    /// Look up the control handle of a live worker.
    pub fn control(&self, task_id: &str) -> Option<Arc<WorkerControl>> {
        self.inner
            .controls
            .lock()
            .expect("control map lock poisoned")
            .get(task_id)
            .cloned()
    }

    /// Task ids of currently live workers.
    pub fn active_workers(&self) -> Vec<String> {
        self.inner
            .controls
            .lock()
            .expect("control map lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Snapshot of the main conversation.
    pub async fn history(&self) -> Vec<Message> {
        self.inner.history.lock().await.clone()
    }

    /// Start the worker for a task directory and return immediately.
    ///
    /// When the worker reaches a terminal state (its disk state is already
    /// written by then), its control handle is dropped and a completion
    /// notification is fed back through `on_user_message` so the main agent
    /// can react. Requires a tokio runtime.
    pub fn spawn_worker(&self, task_dir: &Path) {
        let task_id = task::task_id_from_dir(task_dir);
        let control = Arc::new(WorkerControl::new());
        self.inner
            .controls
            .lock()
            .expect("control map lock poisoned")
            .insert(task_id.clone(), control.clone());

        info!(task = %task_id, "spawning worker");
        let rt = self.clone();
        let dir = task_dir.to_path_buf();
        tokio::spawn(async move {
            let driver = tokio::spawn({
                let rt = rt.clone();
                let dir = dir.clone();
                let task_id = task_id.clone();
                async move {
                    let mut hooks = HookSet::new()
                        .with(Arc::new(WorkerControlHook::new(control, task_id)))
                        .with(Arc::new(CompactionHook::new(
                            rt.inner.provider.clone(),
                            rt.inner.compaction.clone(),
                        )));
                    if let Some(trace_dir) = &rt.inner.trace_dir {
                        hooks.push(Arc::new(TraceHook::new(
                            Tracer::new(trace_dir),
                            rt.model_name(),
                        )));
                    }

                    let system = match task::load_task(&dir) {
                        Ok(record) => worker_system_prompt(&record, &dir),
                        Err(_) => fallback_worker_prompt(&dir),
                    };
                    let ctx = rt.wired_context();
                    run_worker(
                        &dir,
                        &rt.inner.worker_tools,
                        rt.inner.provider.as_ref(),
                        &ctx,
                        &system,
                        &hooks,
                    )
                    .await
                }
            });

            let notification = match driver.await {
                Ok(outcome) => {
                    debug!(task = %outcome.task_id, status = outcome.status.as_str(), "worker finished");
                    match (outcome.status, &outcome.result) {
                        (WorkerStatus::Completed, Some(result)) => format!(
                            "[Task {} completed. Status: {}]\nResult: {}",
                            outcome.task_id,
                            outcome.status.as_str(),
                            result
                        ),
                        _ => format!(
                            "[Task {} completed. Status: {}]\nError: {}",
                            outcome.task_id,
                            outcome.status.as_str(),
                            outcome.error.as_deref().unwrap_or("unknown error")
                        ),
                    }
                }
                Err(join_error) => {
                    format!("[Task {task_id} failed unexpectedly: {join_error}]")
                }
            };

            rt.inner
                .controls
                .lock()
                .expect("control map lock poisoned")
                .remove(&task_id);

            let sink = rt.inner.delta_sink.clone();
            if let Err(e) = rt.on_user_message(&notification, sink).await {
                warn!(task = %task_id, error = %e, "completion notification failed");
            }
        });
    }

    fn model_name(&self) -> Option<String> {
        self.inner.provider.model_name().map(str::to_string)
    }

    /// Clone the base context and late-bind the task-lifecycle callbacks to
    /// this runtime. Tools never hold the runtime directly; the cycle is
    /// broken by wiring a fresh context per invocation.
    fn wired_context(&self) -> ToolContext {
        let mut ctx = self.inner.base_ctx.clone();

        let rt = self.clone();
        ctx.on_task_created = Some(Arc::new(move |dir: &Path| {
            rt.spawn_worker(dir);
        }));

        let rt = self.clone();
        ctx.on_steer = Some(Arc::new(move |task_id: &str, message: &str| {
            match rt.control(task_id) {
                Some(control) => control.steer(message.to_string()),
                None => debug!(task = %task_id, "steer for unknown or finished worker dropped"),
            }
        }));

        let rt = self.clone();
        ctx.on_abort = Some(Arc::new(move |task_id: &str| match rt.control(task_id) {
            Some(control) => control.abort(),
            None => debug!(task = %task_id, "abort for unknown or finished worker dropped"),
        }));

        ctx
    }
}

pub struct RuntimeBuilder<P: Provider> {
    provider: Arc<P>,
    main_tools: Vec<Arc<dyn Tool>>,
    worker_tools: Vec<Arc<dyn Tool>>,
    cwd: Option<PathBuf>,
    tasks_root: Option<PathBuf>,
    system_prompt: String,
    trace_dir: Option<PathBuf>,
    compaction: CompactionConfig,
    delta_sink: Option<Arc<OnText>>,
}

impl<P: Provider + 'static> RuntimeBuilder<P> {
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn main_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.main_tools.extend(tools);
        self
    }

    pub fn worker_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.worker_tools.extend(tools);
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn tasks_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.tasks_root = Some(root.into());
        self
    }

    /// Enable JSONL tracing: one file per loop run under this directory.
    pub fn trace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.trace_dir = Some(dir.into());
        self
    }

    pub fn compaction(mut self, config: CompactionConfig) -> Self {
        self.compaction = config;
        self
    }

    /// Default text sink for runtime-initiated turns (completion
    /// notifications). Front-ends pass their own sink per user turn.
    pub fn delta_sink(mut self, sink: Arc<OnText>) -> Self {
        self.delta_sink = Some(sink);
        self
    }

    pub fn build(self) -> Runtime<P> {
        let cwd = self
            .cwd
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let tasks_root = self.tasks_root.unwrap_or_else(|| cwd.join("tasks"));
        let base_ctx = ToolContext::new(cwd, tasks_root);

        Runtime {
            inner: Arc::new(RuntimeInner {
                provider: self.provider,
                main_tools: self.main_tools,
                worker_tools: self.worker_tools,
                base_ctx,
                system_prompt: self.system_prompt,
                trace_dir: self.trace_dir,
                compaction: self.compaction,
                delta_sink: self.delta_sink,
                controls: Mutex::new(HashMap::new()),
                history: tokio::sync::Mutex::new(Vec::new()),
            }),
        }
    }
}

/// Compose the worker's system prompt: behavior guide, working-directory
/// reminder, then the task heading with its instructions.
fn worker_system_prompt(record: &TaskRecord, task_dir: &Path) -> String {
    format!(
        "You are a background worker agent carrying out one focused task. \
         Work autonomously and do not ask the operator questions. Use your \
         tools as needed, then reply with a final summary of what you did; \
         that reply is recorded as the task result.\n\n\
         Your working directory is {dir}. Every file you write must stay \
         inside it.\n\n\
         # Task: {name}\n\n{instructions}",
        dir = task_dir.display(),
        name = record.name,
        instructions = record.instructions,
    )
}

fn fallback_worker_prompt(task_dir: &Path) -> String {
    format!(
        "You are a background worker agent. Your working directory is {}. \
         Carry out the task described in the first message.",
        task_dir.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::CompletionRequest;
    use crate::task::{RESULT_FILE, TaskStatus, create_task, load_task};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct MockProvider {
        responses: StdMutex<Vec<Message>>,
    }

    impl MockProvider {
        fn new(responses: Vec<Message>) -> Self {
            Self {
                responses: StdMutex::new(responses),
            }
        }
    }

    impl Provider for MockProvider {
        async fn complete(&self, _request: CompletionRequest) -> Result<Message, Error> {
            let mut responses = self.responses.lock().expect("mock lock poisoned");
            if responses.is_empty() {
                return Err(Error::Provider("no more mock responses".into()));
            }
            Ok(responses.remove(0))
        }

        fn model_name(&self) -> Option<&str> {
            Some("mock-model")
        }
    }

    fn runtime_with(provider: MockProvider, root: &Path) -> Runtime<MockProvider> {
        Runtime::builder(Arc::new(provider))
            .system_prompt("You are the main assistant.")
            .cwd(root)
            .tasks_root(root.join("tasks"))
            .build()
    }

    #[tokio::test]
    async fn user_message_appends_to_history() {
        let dir = tempfile::tempdir().unwrap();
        let rt = runtime_with(
            MockProvider::new(vec![Message::assistant_text("Hello there")]),
            dir.path(),
        );

        let reply = rt.on_user_message("hi", None).await.unwrap();
        assert_eq!(reply.text(), "Hello there");

        let history = rt.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], Message::user("hi"));
    }

    #[tokio::test]
    async fn spawned_worker_completes_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let tasks_root = dir.path().join("tasks");
        let task_dir = create_task(
            &tasks_root,
            "bg job",
            "A background job",
            "Do the background thing.",
            None,
            &[],
        )
        .unwrap();

        // First response serves the worker loop, second the notification turn.
        let rt = runtime_with(
            MockProvider::new(vec![
                Message::assistant_text("Worker result text"),
                Message::assistant_text("Noted."),
            ]),
            dir.path(),
        );

        rt.spawn_worker(&task_dir);
        assert_eq!(rt.active_workers(), vec!["t_001".to_string()]);
        assert!(rt.control("t_001").is_some());

        // Wait for the background completion to land in the history.
        let mut notified = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let history = rt.history().await;
            if history
                .iter()
                .any(|m| m.text().contains("[Task t_001 completed. Status: completed]"))
            {
                notified = true;
                break;
            }
        }
        assert!(notified, "no completion notification in history");

        // Disk state was written before the notification.
        let record = load_task(&task_dir).unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(
            std::fs::read_to_string(task_dir.join(RESULT_FILE)).unwrap(),
            "Worker result text"
        );

        // Handle removed once the worker is gone.
        assert!(rt.control("t_001").is_none());

        let history = rt.history().await;
        let notification = history
            .iter()
            .find(|m| m.text().contains("[Task t_001"))
            .unwrap();
        assert!(notification.text().contains("Result: Worker result text"));
    }

    #[tokio::test]
    async fn failed_worker_notification_carries_error() {
        let dir = tempfile::tempdir().unwrap();
        let tasks_root = dir.path().join("tasks");
        let task_dir =
            create_task(&tasks_root, "bad job", "d", "Fail please.", None, &[]).unwrap();

        // No scripted responses: the worker's provider call fails, and the
        // notification turn fails too (logged, not fatal).
        let rt = runtime_with(MockProvider::new(vec![]), dir.path());
        rt.spawn_worker(&task_dir);

        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if rt.control("t_001").is_none() {
                break;
            }
        }

        let record = load_task(&task_dir).unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert!(task_dir.join(RESULT_FILE).exists());
    }

    #[tokio::test]
    async fn context_callbacks_reach_live_controls() {
        let dir = tempfile::tempdir().unwrap();
        let rt = runtime_with(MockProvider::new(vec![]), dir.path());

        // Register a control directly, then drive it through the wired context.
        let control = Arc::new(WorkerControl::new());
        rt.inner
            .controls
            .lock()
            .unwrap()
            .insert("t_009".into(), control.clone());

        let ctx = rt.wired_context();
        (ctx.on_steer.as_ref().unwrap())("t_009", "turn around");
        (ctx.on_abort.as_ref().unwrap())("t_009");

        assert_eq!(control.drain_steers(), vec!["turn around"]);
        assert!(control.is_aborted());

        // Unknown ids are dropped silently.
        (ctx.on_steer.as_ref().unwrap())("t_404", "into the void");
        (ctx.on_abort.as_ref().unwrap())("t_404");
    }

    #[tokio::test]
    async fn delta_callback_streams_main_turn() {
        use crate::llm::{EventStream, StreamEvent};
        use futures::StreamExt;

        struct StreamingProvider;
        impl Provider for StreamingProvider {
            async fn complete(&self, _request: CompletionRequest) -> Result<Message, Error> {
                panic!("should stream when a delta callback is passed");
            }
            async fn stream(&self, _request: CompletionRequest) -> Result<EventStream, Error> {
                Ok(futures::stream::iter(vec![
                    Ok(StreamEvent::TextDelta { text: "Hi ".into() }),
                    Ok(StreamEvent::TextDelta {
                        text: "there".into(),
                    }),
                    Ok(StreamEvent::Done {
                        message: Message::assistant_text("Hi there"),
                    }),
                ])
                .boxed())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let rt = Runtime::builder(Arc::new(StreamingProvider))
            .cwd(dir.path())
            .build();

        let chunks = Arc::new(StdMutex::new(String::new()));
        let sink = chunks.clone();
        let reply = rt
            .on_user_message(
                "hello",
                Some(Arc::new(move |text: &str| {
                    sink.lock().unwrap().push_str(text);
                })),
            )
            .await
            .unwrap();

        assert_eq!(reply.text(), "Hi there");
        assert_eq!(*chunks.lock().unwrap(), "Hi there");
    }

    #[test]
    fn worker_prompt_contains_task_heading() {
        let record = TaskRecord {
            id: "t_001".into(),
            name: "index docs".into(),
            description: "".into(),
            status: TaskStatus::Pending,
            created: None,
            started: None,
            completed: None,
            model: None,
            tags: vec![],
            instructions: "Index everything under ./docs.".into(),
        };
        let prompt = worker_system_prompt(&record, Path::new("/tasks/t_001"));
        assert!(prompt.contains("# Task: index docs"));
        assert!(prompt.contains("/tasks/t_001"));
        assert!(prompt.contains("Index everything under ./docs."));
    }
}
