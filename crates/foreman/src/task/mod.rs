//! On-disk task records.
//!
//! A task lives in a directory named `t_NNN` under the tasks root and holds
//! `task.md` (frontmatter + worker instructions), `progress.md` (append-only
//! worker log) and `result.md` (final text, written on terminal state).

pub mod frontmatter;

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Error;

use self::frontmatter::{FmValue, Frontmatter};

pub const TASK_FILE: &str = "task.md";
pub const PROGRESS_FILE: &str = "progress.md";
pub const RESULT_FILE: &str = "result.md";

/// Lifecycle state of a task: pending → running → completed | failed | aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Aborted,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task record read from `task.md`.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    pub created: Option<String>,
    pub started: Option<String>,
    pub completed: Option<String>,
    pub model: Option<String>,
    pub tags: Vec<String>,
    /// Free-form body of task.md: the worker's instructions.
    pub instructions: String,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The task id is the last path segment of its directory.
pub fn task_id_from_dir(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn task_dir_suffix(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("t_")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Allocate the next sequential task id under `root`: scan existing `t_NNN`
/// directories, take the max suffix, and zero-pad the successor to 3 digits.
pub fn allocate_task_id(root: &Path) -> Result<String, Error> {
    std::fs::create_dir_all(root)?;
    let mut max = 0u32;
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(n) = task_dir_suffix(&entry.file_name().to_string_lossy()) {
            max = max.max(n);
        }
    }
    Ok(format!("t_{:03}", max + 1))
}

/// Create a new pending task directory and return its path.
pub fn create_task(
    root: &Path,
    name: &str,
    description: &str,
    instructions: &str,
    model: Option<&str>,
    tags: &[String],
) -> Result<PathBuf, Error> {
    let id = allocate_task_id(root)?;
    let dir = root.join(&id);
    std::fs::create_dir_all(&dir)?;

    let mut fm = Frontmatter::new();
    fm.set("id", FmValue::from(id.as_str()));
    fm.set("name", FmValue::from(name));
    fm.set("description", FmValue::from(description));
    fm.set("status", FmValue::from(TaskStatus::Pending.as_str()));
    fm.set("created", FmValue::from(now_rfc3339()));
    fm.set("started", FmValue::Null);
    fm.set("completed", FmValue::Null);
    fm.set(
        "model",
        model.map(FmValue::from).unwrap_or(FmValue::Null),
    );
    fm.set(
        "tags",
        FmValue::Array(tags.iter().map(|t| FmValue::from(t.as_str())).collect()),
    );

    let body = format!("\n{instructions}\n");
    write_atomic(&dir.join(TASK_FILE), &fm.render_document(&body))?;
    write_atomic(&dir.join(PROGRESS_FILE), "")?;
    Ok(dir)
}

/// Load a task record from its directory.
pub fn load_task(dir: &Path) -> Result<TaskRecord, Error> {
    let path = dir.join(TASK_FILE);
    let text = std::fs::read_to_string(&path)
        .map_err(|e| Error::Task(format!("cannot read {}: {e}", path.display())))?;
    let (fm, body) = Frontmatter::parse(&text)?;

    let status = fm
        .str_value("status")
        .and_then(TaskStatus::parse)
        .ok_or_else(|| Error::Task(format!("invalid status in {}", path.display())))?;

    let tags = match fm.get("tags") {
        Some(FmValue::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    Ok(TaskRecord {
        id: fm
            .str_value("id")
            .map(str::to_string)
            .unwrap_or_else(|| task_id_from_dir(dir)),
        name: fm.str_value("name").unwrap_or_default().to_string(),
        description: fm.str_value("description").unwrap_or_default().to_string(),
        status,
        created: fm.str_value("created").map(str::to_string),
        started: fm.str_value("started").map(str::to_string),
        completed: fm.str_value("completed").map(str::to_string),
        model: fm.str_value("model").map(str::to_string),
        tags,
        instructions: body.trim().to_string(),
    })
}

/// Transition the on-disk status, stamping `started` on the first transition
/// into running and `completed` on the first transition into a terminal
/// state. Key order and body are preserved.
pub fn set_status(dir: &Path, status: TaskStatus) -> Result<(), Error> {
    let path = dir.join(TASK_FILE);
    let text = std::fs::read_to_string(&path)
        .map_err(|e| Error::Task(format!("cannot read {}: {e}", path.display())))?;
    let (mut fm, body) = Frontmatter::parse(&text)?;

    fm.set("status", FmValue::from(status.as_str()));
    if status == TaskStatus::Running && fm.str_value("started").is_none() {
        fm.set("started", FmValue::from(now_rfc3339()));
    }
    if status.is_terminal() && fm.str_value("completed").is_none() {
        fm.set("completed", FmValue::from(now_rfc3339()));
    }

    write_atomic(&path, &fm.render_document(&body))
}

/// Append one timestamped entry to the worker's progress log.
pub fn append_progress(dir: &Path, entry: &str) -> Result<(), Error> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(PROGRESS_FILE))?;
    writeln!(file, "[{}] {entry}", now_rfc3339())?;
    Ok(())
}

/// Write the final result text.
pub fn write_result(dir: &Path, text: &str) -> Result<(), Error> {
    write_atomic(&dir.join(RESULT_FILE), text)
}

/// List all task records under `root`, ordered by id. Unreadable directories
/// are skipped with a warning.
pub fn list_tasks(root: &Path) -> Result<Vec<TaskRecord>, Error> {
    let mut names: Vec<String> = Vec::new();
    if root.exists() {
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() && task_dir_suffix(&name).is_some() {
                names.push(name);
            }
        }
    }
    names.sort();

    let mut records = Vec::with_capacity(names.len());
    for name in names {
        match load_task(&root.join(&name)) {
            Ok(record) => records.push(record),
            Err(e) => warn!(task = %name, error = %e, "skipping unreadable task"),
        }
    }
    Ok(records)
}

fn write_atomic(path: &Path, content: &str) -> Result<(), Error> {
    let tmp = path.with_extension("md.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
