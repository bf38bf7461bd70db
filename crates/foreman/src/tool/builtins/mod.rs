mod list;
mod read;
mod shell;
mod tasks;
mod write;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::tool::{Tool, ToolContext};

pub use tasks::{AbortTaskTool, CreateTaskTool, ListTasksTool, SteerTaskTool};

/// Resolve a tool-supplied path: absolute paths pass through, relative paths
/// are resolved against the context's working directory.
pub(crate) fn resolve_path(path: &str, ctx: &ToolContext) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        ctx.cwd.join(p)
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into their
/// parent. No filesystem access, so the check also covers paths that do not
/// exist yet.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Returns an error message when `path` falls outside the context's write
/// root. Writes are unrestricted when no write root is set.
pub(crate) fn write_root_violation(path: &Path, ctx: &ToolContext) -> Option<String> {
    let root = ctx.write_root.as_deref()?;
    if normalize(path).starts_with(normalize(root)) {
        None
    } else {
        Some(format!(
            "Refusing to write outside {}: {}",
            root.display(),
            path.display()
        ))
    }
}

/// Find the largest byte index that is a char boundary at or below `target`.
pub(crate) fn floor_char_boundary(text: &str, target: usize) -> usize {
    let mut pos = target.min(text.len());
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// The main agent's tool set: file and shell access plus the task-lifecycle
/// tools that drive background workers.
pub fn main_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(read::ReadFileTool),
        Arc::new(write::WriteFileTool),
        Arc::new(list::ListDirTool),
        Arc::new(shell::ShellTool),
        Arc::new(tasks::CreateTaskTool),
        Arc::new(tasks::SteerTaskTool),
        Arc::new(tasks::AbortTaskTool),
        Arc::new(tasks::ListTasksTool),
    ]
}

/// The worker tool set: file and shell access only. Workers do not spawn or
/// control other workers.
pub fn worker_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(read::ReadFileTool),
        Arc::new(write::WriteFileTool),
        Arc::new(list::ListDirTool),
        Arc::new(shell::ShellTool),
    ]
}
