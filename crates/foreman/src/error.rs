use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("provider request failed: {0}")]
    Provider(String),

    #[error("stream ended without a final message")]
    StreamEndedWithoutMessage,

    #[error("task {0} was aborted")]
    Aborted(String),

    #[error("task error: {0}")]
    Task(String),

    #[error("agent error: {0}")]
    Agent(String),

    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Returns the task id when this error is a worker abort.
    pub fn aborted_task(&self) -> Option<&str> {
        match self {
            Error::Aborted(id) => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = Error::Provider("connection refused".into());
        assert_eq!(err.to_string(), "provider request failed: connection refused");

        let err = Error::Aborted("t_001".into());
        assert_eq!(err.to_string(), "task t_001 was aborted");

        let err = Error::StreamEndedWithoutMessage;
        assert_eq!(err.to_string(), "stream ended without a final message");
    }

    #[test]
    fn aborted_task_extracts_id() {
        assert_eq!(Error::Aborted("t_007".into()).aborted_task(), Some("t_007"));
        assert_eq!(Error::Agent("nope".into()).aborted_task(), None);
    }
}
