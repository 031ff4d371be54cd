use super::outcome::Outcome;
use super::pump::StreamSource;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Failed to spawn worker: {command}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to deliver payload to worker stdin ({written} bytes written)")]
    StdinWrite {
        written: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Error reading worker {stream}")]
    StreamRead {
        stream: StreamSource,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker {stream} exceeded the {limit} byte capture limit")]
    CaptureLimit { stream: StreamSource, limit: usize },

    #[error("Failed to await worker termination")]
    Wait(#[source] std::io::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Pin every error to a classified outcome so nothing escapes the bridge
/// untagged: failures to create the process are spawn failures, everything
/// after a successful spawn is an I/O failure.
impl From<WorkerError> for Outcome {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::CommandNotFound(_) | WorkerError::SpawnFailed { .. } => {
                Outcome::SpawnFailure(err)
            }
            _ => Outcome::IoFailure(err),
        }
    }
}
