use std::time::Duration;

use super::error::WorkerError;

/// Tagged result of one bridged worker invocation. Constructed exactly once
/// per request and consumed by the response translator.
#[derive(Debug)]
pub enum Outcome {
    /// Worker exited 0; stdout is the response body, verbatim
    Success { stdout: Vec<u8> },

    /// Worker ran and signaled failure. Signal deaths are folded in here
    /// with code 128 + signal number.
    NonZeroExit {
        code: i32,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },

    /// The deadline elapsed and the worker was forcibly terminated. Carries
    /// whatever output had been captured by then.
    Timeout {
        elapsed: Duration,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },

    /// The worker process could not be created
    SpawnFailure(WorkerError),

    /// Pipe traffic or process bookkeeping failed after a successful spawn
    IoFailure(WorkerError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}
