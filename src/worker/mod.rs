//! Subprocess bridging: spawn a worker per request, feed it the payload on
//! stdin, capture stdout/stderr concurrently, and classify the result.

pub mod command;
pub mod error;
pub mod mock;
pub mod outcome;
pub mod pump;
pub mod runner;

#[cfg(test)]
mod tests;

pub use command::{WorkerCommand, WorkerCommandBuilder};
pub use error::WorkerError;
pub use mock::MockWorkerRunner;
pub use outcome::Outcome;
pub use pump::{CapturedStream, OverflowAction, PumpLimits, StreamSource};
pub use runner::{TokioWorkerRunner, WorkerRunner};

use std::sync::Arc;

/// One request's gateway into the worker: holds the fixed command template
/// and a runner. Each `run` call spawns a fresh process; nothing is shared
/// between invocations, so concurrent requests need no coordination.
#[derive(Clone)]
pub struct Bridge {
    runner: Arc<dyn WorkerRunner>,
    command: WorkerCommand,
}

impl Bridge {
    pub fn new(runner: Arc<dyn WorkerRunner>, command: WorkerCommand) -> Self {
        Self { runner, command }
    }

    pub fn production(command: WorkerCommand, limits: PumpLimits) -> Self {
        Self::new(Arc::new(TokioWorkerRunner::new(limits)), command)
    }

    #[cfg(test)]
    pub fn mock(command: WorkerCommand) -> (Self, MockWorkerRunner) {
        let mock = MockWorkerRunner::new();
        let runner = Arc::new(mock.clone()) as Arc<dyn WorkerRunner>;
        (Self::new(runner, command), mock)
    }

    pub fn command(&self) -> &WorkerCommand {
        &self.command
    }

    pub async fn run(&self, payload: &[u8]) -> Outcome {
        self.runner.run(self.command.clone(), payload).await
    }
}
