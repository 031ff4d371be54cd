use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::command::WorkerCommand;
use super::error::WorkerError;
use super::outcome::Outcome;
use super::runner::WorkerRunner;

/// Canned response replayed for a matched expectation. Outcomes carry
/// non-clonable error sources, so the response is stored in parts and built
/// per call.
#[derive(Clone)]
enum MockResponse {
    Exit {
        code: i32,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    Timeout {
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    SpawnFailure(String),
    IoFailure(String),
}

impl MockResponse {
    fn to_outcome(&self) -> Outcome {
        match self {
            MockResponse::Exit {
                code: 0, stdout, ..
            } => Outcome::Success {
                stdout: stdout.clone(),
            },
            MockResponse::Exit {
                code,
                stdout,
                stderr,
            } => Outcome::NonZeroExit {
                code: *code,
                stdout: stdout.clone(),
                stderr: stderr.clone(),
            },
            MockResponse::Timeout { stdout, stderr } => Outcome::Timeout {
                elapsed: Duration::from_millis(10),
                stdout: stdout.clone(),
                stderr: stderr.clone(),
            },
            MockResponse::SpawnFailure(program) => {
                Outcome::SpawnFailure(WorkerError::CommandNotFound(program.clone()))
            }
            MockResponse::IoFailure(message) => Outcome::IoFailure(WorkerError::Internal {
                message: message.clone(),
            }),
        }
    }
}

struct MockExpectation {
    program: String,
    response: MockResponse,
    times_called: usize,
    expected_times: Option<usize>,
}

#[derive(Clone, Default)]
pub struct MockWorkerRunner {
    expectations: Arc<Mutex<Vec<MockExpectation>>>,
    call_history: Arc<Mutex<Vec<(WorkerCommand, Vec<u8>)>>>,
}

pub struct MockWorkerConfig {
    runner: MockWorkerRunner,
    expectation: MockExpectation,
}

impl MockWorkerRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_worker(&mut self, program: &str) -> MockWorkerConfig {
        MockWorkerConfig {
            runner: self.clone(),
            expectation: MockExpectation {
                program: program.to_string(),
                response: MockResponse::Exit {
                    code: 0,
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                },
                times_called: 0,
                expected_times: None,
            },
        }
    }

    pub fn verify_called(&self, program: &str, times: usize) -> bool {
        let history = self.call_history.lock().unwrap();
        let count = history
            .iter()
            .filter(|(cmd, _)| cmd.program == program)
            .count();
        count == times
    }

    /// Payloads delivered to a given worker program, in call order
    pub fn payloads_for(&self, program: &str) -> Vec<Vec<u8>> {
        let history = self.call_history.lock().unwrap();
        history
            .iter()
            .filter(|(cmd, _)| cmd.program == program)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn get_call_history(&self) -> Vec<WorkerCommand> {
        let history = self.call_history.lock().unwrap();
        history.iter().map(|(cmd, _)| cmd.clone()).collect()
    }

    pub fn reset(&mut self) {
        self.expectations.lock().unwrap().clear();
        self.call_history.lock().unwrap().clear();
    }
}

#[async_trait]
impl WorkerRunner for MockWorkerRunner {
    async fn run(&self, command: WorkerCommand, payload: &[u8]) -> Outcome {
        self.call_history
            .lock()
            .unwrap()
            .push((command.clone(), payload.to_vec()));

        let mut expectations = self.expectations.lock().unwrap();

        for expectation in expectations.iter_mut() {
            if expectation.program != command.program {
                continue;
            }

            expectation.times_called += 1;

            if let Some(expected) = expectation.expected_times {
                if expectation.times_called > expected {
                    return Outcome::IoFailure(WorkerError::Internal {
                        message: format!(
                            "Worker '{}' called {} times, expected {}",
                            command.program, expectation.times_called, expected
                        ),
                    });
                }
            }

            return expectation.response.to_outcome();
        }

        Outcome::IoFailure(WorkerError::Internal {
            message: format!("No expectation found for worker: {}", command.program),
        })
    }
}

impl MockWorkerConfig {
    pub fn returns_stdout(mut self, stdout: &[u8]) -> Self {
        if let MockResponse::Exit {
            stdout: ref mut out,
            ..
        } = self.expectation.response
        {
            *out = stdout.to_vec();
        }
        self
    }

    pub fn returns_stderr(mut self, stderr: &[u8]) -> Self {
        if let MockResponse::Exit {
            stderr: ref mut err,
            ..
        } = self.expectation.response
        {
            *err = stderr.to_vec();
        }
        self
    }

    pub fn returns_exit_code(mut self, code: i32) -> Self {
        if let MockResponse::Exit {
            code: ref mut c, ..
        } = self.expectation.response
        {
            *c = code;
        }
        self
    }

    pub fn returns_timeout(mut self) -> Self {
        self.expectation.response = MockResponse::Timeout {
            stdout: Vec::new(),
            stderr: Vec::new(),
        };
        self
    }

    pub fn returns_spawn_failure(mut self) -> Self {
        self.expectation.response = MockResponse::SpawnFailure(self.expectation.program.clone());
        self
    }

    pub fn returns_io_failure(mut self, message: &str) -> Self {
        self.expectation.response = MockResponse::IoFailure(message.to_string());
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.expectation.expected_times = Some(n);
        self
    }

    pub fn finish(self) {
        self.runner
            .expectations
            .lock()
            .unwrap()
            .push(self.expectation);
    }
}
