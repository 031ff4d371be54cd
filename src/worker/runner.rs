use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::task::JoinHandle;

use super::command::WorkerCommand;
use super::error::WorkerError;
use super::outcome::Outcome;
use super::pump::{self, CapturedStream, PumpLimits, StreamSource};

/// Flush window for the pumps once the worker has been forcibly terminated
const PUMP_FLUSH_GRACE: Duration = Duration::from_millis(500);

/// Pause between SIGTERM and SIGKILL when tearing down a process group
const KILL_GRACE: Duration = Duration::from_millis(100);

#[async_trait]
pub trait WorkerRunner: Send + Sync {
    /// Run one worker to completion, feeding it `payload` on stdin. Every
    /// failure mode is classified into the returned outcome; nothing escapes
    /// untagged.
    async fn run(&self, command: WorkerCommand, payload: &[u8]) -> Outcome;
}

/// Production runner: one OS process per call, stdio over pipes.
pub struct TokioWorkerRunner {
    limits: PumpLimits,
}

impl TokioWorkerRunner {
    pub fn new(limits: PumpLimits) -> Self {
        Self { limits }
    }

    fn configure(command: &WorkerCommand) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&command.program);

        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        cmd.args(&command.args);
        for (key, value) in &command.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn(command: &WorkerCommand) -> Result<Child, WorkerError> {
        Self::configure(command).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WorkerError::CommandNotFound(command.program.clone())
            } else {
                WorkerError::SpawnFailed {
                    command: command.display(),
                    source: e,
                }
            }
        })
    }

    /// Take ownership of a child stream, converting None to an error
    fn take_stream<T>(stream: Option<T>, name: &str) -> Result<T, WorkerError> {
        stream.ok_or_else(|| WorkerError::Internal {
            message: format!("Failed to capture {name}"),
        })
    }

    /// Terminate the worker's whole process group, then reap it. SIGTERM
    /// first so the worker can flush, SIGKILL if it lingers.
    async fn kill_group(child: &mut Child) {
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                use nix::sys::signal::{self, Signal};
                use nix::unistd::Pid;

                let pgid = Pid::from_raw(-(pid as i32));
                let _ = signal::kill(pgid, Signal::SIGTERM);
                tokio::time::sleep(KILL_GRACE).await;
                if let Ok(None) = child.try_wait() {
                    let _ = signal::kill(pgid, Signal::SIGKILL);
                }
            }
        }

        if let Err(e) = child.kill().await {
            tracing::warn!("Failed to kill worker: {}", e);
        }
    }

    /// Join a pump. After a forced termination the join is bounded: a pipe
    /// kept open by an orphaned grandchild must not stall the response.
    async fn join_pump(
        mut handle: JoinHandle<CapturedStream>,
        bounded: bool,
    ) -> Result<CapturedStream, WorkerError> {
        let joined = if bounded {
            match tokio::time::timeout(PUMP_FLUSH_GRACE, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    tracing::warn!("Discarding worker output still in flight after termination");
                    return Ok(CapturedStream::default());
                }
            }
        } else {
            handle.await
        };

        joined.map_err(|e| WorkerError::Internal {
            message: format!("Stream pump task failed: {e}"),
        })
    }

    fn exit_code(status: &std::process::ExitStatus) -> i32 {
        if let Some(code) = status.code() {
            return code;
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                tracing::warn!("Worker terminated by signal {}", signal);
                return 128 + signal;
            }
        }

        -1
    }

    fn log_start(command: &WorkerCommand, payload_len: usize) {
        tracing::debug!("Spawning worker: {}", command.display());
        if let Some(ref dir) = command.working_dir {
            tracing::trace!("Working directory: {:?}", dir);
        }
        tracing::trace!("Payload: {} bytes", payload_len);
    }

    fn log_outcome(command: &WorkerCommand, outcome: &Outcome, elapsed: Duration) {
        match outcome {
            Outcome::Success { stdout } => {
                tracing::debug!("Worker completed in {:?}: {}", elapsed, command.display());
                tracing::trace!("Stdout length: {} bytes", stdout.len());
            }
            Outcome::NonZeroExit { code, stderr, .. } => {
                tracing::debug!(
                    "Worker exited with code {} in {:?}: {}",
                    code,
                    elapsed,
                    command.display()
                );
                if !stderr.is_empty() {
                    tracing::trace!("Stderr: {}", String::from_utf8_lossy(stderr));
                }
            }
            Outcome::Timeout { elapsed: ran, .. } => {
                tracing::warn!("Worker timed out after {:?}: {}", ran, command.display());
            }
            Outcome::SpawnFailure(err) => {
                tracing::error!("{}", err);
            }
            Outcome::IoFailure(err) => {
                tracing::error!("Worker I/O failed: {}", err);
            }
        }
    }

    async fn bridge(
        &self,
        command: &WorkerCommand,
        payload: &[u8],
    ) -> Result<Outcome, WorkerError> {
        let start = Instant::now();
        let mut child = Self::spawn(command)?;

        // Both pumps and the stdin writer run as independent tasks, started
        // before any of them is awaited. Writing the payload only after the
        // output was fully read, or reading only after the payload was fully
        // written, wedges as soon as both sides outgrow the pipe buffers.
        let stdout = Self::take_stream(child.stdout.take(), "stdout")?;
        let stderr = Self::take_stream(child.stderr.take(), "stderr")?;
        let stdin = Self::take_stream(child.stdin.take(), "stdin")?;

        let limits = self.limits;
        let stdout_pump = tokio::spawn(pump::drain(stdout, StreamSource::Stdout, limits));
        let stderr_pump = tokio::spawn(pump::drain(stderr, StreamSource::Stderr, limits));
        let writer = tokio::spawn(write_payload(stdin, payload.to_vec()));

        // EOF on the output pipes is only reachable once the worker is gone,
        // so the process is joined before the pumps.
        let status = match command.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(result) => Some(result.map_err(WorkerError::Wait)?),
                Err(_) => None,
            },
            None => Some(child.wait().await.map_err(WorkerError::Wait)?),
        };

        let timed_out = status.is_none();
        if timed_out {
            Self::kill_group(&mut child).await;
        }

        let stdout_cap = Self::join_pump(stdout_pump, timed_out).await?;
        let stderr_cap = Self::join_pump(stderr_pump, timed_out).await?;

        let status = match status {
            Some(status) => status,
            None => {
                return Ok(Outcome::Timeout {
                    elapsed: start.elapsed(),
                    stdout: stdout_cap.bytes,
                    stderr: stderr_cap.bytes,
                })
            }
        };

        // The writer always finishes once the worker is gone: a full stdin
        // pipe turns into a broken one.
        let write_result = writer.await.map_err(|e| WorkerError::Internal {
            message: format!("Stdin writer task failed: {e}"),
        })?;

        if !status.success() {
            return Ok(Outcome::NonZeroExit {
                code: Self::exit_code(&status),
                stdout: stdout_cap.bytes,
                stderr: stderr_cap.bytes,
            });
        }

        // A clean exit still fails if the payload never made it in or a pump
        // gave up mid-stream; a failing worker explains itself via stderr, so
        // those take precedence above.
        write_result?;
        if let Some(err) = stdout_cap.error {
            return Err(err);
        }
        if let Some(err) = stderr_cap.error {
            return Err(err);
        }
        if stdout_cap.truncated || stderr_cap.truncated {
            tracing::warn!("Worker output truncated at the capture limit");
        }

        Ok(Outcome::Success {
            stdout: stdout_cap.bytes,
        })
    }
}

#[async_trait]
impl WorkerRunner for TokioWorkerRunner {
    async fn run(&self, command: WorkerCommand, payload: &[u8]) -> Outcome {
        let start = Instant::now();
        Self::log_start(&command, payload.len());

        let outcome = match self.bridge(&command, payload).await {
            Ok(outcome) => outcome,
            Err(err) => Outcome::from(err),
        };

        Self::log_outcome(&command, &outcome, start.elapsed());
        outcome
    }
}

/// Deliver the payload and close stdin. The close is the end-of-input signal
/// and happens on every path: this task owns the handle, so returning drops
/// it. A broken pipe after at least one delivered byte means the worker
/// stopped reading early, which is not a failure; zero delivered bytes is.
async fn write_payload(mut stdin: ChildStdin, payload: Vec<u8>) -> Result<(), WorkerError> {
    let mut written = 0;
    while written < payload.len() {
        match stdin.write(&payload[written..]).await {
            Ok(0) => {
                return Err(WorkerError::StdinWrite {
                    written,
                    source: std::io::ErrorKind::WriteZero.into(),
                })
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe && written > 0 => return Ok(()),
            Err(e) => return Err(WorkerError::StdinWrite { written, source: e }),
        }
    }

    stdin.shutdown().await.map_err(|e| WorkerError::StdinWrite {
        written,
        source: e,
    })?;
    Ok(())
}
