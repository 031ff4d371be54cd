//! Stream pumps that drain worker output into bounded in-memory buffers.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::WorkerError;

const READ_CHUNK: usize = 8192;

/// Stream source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamSource::Stdout => write!(f, "stdout"),
            StreamSource::Stderr => write!(f, "stderr"),
        }
    }
}

/// Behavior when a captured stream reaches its configured cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverflowAction {
    /// Keep the first max_bytes, discard the rest
    #[default]
    Truncate,
    /// Treat the overflowing capture as an I/O failure
    Fail,
}

/// Capture limits for one stream
#[derive(Debug, Clone, Copy, Default)]
pub struct PumpLimits {
    /// Maximum bytes to retain; None means unbounded
    pub max_bytes: Option<usize>,
    pub overflow: OverflowAction,
}

/// Bytes accumulated from one worker stream, plus how draining ended.
#[derive(Debug, Default)]
pub struct CapturedStream {
    pub bytes: Vec<u8>,
    /// Cap was hit under the truncate policy
    pub truncated: bool,
    /// Read error or cap hit under the fail policy; draining stopped storing
    /// but the pipe was still consumed to EOF
    pub error: Option<WorkerError>,
}

/// Drain `reader` to EOF, retaining at most `limits.max_bytes`.
///
/// Once the cap is hit the pump keeps consuming the pipe without storing, so
/// a verbose worker cannot block on a full pipe while the parent still holds
/// the other end. A read error ends accumulation early and is recorded on the
/// capture rather than raised; the caller surfaces it during classification.
pub async fn drain<R>(mut reader: R, source: StreamSource, limits: PumpLimits) -> CapturedStream
where
    R: AsyncRead + Unpin,
{
    let mut captured = CapturedStream::default();
    let mut buf = [0u8; READ_CHUNK];
    let mut discarding = false;

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if discarding {
                    continue;
                }
                match limits.max_bytes {
                    Some(max) if captured.bytes.len() + n > max => {
                        let room = max - captured.bytes.len();
                        match limits.overflow {
                            OverflowAction::Truncate => {
                                captured.bytes.extend_from_slice(&buf[..room]);
                                captured.truncated = true;
                            }
                            OverflowAction::Fail => {
                                captured.error = Some(WorkerError::CaptureLimit {
                                    stream: source,
                                    limit: max,
                                });
                            }
                        }
                        discarding = true;
                    }
                    _ => captured.bytes.extend_from_slice(&buf[..n]),
                }
            }
            Err(source_err) => {
                captured.error = Some(WorkerError::StreamRead {
                    stream: source,
                    source: source_err,
                });
                break;
            }
        }
    }

    captured
}
