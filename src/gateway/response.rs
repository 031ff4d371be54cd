//! Translation from a bridged worker outcome to an HTTP response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::worker::Outcome;

/// Structured error body. Serialized with serde_json, so quotes and control
/// characters in worker diagnostics always arrive escaped.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: &'static str,
    pub details: String,
}

/// A translated response: either the worker's stdout verbatim or a tagged
/// error. Pure value so translation is testable without a server.
#[derive(Debug)]
pub enum GatewayResponse {
    Ok(Vec<u8>),
    Error { status: StatusCode, body: ErrorBody },
}

impl GatewayResponse {
    fn error(tag: &'static str, details: String) -> Self {
        GatewayResponse::Error {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody {
                error: tag,
                details,
            },
        }
    }
}

pub fn translate(outcome: Outcome) -> GatewayResponse {
    match outcome {
        Outcome::Success { stdout } => GatewayResponse::Ok(stdout),
        Outcome::NonZeroExit { stderr, .. } => GatewayResponse::error(
            "worker-nonzero-exit",
            String::from_utf8_lossy(&stderr).into_owned(),
        ),
        Outcome::Timeout {
            elapsed, stderr, ..
        } => {
            let details = if stderr.is_empty() {
                format!("worker produced no diagnostics before termination ({elapsed:?})")
            } else {
                String::from_utf8_lossy(&stderr).into_owned()
            };
            GatewayResponse::error("timeout", details)
        }
        Outcome::SpawnFailure(err) => GatewayResponse::error("spawn-failure", err.to_string()),
        Outcome::IoFailure(err) => GatewayResponse::error("io-failure", err.to_string()),
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        match self {
            GatewayResponse::Ok(body) => (StatusCode::OK, body).into_response(),
            GatewayResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}
