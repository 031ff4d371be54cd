//! Gateway configuration: the worker command line, its working directory and
//! deadline, and the HTTP listen address all arrive here explicitly instead
//! of through ambient process state.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::worker::{OverflowAction, PumpLimits, WorkerCommand, WorkerCommandBuilder};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address the HTTP listener binds to
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    pub worker: WorkerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Worker command line, shell-style; the first word is the executable.
    /// Request payloads never become part of this line.
    pub command: String,

    /// Directory the worker runs in
    pub working_dir: Option<PathBuf>,

    /// Deadline for one worker invocation, humantime-style ("90s", "2m")
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    /// Extra environment for the worker
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Cap on captured bytes per stream; unset means unbounded
    #[serde(default)]
    pub max_output_bytes: Option<usize>,

    /// What to do when a stream hits the cap
    #[serde(default)]
    pub on_overflow: OverflowAction,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_timeout() -> Duration {
    Duration::from_secs(120)
}

impl GatewayConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: GatewayConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.worker_command()?;
        Ok(config)
    }

    /// Build the fixed command template the bridge runs per request
    pub fn worker_command(&self) -> Result<WorkerCommand> {
        let words = shell_words::split(&self.worker.command)
            .with_context(|| format!("Invalid worker command: {}", self.worker.command))?;
        let (program, args) = words
            .split_first()
            .ok_or_else(|| anyhow!("Worker command is empty"))?;

        let mut builder = WorkerCommandBuilder::new(program)
            .args(args)
            .envs(&self.worker.env)
            .timeout(self.worker.timeout);
        if let Some(ref dir) = self.worker.working_dir {
            builder = builder.current_dir(dir);
        }
        Ok(builder.build())
    }

    pub fn pump_limits(&self) -> PumpLimits {
        PumpLimits {
            max_bytes: self.worker.max_output_bytes,
            overflow: self.worker.on_overflow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [worker]
            command = "python3 -m engine.main"
            "#,
        )
        .unwrap();

        assert_eq!(config.listen, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.worker.timeout, Duration::from_secs(120));

        let command = config.worker_command().unwrap();
        assert_eq!(command.program, "python3");
        assert_eq!(command.args, vec!["-m", "engine.main"]);
        assert_eq!(command.timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_full_config() {
        let config: GatewayConfig = toml::from_str(
            r#"
            listen = "0.0.0.0:9000"

            [worker]
            command = "engine --mode full"
            working_dir = "/srv/engine"
            timeout = "90s"
            max_output_bytes = 1048576
            on_overflow = "fail"

            [worker.env]
            ENGINE_PROFILE = "production"
            "#,
        )
        .unwrap();

        assert_eq!(config.listen, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.worker.timeout, Duration::from_secs(90));

        let command = config.worker_command().unwrap();
        assert_eq!(command.working_dir, Some(PathBuf::from("/srv/engine")));
        assert_eq!(
            command.env.get("ENGINE_PROFILE").map(String::as_str),
            Some("production")
        );

        let limits = config.pump_limits();
        assert_eq!(limits.max_bytes, Some(1_048_576));
        assert_eq!(limits.overflow, OverflowAction::Fail);
    }

    #[test]
    fn test_quoted_command_words() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [worker]
            command = "sh -c 'printf ok'"
            "#,
        )
        .unwrap();

        let command = config.worker_command().unwrap();
        assert_eq!(command.program, "sh");
        assert_eq!(command.args, vec!["-c", "printf ok"]);
    }

    #[test]
    fn test_empty_command_rejected() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [worker]
            command = ""
            "#,
        )
        .unwrap();

        assert!(config.worker_command().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = GatewayConfig::load(Path::new("/nonexistent/pipegate.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipegate.toml");
        std::fs::write(&path, "[worker]\ncommand = \"cat\"\ntimeout = \"5s\"\n").unwrap();

        let config = GatewayConfig::load(&path).unwrap();
        assert_eq!(config.worker.timeout, Duration::from_secs(5));
    }
}
