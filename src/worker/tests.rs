#[cfg(test)]
mod tests {
    use super::super::*;
    use std::time::{Duration, Instant};

    fn sh(script: &str) -> WorkerCommand {
        WorkerCommandBuilder::new("sh").arg("-c").arg(script).build()
    }

    fn runner() -> TokioWorkerRunner {
        TokioWorkerRunner::new(PumpLimits::default())
    }

    #[tokio::test]
    async fn test_echo_worker_round_trips_payload() {
        let payload = b"analyze this case\nsecond line \xf0\x9f\x93\x8e".to_vec();

        let outcome = runner().run(sh("cat"), &payload).await;

        match outcome {
            Outcome::Success { stdout } => assert_eq!(stdout, payload),
            other => panic!("Expected Success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_payload_still_reaches_eof() {
        let outcome = runner().run(sh("cat"), b"").await;

        match outcome {
            Outcome::Success { stdout } => assert!(stdout.is_empty()),
            other => panic!("Expected Success, got {other:?}"),
        }
    }

    // A worker that fills its stdout far past pipe capacity before touching
    // stdin, while the gateway is still delivering a large payload. Hangs
    // forever unless the writer and both pumps really are independent.
    #[tokio::test]
    async fn test_large_output_before_reading_stdin_does_not_deadlock() {
        let payload = vec![b'a'; 1_048_576];
        let command = WorkerCommandBuilder::new("sh")
            .arg("-c")
            .arg("head -c 1048576 /dev/zero; cat >/dev/null")
            .timeout(Duration::from_secs(30))
            .build();

        let outcome = runner().run(command, &payload).await;

        match outcome {
            Outcome::Success { stdout } => assert_eq!(stdout.len(), 1_048_576),
            other => panic!("Expected Success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let outcome = runner().run(sh("printf boom >&2; exit 2"), b"input").await;

        match outcome {
            Outcome::NonZeroExit {
                code,
                stdout,
                stderr,
            } => {
                assert_eq!(code, 2);
                assert!(stdout.is_empty());
                assert_eq!(stderr, b"boom");
            }
            other => panic!("Expected NonZeroExit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_partial_stdout_kept_on_failure() {
        let outcome = runner()
            .run(sh("printf partial; printf why >&2; exit 1"), b"")
            .await;

        match outcome {
            Outcome::NonZeroExit {
                code,
                stdout,
                stderr,
            } => {
                assert_eq!(code, 1);
                assert_eq!(stdout, b"partial");
                assert_eq!(stderr, b"why");
            }
            other => panic!("Expected NonZeroExit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_nonexistent_program_is_spawn_failure() {
        let command = WorkerCommandBuilder::new("nonexistent-worker-12345").build();

        let outcome = runner().run(command, b"payload").await;

        match outcome {
            Outcome::SpawnFailure(WorkerError::CommandNotFound(program)) => {
                assert_eq!(program, "nonexistent-worker-12345");
            }
            other => panic!("Expected SpawnFailure, got {other:?}"),
        }
    }

    // The worker closes both output streams but never exits; only the
    // deadline gets the request unstuck.
    #[tokio::test]
    async fn test_timeout_on_worker_that_never_exits() {
        let start = Instant::now();
        let command = WorkerCommandBuilder::new("sh")
            .arg("-c")
            .arg("exec >/dev/null 2>&1; sleep 30")
            .timeout(Duration::from_millis(200))
            .build();

        let outcome = runner().run(command, b"").await;

        match outcome {
            Outcome::Timeout { elapsed, .. } => {
                assert!(elapsed >= Duration::from_millis(200));
            }
            other => panic!("Expected Timeout, got {other:?}"),
        }
        // Deadline plus kill and flush grace, nowhere near the worker's 30s
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        let command = WorkerCommandBuilder::new("sh")
            .arg("-c")
            .arg("printf sofar; printf diag >&2; sleep 30")
            .timeout(Duration::from_millis(300))
            .build();

        let outcome = runner().run(command, b"").await;

        match outcome {
            Outcome::Timeout { stdout, stderr, .. } => {
                assert_eq!(stdout, b"sofar");
                assert_eq!(stderr, b"diag");
            }
            other => panic!("Expected Timeout, got {other:?}"),
        }
    }

    // Worker consumes a prefix of stdin and exits cleanly; the resulting
    // broken pipe is a soft end of writing, not a failure.
    #[tokio::test]
    async fn test_worker_that_stops_reading_early() {
        let payload = vec![b'b'; 1_048_576];

        let outcome = runner().run(sh("head -c 10 >/dev/null"), &payload).await;

        match outcome {
            Outcome::Success { stdout } => assert!(stdout.is_empty()),
            other => panic!("Expected Success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_capture_limit_truncates() {
        let limits = PumpLimits {
            max_bytes: Some(8),
            overflow: OverflowAction::Truncate,
        };

        let outcome = TokioWorkerRunner::new(limits)
            .run(sh("printf 0123456789abcdef"), b"")
            .await;

        match outcome {
            Outcome::Success { stdout } => assert_eq!(stdout, b"01234567"),
            other => panic!("Expected Success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_capture_limit_fail_policy() {
        let limits = PumpLimits {
            max_bytes: Some(8),
            overflow: OverflowAction::Fail,
        };

        let outcome = TokioWorkerRunner::new(limits)
            .run(sh("printf 0123456789abcdef"), b"")
            .await;

        match outcome {
            Outcome::IoFailure(WorkerError::CaptureLimit { limit, .. }) => {
                assert_eq!(limit, 8);
            }
            other => panic!("Expected IoFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_worker_runs_in_configured_directory() {
        let dir = tempfile::tempdir().unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        let command = WorkerCommandBuilder::new("sh")
            .arg("-c")
            .arg("pwd")
            .current_dir(&canonical)
            .build();

        let outcome = runner().run(command, b"").await;

        match outcome {
            Outcome::Success { stdout } => {
                let printed = String::from_utf8(stdout).unwrap();
                assert_eq!(printed.trim(), canonical.to_str().unwrap());
            }
            other => panic!("Expected Success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_worker_sees_configured_env() {
        let command = WorkerCommandBuilder::new("sh")
            .arg("-c")
            .arg("printf \"$PIPEGATE_TEST_VALUE\"")
            .env("PIPEGATE_TEST_VALUE", "from-config")
            .build();

        let outcome = runner().run(command, b"").await;

        match outcome {
            Outcome::Success { stdout } => assert_eq!(stdout, b"from-config"),
            other => panic!("Expected Success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bridge_runs_fixed_command_per_request() {
        let command = sh("cat");
        let bridge = Bridge::production(command, PumpLimits::default());

        let first = bridge.run(b"first").await;
        let second = bridge.run(b"second").await;

        assert!(matches!(first, Outcome::Success { ref stdout } if stdout == b"first"));
        assert!(matches!(second, Outcome::Success { ref stdout } if stdout == b"second"));
    }

    #[tokio::test]
    async fn test_mock_runner_replays_expectation() {
        let mut mock = MockWorkerRunner::new();
        mock.expect_worker("engine")
            .returns_stdout(b"{\"answer\": 42}")
            .finish();

        let command = WorkerCommandBuilder::new("engine").build();
        let outcome = mock.run(command, b"question").await;

        assert!(matches!(outcome, Outcome::Success { ref stdout } if stdout == b"{\"answer\": 42}"));
        assert!(mock.verify_called("engine", 1));
        assert_eq!(mock.payloads_for("engine"), vec![b"question".to_vec()]);
    }

    #[tokio::test]
    async fn test_mock_runner_nonzero_exit() {
        let mut mock = MockWorkerRunner::new();
        mock.expect_worker("engine")
            .returns_exit_code(3)
            .returns_stderr(b"bad input")
            .finish();

        let command = WorkerCommandBuilder::new("engine").build();
        let outcome = mock.run(command, b"").await;

        match outcome {
            Outcome::NonZeroExit { code, stderr, .. } => {
                assert_eq!(code, 3);
                assert_eq!(stderr, b"bad input");
            }
            other => panic!("Expected NonZeroExit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mock_runner_enforces_times() {
        let mut mock = MockWorkerRunner::new();
        mock.expect_worker("engine").times(1).finish();

        let command = WorkerCommandBuilder::new("engine").build();
        assert!(mock.run(command.clone(), b"").await.is_success());
        assert!(!mock.run(command, b"").await.is_success());
    }

    #[tokio::test]
    async fn test_mock_runner_unexpected_worker() {
        let mock = MockWorkerRunner::new();
        let command = WorkerCommandBuilder::new("stranger").build();

        let outcome = mock.run(command, b"").await;
        assert!(matches!(outcome, Outcome::IoFailure(_)));
    }
}
