use std::path::Path;
use std::time::Duration;

use crate::process::{CommandRunner, ObserveMode, RunRequest};

/// Run a read-only diagnostic command and report whether it printed any
/// non-empty line. Output is collected, never echoed.
///
/// A command that fails to run, or exits non-zero, counts as "nothing
/// configured": `git config --global user.email` exits 1 when the key is
/// unset.
pub async fn probe<R: CommandRunner>(
    runner: &mut R,
    command: &str,
    working_dir: &Path,
    timeout: Duration,
) -> bool {
    let commands = [command.to_string()];
    let mut found = false;
    let outcome = runner
        .run(
            RunRequest {
                commands: &commands,
                working_dir,
                timeout,
                mode: ObserveMode::Streamed,
                title: "identity probe",
            },
            &mut |line: &str| {
                if !line.trim().is_empty() {
                    found = true;
                }
            },
        )
        .await;

    tracing::debug!(command, found, exit_code = outcome.exit_code, "probe finished");
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRunner;

    const PROBE: &str = "git config --global user.email";

    #[tokio::test]
    async fn output_means_configured() {
        let mut runner = RecordingRunner::new().respond(PROBE, &["me@example.com"]);
        assert!(probe(&mut runner, PROBE, Path::new("."), Duration::from_secs(5)).await);
        assert_eq!(runner.lines(), vec![PROBE]);
        assert_eq!(runner.calls[0].mode, ObserveMode::Streamed);
    }

    #[tokio::test]
    async fn blank_output_means_not_configured() {
        let mut runner = RecordingRunner::new().respond(PROBE, &["", "   "]);
        assert!(!probe(&mut runner, PROBE, Path::new("."), Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn failing_probe_means_not_configured() {
        let mut runner = RecordingRunner::new().fail_on(PROBE, 1);
        assert!(!probe(&mut runner, PROBE, Path::new("."), Duration::from_secs(5)).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn real_process_output_is_detected() {
        let mut runner = crate::process::ProcessRunner::default();
        let dir = std::env::temp_dir();
        assert!(probe(&mut runner, "echo someone", &dir, Duration::from_secs(5)).await);
        assert!(!probe(&mut runner, "true", &dir, Duration::from_secs(5)).await);
    }
}
