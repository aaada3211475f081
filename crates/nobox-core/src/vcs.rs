//! Version-control bootstrap: one chained step that optionally sets the
//! operator's identity, then creates the repository and pushes it upstream.

use std::path::Path;

use crate::config::VcsSettings;
use crate::error::Result;
use crate::process::{shell_quote, CommandRunner, ObserveMode};
use crate::step::{execute_step, step_failure, RunOptions, Step};

pub const BOOTSTRAP_ALIAS: &str = "github-setup";
pub const BOOTSTRAP_TITLE: &str = "Setting up github repository";

/// Collected during preflight, consumed once by [`bootstrap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsConfig {
    /// Present only when the identity probe found nothing configured.
    pub identity_email: Option<String>,
    pub remote_url: String,
}

/// Result of a bootstrap that got past `git init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsOutcome {
    /// Every command succeeded.
    Linked,
    /// The local repository exists but a later command failed.
    Partial { command: String, exit_code: i32 },
}

pub fn identity_command(email: &str) -> String {
    format!("git config --global user.email {}", shell_quote(email))
}

/// Build the bootstrap step. The identity line is only constructed when no
/// identity is configured and an email was collected.
pub fn bootstrap_step(config: &VcsConfig, identity_configured: bool, settings: &VcsSettings) -> Step {
    let mut commands = Vec::with_capacity(6);
    if !identity_configured {
        if let Some(email) = &config.identity_email {
            commands.push(identity_command(email));
        }
    }
    commands.extend([
        "git init".to_string(),
        "git add .".to_string(),
        format!("git commit -m {}", shell_quote(&settings.commit_message)),
        format!("git remote add origin {}", shell_quote(&config.remote_url)),
        format!("git push -u origin {}", shell_quote(&settings.branch)),
    ]);
    Step::new(BOOTSTRAP_ALIAS, BOOTSTRAP_TITLE, commands, ObserveMode::Streamed)
}

/// Run the bootstrap chain in `directory`.
///
/// A failure at or before `git init` is an error. Anything later leaves a
/// usable local repository and is reported as [`VcsOutcome::Partial`].
pub async fn bootstrap<R: CommandRunner>(
    runner: &mut R,
    directory: &Path,
    config: VcsConfig,
    identity_configured: bool,
    settings: &VcsSettings,
    options: RunOptions,
) -> Result<VcsOutcome> {
    let step = bootstrap_step(&config, identity_configured, settings);
    let init_index = step
        .commands
        .iter()
        .position(|c| c == "git init")
        .unwrap_or(0);

    let outcome = execute_step(runner, &step, directory, options).await;
    if outcome.is_success() {
        return Ok(VcsOutcome::Linked);
    }

    match outcome.failed_command.clone() {
        Some(failed) if failed.index > init_index => {
            tracing::warn!(
                command = %failed.line,
                exit_code = outcome.exit_code,
                "repository created locally but remote setup failed"
            );
            Ok(VcsOutcome::Partial {
                command: failed.line,
                exit_code: outcome.exit_code,
            })
        }
        _ => Err(step_failure(&step, outcome)),
    }
}
