use std::path::Path;
use std::time::Duration;

use crate::error::{NoboxError, Result};
use crate::process::{CommandRunner, ObserveMode, ProcessOutcome, RunRequest};

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// One named unit of external work: a chain of command lines run with
/// stop-on-first-failure semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub alias: String,
    pub title: String,
    pub commands: Vec<String>,
    pub observe: ObserveMode,
}

impl Step {
    pub fn new(
        alias: impl Into<String>,
        title: impl Into<String>,
        commands: Vec<String>,
        observe: ObserveMode,
    ) -> Self {
        Self {
            alias: alias.into(),
            title: title.into(),
            commands,
            observe,
        }
    }

    /// Verbose runs always stream, whatever the step prefers.
    pub fn effective_mode(&self, verbose: bool) -> ObserveMode {
        if verbose {
            ObserveMode::Streamed
        } else {
            self.observe
        }
    }
}

// ---------------------------------------------------------------------------
// StepBatch
// ---------------------------------------------------------------------------

/// Steps executed strictly in declaration order. Aliases are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepBatch {
    steps: Vec<Step>,
}

impl StepBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_steps(steps: Vec<Step>) -> Result<Self> {
        let mut batch = Self::new();
        for step in steps {
            batch.push(step)?;
        }
        Ok(batch)
    }

    pub fn push(&mut self, step: Step) -> Result<()> {
        if step.commands.is_empty() {
            return Err(NoboxError::EmptyStep(step.alias));
        }
        if self.steps.iter().any(|s| s.alias == step.alias) {
            return Err(NoboxError::DuplicateAlias(step.alias));
        }
        self.steps.push(step);
        Ok(())
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub verbose: bool,
    pub timeout: Duration,
}

/// Run a single step and return its raw outcome. Streamed output is echoed to
/// stdout.
pub async fn execute_step<R: CommandRunner>(
    runner: &mut R,
    step: &Step,
    working_dir: &Path,
    options: RunOptions,
) -> ProcessOutcome {
    let mode = step.effective_mode(options.verbose);
    if mode == ObserveMode::Streamed {
        println!("\n{}", step.title);
    }
    tracing::debug!(alias = %step.alias, ?mode, "running step");

    let outcome = runner
        .run(
            RunRequest {
                commands: &step.commands,
                working_dir,
                timeout: options.timeout,
                mode,
                title: &step.title,
            },
            &mut |line: &str| println!("{line}"),
        )
        .await;

    if outcome.is_success() {
        println!("{} ✓ done", step.title);
    }
    outcome
}

/// Run every step of `batch` in order, halting on the first failure.
pub async fn execute<R: CommandRunner>(
    runner: &mut R,
    batch: &StepBatch,
    working_dir: &Path,
    options: RunOptions,
) -> Result<()> {
    for step in batch.steps() {
        let outcome = execute_step(runner, step, working_dir, options).await;
        if !outcome.is_success() {
            return Err(step_failure(step, outcome));
        }
    }
    Ok(())
}

pub(crate) fn step_failure(step: &Step, outcome: ProcessOutcome) -> NoboxError {
    NoboxError::StepFailed {
        alias: step.alias.clone(),
        title: step.title.clone(),
        kind: outcome.kind,
        exit_code: outcome.exit_code,
        command: outcome.failed_command.map(|f| f.line),
    }
}
