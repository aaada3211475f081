use std::path::Path;

use crate::config::{InstallConfig, StepConfig};
use crate::error::Result;
use crate::paths;
use crate::process::shell_quote;
use crate::step::StepBatch;

/// The command used to invoke composer from `cwd`.
///
/// A `composer.phar` next to the operator takes precedence and is run through
/// php; otherwise a `composer` binary is expected on PATH.
pub fn resolve_composer(cwd: &Path) -> String {
    let phar = paths::composer_phar(cwd);
    if !phar.is_file() {
        return "composer".to_string();
    }
    let php = which::which("php")
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "php".to_string());
    format!(
        "{} {}",
        shell_quote(&php),
        shell_quote(&phar.display().to_string())
    )
}

/// Dependency and post-install batches, ready to run.
#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub dependencies: StepBatch,
    pub post_install: StepBatch,
}

impl InstallPlan {
    pub fn from_config(config: &InstallConfig, composer: &str) -> Result<Self> {
        Ok(Self {
            dependencies: batch(&config.dependencies, composer)?,
            post_install: batch(&config.post_install, composer)?,
        })
    }
}

fn batch(steps: &[StepConfig], composer: &str) -> Result<StepBatch> {
    StepBatch::from_steps(steps.iter().map(|s| s.to_step(composer)).collect())
}
