//! Pipeline orchestrator.
//!
//! `new` flow:
//!
//! ```text
//! Init → PreflightChecked → (ConfigCollected) → ArchiveStaged
//!      → DependenciesInstalled → PostInstalled → (VcsBootstrapped) → Done
//! ```
//!
//! `clone` flow:
//!
//! ```text
//! Init → PreflightChecked → SourceCloned → DependenciesInstalled → PostInstalled → Done
//! ```
//!
//! Each stage is a `Result`-returning call; the first error moves the
//! pipeline to `Failed` and is returned to the caller.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::archive::{self, ArchiveFetcher};
use crate::config::Config;
use crate::error::{NoboxError, Result};
use crate::install::{resolve_composer, InstallPlan};
use crate::paths;
use crate::probe::probe;
use crate::process::{
    shell_quote, CommandRunner, ObserveMode, OutcomeKind, SYNTHETIC_EXIT_CODE,
};
use crate::prompt::{ask_required, Prompter, EMAIL_QUESTION, LINK_QUESTION, REMOTE_QUESTION};
use crate::step::{execute, RunOptions, Step, StepBatch};
use crate::vcs::{self, identity_command, VcsConfig, VcsOutcome};

// ---------------------------------------------------------------------------
// ProjectContext
// ---------------------------------------------------------------------------

/// Fixed at preflight and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    pub project_name: String,
    pub target_dir: PathBuf,
    pub temp_archive: PathBuf,
}

impl ProjectContext {
    pub fn new(cwd: &Path, project_name: &str, template: &str) -> Result<Self> {
        paths::validate_project_name(project_name)?;
        Ok(Self {
            project_name: project_name.to_string(),
            target_dir: paths::target_dir(cwd, project_name),
            temp_archive: paths::temp_archive_path(cwd, template),
        })
    }
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    PreflightChecked,
    ConfigCollected,
    SourceCloned,
    ArchiveStaged,
    DependenciesInstalled,
    PostInstalled,
    VcsBootstrapped,
    Done,
    Failed { title: String, exit_code: i32 },
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Init => f.write_str("init"),
            PipelineState::PreflightChecked => f.write_str("preflight-checked"),
            PipelineState::ConfigCollected => f.write_str("config-collected"),
            PipelineState::SourceCloned => f.write_str("source-cloned"),
            PipelineState::ArchiveStaged => f.write_str("archive-staged"),
            PipelineState::DependenciesInstalled => f.write_str("dependencies-installed"),
            PipelineState::PostInstalled => f.write_str("post-installed"),
            PipelineState::VcsBootstrapped => f.write_str("vcs-bootstrapped"),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Failed { title, exit_code } => {
                write!(f, "failed ({title}, exit code {exit_code})")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Requests / summaries
// ---------------------------------------------------------------------------

/// How the `new` flow decides on version control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsRequest {
    /// Ask the operator whether to link a repository.
    Ask,
    /// Link to this remote without asking.
    Remote(String),
    /// Never link.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    pub project_dir: PathBuf,
    pub vcs: Option<VcsOutcome>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<'a, R, F, P> {
    runner: &'a mut R,
    fetcher: &'a F,
    prompter: &'a mut P,
    config: &'a Config,
    cwd: PathBuf,
    options: RunOptions,
    /// Identity probe result, filled at most once per pipeline.
    identity: Option<bool>,
    stage: &'static str,
    states: Vec<PipelineState>,
    warnings: Vec<String>,
}

impl<'a, R, F, P> Pipeline<'a, R, F, P>
where
    R: CommandRunner,
    F: ArchiveFetcher,
    P: Prompter,
{
    pub fn new(
        runner: &'a mut R,
        fetcher: &'a F,
        prompter: &'a mut P,
        config: &'a Config,
        cwd: PathBuf,
        verbose: bool,
    ) -> Self {
        Self {
            runner,
            fetcher,
            prompter,
            config,
            cwd,
            options: RunOptions {
                verbose,
                timeout: config.process.timeout(),
            },
            identity: None,
            stage: "init",
            states: vec![PipelineState::Init],
            warnings: Vec::new(),
        }
    }

    pub fn states(&self) -> &[PipelineState] {
        &self.states
    }

    pub fn state(&self) -> &PipelineState {
        // `states` always starts with Init
        &self.states[self.states.len() - 1]
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Create a new project from the configured archive template.
    pub async fn scaffold(&mut self, name: &str, request: VcsRequest) -> Result<PipelineSummary> {
        let result = self.run_scaffold(name, request).await;
        self.finish(result)
    }

    /// Create a new project by cloning an existing repository.
    pub async fn clone_project(&mut self, repository: &str, name: &str) -> Result<PipelineSummary> {
        let result = self.run_clone(repository, name).await;
        self.finish(result)
    }

    // -----------------------------------------------------------------------
    // Flows
    // -----------------------------------------------------------------------

    async fn run_scaffold(&mut self, name: &str, request: VcsRequest) -> Result<PipelineSummary> {
        let (ctx, plan) = self.preflight(name)?;

        self.stage = "collecting version control settings";
        let vcs_config = match request {
            VcsRequest::Skip => None,
            VcsRequest::Ask => {
                if self.prompter.confirm(LINK_QUESTION, false)? {
                    Some(self.collect_vcs(None).await?)
                } else {
                    None
                }
            }
            VcsRequest::Remote(url) => Some(self.collect_vcs(Some(url)).await?),
        };
        if vcs_config.is_some() {
            self.enter(PipelineState::ConfigCollected);
        }

        println!("Crafting application...");
        self.stage = "staging archive";
        archive::stage(
            self.fetcher,
            &self.config.archive,
            ctx.temp_archive.clone(),
            &self.cwd,
            &ctx.target_dir,
        )
        .await?;
        self.enter(PipelineState::ArchiveStaged);

        self.install(&ctx, &plan).await?;

        let vcs = match vcs_config {
            Some(config) => {
                self.stage = "bootstrapping version control";
                let identity = self.identity.unwrap_or(false);
                let outcome = vcs::bootstrap(
                    &mut *self.runner,
                    &ctx.target_dir,
                    config,
                    identity,
                    &self.config.vcs,
                    self.options,
                )
                .await?;
                if let VcsOutcome::Partial { command, exit_code } = &outcome {
                    self.warnings.push(format!(
                        "local repository created but `{command}` failed (exit code {exit_code})"
                    ));
                }
                self.enter(PipelineState::VcsBootstrapped);
                Some(outcome)
            }
            None => None,
        };

        self.enter(PipelineState::Done);
        Ok(PipelineSummary {
            project_dir: ctx.target_dir,
            vcs,
        })
    }

    async fn run_clone(&mut self, repository: &str, name: &str) -> Result<PipelineSummary> {
        let (ctx, plan) = self.preflight(name)?;

        self.stage = "cloning repository";
        let mut source = StepBatch::new();
        if !self.identity_configured().await {
            let email = ask_required(&mut *self.prompter, EMAIL_QUESTION)?;
            source.push(Step::new(
                "github-set-email",
                "Setting github email",
                vec![identity_command(&email)],
                ObserveMode::Streamed,
            ))?;
        }
        source.push(Step::new(
            "github-clone",
            "Cloning repository",
            vec![format!(
                "git clone {} {}",
                shell_quote(repository),
                shell_quote(&ctx.project_name)
            )],
            ObserveMode::Streamed,
        ))?;

        println!("Crafting application...");
        execute(&mut *self.runner, &source, &self.cwd, self.options).await?;
        if !ctx.target_dir.is_dir() {
            return Err(NoboxError::StepFailed {
                alias: "github-clone".to_string(),
                title: "Cloning repository".to_string(),
                kind: OutcomeKind::NonZeroExit,
                exit_code: SYNTHETIC_EXIT_CODE,
                command: None,
            });
        }
        self.enter(PipelineState::SourceCloned);

        self.install(&ctx, &plan).await?;
        self.enter(PipelineState::Done);
        Ok(PipelineSummary {
            project_dir: ctx.target_dir,
            vcs: None,
        })
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    /// Validate the name, refuse an existing target and build the install
    /// plan. Nothing here touches the filesystem beyond the existence check.
    fn preflight(&mut self, name: &str) -> Result<(ProjectContext, InstallPlan)> {
        self.stage = "preflight";
        let ctx = ProjectContext::new(&self.cwd, name, &self.config.archive.template)?;
        if ctx.target_dir.exists() {
            return Err(NoboxError::ProjectExists(ctx.target_dir));
        }
        let composer = resolve_composer(&self.cwd);
        let plan = InstallPlan::from_config(&self.config.install, &composer)?;
        self.enter(PipelineState::PreflightChecked);
        Ok((ctx, plan))
    }

    async fn collect_vcs(&mut self, remote: Option<String>) -> Result<VcsConfig> {
        let identity_email = if self.identity_configured().await {
            None
        } else {
            Some(ask_required(&mut *self.prompter, EMAIL_QUESTION)?)
        };
        let remote_url = match remote {
            Some(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => ask_required(&mut *self.prompter, REMOTE_QUESTION)?,
        };
        Ok(VcsConfig {
            identity_email,
            remote_url,
        })
    }

    async fn install(&mut self, ctx: &ProjectContext, plan: &InstallPlan) -> Result<()> {
        self.stage = "installing dependencies";
        execute(&mut *self.runner, &plan.dependencies, &ctx.target_dir, self.options).await?;
        self.enter(PipelineState::DependenciesInstalled);

        self.stage = "running post installation";
        execute(&mut *self.runner, &plan.post_install, &ctx.target_dir, self.options).await?;
        self.enter(PipelineState::PostInstalled);
        Ok(())
    }

    async fn identity_configured(&mut self) -> bool {
        if let Some(known) = self.identity {
            return known;
        }
        let found = probe(
            &mut *self.runner,
            &self.config.vcs.probe_command,
            &self.cwd,
            self.options.timeout,
        )
        .await;
        self.identity = Some(found);
        found
    }

    // -----------------------------------------------------------------------
    // Bookkeeping
    // -----------------------------------------------------------------------

    fn enter(&mut self, state: PipelineState) {
        tracing::info!(%state, "pipeline");
        self.states.push(state);
    }

    fn finish(&mut self, result: Result<PipelineSummary>) -> Result<PipelineSummary> {
        if let Err(e) = &result {
            let (title, exit_code) = match e {
                NoboxError::StepFailed {
                    title, exit_code, ..
                } => (title.clone(), *exit_code),
                _ => (self.stage.to_string(), SYNTHETIC_EXIT_CODE),
            };
            self.enter(PipelineState::Failed { title, exit_code });
        }
        result
    }
}
