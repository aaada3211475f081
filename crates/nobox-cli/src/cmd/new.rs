use crate::output::print_summary;
use crate::prompt::StdinPrompter;
use anyhow::Context;
use nobox_core::archive::UrlFetcher;
use nobox_core::pipeline::{Pipeline, VcsRequest};
use nobox_core::process::ProcessRunner;
use std::path::Path;

pub fn run(
    config_path: Option<&Path>,
    name: &str,
    remote: Option<String>,
    no_vcs: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let cwd = super::current_dir()?;
    let loaded = super::load_config(config_path, &cwd)?;

    let request = match (no_vcs, remote) {
        (true, _) => VcsRequest::Skip,
        (false, Some(url)) => VcsRequest::Remote(url),
        (false, None) => VcsRequest::Ask,
    };

    let mut runner = ProcessRunner::new(loaded.config.process.tick());
    let fetcher = UrlFetcher::new();
    let mut prompter = StdinPrompter;
    let mut pipeline = Pipeline::new(
        &mut runner,
        &fetcher,
        &mut prompter,
        &loaded.config,
        cwd,
        verbose,
    );

    let rt = super::runtime()?;
    let summary = rt
        .block_on(pipeline.scaffold(name, request))
        .with_context(|| format!("failed to create '{name}'"))?;

    print_summary(&summary, pipeline.states(), pipeline.warnings());
    Ok(())
}
