use crate::output::print_summary;
use crate::prompt::StdinPrompter;
use anyhow::Context;
use nobox_core::archive::UrlFetcher;
use nobox_core::pipeline::Pipeline;
use nobox_core::process::ProcessRunner;
use std::path::Path;

pub fn run(
    config_path: Option<&Path>,
    repository: &str,
    name: &str,
    verbose: bool,
) -> anyhow::Result<()> {
    let cwd = super::current_dir()?;
    let loaded = super::load_config(config_path, &cwd)?;

    let mut runner = ProcessRunner::new(loaded.config.process.tick());
    // Never called by the clone flow.
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
        .block_on(pipeline.clone_project(repository, name))
        .with_context(|| format!("failed to clone '{repository}' into '{name}'"))?;

    print_summary(&summary, pipeline.states(), pipeline.warnings());
    Ok(())
}
