use nobox_core::pipeline::{PipelineState, PipelineSummary};
use nobox_core::vcs::VcsOutcome;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Closing lines after a successful run. Warnings go to stderr.
pub fn print_summary(summary: &PipelineSummary, states: &[PipelineState], warnings: &[String]) {
    tracing::debug!(
        states = %states.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> "),
        "pipeline finished"
    );
    for w in warnings {
        eprintln!("warning: {w}");
    }
    match &summary.vcs {
        Some(VcsOutcome::Linked) => println!("Repository linked and pushed."),
        Some(VcsOutcome::Partial { .. }) => {
            println!("Local repository created; push it manually once the remote is reachable.")
        }
        None => {}
    }
    println!("Application ready!! ({})", summary.project_dir.display());
}
