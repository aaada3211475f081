pub mod clone;
pub mod config;
pub mod new;

use anyhow::Context;
use nobox_core::config::{Config, LoadedConfig, WarnLevel};
use std::path::{Path, PathBuf};

pub fn current_dir() -> anyhow::Result<PathBuf> {
    std::env::current_dir().context("failed to read the current directory")
}

/// Load the effective config. Validation errors abort; warnings are printed.
pub fn load_config(explicit: Option<&Path>, cwd: &Path) -> anyhow::Result<LoadedConfig> {
    let loaded = Config::resolve(explicit, cwd).context("failed to load config")?;
    match &loaded.source {
        Some(path) => tracing::debug!(path = %path.display(), "using config file"),
        None => tracing::debug!("using built-in defaults"),
    }

    let warnings = loaded.config.validate();
    for w in warnings.iter().filter(|w| w.level == WarnLevel::Warning) {
        eprintln!("warning: {}", w.message);
    }
    if Config::has_errors(&warnings) {
        let errors: Vec<_> = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message.as_str())
            .collect();
        anyhow::bail!("invalid config: {}", errors.join("; "));
    }
    Ok(loaded)
}

pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
