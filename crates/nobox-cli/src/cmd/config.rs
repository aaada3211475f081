use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use nobox_core::config::{Config, WarnLevel};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration
    Show {
        /// Output as JSON instead of YAML
        #[arg(long)]
        json: bool,
    },

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(config_path: Option<&Path>, subcmd: ConfigSubcommand) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show { json } => show(config_path, json),
        ConfigSubcommand::Validate => validate(config_path),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(config_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let cwd = super::current_dir()?;
    let loaded = Config::resolve(config_path, &cwd).context("failed to load config")?;

    if json {
        let value = serde_json::json!({
            "source": loaded.source,
            "config": loaded.config,
        });
        return print_json(&value);
    }

    match &loaded.source {
        Some(path) => println!("# source: {}", path.display()),
        None => println!("# source: built-in defaults"),
    }
    print!("{}", loaded.config.to_yaml()?);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(config_path: Option<&Path>) -> anyhow::Result<()> {
    let cwd = super::current_dir()?;
    let loaded = Config::resolve(config_path, &cwd).context("failed to load config")?;
    let warnings = loaded.config.validate();

    if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if Config::has_errors(&warnings) {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}
