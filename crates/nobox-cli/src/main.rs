mod cmd;
mod output;
mod prompt;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "nobox",
    about = "Create new projects from the Nobox template, install their dependencies and link them to a repository",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: ./nobox.yaml, then ~/.nobox/config.yaml)
    #[arg(long, global = true, env = "NOBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Stream the output of every step instead of showing a spinner
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new application from the template archive
    New {
        /// Application (directory) name
        name: String,

        /// Remote repository to link without asking (git@github.com:org/repo.git)
        #[arg(long)]
        remote: Option<String>,

        /// Don't link a repository and don't ask
        #[arg(long, conflicts_with = "remote")]
        no_vcs: bool,
    },

    /// Create a new application by cloning an existing repository
    Clone {
        /// Repository to clone
        repository: String,

        /// Application (directory) name
        name: String,
    },

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::New {
            name,
            remote,
            no_vcs,
        } => cmd::new::run(config, &name, remote, no_vcs, cli.verbose),
        Commands::Clone { repository, name } => {
            cmd::clone::run(config, &repository, &name, cli.verbose)
        }
        Commands::Config { subcommand } => cmd::config::run(config, subcommand),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
