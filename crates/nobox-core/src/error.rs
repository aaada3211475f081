use std::path::PathBuf;

use thiserror::Error;

use crate::process::OutcomeKind;

#[derive(Debug, Error)]
pub enum NoboxError {
    #[error("application already exists: {}", .0.display())]
    ProjectExists(PathBuf),

    #[error("invalid project name '{0}': must be a non-empty directory name")]
    InvalidProjectName(String),

    #[error("{title} failed: {kind} (exit code {exit_code})")]
    StepFailed {
        alias: String,
        title: String,
        kind: OutcomeKind,
        exit_code: i32,
        command: Option<String>,
    },

    #[error("duplicate step alias '{0}' in batch")]
    DuplicateAlias(String),

    #[error("step '{0}' has no command lines")]
    EmptyStep(String),

    #[error("failed to download {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("unsupported archive url '{0}': expected http://, https:// or file://")]
    UnsupportedUrl(String),

    #[error("failed to extract archive {}: {reason}", .path.display())]
    Extract { path: PathBuf, reason: String },

    #[error("archive did not unpack to the expected folder {}", .0.display())]
    ExtractedRootMissing(PathBuf),

    #[error("no answer given for: {0}")]
    EmptyAnswer(String),

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, NoboxError>;
