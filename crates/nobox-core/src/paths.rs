use crate::error::{NoboxError, Result};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File name constants
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "nobox.yaml";
pub const USER_CONFIG_DIR: &str = ".nobox";
pub const USER_CONFIG_FILE: &str = "config.yaml";

pub const COMPOSER_PHAR: &str = "composer.phar";
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn target_dir(cwd: &Path, project_name: &str) -> PathBuf {
    cwd.join(project_name)
}

pub fn project_config_path(cwd: &Path) -> PathBuf {
    cwd.join(CONFIG_FILE)
}

/// `~/.nobox/config.yaml`, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    home::home_dir().map(|h| h.join(USER_CONFIG_DIR).join(USER_CONFIG_FILE))
}

/// A fresh, unique temporary archive path under `cwd`.
pub fn temp_archive_path(cwd: &Path, template: &str) -> PathBuf {
    let id = uuid::Uuid::new_v4().simple();
    cwd.join(format!("nobox-{template}_{id}.{ARCHIVE_EXTENSION}"))
}

pub fn composer_phar(cwd: &Path) -> PathBuf {
    cwd.join(COMPOSER_PHAR)
}

// ---------------------------------------------------------------------------
// Project name validation
// ---------------------------------------------------------------------------

/// A project name becomes a single directory under the current directory.
pub fn validate_project_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed != name
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
    {
        return Err(NoboxError::InvalidProjectName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
