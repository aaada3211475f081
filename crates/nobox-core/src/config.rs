use crate::error::{NoboxError, Result};
use crate::paths;
use crate::process::ObserveMode;
use crate::step::Step;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ARCHIVE_URL: &str = "https://github.com/Nobox/laravel/archive/master.tar.gz";
pub const DEFAULT_ROOT_FOLDER: &str = "laravel-master";

/// Placeholder in configured command lines replaced by the resolved composer command.
pub const COMPOSER_PLACEHOLDER: &str = "{composer}";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ArchiveConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_url")]
    pub url: String,
    /// Top-level folder the archive is expected to unpack to.
    #[serde(default = "default_root_folder")]
    pub root_folder: String,
    /// Short name used in the temporary archive file name.
    #[serde(default = "default_template")]
    pub template: String,
}

fn default_archive_url() -> String {
    DEFAULT_ARCHIVE_URL.to_string()
}

fn default_root_folder() -> String {
    DEFAULT_ROOT_FOLDER.to_string()
}

fn default_template() -> String {
    "laravel".to_string()
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            url: default_archive_url(),
            root_folder: default_root_folder(),
            template: default_template(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

fn default_timeout_seconds() -> u64 {
    7600
}

fn default_tick_millis() -> u64 {
    100
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            tick_millis: default_tick_millis(),
        }
    }
}

impl ProcessConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}

// ---------------------------------------------------------------------------
// VcsSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VcsSettings {
    #[serde(default = "default_probe_command")]
    pub probe_command: String,
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_probe_command() -> String {
    "git config --global user.email".to_string()
}

fn default_commit_message() -> String {
    "Project Setup".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

impl Default for VcsSettings {
    fn default() -> Self {
        Self {
            probe_command: default_probe_command(),
            commit_message: default_commit_message(),
            branch: default_branch(),
        }
    }
}

// ---------------------------------------------------------------------------
// InstallConfig / StepConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    pub alias: String,
    pub title: String,
    pub commands: Vec<String>,
    /// Show a spinner instead of streaming output.
    #[serde(default)]
    pub progress: bool,
}

impl StepConfig {
    fn new(alias: &str, title: &str, commands: &[&str], progress: bool) -> Self {
        Self {
            alias: alias.to_string(),
            title: title.to_string(),
            commands: commands.iter().map(|c| c.to_string()).collect(),
            progress,
        }
    }

    /// Build the runnable step, substituting `{composer}` in every line.
    pub fn to_step(&self, composer: &str) -> Step {
        let observe = if self.progress {
            ObserveMode::Animated
        } else {
            ObserveMode::Streamed
        };
        Step::new(
            self.alias.clone(),
            self.title.clone(),
            self.commands
                .iter()
                .map(|c| c.replace(COMPOSER_PLACEHOLDER, composer))
                .collect(),
            observe,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallConfig {
    #[serde(default = "default_dependencies")]
    pub dependencies: Vec<StepConfig>,
    #[serde(default = "default_post_install")]
    pub post_install: Vec<StepConfig>,
}

fn default_dependencies() -> Vec<StepConfig> {
    vec![
        StepConfig::new(
            "composer",
            "Running composer dependencies installation",
            &["{composer} install"],
            true,
        ),
        StepConfig::new(
            "npm",
            "Running npm dependencies installation (this will take some time...)",
            &["npm install"],
            false,
        ),
        StepConfig::new(
            "bower",
            "Running bower dependencies installation",
            &["bower install"],
            true,
        ),
    ]
}

fn default_post_install() -> Vec<StepConfig> {
    vec![StepConfig::new(
        "post-installation",
        "Running post installation commands",
        &["cp .env.example .env", "php artisan key:generate", "gulp"],
        false,
    )]
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            dependencies: default_dependencies(),
            post_install: default_post_install(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub process: ProcessConfig,
    #[serde(default)]
    pub vcs: VcsSettings,
    #[serde(default)]
    pub install: InstallConfig,
}

/// A config together with the file it came from (`None` for built-in defaults).
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(NoboxError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(Config::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Resolve the effective config.
    ///
    /// Priority:
    /// 1. `explicit` (`--config` flag / `NOBOX_CONFIG`), which must exist
    /// 2. `./nobox.yaml`
    /// 3. `~/.nobox/config.yaml`
    /// 4. Built-in defaults
    pub fn resolve(explicit: Option<&Path>, cwd: &Path) -> Result<LoadedConfig> {
        if let Some(path) = explicit {
            return Ok(LoadedConfig {
                config: Config::load(path)?,
                source: Some(path.to_path_buf()),
            });
        }

        let candidates = std::iter::once(paths::project_config_path(cwd))
            .chain(paths::user_config_path());
        for path in candidates {
            if path.is_file() {
                tracing::debug!(path = %path.display(), "loading config");
                return Ok(LoadedConfig {
                    config: Config::load(&path)?,
                    source: Some(path),
                });
            }
        }

        Ok(LoadedConfig {
            config: Config::default(),
            source: None,
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut error = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message,
            })
        };

        if self.archive.url.trim().is_empty() {
            error("archive.url is empty".to_string());
        }
        if self.archive.root_folder.trim().is_empty() {
            error("archive.root_folder is empty".to_string());
        } else if self.archive.root_folder.contains(['/', '\\']) {
            error(format!(
                "archive.root_folder '{}' must be a single folder name",
                self.archive.root_folder
            ));
        }
        if self.process.timeout_seconds == 0 {
            error("process.timeout_seconds must be greater than 0".to_string());
        }
        if self.vcs.branch.trim().is_empty() {
            error("vcs.branch is empty".to_string());
        }
        if self.vcs.probe_command.trim().is_empty() {
            error("vcs.probe_command is empty".to_string());
        }

        for (section, steps) in [
            ("install.dependencies", &self.install.dependencies),
            ("install.post_install", &self.install.post_install),
        ] {
            let mut seen = HashSet::new();
            for step in steps {
                if !seen.insert(step.alias.as_str()) {
                    error(format!("duplicate alias '{}' in {section}", step.alias));
                }
                if step.commands.is_empty() {
                    error(format!("step '{}' in {section} has no commands", step.alias));
                } else if let Some(line) = step.commands.iter().position(|c| c.trim().is_empty()) {
                    error(format!(
                        "step '{}' in {section} has a blank command line (#{})",
                        step.alias,
                        line + 1
                    ));
                }
            }
        }

        if self.install.dependencies.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "install.dependencies is empty: no dependencies will be installed"
                    .to_string(),
            });
        }

        warnings
    }

    pub fn has_errors(warnings: &[ConfigWarning]) -> bool {
        warnings.iter().any(|w| w.level == WarnLevel::Error)
    }
}
