//! In-memory collaborators for pipeline tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::archive::ArchiveFetcher;
use crate::error::{NoboxError, Result};
use crate::process::{
    CommandRunner, FailedCommand, ObserveMode, OutcomeKind, ProcessOutcome, RunRequest,
};
use crate::prompt::{is_affirmative, Prompter};

// ---------------------------------------------------------------------------
// RecordingRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub commands: Vec<String>,
    pub working_dir: PathBuf,
    pub mode: ObserveMode,
    pub title: String,
}

/// Records every call and pretends each line succeeds unless told otherwise.
#[derive(Default)]
pub(crate) struct RecordingRunner {
    pub calls: Vec<RecordedCall>,
    executed: Vec<String>,
    failures: Vec<(String, i32)>,
    outputs: HashMap<String, Vec<String>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines starting with `prefix` exit with `code`.
    pub fn fail_on(mut self, prefix: &str, code: i32) -> Self {
        self.failures.push((prefix.to_string(), code));
        self
    }

    /// Lines starting with `prefix` print `output`.
    pub fn respond(mut self, prefix: &str, output: &[&str]) -> Self {
        self.outputs.insert(
            prefix.to_string(),
            output.iter().map(|l| l.to_string()).collect(),
        );
        self
    }

    /// Every line that was actually executed, in order.
    pub fn lines(&self) -> Vec<&str> {
        self.executed.iter().map(String::as_str).collect()
    }

    pub fn ran_any(&self, prefix: &str) -> bool {
        self.executed.iter().any(|l| l.starts_with(prefix))
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(
        &mut self,
        request: RunRequest<'_>,
        on_output: &mut dyn FnMut(&str),
    ) -> ProcessOutcome {
        self.calls.push(RecordedCall {
            commands: request.commands.to_vec(),
            working_dir: request.working_dir.to_path_buf(),
            mode: request.mode,
            title: request.title.to_string(),
        });

        let mut captured = match request.mode {
            ObserveMode::Streamed => Some(String::new()),
            ObserveMode::Animated => None,
        };
        for (index, line) in request.commands.iter().enumerate() {
            self.executed.push(line.clone());

            if request.mode == ObserveMode::Streamed {
                for (prefix, output) in &self.outputs {
                    if line.starts_with(prefix.as_str()) {
                        for text in output {
                            on_output(text);
                            if let Some(buf) = captured.as_mut() {
                                buf.push_str(text);
                                buf.push('\n');
                            }
                        }
                    }
                }
            }

            if let Some((_, code)) = self.failures.iter().find(|(p, _)| line.starts_with(p.as_str()))
            {
                return ProcessOutcome::failure(
                    OutcomeKind::NonZeroExit,
                    *code,
                    captured,
                    FailedCommand {
                        index,
                        line: line.clone(),
                    },
                );
            }
        }
        ProcessOutcome::success(captured)
    }
}

// ---------------------------------------------------------------------------
// FakeFetcher
// ---------------------------------------------------------------------------

/// Writes a fixed payload, or fails after leaving a partial file behind.
pub(crate) struct FakeFetcher {
    payload: Option<Vec<u8>>,
    pub urls: RefCell<Vec<String>>,
}

impl FakeFetcher {
    pub fn serving(payload: Vec<u8>) -> Self {
        Self {
            payload: Some(payload),
            urls: RefCell::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            payload: None,
            urls: RefCell::new(Vec::new()),
        }
    }
}

impl ArchiveFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        self.urls.borrow_mut().push(url.to_string());
        match &self.payload {
            Some(bytes) => {
                std::fs::write(dest, bytes)?;
                Ok(())
            }
            None => {
                std::fs::write(dest, b"partial")?;
                Err(NoboxError::Fetch {
                    url: url.to_string(),
                    reason: "connection reset".to_string(),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedPrompter
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub questions: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            questions: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        self.questions.push(question.to_string());
        match self.answers.pop_front() {
            Some(answer) if answer.trim().is_empty() => Ok(default),
            Some(answer) => Ok(is_affirmative(&answer)),
            None => Err(NoboxError::Prompt("no scripted answer left".into())),
        }
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        self.questions.push(question.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| NoboxError::Prompt("no scripted answer left".into()))
    }
}

// ---------------------------------------------------------------------------
// Archive fixtures
// ---------------------------------------------------------------------------

/// Build a `.tar.gz` holding `files` (path, contents).
pub(crate) fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }
    let mut encoder = builder.into_inner().unwrap();
    encoder.flush().unwrap();
    encoder.finish().unwrap()
}
