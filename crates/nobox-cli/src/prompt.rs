use std::io::{self, BufRead, Write};

use nobox_core::prompt::{is_affirmative, Prompter};
use nobox_core::{NoboxError, Result};

/// Reads answers line by line from stdin.
pub struct StdinPrompter;

impl StdinPrompter {
    /// `None` once stdin is exhausted.
    fn read_answer(&self, question: &str) -> Result<Option<String>> {
        print!("{question}");
        io::stdout().flush()?;
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            println!();
            return Ok(None);
        }
        Ok(Some(line))
    }
}

impl Prompter for StdinPrompter {
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        match self.read_answer(question)? {
            Some(answer) if !answer.trim().is_empty() => Ok(is_affirmative(&answer)),
            _ => Ok(default),
        }
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        self.read_answer(question)?
            .ok_or_else(|| NoboxError::Prompt(format!("no answer for '{}'", question.trim())))
    }
}
