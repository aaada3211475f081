use std::sync::OnceLock;

use regex::Regex;

use crate::error::{NoboxError, Result};

pub const LINK_QUESTION: &str =
    "Do you want to link an empty github repository to this project? (y/n): ";
pub const EMAIL_QUESTION: &str = "What is your github email? ";
pub const REMOTE_QUESTION: &str = "What is the repository url (git@github.com:repo.git) ? ";

/// Operator interaction used during preflight. The CLI reads from stdin;
/// tests script the answers.
pub trait Prompter {
    /// Yes/no question. An empty answer yields `default`.
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool>;

    /// Free-text question. Returns the raw answer, untrimmed.
    fn ask(&mut self, question: &str) -> Result<String>;
}

static AFFIRMATIVE_RE: OnceLock<Regex> = OnceLock::new();

fn affirmative_re() -> &'static Regex {
    AFFIRMATIVE_RE.get_or_init(|| Regex::new(r"(?i)^(y|j)").unwrap())
}

/// Answers starting with `y` or `j` (any case) mean yes.
pub fn is_affirmative(answer: &str) -> bool {
    affirmative_re().is_match(answer.trim())
}

/// Ask `question` and reject blank answers.
pub fn ask_required<P: Prompter + ?Sized>(prompter: &mut P, question: &str) -> Result<String> {
    let answer = prompter.ask(question)?;
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(NoboxError::EmptyAnswer(question.trim().to_string()));
    }
    Ok(answer.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPrompter;

    #[test]
    fn affirmative_answers() {
        for yes in ["y", "Y", "yes", "ja", "J", "  yep"] {
            assert!(is_affirmative(yes), "{yes} should be affirmative");
        }
        for no in ["n", "no", "", "sure", "ok"] {
            assert!(!is_affirmative(no), "{no} should not be affirmative");
        }
    }

    #[test]
    fn ask_required_trims() {
        let mut prompter = ScriptedPrompter::new(&["  a@b.com \n"]);
        assert_eq!(ask_required(&mut prompter, EMAIL_QUESTION).unwrap(), "a@b.com");
    }

    #[test]
    fn ask_required_rejects_blank() {
        let mut prompter = ScriptedPrompter::new(&["   "]);
        let err = ask_required(&mut prompter, REMOTE_QUESTION).unwrap_err();
        assert!(matches!(err, NoboxError::EmptyAnswer(_)));
    }
}
