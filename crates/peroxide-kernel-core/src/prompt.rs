//! Prompt protocol of the guest REPL.
//!
//! The interpreter signals its parser state purely through text:
//!
//! ```text
//! ">>> "        ready: waiting for a new, complete expression
//! "... "        continuation: the last line left an expression open
//! "Error: .*"   printed when a line fails to lex or parse
//! ```
//!
//! After every line sent, the adapter expects `[ready, continuation]` and
//! feeds the matched index into [`PromptState::transition`].

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Index of the ready prompt in [`PromptSet::line_patterns`].
pub const READY_INDEX: usize = 0;

/// Index of the continuation prompt in [`PromptSet::line_patterns`].
pub const CONTINUATION_INDEX: usize = 1;

/// Text of the prompts and of the incomplete-expression recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Literal ready prompt.
    pub ready: String,
    /// Literal continuation prompt.
    pub continuation: String,
    /// Regular expression matching the interpreter's error line.
    pub error: String,
    /// Line that the interpreter is guaranteed to reject.
    pub invalid_token: String,
    /// Notice appended to the output after an incomplete submission.
    pub incomplete_notice: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            ready: ">>> ".to_string(),
            continuation: "... ".to_string(),
            error: "Error: .*".to_string(),
            invalid_token: "#\\invalid".to_string(),
            incomplete_notice: "** Incomplete expression.".to_string(),
        }
    }
}

/// Compiled prompt patterns.
#[derive(Debug, Clone)]
pub struct PromptSet {
    line_patterns: [Regex; 2],
    ready: Regex,
    error: Regex,
}

impl PromptSet {
    /// Compile the patterns of a prompt configuration.
    ///
    /// Ready and continuation prompts are literals; the error pattern is a
    /// regular expression.
    pub fn compile(config: &PromptConfig) -> Result<Self> {
        let ready = Regex::new(&regex::escape(&config.ready))?;
        let continuation = Regex::new(&regex::escape(&config.continuation))?;
        let error = Regex::new(&config.error)?;

        Ok(Self {
            line_patterns: [ready.clone(), continuation],
            ready,
            error,
        })
    }

    /// Patterns expected after each submitted line, in index order.
    pub fn line_patterns(&self) -> &[Regex] {
        &self.line_patterns
    }

    /// The ready prompt alone.
    pub fn ready(&self) -> &Regex {
        &self.ready
    }

    /// The interpreter's error line.
    pub fn error(&self) -> &Regex {
        &self.error
    }
}

/// Parser state of the guest REPL as observed from its prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptState {
    /// Waiting for a new expression.
    #[default]
    Ready,
    /// Waiting for the rest of an open expression.
    Continuation,
}

impl PromptState {
    /// Next state given the index of the pattern that matched.
    ///
    /// The next state only depends on which prompt was seen; the current
    /// state is irrelevant because the prompt reports the interpreter's
    /// state directly.
    pub fn transition(self, matched_index: usize) -> Result<Self> {
        match matched_index {
            READY_INDEX => Ok(PromptState::Ready),
            CONTINUATION_INDEX => Ok(PromptState::Continuation),
            other => Err(Error::UnexpectedPattern(other)),
        }
    }

    pub fn is_ready(self) -> bool {
        self == PromptState::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use PromptState::*;

        assert_eq!(Ready.transition(0).unwrap(), Ready);
        assert_eq!(Ready.transition(1).unwrap(), Continuation);
        assert_eq!(Continuation.transition(1).unwrap(), Continuation);
        assert_eq!(Continuation.transition(0).unwrap(), Ready);
        assert!(matches!(
            Ready.transition(2),
            Err(Error::UnexpectedPattern(2))
        ));
    }

    #[test]
    fn test_prompts_are_literals() {
        let set = PromptSet::compile(&PromptConfig::default()).unwrap();

        // "..." must not behave as a regex wildcard
        assert!(!set.line_patterns()[CONTINUATION_INDEX].is_match("abc "));
        assert!(set.line_patterns()[CONTINUATION_INDEX].is_match("... "));
        assert!(set.line_patterns()[READY_INDEX].is_match("3\n>>> "));
    }

    #[test]
    fn test_error_pattern_stops_at_newline() {
        let set = PromptSet::compile(&PromptConfig::default()).unwrap();
        let m = set.error().find("Error: unknown char\n>>> ").unwrap();
        assert_eq!(m.as_str(), "Error: unknown char");
    }

    #[test]
    fn test_invalid_error_pattern() {
        let config = PromptConfig {
            error: "Error: (".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            PromptSet::compile(&config),
            Err(Error::InvalidPattern(_))
        ));
    }
}
