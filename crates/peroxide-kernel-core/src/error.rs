//! Error types for peroxide-kernel-core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for peroxide-kernel-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving the interpreter process.
#[derive(Debug, Error)]
pub enum Error {
    /// The interpreter process could not be started.
    #[error("failed to spawn interpreter '{}': {message}", program.display())]
    Spawn { program: PathBuf, message: String },

    /// No interpreter binary could be located.
    #[error("interpreter not found: {0}")]
    InterpreterNotFound(String),

    /// IO error while talking to the interpreter.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The interpreter closed its output before the expected prompt appeared.
    #[error("interpreter exited before emitting a prompt")]
    ChildExited {
        /// Output received after the last match and never consumed.
        pending: String,
    },

    /// No prompt appeared within the configured timeout.
    #[error("no prompt after {0:?}")]
    Timeout(Duration),

    /// A match reported a pattern index outside the prompt table.
    #[error("unexpected pattern index {0}")]
    UnexpectedPattern(usize),

    /// A configured prompt pattern is not a valid regular expression.
    #[error("invalid prompt pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The requested transport is not available on this platform.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Returns a recovery hint for the error, if one applies.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::Spawn { .. } | Error::InterpreterNotFound(_) => Some(
                "Pass --interpreter <path> or set PEROXIDE_KERNEL_INTERPRETER to the peroxide REPL binary.",
            ),
            Error::ChildExited { .. } => {
                Some("The interpreter died. Restart the kernel to start a fresh process.")
            }
            Error::Timeout(_) => Some(
                "The interpreter did not return to its prompt. Check that it runs with --no-readline.",
            ),
            Error::Unsupported(_) => Some("Use --pipe to talk to the interpreter over plain pipes."),
            _ => None,
        }
    }

    /// Formats the error together with its recovery hint.
    pub fn with_hint(&self) -> String {
        match self.hint() {
            Some(hint) => format!("{}\n  hint: {}", self, hint),
            None => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error_has_hint() {
        let err = Error::Spawn {
            program: PathBuf::from("/opt/peroxide"),
            message: "No such file or directory".to_string(),
        };
        let text = err.with_hint();
        assert!(text.starts_with("failed to spawn interpreter '/opt/peroxide'"));
        assert!(text.contains("PEROXIDE_KERNEL_INTERPRETER"));
    }

    #[test]
    fn test_pattern_error_has_no_hint() {
        let err = Error::UnexpectedPattern(7);
        assert_eq!(err.with_hint(), "unexpected pattern index 7");
    }
}
