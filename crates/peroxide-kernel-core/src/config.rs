//! Adapter configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::prompt::PromptConfig;

/// Environment variable naming the interpreter binary.
pub const INTERPRETER_ENV: &str = "PEROXIDE_KERNEL_INTERPRETER";

/// Name of the interpreter binary looked up next to the kernel and on PATH.
pub const INTERPRETER_NAME: &str = if cfg!(windows) {
    "peroxide.exe"
} else {
    "peroxide"
};

/// How the adapter talks to the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Pseudo-terminal with echo disabled.
    #[default]
    Pty,
    /// Plain stdin/stdout pipes.
    Pipe,
}

/// Which interpreter to run and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Path to the interpreter executable.
    pub program: PathBuf,
    /// Command-line arguments. Defaults to `--no-readline`.
    pub args: Vec<String>,
    /// Extra environment variables, on top of the inherited environment.
    pub env: HashMap<String, String>,
    pub transport: Transport,
}

impl InterpreterConfig {
    /// Run `program` with the default arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec!["--no-readline".to_string()],
            env: HashMap::new(),
            transport: Transport::default(),
        }
    }

    /// Replace the argument list.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set an environment variable for the interpreter.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }
}

/// Full adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub interpreter: InterpreterConfig,
    pub prompts: PromptConfig,
    /// Limit on each wait for a prompt. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl AdapterConfig {
    pub fn new(interpreter: InterpreterConfig) -> Self {
        Self {
            interpreter,
            prompts: PromptConfig::default(),
            timeout: None,
        }
    }

    pub fn with_prompts(mut self, prompts: PromptConfig) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Locate the interpreter binary.
///
/// Looks in the following order:
/// 1. `explicit`, when given
/// 2. `PEROXIDE_KERNEL_INTERPRETER` environment variable
/// 3. Same directory as the current executable
/// 4. System PATH
pub fn find_interpreter(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return if path.exists() {
            Ok(path)
        } else {
            Err(Error::InterpreterNotFound(format!(
                "{} does not exist",
                path.display()
            )))
        };
    }

    if let Ok(path) = std::env::var(INTERPRETER_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            "{} points to missing file {}, continuing search",
            INTERPRETER_ENV,
            path.display()
        );
    }

    if let Ok(exe_path) = std::env::current_exe()
        && let Some(exe_dir) = exe_path.parent()
    {
        let candidate = exe_dir.join(INTERPRETER_NAME);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    if let Ok(path) = which::which(INTERPRETER_NAME) {
        return Ok(path);
    }

    Err(Error::InterpreterNotFound(format!(
        "could not find '{}'. Set {} or ensure it's in PATH.",
        INTERPRETER_NAME, INTERPRETER_ENV
    )))
}
