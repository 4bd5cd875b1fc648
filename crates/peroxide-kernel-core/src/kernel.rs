//! Contract between a kernel implementation and the notebook framework.
//!
//! The framework owns the sockets and the execution counter; a [`Kernel`]
//! only turns code into output. Request and result types serialize to the
//! field names of the notebook messaging protocol so the framework can pass
//! them through unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// One cell's worth of code to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    /// Run without producing output or touching the execution counter.
    #[serde(default)]
    pub silent: bool,
    #[serde(default = "default_true")]
    pub store_history: bool,
    #[serde(default)]
    pub user_expressions: Map<String, Value>,
    #[serde(default = "default_true")]
    pub allow_stdin: bool,
}

fn default_true() -> bool {
    true
}

impl ExecuteRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            silent: false,
            store_history: true,
            user_expressions: Map::new(),
            allow_stdin: true,
        }
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }
}

/// Outcome status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Ok,
    Error,
}

/// Reply to an [`ExecuteRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResult {
    pub status: ExecutionStatus,
    pub execution_count: u32,
    pub payload: Vec<Value>,
    pub user_expressions: Map<String, Value>,
}

impl ExecuteResult {
    /// Successful result with empty payload and user expressions.
    pub fn ok(execution_count: u32) -> Self {
        Self {
            status: ExecutionStatus::Ok,
            execution_count,
            payload: Vec::new(),
            user_expressions: Map::new(),
        }
    }
}

/// Name of an output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamName {
    Stdout,
}

impl StreamName {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamName::Stdout => "stdout",
        }
    }
}

/// Text written to one of the notebook's output streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub name: StreamName,
    pub text: String,
}

impl StreamEvent {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            name: StreamName::Stdout,
            text: text.into(),
        }
    }
}

/// Receives output produced while executing a request.
pub trait OutputSink {
    fn stream(&mut self, event: StreamEvent);
}

impl OutputSink for Vec<StreamEvent> {
    fn stream(&mut self, event: StreamEvent) {
        self.push(event);
    }
}

/// Guest language description shown by notebook front-ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub name: String,
    pub version: String,
    pub mimetype: String,
    pub file_extension: String,
}

/// Static kernel metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelInfo {
    pub implementation: String,
    pub implementation_version: String,
    /// Human-readable language name, used as the kernelspec display name.
    pub language: String,
    pub language_info: LanguageInfo,
    pub banner: String,
}

impl KernelInfo {
    /// Metadata of the Peroxide Scheme kernel.
    pub fn peroxide() -> Self {
        Self {
            implementation: "peroxide_kernel".to_string(),
            implementation_version: env!("CARGO_PKG_VERSION").to_string(),
            language: "Peroxide Scheme".to_string(),
            language_info: LanguageInfo {
                name: "Scheme".to_string(),
                version: "0.1.0".to_string(),
                mimetype: "text/x-scheme".to_string(),
                file_extension: ".scm".to_string(),
            },
            banner: "Peroxide Scheme Kernel".to_string(),
        }
    }
}

/// A notebook kernel.
///
/// Requests are delivered one at a time; an implementation never sees two
/// overlapping calls.
pub trait Kernel: Send {
    fn info(&self) -> &KernelInfo;

    /// Execute `request`, writing any output to `output`.
    ///
    /// `execution_count` is the counter value the framework assigned to this
    /// request.
    fn execute(
        &mut self,
        request: &ExecuteRequest,
        execution_count: u32,
        output: &mut dyn OutputSink,
    ) -> Result<ExecuteResult>;
}
