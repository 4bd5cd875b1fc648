//! Core of the Peroxide Scheme notebook kernel.
//!
//! This crate provides:
//! - [`InteractiveProcessAdapter`], which runs the Peroxide REPL as a child
//!   process and turns its prompt-delimited output into cell output
//! - The prompt state machine and the pattern-matching reader behind it
//! - The [`Kernel`] trait the notebook framework drives
//!
//! # Architecture
//!
//! ```text
//! Kernel::execute
//!     │
//!     └── InteractiveProcessAdapter
//!             │
//!             ├── PromptSet / PromptState   (">>> ", "... ", "Error: .*")
//!             │
//!             └── ChildProcess
//!                     ├── pty or pipes, echo off
//!                     ├── reader thread ──chunks──► Expecter
//!                     └── killed on drop
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod expect;
pub mod kernel;
pub mod process;
pub mod prompt;
#[cfg(unix)]
mod pty;

pub use adapter::{InteractiveProcessAdapter, ReplChannel};
pub use config::{AdapterConfig, INTERPRETER_ENV, InterpreterConfig, Transport, find_interpreter};
pub use error::{Error, Result};
pub use expect::{Expecter, Match};
pub use kernel::{
    ExecuteRequest, ExecuteResult, ExecutionStatus, Kernel, KernelInfo, LanguageInfo, OutputSink,
    StreamEvent, StreamName,
};
pub use process::ChildProcess;
pub use prompt::{PromptConfig, PromptSet, PromptState};
