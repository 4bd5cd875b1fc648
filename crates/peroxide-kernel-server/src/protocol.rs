//! Message contents of the Jupyter messaging protocol.
//!
//! Only the request types this kernel answers are modelled; everything else
//! is logged and dropped by the dispatcher.

use peroxide_kernel_core::{
    Error as CoreError, ExecutionStatus, KernelInfo, LanguageInfo, StreamEvent,
};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::wire::PROTOCOL_VERSION;

/// Requests handled on the shell and control sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    KernelInfo,
    Execute,
    IsComplete,
    CommInfo,
    History,
    Shutdown,
}

impl RequestKind {
    /// Map a `msg_type` to a handled request, if it is one.
    pub fn from_msg_type(msg_type: &str) -> Option<Self> {
        match msg_type {
            "kernel_info_request" => Some(Self::KernelInfo),
            "execute_request" => Some(Self::Execute),
            "is_complete_request" => Some(Self::IsComplete),
            "comm_info_request" => Some(Self::CommInfo),
            "history_request" => Some(Self::History),
            "shutdown_request" => Some(Self::Shutdown),
            _ => None,
        }
    }

    /// `msg_type` of the matching reply.
    pub fn reply_type(self) -> &'static str {
        match self {
            Self::KernelInfo => "kernel_info_reply",
            Self::Execute => "execute_reply",
            Self::IsComplete => "is_complete_reply",
            Self::CommInfo => "comm_info_reply",
            Self::History => "history_reply",
            Self::Shutdown => "shutdown_reply",
        }
    }
}

/// Kernel activity broadcast on IOPub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Starting,
    Busy,
    Idle,
}

/// `status` content.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub execution_state: ExecutionState,
}

/// `kernel_info_reply` content.
#[derive(Debug, Clone, Serialize)]
pub struct KernelInfoReply {
    pub status: &'static str,
    pub protocol_version: &'static str,
    pub implementation: String,
    pub implementation_version: String,
    pub language_info: LanguageInfo,
    pub banner: String,
    pub help_links: Vec<HelpLink>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HelpLink {
    pub text: String,
    pub url: String,
}

impl From<&KernelInfo> for KernelInfoReply {
    fn from(info: &KernelInfo) -> Self {
        Self {
            status: "ok",
            protocol_version: PROTOCOL_VERSION,
            implementation: info.implementation.clone(),
            implementation_version: info.implementation_version.clone(),
            language_info: info.language_info.clone(),
            banner: info.banner.clone(),
            help_links: Vec::new(),
        }
    }
}

/// `execute_input` content, echoing the code being run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteInput {
    pub code: String,
    pub execution_count: u32,
}

/// `stream` content.
#[derive(Debug, Clone, Serialize)]
pub struct Stream {
    pub name: &'static str,
    pub text: String,
}

impl From<StreamEvent> for Stream {
    fn from(event: StreamEvent) -> Self {
        Self {
            name: event.name.as_str(),
            text: event.text,
        }
    }
}

/// Exception description shared by the `error` message and failed replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorContent {
    pub ename: String,
    pub evalue: String,
    pub traceback: Vec<String>,
}

impl From<&CoreError> for ErrorContent {
    fn from(err: &CoreError) -> Self {
        let ename = match err {
            CoreError::ChildExited { .. } => "InterpreterExited",
            CoreError::Timeout(_) => "InterpreterTimeout",
            _ => "InterpreterError",
        };
        Self {
            ename: ename.to_string(),
            evalue: err.to_string(),
            traceback: err.with_hint().lines().map(str::to_string).collect(),
        }
    }
}

impl From<&ServerError> for ErrorContent {
    fn from(err: &ServerError) -> Self {
        let ename = match err {
            ServerError::Core(core) => return Self::from(core),
            ServerError::Json(_) | ServerError::Protocol(_) => "InvalidRequest",
            _ => "KernelError",
        };
        Self {
            ename: ename.to_string(),
            evalue: err.to_string(),
            traceback: vec![err.to_string()],
        }
    }
}

/// `execute_reply` content for an execution the kernel itself failed to run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteErrorReply {
    pub status: ExecutionStatus,
    pub execution_count: u32,
    #[serde(flatten)]
    pub error: ErrorContent,
}

impl ExecuteErrorReply {
    pub fn new(execution_count: u32, error: ErrorContent) -> Self {
        Self {
            status: ExecutionStatus::Error,
            execution_count,
            error,
        }
    }
}

/// Reply content for any other request the kernel could not handle.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReply {
    pub status: ExecutionStatus,
    #[serde(flatten)]
    pub error: ErrorContent,
}

impl From<ErrorContent> for ErrorReply {
    fn from(error: ErrorContent) -> Self {
        Self {
            status: ExecutionStatus::Error,
            error,
        }
    }
}

/// `is_complete_reply` content. Completeness is decided by the REPL itself.
#[derive(Debug, Clone, Serialize)]
pub struct IsCompleteReply {
    pub status: &'static str,
}

impl Default for IsCompleteReply {
    fn default() -> Self {
        Self { status: "unknown" }
    }
}

/// `comm_info_reply` content. No comms are ever open.
#[derive(Debug, Clone, Serialize)]
pub struct CommInfoReply {
    pub status: &'static str,
    pub comms: serde_json::Map<String, serde_json::Value>,
}

impl Default for CommInfoReply {
    fn default() -> Self {
        Self {
            status: "ok",
            comms: serde_json::Map::new(),
        }
    }
}

/// `history_reply` content. History is not recorded.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryReply {
    pub status: &'static str,
    pub history: Vec<serde_json::Value>,
}

impl Default for HistoryReply {
    fn default() -> Self {
        Self {
            status: "ok",
            history: Vec::new(),
        }
    }
}

/// `shutdown_request` content.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShutdownRequest {
    #[serde(default)]
    pub restart: bool,
}

/// `shutdown_reply` content.
#[derive(Debug, Clone, Serialize)]
pub struct ShutdownReply {
    pub status: &'static str,
    pub restart: bool,
}
