//! Jupyter connection files.
//!
//! The notebook front-end writes a JSON file describing where the kernel
//! must listen and which key signs messages, then launches the kernel with
//! the file's path.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Contents of a connection file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub ip: String,
    #[serde(default = "default_transport")]
    pub transport: String,
    pub shell_port: u16,
    pub iopub_port: u16,
    pub stdin_port: u16,
    pub control_port: u16,
    pub hb_port: u16,
    /// HMAC key. Empty disables signing.
    #[serde(default)]
    pub key: String,
    #[serde(default = "default_signature_scheme")]
    pub signature_scheme: String,
    #[serde(default)]
    pub kernel_name: String,
}

fn default_transport() -> String {
    "tcp".to_string()
}

fn default_signature_scheme() -> String {
    "hmac-sha256".to_string()
}

impl ConnectionInfo {
    /// Read and validate a connection file.
    pub fn from_file(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let connection_error = |message: String| ServerError::Connection {
            path: path.to_path_buf(),
            message,
        };

        let text = fs::read_to_string(path).map_err(|e| connection_error(e.to_string()))?;
        let info: Self = serde_json::from_str(&text).map_err(|e| connection_error(e.to_string()))?;
        info.validate().map_err(connection_error)?;
        Ok(info)
    }

    fn validate(&self) -> Result<(), String> {
        if !self.key.is_empty() && self.signature_scheme != "hmac-sha256" {
            return Err(format!(
                "unsupported signature scheme '{}'",
                self.signature_scheme
            ));
        }
        if self.transport != "tcp" && self.transport != "ipc" {
            return Err(format!("unsupported transport '{}'", self.transport));
        }
        Ok(())
    }

    /// ZeroMQ endpoint for `port`.
    pub fn endpoint(&self, port: u16) -> String {
        match self.transport.as_str() {
            "ipc" => format!("ipc://{}-{}", self.ip, port),
            _ => format!("{}://{}:{}", self.transport, self.ip, port),
        }
    }
}
