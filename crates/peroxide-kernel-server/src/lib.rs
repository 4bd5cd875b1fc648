//! Jupyter messaging server for the Peroxide Scheme kernel.
//!
//! Hosts any [`Kernel`] behind the Jupyter wire protocol.
//!
//! # Architecture
//!
//! The server consists of:
//! - **Connection**: the connection file written by the notebook front-end
//! - **Wire**: multipart framing, HMAC signatures and message headers
//! - **Protocol**: reply and broadcast contents
//! - **Dispatch**: request routing and the execution counter
//! - **Server**: ZeroMQ sockets and the request loop

pub mod connection;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod server;
pub mod wire;

use std::path::Path;

use peroxide_kernel_core::Kernel;

pub use connection::ConnectionInfo;
pub use dispatch::{Dispatcher, Outcome};
pub use error::{ServerError, ServerResult};
pub use server::KernelServer;
pub use wire::{Header, Message, PROTOCOL_VERSION, Session, Signer};

/// Serve `kernel` on the sockets described by `connection_file`.
pub async fn serve<K: Kernel + 'static>(
    connection_file: impl AsRef<Path>,
    kernel: K,
) -> ServerResult<()> {
    let connection = ConnectionInfo::from_file(connection_file)?;
    KernelServer::new(connection, kernel)?.run().await
}
