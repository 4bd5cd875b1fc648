//! Socket loop.
//!
//! Binds the shell, control, IOPub and heartbeat sockets described by the
//! connection file and feeds requests to the [`Dispatcher`] one at a time.

use bytes::Bytes;
use peroxide_kernel_core::Kernel;
use zeromq::{PubSocket, RepSocket, RouterSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

use crate::connection::ConnectionInfo;
use crate::dispatch::{Dispatcher, Outcome};
use crate::error::{ServerError, ServerResult};
use crate::protocol::ExecutionState;
use crate::wire::{Message, Session, Signer};

/// A Jupyter kernel bound to its sockets.
pub struct KernelServer<K> {
    connection: ConnectionInfo,
    signer: Signer,
    dispatcher: Dispatcher<K>,
}

impl<K: Kernel + 'static> KernelServer<K> {
    pub fn new(connection: ConnectionInfo, kernel: K) -> ServerResult<Self> {
        let signer = Signer::new(&connection.key)?;
        Ok(Self {
            connection,
            signer,
            dispatcher: Dispatcher::new(kernel, Session::new()),
        })
    }

    /// Serve until a shutdown request or Ctrl+C.
    pub async fn run(mut self) -> ServerResult<()> {
        let mut shell = RouterSocket::new();
        let mut control = RouterSocket::new();
        let mut iopub = PubSocket::new();
        let mut heartbeat = RepSocket::new();

        let endpoint = |port| self.connection.endpoint(port);
        shell.bind(&endpoint(self.connection.shell_port)).await?;
        control.bind(&endpoint(self.connection.control_port)).await?;
        iopub.bind(&endpoint(self.connection.iopub_port)).await?;
        heartbeat.bind(&endpoint(self.connection.hb_port)).await?;

        tracing::info!(
            "Kernel listening on {} (shell {}, control {}, iopub {}, hb {})",
            self.connection.ip,
            self.connection.shell_port,
            self.connection.control_port,
            self.connection.iopub_port,
            self.connection.hb_port
        );

        let starting = self.dispatcher.starting()?;
        self.send(&mut iopub, &starting).await?;

        let heartbeat_task = tokio::spawn(async move {
            loop {
                let ping = match heartbeat.recv().await {
                    Ok(ping) => ping,
                    Err(e) => {
                        tracing::warn!("Heartbeat socket closed: {}", e);
                        break;
                    }
                };
                if let Err(e) = heartbeat.send(ping).await {
                    tracing::warn!("Heartbeat reply failed: {}", e);
                    break;
                }
            }
        });

        loop {
            let (channel, received) = tokio::select! {
                received = control.recv() => ("control", received),
                received = shell.recv() => ("shell", received),
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received shutdown signal");
                    break;
                }
            };

            let Some(request) = self.decode(channel, received?) else {
                continue;
            };

            let socket = if channel == "control" {
                &mut control
            } else {
                &mut shell
            };

            if self.handle(socket, &mut iopub, &request).await? {
                break;
            }
        }

        heartbeat_task.abort();
        let _ = heartbeat_task.await;

        tracing::info!("Kernel shutdown complete");
        Ok(())
    }

    fn decode(&self, channel: &str, received: ZmqMessage) -> Option<Message> {
        match Message::decode(received.into_vec(), &self.signer) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!("Dropping message on {} channel: {}", channel, e);
                None
            }
        }
    }

    /// Handle one request. Returns true once the kernel should stop.
    async fn handle(
        &mut self,
        socket: &mut RouterSocket,
        iopub: &mut PubSocket,
        request: &Message,
    ) -> ServerResult<bool> {
        let Some(kind) = self.dispatcher.route(request) else {
            return Ok(false);
        };

        let busy = self.dispatcher.status(request, ExecutionState::Busy)?;
        self.send(iopub, &busy).await?;

        let outcome = match self.dispatcher.dispatch(kind, request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Failed to reply to {}: {}", request.msg_type(), e);
                Outcome::default()
            }
        };

        let Outcome {
            iopub: published,
            reply,
            shutdown,
        } = outcome;

        for message in &published {
            self.send(iopub, message).await?;
        }
        if let Some(reply) = &reply {
            self.send(socket, reply).await?;
        }

        let idle = self.dispatcher.status(request, ExecutionState::Idle)?;
        self.send(iopub, &idle).await?;

        Ok(shutdown)
    }

    async fn send<S: SocketSend>(&self, socket: &mut S, message: &Message) -> ServerResult<()> {
        let frames: Vec<Bytes> = message.encode(&self.signer)?;
        let message = ZmqMessage::try_from(frames)
            .map_err(|e| ServerError::Protocol(format!("cannot build message: {}", e)))?;
        socket.send(message).await?;
        Ok(())
    }
}
