//! Request dispatch.
//!
//! Turns one incoming shell or control message into the IOPub messages and
//! the reply it produces. Socket I/O stays in [`crate::server`], so the
//! dispatcher can be driven directly in tests.

use std::sync::{Arc, Mutex};

use peroxide_kernel_core::{ExecuteRequest, Kernel, KernelInfo, StreamEvent};
use serde::Serialize;

use crate::error::{ServerError, ServerResult};
use crate::protocol::{
    CommInfoReply, ErrorContent, ErrorReply, ExecuteErrorReply, ExecuteInput, ExecutionState,
    HistoryReply, IsCompleteReply, KernelInfoReply, RequestKind, ShutdownReply, ShutdownRequest,
    Status, Stream,
};
use crate::wire::{Message, Session};

/// Messages produced by handling one request.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Published on IOPub, in order, before the reply is sent.
    pub iopub: Vec<Message>,
    pub reply: Option<Message>,
    /// The request asked the kernel to stop.
    pub shutdown: bool,
}

/// Routes requests to a [`Kernel`] and keeps the execution counter.
pub struct Dispatcher<K> {
    kernel: Arc<Mutex<K>>,
    info: KernelInfo,
    session: Session,
    execution_count: u32,
}

impl<K: Kernel + 'static> Dispatcher<K> {
    pub fn new(kernel: K, session: Session) -> Self {
        let info = kernel.info().clone();
        Self {
            kernel: Arc::new(Mutex::new(kernel)),
            info,
            session,
            execution_count: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn execution_count(&self) -> u32 {
        self.execution_count
    }

    /// IOPub `status` message attributed to `parent`.
    pub fn status(&self, parent: &Message, state: ExecutionState) -> ServerResult<Message> {
        self.publish(
            parent,
            "status",
            &Status {
                execution_state: state,
            },
        )
    }

    /// IOPub `status: starting`, sent once the sockets are bound.
    pub fn starting(&self) -> ServerResult<Message> {
        let content = serde_json::to_value(Status {
            execution_state: ExecutionState::Starting,
        })?;
        Ok(self.session.broadcast("status", content))
    }

    /// Kind of `request`, or `None` (logged) for message types this kernel ignores.
    pub fn route(&self, request: &Message) -> Option<RequestKind> {
        let kind = RequestKind::from_msg_type(request.msg_type());
        if kind.is_none() {
            tracing::warn!("Ignoring unsupported message type '{}'", request.msg_type());
        }
        kind
    }

    /// Handle `request` of the given kind.
    ///
    /// A request that cannot be handled still gets a reply, with status
    /// `error`, so the front-end never waits on it.
    pub async fn dispatch(
        &mut self,
        kind: RequestKind,
        request: &Message,
    ) -> ServerResult<Outcome> {
        tracing::debug!("Handling {}", request.msg_type());

        let handled = match kind {
            RequestKind::KernelInfo => {
                self.reply_only(request, kind, &KernelInfoReply::from(&self.info))
            }
            RequestKind::Execute => self.execute(request).await,
            RequestKind::IsComplete => self.reply_only(request, kind, &IsCompleteReply::default()),
            RequestKind::CommInfo => self.reply_only(request, kind, &CommInfoReply::default()),
            RequestKind::History => self.reply_only(request, kind, &HistoryReply::default()),
            RequestKind::Shutdown => self.shutdown(request),
        };

        handled.or_else(|err| {
            tracing::error!("Failed to handle {}: {}", request.msg_type(), err);
            let error = ErrorContent::from(&err);
            match kind {
                RequestKind::Execute => {
                    let reply = ExecuteErrorReply::new(self.execution_count, error);
                    self.reply_only(request, kind, &reply)
                }
                _ => self.reply_only(request, kind, &ErrorReply::from(error)),
            }
        })
    }

    fn shutdown(&self, request: &Message) -> ServerResult<Outcome> {
        let content: ShutdownRequest =
            serde_json::from_value(request.content.clone()).unwrap_or_default();
        tracing::info!("Shutdown requested (restart: {})", content.restart);

        let reply = ShutdownReply {
            status: "ok",
            restart: content.restart,
        };
        let mut outcome = self.reply_only(request, RequestKind::Shutdown, &reply)?;
        outcome.shutdown = true;
        Ok(outcome)
    }

    async fn execute(&mut self, request: &Message) -> ServerResult<Outcome> {
        let execute: ExecuteRequest = serde_json::from_value(request.content.clone())?;
        let mut iopub = Vec::new();

        if !execute.silent {
            self.execution_count += 1;
            iopub.push(self.publish(
                request,
                "execute_input",
                &ExecuteInput {
                    code: execute.code.clone(),
                    execution_count: self.execution_count,
                },
            )?);
        }

        let count = self.execution_count;
        let kernel = Arc::clone(&self.kernel);
        let (result, events) = tokio::task::spawn_blocking(move || {
            let mut kernel = kernel.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let mut events: Vec<StreamEvent> = Vec::new();
            let result = kernel.execute(&execute, count, &mut events);
            (result, events)
        })
        .await
        .map_err(|e| ServerError::Protocol(format!("execution task failed: {}", e)))?;

        for event in events {
            iopub.push(self.publish(request, "stream", &Stream::from(event))?);
        }

        let reply_content = match result {
            Ok(result) => serde_json::to_value(&result)?,
            Err(err) => {
                tracing::error!("Execution failed: {}", err);
                let error = ErrorContent::from(&err);
                iopub.push(self.publish(request, "error", &error)?);
                serde_json::to_value(ExecuteErrorReply::new(count, error))?
            }
        };

        let reply = self
            .session
            .reply(request, RequestKind::Execute.reply_type(), reply_content)?;

        Ok(Outcome {
            iopub,
            reply: Some(reply),
            shutdown: false,
        })
    }

    fn reply_only(
        &self,
        request: &Message,
        kind: RequestKind,
        content: &impl Serialize,
    ) -> ServerResult<Outcome> {
        let reply = self
            .session
            .reply(request, kind.reply_type(), serde_json::to_value(content)?)?;
        Ok(Outcome {
            iopub: Vec::new(),
            reply: Some(reply),
            shutdown: false,
        })
    }

    fn publish(
        &self,
        parent: &Message,
        msg_type: &str,
        content: &impl Serialize,
    ) -> ServerResult<Message> {
        self.session.publish(parent, msg_type, serde_json::to_value(content)?)
    }
}
