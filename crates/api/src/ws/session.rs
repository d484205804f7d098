//! Session Protocol Handler: one per (project, connection).
//!
//! Every decodable inbound message gets exactly one ack, except `ping`
//! which gets a `pong`. Failures become error-tagged acks and the loop keeps
//! reading; only an oversized `docUpdate` closes the connection.

use std::fmt::Display;

use axum::extract::ws::{CloseFrame, Message};
use futures::{Stream, StreamExt};
use serde_json::Value;
use texsync_core::error::CoreError;
use texsync_core::job::DEFAULT_ENGINE;
use texsync_core::paths::normalize_relative;
use texsync_core::protocol::{
    CLOSE_CODE_MESSAGE_TOO_BIG, CODE_INTERNAL_ERROR, CODE_INVALID_MESSAGE, CODE_INVALID_PATH,
    CODE_PROJECT_NOT_FOUND, CODE_SIZE_LIMIT_EXCEEDED, CODE_UNKNOWN_TYPE, OP_CANCEL_COMPILE,
    OP_DOC_UPDATE, OP_REQUEST_COMPILE, OP_SAVE, OP_UNKNOWN,
};
use texsync_core::Revision;
use texsync_store::models::file::PutFile;
use texsync_store::StoreError;
use tokio_util::sync::CancellationToken;

use crate::engine::StatusWatcher;
use crate::state::AppState;
use crate::ws::manager::WsSender;
use crate::ws::protocol::{AckError, ClientMessage, DecodeError, Outbound, ServerEvent, WireRevision};

/// Recorded as the job requestor for compiles started over the socket.
const REQUESTOR: &str = "ws";

/// Whether the read loop keeps going after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

pub struct Session {
    state: AppState,
    project_id: String,
    conn_id: String,
    outbound: WsSender,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(
        state: AppState,
        project_id: impl Into<String>,
        conn_id: impl Into<String>,
        outbound: WsSender,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state,
            project_id: project_id.into(),
            conn_id: conn_id.into(),
            outbound,
            cancel,
        }
    }

    /// Read loop. Returns when the peer goes away, a read fails, the session
    /// asks to close, or the connection scope is cancelled. The scope is
    /// cancelled on the way out so every watcher stops too.
    pub async fn run<S, E>(self, mut inbound: S)
    where
        S: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = inbound.next() => next,
            };
            match next {
                Some(Ok(Message::Text(text))) => {
                    if self.handle_text(text.as_str()).await == Flow::Close {
                        break;
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    self.send(ServerEvent::ack_error(
                        OP_UNKNOWN,
                        AckError::new(CODE_INVALID_MESSAGE, "Binary frames are not supported"),
                    ));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    tracing::trace!(conn_id = %self.conn_id, "Ping/pong received");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(conn_id = %self.conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
        self.cancel.cancel();
    }

    /// Handle one text frame.
    pub async fn handle_text(&self, text: &str) -> Flow {
        let message = match ClientMessage::decode(text) {
            Ok(message) => message,
            Err(DecodeError::UnknownType(kind)) => {
                let error = AckError::new(CODE_UNKNOWN_TYPE, format!("Unknown message type: {kind}"));
                self.send(ServerEvent::ack_error(kind, error));
                return Flow::Continue;
            }
            Err(DecodeError::Invalid(reason)) => {
                tracing::debug!(conn_id = %self.conn_id, %reason, "Invalid message");
                self.send(ServerEvent::ack_error(
                    OP_UNKNOWN,
                    AckError::new(CODE_INVALID_MESSAGE, reason),
                ));
                return Flow::Continue;
            }
        };

        match message {
            ClientMessage::DocUpdate {
                entry_file,
                content,
                revision,
            } => return self.doc_update(entry_file, content, revision).await,
            ClientMessage::RequestCompile {
                entry_file,
                engine,
                revision,
            } => self.request_compile(entry_file, engine, revision).await,
            ClientMessage::Save { files } => self.save(files).await,
            ClientMessage::CancelCompile { job_id } => self.cancel_compile(job_id).await,
            ClientMessage::Ping => self.send(ServerEvent::Pong),
        }
        Flow::Continue
    }

    async fn doc_update(
        &self,
        entry_file: String,
        content: String,
        revision: Option<WireRevision>,
    ) -> Flow {
        let limit = self.state.config.max_doc_update_bytes;
        if content.len() > limit {
            tracing::warn!(
                conn_id = %self.conn_id,
                project_id = %self.project_id,
                bytes = content.len(),
                limit,
                "docUpdate over size limit, closing connection",
            );
            self.send(ServerEvent::ack_error(
                OP_DOC_UPDATE,
                AckError::new(
                    CODE_SIZE_LIMIT_EXCEEDED,
                    format!("Content exceeds {limit} bytes"),
                ),
            ));
            let _ = self.outbound.send(Message::Close(Some(CloseFrame {
                code: CLOSE_CODE_MESSAGE_TOO_BIG,
                reason: "payload too large".into(),
            })));
            return Flow::Close;
        }

        let entry_file = match normalize_relative(&entry_file) {
            Ok(entry) => entry,
            Err(e) => {
                self.send(ServerEvent::ack_error(
                    OP_DOC_UPDATE,
                    AckError::new(CODE_INVALID_PATH, e.to_string()),
                ));
                return Flow::Continue;
            }
        };
        if !self.project_exists(OP_DOC_UPDATE).await {
            return Flow::Continue;
        }

        let (canonical, echo) = match revision {
            Some(WireRevision { canonical, raw }) => (canonical, raw),
            None => {
                let generated = Revision::generate();
                let echo = Value::String(generated.to_string());
                (generated, echo)
            }
        };
        self.state
            .registry
            .apply_doc_update(&self.project_id, &entry_file, content, canonical.clone())
            .await;
        if let Err(e) = self
            .state
            .files
            .write_latest_token(&self.project_id, &canonical)
            .await
        {
            tracing::warn!(project_id = %self.project_id, error = %e, "Failed to record latest revision");
        }
        tracing::debug!(
            project_id = %self.project_id,
            entry_file = %entry_file,
            revision = %canonical,
            "Document updated",
        );
        self.send(ServerEvent::ack(OP_DOC_UPDATE, Some(echo)));
        Flow::Continue
    }

    async fn request_compile(
        &self,
        entry_file: String,
        engine: Option<String>,
        requested: Option<WireRevision>,
    ) {
        let Some(project) = self.state.catalog.get(&self.project_id).await else {
            self.send_not_found(OP_REQUEST_COMPILE);
            return;
        };
        let engine = engine
            .or(Some(project.engine))
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_ENGINE.to_string());

        // Always compile the newest revision, whatever the client named.
        let latest = self.state.registry.latest_revision(&self.project_id).await;
        let echo = match requested {
            Some(requested) if requested.canonical == latest => requested.raw,
            _ => Value::String(latest.to_string()),
        };

        let job = match self
            .state
            .dispatcher
            .enqueue(&self.project_id, &entry_file, &engine, latest, REQUESTOR)
            .await
        {
            Ok(job) => job,
            Err(StoreError::Core(CoreError::InvalidPath(reason))) => {
                self.send(ServerEvent::ack_error(
                    OP_REQUEST_COMPILE,
                    AckError::new(CODE_INVALID_PATH, reason),
                ));
                return;
            }
            Err(e) => {
                tracing::error!(project_id = %self.project_id, error = %e, "Failed to enqueue compile");
                self.send(ServerEvent::ack_error(
                    OP_REQUEST_COMPILE,
                    AckError::new(CODE_INTERNAL_ERROR, "enqueue failed"),
                ));
                return;
            }
        };

        self.send(ServerEvent::ack(OP_REQUEST_COMPILE, Some(echo)));
        self.send(ServerEvent::CompileQueued {
            job_id: job.job_id.clone(),
            revision: job.revision.clone(),
        });

        let watcher = StatusWatcher::new(
            self.state.jobs.clone(),
            job,
            self.outbound.clone(),
            self.state.config.status_poll_interval(),
        )
        .with_timeout(self.state.config.watch_timeout());
        tokio::spawn(watcher.run(self.cancel.child_token()));
    }

    async fn save(&self, files: Vec<PutFile>) {
        if !self.project_exists(OP_SAVE).await {
            return;
        }
        let saved = match self.state.files.write_all(&self.project_id, &files).await {
            Ok(saved) => saved,
            Err(e) => {
                let error = match &e {
                    StoreError::Core(CoreError::InvalidPath(reason)) => {
                        AckError::new(CODE_INVALID_PATH, reason.clone())
                    }
                    StoreError::Core(CoreError::Validation(reason)) => {
                        AckError::new(CODE_INVALID_MESSAGE, reason.clone())
                    }
                    other => {
                        tracing::error!(project_id = %self.project_id, error = %other, "Save failed");
                        AckError::new(CODE_INTERNAL_ERROR, "save failed")
                    }
                };
                self.send(ServerEvent::ack_error(OP_SAVE, error));
                return;
            }
        };

        // Saved content supersedes any unsaved buffer for the same file.
        for (file, written) in files.iter().zip(&saved) {
            if self
                .state
                .registry
                .buffer(&self.project_id, &written.path)
                .await
                .is_some()
            {
                self.state
                    .registry
                    .set_buffer(&self.project_id, &written.path, file.content.clone())
                    .await;
            }
        }
        if let Err(e) = self.state.catalog.touch(&self.project_id).await {
            tracing::warn!(project_id = %self.project_id, error = %e, "Failed to update project timestamp");
        }

        let latest = self.state.registry.latest_revision(&self.project_id).await;
        tracing::debug!(project_id = %self.project_id, count = saved.len(), "Files saved");
        self.send(ServerEvent::ack(OP_SAVE, Some(Value::String(latest.to_string()))));
    }

    async fn cancel_compile(&self, job_id: Option<String>) {
        let dispatcher = &self.state.dispatcher;
        let result = match &job_id {
            Some(job_id) => dispatcher.cancel(&self.project_id, job_id).await,
            None => dispatcher.cancel_latest(&self.project_id).await,
        };
        match result {
            Ok(canceled) => {
                tracing::debug!(project_id = %self.project_id, ?job_id, canceled, "Cancel handled");
                self.send(ServerEvent::ack(OP_CANCEL_COMPILE, None));
            }
            Err(e) => {
                tracing::error!(project_id = %self.project_id, error = %e, "Cancel failed");
                self.send(ServerEvent::ack_error(
                    OP_CANCEL_COMPILE,
                    AckError::new(CODE_INTERNAL_ERROR, "cancel failed"),
                ));
            }
        }
    }

    async fn project_exists(&self, op: &str) -> bool {
        if self.state.catalog.exists(&self.project_id).await {
            return true;
        }
        self.send_not_found(op);
        false
    }

    fn send_not_found(&self, op: &str) {
        self.send(ServerEvent::ack_error(
            op,
            AckError::new(
                CODE_PROJECT_NOT_FOUND,
                format!("Project {} not found", self.project_id),
            ),
        ));
    }

    fn send(&self, event: ServerEvent) {
        let _ = self
            .outbound
            .send(Outbound::new(&self.project_id, &event).to_message());
    }
}
