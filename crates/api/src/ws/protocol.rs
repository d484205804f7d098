//! JSON wire format of the live compile channel.
//!
//! Inbound frames are decoded through a [`serde_json::Value`] first so a
//! frame that is not JSON, lacks a `type`, or names an unknown type can be
//! told apart and acknowledged accordingly.

use axum::extract::ws::Message;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use texsync_core::job::DEFAULT_ENTRY_FILE;
use texsync_core::protocol::{
    OP_CANCEL_COMPILE, OP_DOC_UPDATE, OP_PING, OP_REQUEST_COMPILE, OP_SAVE,
};
use texsync_core::types::Timestamp;
use texsync_core::Revision;
use texsync_store::models::file::PutFile;

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A revision as sent by a client: the canonical token plus the exact JSON
/// value, which acks echo back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRevision {
    pub canonical: Revision,
    pub raw: Value,
}

impl WireRevision {
    /// `Ok(None)` for an absent, null or blank revision.
    pub fn parse(value: Option<&Value>) -> Result<Option<Self>, String> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(Some(Self {
                canonical: Revision::from_number(n),
                raw: Value::Number(n.clone()),
            })),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(Self {
                canonical: Revision::new(s.as_str()),
                raw: Value::String(s.clone()),
            })),
            Some(_) => Err("revision must be a number or a string".into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    DocUpdate {
        entry_file: String,
        content: String,
        revision: Option<WireRevision>,
    },
    RequestCompile {
        entry_file: String,
        engine: Option<String>,
        revision: Option<WireRevision>,
    },
    Save {
        files: Vec<PutFile>,
    },
    CancelCompile {
        job_id: Option<String>,
    },
    Ping,
}

/// Why an inbound frame could not be turned into a [`ClientMessage`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    /// Not JSON, not an object, no `type`, or bad field types.
    #[error("{0}")]
    Invalid(String),
    /// Well-formed envelope with a `type` this server does not handle.
    #[error("Unknown message type: {0}")]
    UnknownType(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocUpdateFields {
    path: Option<String>,
    entry_file: Option<String>,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestCompileFields {
    path: Option<String>,
    entry_file: Option<String>,
    engine: Option<String>,
}

#[derive(Deserialize)]
struct SaveFields {
    #[serde(default)]
    files: Vec<PutFile>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelFields {
    job_id: Option<String>,
}

impl ClientMessage {
    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| DecodeError::Invalid(format!("Invalid JSON: {e}")))?;
        let Some(object) = value.as_object() else {
            return Err(DecodeError::Invalid("Message must be a JSON object".into()));
        };
        let Some(kind) = object.get("type").and_then(Value::as_str) else {
            return Err(DecodeError::Invalid("Message is missing a string `type`".into()));
        };

        match kind {
            OP_DOC_UPDATE => {
                let fields: DocUpdateFields = fields_of(&value)?;
                Ok(ClientMessage::DocUpdate {
                    entry_file: entry_of(fields.entry_file, fields.path),
                    content: fields.content,
                    revision: revision_of(&value)?,
                })
            }
            OP_REQUEST_COMPILE => {
                let fields: RequestCompileFields = fields_of(&value)?;
                Ok(ClientMessage::RequestCompile {
                    entry_file: entry_of(fields.entry_file, fields.path),
                    engine: fields.engine.filter(|e| !e.trim().is_empty()),
                    revision: revision_of(&value)?,
                })
            }
            OP_SAVE => {
                let fields: SaveFields = fields_of(&value)?;
                Ok(ClientMessage::Save {
                    files: fields.files,
                })
            }
            OP_CANCEL_COMPILE => {
                let fields: CancelFields = fields_of(&value)?;
                Ok(ClientMessage::CancelCompile {
                    job_id: fields.job_id.filter(|id| !id.is_empty()),
                })
            }
            OP_PING => Ok(ClientMessage::Ping),
            other => Err(DecodeError::UnknownType(other.to_string())),
        }
    }
}

fn fields_of<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, DecodeError> {
    T::deserialize(value).map_err(|e| DecodeError::Invalid(format!("Invalid message: {e}")))
}

fn revision_of(value: &Value) -> Result<Option<WireRevision>, DecodeError> {
    WireRevision::parse(value.get("revision")).map_err(DecodeError::Invalid)
}

/// `entryFile` wins over `path`; blank values fall back to the default.
fn entry_of(entry_file: Option<String>, path: Option<String>) -> String {
    entry_file
        .filter(|e| !e.trim().is_empty())
        .or(path.filter(|p| !p.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_ENTRY_FILE.to_string())
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Error payload of a failed ack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AckError {
    pub message: String,
    pub code: &'static str,
}

impl AckError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }
}

/// Server to client events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    Ack {
        op: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        revision: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<AckError>,
    },
    CompileQueued {
        job_id: String,
        revision: Revision,
    },
    CompileStarted {
        job_id: String,
        revision: Revision,
        started_at: Timestamp,
    },
    CompileProgress {
        job_id: String,
        revision: Revision,
        message: String,
        log_tail: String,
    },
    CompileSucceeded {
        job_id: String,
        revision: Revision,
        pdf_url: String,
        output_path: String,
        finished_at: Timestamp,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
    CompileFailed {
        job_id: String,
        revision: Revision,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        log_tail: Option<String>,
        log_url: String,
        finished_at: Timestamp,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
    CompileCanceled {
        job_id: String,
        revision: Revision,
        reason: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        superseded_by_revision: Option<Revision>,
        finished_at: Timestamp,
    },
    Pong,
}

impl ServerEvent {
    pub fn ack(op: impl Into<String>, revision: Option<Value>) -> Self {
        ServerEvent::Ack {
            op: op.into(),
            revision,
            error: None,
        }
    }

    pub fn ack_error(op: impl Into<String>, error: AckError) -> Self {
        ServerEvent::Ack {
            op: op.into(),
            revision: None,
            error: Some(error),
        }
    }
}

/// An event stamped with its project and send time, ready for the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outbound<'a> {
    #[serde(flatten)]
    pub event: &'a ServerEvent,
    pub project_id: &'a str,
    pub ts: Timestamp,
}

impl<'a> Outbound<'a> {
    pub fn new(project_id: &'a str, event: &'a ServerEvent) -> Self {
        Self {
            event,
            project_id,
            ts: Utc::now(),
        }
    }

    pub fn to_message(&self) -> Message {
        let payload = serde_json::to_string(self).unwrap_or_default();
        Message::Text(payload.into())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn doc_update_accepts_numeric_and_string_revisions() {
        let msg = ClientMessage::decode(
            r#"{"type":"docUpdate","path":"main.tex","content":"A","revision":7}"#,
        )
        .unwrap();
        assert_matches!(msg, ClientMessage::DocUpdate { revision: Some(r), .. } => {
            assert_eq!(r.canonical, Revision::from(7));
            assert_eq!(r.raw, json!(7));
        });

        let msg =
            ClientMessage::decode(r#"{"type":"docUpdate","content":"A","revision":" 7"}"#).unwrap();
        assert_matches!(msg, ClientMessage::DocUpdate { entry_file, revision: Some(r), .. } => {
            assert_eq!(entry_file, "main.tex");
            assert_eq!(r.canonical, Revision::from(7));
            assert_eq!(r.raw, json!(" 7"));
        });
    }

    #[test]
    fn entry_file_wins_over_path() {
        let msg = ClientMessage::decode(
            r#"{"type":"requestCompile","path":"a.tex","entryFile":"b.tex","engine":"xelatex"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::RequestCompile {
                entry_file: "b.tex".into(),
                engine: Some("xelatex".into()),
                revision: None,
            }
        );
    }

    #[test]
    fn blank_or_null_revision_is_absent() {
        assert_eq!(WireRevision::parse(Some(&json!(""))).unwrap(), None);
        assert_eq!(WireRevision::parse(Some(&Value::Null)).unwrap(), None);
        assert!(WireRevision::parse(Some(&json!([1]))).is_err());
    }

    #[test]
    fn malformed_frames_are_invalid() {
        assert_matches!(ClientMessage::decode("not json"), Err(DecodeError::Invalid(_)));
        assert_matches!(ClientMessage::decode("[1,2]"), Err(DecodeError::Invalid(_)));
        assert_matches!(ClientMessage::decode(r#"{"path":"x"}"#), Err(DecodeError::Invalid(_)));
        assert_matches!(
            ClientMessage::decode(r#"{"type":"docUpdate","content":5}"#),
            Err(DecodeError::Invalid(_))
        );
    }

    #[test]
    fn unknown_type_is_reported_by_name() {
        assert_eq!(
            ClientMessage::decode(r#"{"type":"selfDestruct"}"#),
            Err(DecodeError::UnknownType("selfDestruct".into()))
        );
    }

    #[test]
    fn events_are_tagged_and_stamped() {
        let event = ServerEvent::CompileQueued {
            job_id: "j1".into(),
            revision: Revision::from(2),
        };
        let json = serde_json::to_value(Outbound::new("p1", &event)).unwrap();
        assert_eq!(json["type"], "compileQueued");
        assert_eq!(json["jobId"], "j1");
        assert_eq!(json["revision"], "2");
        assert_eq!(json["projectId"], "p1");
        assert!(json["ts"].is_string());
    }

    #[test]
    fn ack_omits_absent_fields() {
        let json = serde_json::to_value(ServerEvent::ack(OP_PING, None)).unwrap();
        assert_eq!(json, json!({"type": "ack", "op": "ping"}));

        let json = serde_json::to_value(ServerEvent::ack_error(
            "docUpdate",
            AckError::new("size_limit_exceeded", "too big"),
        ))
        .unwrap();
        assert_eq!(json["error"]["code"], "size_limit_exceeded");
        assert_eq!(json["error"]["message"], "too big");
    }

    #[test]
    fn pong_is_bare() {
        let json = serde_json::to_value(ServerEvent::Pong).unwrap();
        assert_eq!(json, json!({"type": "pong"}));
    }
}
