//! Compile job description and status record.
//!
//! A [`JobDescription`] is written once at enqueue time and never changes.
//! A [`JobStatusRecord`] is written by the executing worker only; absence of
//! a record means the job is still queued.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::revision::Revision;
use crate::types::{JobId, ProjectId, Timestamp};

/// Entry file compiled when a request does not name one.
pub const DEFAULT_ENTRY_FILE: &str = "main.tex";

/// Engine used when a request does not name one.
pub const DEFAULT_ENGINE: &str = "pdflatex";

/// Engines the toolchain is allowed to invoke.
pub const SUPPORTED_ENGINES: &[&str] = &["pdflatex", "xelatex", "lualatex", "latex"];

/// Command-line options passed to every engine invocation.
pub const DEFAULT_ENGINE_OPTIONS: &[&str] = &["-interaction=nonstopmode", "-halt-on-error"];

/// Immutable description of one compile request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescription {
    pub job_id: JobId,
    pub project_id: ProjectId,
    pub entry_file: String,
    pub engine: String,
    /// Revision captured at enqueue time; later edits never change it.
    pub revision: Revision,
    #[serde(default)]
    pub options: Vec<String>,
    pub created_at: Timestamp,
    /// Which transport triggered the job. Diagnostic only.
    pub requestor: String,
}

impl JobDescription {
    /// Build a description with a freshly generated job id.
    pub fn new(
        project_id: impl Into<ProjectId>,
        entry_file: impl Into<String>,
        engine: impl Into<String>,
        revision: Revision,
        requestor: impl Into<String>,
    ) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            entry_file: entry_file.into(),
            engine: engine.into(),
            revision,
            options: DEFAULT_ENGINE_OPTIONS.iter().map(|o| o.to_string()).collect(),
            created_at: Utc::now(),
            requestor: requestor.into(),
        }
    }
}

/// Observable job state. Queued jobs have no status record at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Success,
    Failed,
    Canceled,
    Superseded,
}

impl JobState {
    /// Terminal states are never transitioned out of.
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Running => "running",
            JobState::Success => "success",
            JobState::Failed => "failed",
            JobState::Canceled => "canceled",
            JobState::Superseded => "superseded",
        }
    }
}

/// Why a job was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelReason {
    /// Explicit client cancellation.
    Canceled,
    /// A newer revision made the result moot.
    Superseded,
}

impl CancelReason {
    /// The terminal state a job ends in when honouring this request.
    pub fn terminal_state(self) -> JobState {
        match self {
            CancelReason::Canceled => JobState::Canceled,
            CancelReason::Superseded => JobState::Superseded,
        }
    }
}

/// Cancel marker stored next to a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub reason: CancelReason,
    /// Revision that superseded the job, when `reason` is `superseded`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<Revision>,
    pub requested_at: Timestamp,
}

impl CancelRequest {
    pub fn canceled() -> Self {
        Self {
            reason: CancelReason::Canceled,
            superseded_by: None,
            requested_at: Utc::now(),
        }
    }

    pub fn superseded_by(revision: Revision) -> Self {
        Self {
            reason: CancelReason::Superseded,
            superseded_by: Some(revision),
            requested_at: Utc::now(),
        }
    }
}

/// Mutable status of a job, single writer per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusRecord {
    pub job_id: JobId,
    pub project_id: ProjectId,
    pub state: JobState,
    #[serde(default)]
    pub revision: Revision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Last few KiB of the job log, set on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_tail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Project-relative path of the produced artifact, set on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<Revision>,
}

impl JobStatusRecord {
    /// Record for a job that just started executing.
    pub fn running(job: &JobDescription, started_at: Timestamp) -> Self {
        Self {
            job_id: job.job_id.clone(),
            project_id: job.project_id.clone(),
            state: JobState::Running,
            revision: job.revision.clone(),
            started_at: Some(started_at),
            finished_at: None,
            duration_ms: None,
            log_tail: None,
            error: None,
            output_path: None,
            superseded_by: None,
        }
    }

    /// Terminal record. `started_at` is `None` for jobs stopped before they ran.
    pub fn finished(
        job: &JobDescription,
        state: JobState,
        started_at: Option<Timestamp>,
        finished_at: Timestamp,
    ) -> Self {
        let duration_ms = started_at.map(|start| {
            finished_at
                .signed_duration_since(start)
                .num_milliseconds()
                .max(0) as u64
        });
        Self {
            job_id: job.job_id.clone(),
            project_id: job.project_id.clone(),
            state,
            revision: job.revision.clone(),
            started_at,
            finished_at: Some(finished_at),
            duration_ms,
            log_tail: None,
            error: None,
            output_path: None,
            superseded_by: None,
        }
    }

    pub fn with_output(mut self, output_path: impl Into<String>) -> Self {
        self.output_path = Some(output_path.into());
        self
    }

    pub fn with_failure(mut self, error: impl Into<String>, log_tail: String) -> Self {
        self.error = Some(error.into());
        self.log_tail = Some(log_tail);
        self
    }

    pub fn with_superseded_by(mut self, revision: Option<Revision>) -> Self {
        self.superseded_by = revision;
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn job() -> JobDescription {
        JobDescription::new("p1", DEFAULT_ENTRY_FILE, DEFAULT_ENGINE, Revision::from(4), "ws")
    }

    #[test]
    fn only_running_is_non_terminal() {
        assert!(!JobState::Running.is_terminal());
        for state in [
            JobState::Success,
            JobState::Failed,
            JobState::Canceled,
            JobState::Superseded,
        ] {
            assert!(state.is_terminal(), "{state:?} should be terminal");
        }
    }

    #[test]
    fn new_jobs_get_unique_ids_and_default_options() {
        let a = job();
        let b = job();
        assert_ne!(a.job_id, b.job_id);
        assert_eq!(a.options, vec!["-interaction=nonstopmode", "-halt-on-error"]);
    }

    #[test]
    fn description_uses_camel_case_fields() {
        let json = serde_json::to_value(job()).unwrap();
        assert_eq!(json["projectId"], "p1");
        assert_eq!(json["entryFile"], "main.tex");
        assert_eq!(json["revision"], "4");
        assert!(json["jobId"].is_string());
        assert!(json["createdAt"].is_string());
    }

    #[test]
    fn finished_record_computes_duration() {
        let job = job();
        let start = Utc::now();
        let end = start + Duration::milliseconds(1500);
        let record = JobStatusRecord::finished(&job, JobState::Success, Some(start), end);

        assert_eq!(record.duration_ms, Some(1500));
        assert_eq!(record.revision, Revision::from(4));
    }

    #[test]
    fn status_without_optional_fields_parses() {
        let json = r#"{"jobId":"j","projectId":"p","state":"canceled"}"#;
        let record: JobStatusRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.state, JobState::Canceled);
        assert_eq!(record.revision, Revision::zero());
        assert!(record.started_at.is_none());
    }

    #[test]
    fn cancel_reason_maps_to_terminal_state() {
        assert_eq!(CancelReason::Canceled.terminal_state(), JobState::Canceled);
        assert_eq!(CancelReason::Superseded.terminal_state(), JobState::Superseded);
    }
}
