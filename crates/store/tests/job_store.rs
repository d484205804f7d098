//! Behaviour of the filesystem and in-memory job stores.
//!
//! Both implementations must agree on the queue -> working -> status
//! lifecycle and on refusing writes after a terminal state.

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Utc;
use texsync_core::job::{
    CancelReason, CancelRequest, JobDescription, JobState, JobStatusRecord,
};
use texsync_core::Revision;
use texsync_store::jobs::DEFAULT_LOG_TAIL_BYTES;
use texsync_store::{FsJobStore, JobStore, MemoryJobStore, ProjectLayout, StoreError};

fn job(project: &str, revision: i64) -> JobDescription {
    JobDescription::new(project, "main.tex", "pdflatex", Revision::from(revision), "test")
}

fn stores(tmp: &tempfile::TempDir) -> Vec<(&'static str, Arc<dyn JobStore>)> {
    vec![
        (
            "fs",
            Arc::new(FsJobStore::new(ProjectLayout::new(tmp.path()))) as Arc<dyn JobStore>,
        ),
        ("memory", Arc::new(MemoryJobStore::new()) as Arc<dyn JobStore>),
    ]
}

// ---------------------------------------------------------------------------
// Test: enqueued jobs are pending until claimed, and claimed exactly once
// ---------------------------------------------------------------------------

#[tokio::test]
async fn claim_moves_job_out_of_pending_once() {
    let tmp = tempfile::tempdir().unwrap();
    for (name, store) in stores(&tmp) {
        let first = job("p1", 1);
        let second = job("p2", 2);
        store.enqueue(&first).await.unwrap();
        store.enqueue(&second).await.unwrap();

        let pending = store.pending().await.unwrap();
        assert_eq!(pending.len(), 2, "{name}");
        assert_eq!(pending[0].job_id, first.job_id, "{name}: oldest first");

        let claimed = store.claim("p1", &first.job_id).await.unwrap();
        assert_eq!(claimed.as_ref(), Some(&first), "{name}");
        assert!(store.claim("p1", &first.job_id).await.unwrap().is_none(), "{name}");

        // Still readable while working; gone after release.
        assert!(store.job("p1", &first.job_id).await.unwrap().is_some(), "{name}");
        store.release("p1", &first.job_id).await.unwrap();
        assert!(store.job("p1", &first.job_id).await.unwrap().is_none(), "{name}");

        assert_eq!(store.pending().await.unwrap().len(), 1, "{name}");
    }
}

// ---------------------------------------------------------------------------
// Test: no status record means queued; terminal records are final
// ---------------------------------------------------------------------------

#[tokio::test]
async fn terminal_status_is_never_overwritten() {
    let tmp = tempfile::tempdir().unwrap();
    for (name, store) in stores(&tmp) {
        let job = job("p1", 3);
        store.enqueue(&job).await.unwrap();
        assert!(store.status("p1", &job.job_id).await.unwrap().is_none(), "{name}");

        let started = Utc::now();
        store
            .write_status(&JobStatusRecord::running(&job, started))
            .await
            .unwrap();
        store
            .write_status(&JobStatusRecord::finished(&job, JobState::Success, Some(started), Utc::now()))
            .await
            .unwrap();

        let err = store
            .write_status(&JobStatusRecord::finished(&job, JobState::Failed, Some(started), Utc::now()))
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::TerminalState { state: "success", .. }, "{name}");

        let record = store.status("p1", &job.job_id).await.unwrap().unwrap();
        assert_eq!(record.state, JobState::Success, "{name}");
        assert_eq!(record.revision, Revision::from(3), "{name}");
    }
}

// ---------------------------------------------------------------------------
// Test: log tails are bounded and missing logs read as empty
// ---------------------------------------------------------------------------

#[tokio::test]
async fn log_tail_returns_the_end_of_the_log() {
    let tmp = tempfile::tempdir().unwrap();
    for (name, store) in stores(&tmp) {
        assert_eq!(store.log_tail("p1", "nope", 10).await.unwrap(), "", "{name}");

        store.append_log("p1", "j1", "first line\n").await.unwrap();
        store.append_log("p1", "j1", "second line\n").await.unwrap();

        assert_eq!(store.log_tail("p1", "j1", 12).await.unwrap(), "second line\n", "{name}");
        let full = store.log_tail("p1", "j1", DEFAULT_LOG_TAIL_BYTES).await.unwrap();
        assert_eq!(full, "first line\nsecond line\n", "{name}");
    }
}

// ---------------------------------------------------------------------------
// Test: cancel requests round through the store and can be cleared
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_requests_are_stored_per_job() {
    let tmp = tempfile::tempdir().unwrap();
    for (name, store) in stores(&tmp) {
        assert!(store.cancel_request("p1", "j1").await.unwrap().is_none(), "{name}");

        store
            .request_cancel("p1", "j1", &CancelRequest::superseded_by(Revision::from(9)))
            .await
            .unwrap();
        let request = store.cancel_request("p1", "j1").await.unwrap().unwrap();
        assert_eq!(request.reason, CancelReason::Superseded, "{name}");
        assert_eq!(request.superseded_by, Some(Revision::from(9)), "{name}");
        assert!(store.cancel_request("p1", "j2").await.unwrap().is_none(), "{name}");

        store.clear_cancel("p1", "j1").await.unwrap();
        assert!(store.cancel_request("p1", "j1").await.unwrap().is_none(), "{name}");
    }
}

// ---------------------------------------------------------------------------
// Test: filesystem specifics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fs_store_writes_records_where_workers_expect_them() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(tmp.path());
    let store = FsJobStore::new(layout.clone());
    let job = job("p1", 1);

    store.enqueue(&job).await.unwrap();
    let raw = std::fs::read_to_string(layout.queue_file("p1", &job.job_id)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["jobId"], job.job_id.as_str());
    assert_eq!(json["entryFile"], "main.tex");
    assert_eq!(json["revision"], "1");
}

#[tokio::test]
async fn fs_store_treats_plain_cancel_marker_as_cancel() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(tmp.path());
    let store = FsJobStore::new(layout.clone());

    let marker = layout.cancel_file("p1", "j1");
    std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
    std::fs::write(&marker, "2024-01-01T00:00:00Z").unwrap();

    let request = store.cancel_request("p1", "j1").await.unwrap().unwrap();
    assert_eq!(request.reason, CancelReason::Canceled);
}

#[tokio::test]
async fn fs_store_drops_corrupt_queue_entries() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(tmp.path());
    let store = FsJobStore::new(layout.clone());

    std::fs::create_dir_all(layout.queue_dir("p1")).unwrap();
    let corrupt = layout.queue_dir("p1").join("broken.json");
    std::fs::write(&corrupt, "{not json").unwrap();

    assert!(store.pending().await.unwrap().is_empty());
    assert!(!corrupt.exists());
}

// ---------------------------------------------------------------------------
// Test: the in-memory store can be told to fail enqueues
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memory_store_can_refuse_writes() {
    let store = MemoryJobStore::new();
    store.fail_writes(true);

    let err = store.enqueue(&job("p1", 1)).await.unwrap_err();
    assert_matches!(err, StoreError::Unavailable(_));
    assert_eq!(store.job_count().await, 0);

    store.fail_writes(false);
    store.enqueue(&job("p1", 2)).await.unwrap();
    assert_eq!(store.job_count().await, 1);
}
