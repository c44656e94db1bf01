use crate::db::*;
use crate::error::JobError;
use crate::types::{DownloadJob, JobId, JobStatus, TaskType};
use tempfile::NamedTempFile;

fn new_job(owner: &str, n: u32) -> NewJob {
    NewJob {
        owner: owner.to_string(),
        source_url: format!("https://x.com/user/status/{}", n),
        task_type: TaskType::Video,
        cookies: None,
    }
}

#[tokio::test]
async fn test_insert_and_get_job() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let id = db.insert_job(&new_job("alice", 1)).await.unwrap();
    assert!(id.0 > 0);

    let row = db.get_job(id).await.unwrap().unwrap();
    assert_eq!(row.status, "pending");
    assert_eq!(row.task_type, "video");
    assert!(row.worker_id.is_none());

    let job = DownloadJob::try_from(row).unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.source_url, "https://x.com/user/status/1");

    db.close().await;
}

#[tokio::test]
async fn test_claim_takes_oldest_first_and_marks_processing() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let mut ids = Vec::new();
    for n in 0..5 {
        ids.push(db.insert_job(&new_job("alice", n)).await.unwrap());
    }

    let claimed = db.claim_jobs("w1", 3).await.unwrap();
    let claimed_ids: Vec<i64> = claimed.iter().map(|r| r.id).collect();
    assert_eq!(claimed_ids, vec![ids[0].0, ids[1].0, ids[2].0]);
    for row in &claimed {
        assert_eq!(row.status, "processing");
        assert_eq!(row.worker_id.as_deref(), Some("w1"));
        assert!(row.claimed_at.is_some());
    }

    // The rest go to the next claimer, and then nothing is left
    let rest = db.claim_jobs("w2", 10).await.unwrap();
    assert_eq!(rest.len(), 2);
    assert!(db.claim_jobs("w3", 10).await.unwrap().is_empty());

    db.close().await;
}

#[tokio::test]
async fn test_claim_with_zero_limit_is_empty() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    db.insert_job(&new_job("alice", 1)).await.unwrap();
    assert!(db.claim_jobs("w1", 0).await.unwrap().is_empty());

    let stats = db.count_jobs_by_status().await.unwrap();
    assert_eq!(stats, vec![("pending".to_string(), 1)]);

    db.close().await;
}

#[tokio::test]
async fn test_complete_job() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let id = db.insert_job(&new_job("alice", 1)).await.unwrap();
    db.claim_jobs("w1", 1).await.unwrap();

    db.complete_job(id, "videos/1/1.mp4", Some(r#"{"title":"t"}"#), Some(2048))
        .await
        .unwrap();

    let job = DownloadJob::try_from(db.get_job(id).await.unwrap().unwrap()).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.storage_key.as_deref(), Some("videos/1/1.mp4"));
    assert_eq!(job.size, Some(2048));
    assert_eq!(job.metadata, Some(serde_json::json!({"title": "t"})));
    assert!(job.completed_at.is_some());

    db.close().await;
}

#[tokio::test]
async fn test_terminal_transition_requires_processing() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let id = db.insert_job(&new_job("alice", 1)).await.unwrap();

    // Still pending
    let err = db.complete_job(id, "k", None, None).await.unwrap_err();
    match err {
        crate::Error::Job(JobError::InvalidTransition { from, to, .. }) => {
            assert_eq!(from, "pending");
            assert_eq!(to, "completed");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    db.claim_jobs("w1", 1).await.unwrap();
    db.fail_job(id, JobStatus::Failed, "boom").await.unwrap();

    // Terminal states are never left
    let err = db.fail_job(id, JobStatus::Invalid, "again").await.unwrap_err();
    assert!(matches!(
        err,
        crate::Error::Job(JobError::InvalidTransition { .. })
    ));
    let row = db.get_job(id).await.unwrap().unwrap();
    assert_eq!(row.status, "failed");
    assert_eq!(row.error_message.as_deref(), Some("boom"));

    db.close().await;
}

#[tokio::test]
async fn test_transition_on_missing_job_is_not_found() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let err = db
        .fail_job(JobId(999), JobStatus::Failed, "x")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        crate::Error::Job(JobError::NotFound { id: 999 })
    ));

    db.close().await;
}

#[tokio::test]
async fn test_fail_job_rejects_non_failure_status() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let id = db.insert_job(&new_job("alice", 1)).await.unwrap();
    db.claim_jobs("w1", 1).await.unwrap();

    assert!(db.fail_job(id, JobStatus::Completed, "x").await.is_err());
    assert_eq!(db.get_job(id).await.unwrap().unwrap().status, "processing");

    db.close().await;
}

#[tokio::test]
async fn test_list_jobs_for_owner_newest_first() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let first = db.insert_job(&new_job("alice", 1)).await.unwrap();
    let second = db.insert_job(&new_job("alice", 2)).await.unwrap();
    db.insert_job(&new_job("bob", 3)).await.unwrap();

    let rows = db.list_jobs_for_owner("alice", 10).await.unwrap();
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![second.0, first.0]);

    assert_eq!(db.list_jobs_for_owner("alice", 1).await.unwrap().len(), 1);
    assert!(db.list_jobs_for_owner("carol", 10).await.unwrap().is_empty());

    db.close().await;
}

#[tokio::test]
async fn test_non_json_metadata_is_kept_as_string() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let id = db.insert_job(&new_job("alice", 1)).await.unwrap();
    db.claim_jobs("w1", 1).await.unwrap();
    db.complete_job(id, "k", Some("not json"), None).await.unwrap();

    let job = DownloadJob::try_from(db.get_job(id).await.unwrap().unwrap()).unwrap();
    assert_eq!(job.metadata, Some(serde_json::json!("not json")));

    db.close().await;
}

#[tokio::test]
async fn test_cookies_are_returned_only_by_claim_and_wiped_on_finish() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let with_cookies = |n| NewJob {
        cookies: Some("auth_token=abc; ct0=def".to_string()),
        ..new_job("alice", n)
    };
    let done = db.insert_job(&with_cookies(1)).await.unwrap();
    let failed = db.insert_job(&with_cookies(2)).await.unwrap();

    assert!(db.get_job(done).await.unwrap().unwrap().cookies.is_none());
    assert!(db.list_jobs_for_owner("alice", 10).await.unwrap().iter().all(|r| r.cookies.is_none()));

    let claimed = db.claim_jobs("w1", 2).await.unwrap();
    assert!(
        claimed
            .iter()
            .all(|r| r.cookies.as_deref() == Some("auth_token=abc; ct0=def"))
    );

    db.complete_job(done, "videos/1/a.mp4", None, None).await.unwrap();
    db.fail_job(failed, JobStatus::Failed, "boom").await.unwrap();

    let stored: Vec<Option<String>> =
        sqlx::query_scalar("SELECT cookies FROM download_jobs ORDER BY id")
            .fetch_all(db.pool())
            .await
            .unwrap();
    assert_eq!(stored, vec![None, None]);

    db.close().await;
}
