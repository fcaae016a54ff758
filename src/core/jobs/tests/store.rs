use chrono::{Duration, Utc};

use crate::core::jobs::{JobStatus, JobStore};

use super::job_at;

#[tokio::test]
async fn put_get_delete_round_trip() {
    let store = JobStore::new();
    store.put(job_at("resp_1", Utc::now())).await;

    assert_eq!(store.len().await, 1);
    assert_eq!(store.get("resp_1").await.unwrap().query, "query for resp_1");
    assert!(store.get("missing").await.is_none());

    assert!(store.delete("resp_1").await.is_some());
    assert!(store.delete("resp_1").await.is_none());
    assert_eq!(store.len().await, 0);
}

#[tokio::test]
async fn update_returns_mutated_record_and_mutator_output() {
    let store = JobStore::new();
    store.put(job_at("resp_1", Utc::now())).await;

    let (job, previous) = store
        .update("resp_1", |job| {
            let previous = job.status;
            job.status = JobStatus::InProgress;
            previous
        })
        .await
        .unwrap();
    assert_eq!(previous, JobStatus::Pending);
    assert_eq!(job.status, JobStatus::InProgress);
    assert_eq!(
        store.get("resp_1").await.unwrap().status,
        JobStatus::InProgress
    );

    assert!(store.update("missing", |_| ()).await.is_none());
}

#[tokio::test]
async fn concurrent_updates_are_not_lost() {
    let store = JobStore::new();
    let mut job = job_at("resp_1", Utc::now());
    job.max_tool_calls = 0;
    store.put(job).await;

    let mut handles = Vec::new();
    for _ in 0..32 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .update("resp_1", |job| job.max_tool_calls += 1)
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(store.get("resp_1").await.unwrap().max_tool_calls, 32);
}

#[tokio::test]
async fn list_is_newest_first() {
    let store = JobStore::new();
    let now = Utc::now();
    store.put(job_at("old", now - Duration::hours(2))).await;
    store.put(job_at("new", now)).await;
    store.put(job_at("mid", now - Duration::hours(1))).await;

    let ids: Vec<String> = store.list().await.into_iter().map(|j| j.id).collect();
    assert_eq!(ids, vec!["new", "mid", "old"]);
}
