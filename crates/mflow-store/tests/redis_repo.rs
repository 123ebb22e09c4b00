//! Redis job repository integration tests.

use std::time::Duration;

use mflow_models::{CompressionParams, Job, JobId, JobParams, JobStatus};
use mflow_store::{JobRepository, RedisJobRepository, StoreConfig, StoreError};

fn repo() -> RedisJobRepository {
    dotenvy::dotenv().ok();
    let config = StoreConfig {
        prefix: format!("mflow-test-{}", JobId::new()),
        ..StoreConfig::from_env()
    };
    RedisJobRepository::new(config).expect("Failed to create repository")
}

fn job() -> Job {
    Job::new(
        "test_user_123",
        "Compression/original/test_user_123/clip.mp4",
        JobParams::Compression(CompressionParams::new("5MB")),
    )
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_ping() {
    repo().ping().await.expect("PING failed");
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_insert_get_and_duplicate() {
    let repo = repo();
    let job = job();

    repo.insert(&job).await.expect("Failed to insert");
    assert_eq!(repo.get(&job.id).await.unwrap(), Some(job.clone()));
    assert!(matches!(
        repo.insert(&job).await,
        Err(StoreError::AlreadyExists(_))
    ));
    assert_eq!(repo.get(&JobId::new()).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_guarded_update() {
    let repo = repo();
    let job = job();
    repo.insert(&job).await.unwrap();

    let applied = repo
        .update_if(&job.id, &JobStatus::SUBMITTABLE, &|j: Job| j.resubmit().start())
        .await
        .unwrap();
    assert!(applied.is_applied());
    assert_eq!(applied.job().status, JobStatus::Processing);

    let rejected = repo
        .update_if(&job.id, &JobStatus::SUBMITTABLE, &|j: Job| j.resubmit().start())
        .await
        .unwrap();
    assert!(!rejected.is_applied());

    let missing = repo
        .update_if(&JobId::new(), &[JobStatus::Processing], &|j: Job| j)
        .await;
    assert!(matches!(missing, Err(e) if e.is_not_found()));
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_concurrent_submissions_admit_one() {
    let repo = std::sync::Arc::new(repo());
    let job = job();
    repo.insert(&job).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let repo = repo.clone();
        let id = job.id.clone();
        handles.push(tokio::spawn(async move {
            repo.update_if(&id, &JobStatus::SUBMITTABLE, &|j: Job| j.resubmit().start())
                .await
                .map(|t| t.is_applied())
                .unwrap_or(false)
        }));
    }

    let mut applied = 0;
    for handle in handles {
        if handle.await.unwrap() {
            applied += 1;
        }
    }
    assert_eq!(applied, 1);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_lease_is_exclusive_until_released() {
    let repo = repo();
    let id = JobId::new();
    let ttl = Duration::from_secs(30);

    assert!(repo.try_lease(&id, "worker-a", ttl).await.unwrap());
    assert!(!repo.try_lease(&id, "worker-b", ttl).await.unwrap());

    // Only the owner can release.
    repo.release_lease(&id, "worker-b").await.unwrap();
    assert!(!repo.try_lease(&id, "worker-b", ttl).await.unwrap());

    repo.release_lease(&id, "worker-a").await.unwrap();
    assert!(repo.try_lease(&id, "worker-b", ttl).await.unwrap());
}
