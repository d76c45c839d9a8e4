//! Concurrent writers against the in-memory registry.

use futures_util::future::join_all;

use reel_models::{JobId, JobStatus, Transition};
use reel_registry::JobRegistry;

const JOBS: usize = 8;
const WRITERS_PER_JOB: usize = 16;
const REPORTS_PER_WRITER: usize = 25;

async fn start(registry: &JobRegistry, id: &JobId) {
    registry
        .create(id.clone(), "Demo", None, "https://pub/out.mp4")
        .await
        .unwrap();
    registry
        .transition(
            id,
            Transition::Start {
                runpod_id: format!("rp-{}", id),
            },
        )
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_progress_writers_do_not_lose_updates() {
    let registry = JobRegistry::in_memory();
    let ids: Vec<JobId> = (0..JOBS).map(|i| JobId::from(format!("job-{}", i))).collect();
    for id in &ids {
        start(&registry, id).await;
    }

    let mut tasks = Vec::new();
    for id in &ids {
        for writer in 0..WRITERS_PER_JOB {
            let registry = registry.clone();
            let id = id.clone();
            tasks.push(tokio::spawn(async move {
                for n in 0..REPORTS_PER_WRITER {
                    let recorded = registry
                        .append_progress(&id, Some(n as f64), Some(format!("{}:{}:{}", id, writer, n)))
                        .await
                        .unwrap();
                    assert!(recorded);
                    tokio::task::yield_now().await;
                }
            }));
        }
    }
    for result in join_all(tasks).await {
        result.unwrap();
    }

    for id in &ids {
        let job = registry.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.progress.len(), WRITERS_PER_JOB * REPORTS_PER_WRITER);
        // Every entry belongs to this job and every writer's reports stay in order.
        for writer in 0..WRITERS_PER_JOB {
            let prefix = format!("{}:{}:", id, writer);
            let seen: Vec<usize> = job
                .progress
                .iter()
                .filter_map(|p| p.message.as_deref())
                .filter_map(|m| m.strip_prefix(prefix.as_str()))
                .map(|n| n.parse().unwrap())
                .collect();
            assert_eq!(seen, (0..REPORTS_PER_WRITER).collect::<Vec<_>>());
        }
        assert!(job
            .progress
            .iter()
            .all(|p| p.message.as_deref().unwrap().starts_with(&format!("{}:", id))));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_terminal_callbacks_apply_once() {
    let registry = JobRegistry::in_memory();
    let ids: Vec<JobId> = (0..JOBS).map(|i| JobId::from(format!("race-{}", i))).collect();
    for id in &ids {
        start(&registry, id).await;
    }

    let mut tasks = Vec::new();
    for id in &ids {
        for attempt in 0..WRITERS_PER_JOB {
            let registry = registry.clone();
            let id = id.clone();
            tasks.push(tokio::spawn(async move {
                // Interleave progress with the terminal callbacks of every job.
                registry
                    .append_progress(&id, Some(50.0), Some("rendering".into()))
                    .await
                    .unwrap();
                let transition = if attempt % 2 == 0 {
                    Transition::Complete {
                        output_url: Some(format!("https://pub/final-{}.mp4", id)),
                    }
                } else {
                    Transition::Fail {
                        error: format!("attempt {}", attempt),
                    }
                };
                registry
                    .transition(&id, transition)
                    .await
                    .unwrap()
                    .outcome
                    .is_applied()
            }));
        }
    }

    let applied = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .filter(|applied| *applied)
        .count();
    assert_eq!(applied, JOBS);

    for id in &ids {
        let job = registry.get(id).await.unwrap();
        assert!(job.status.is_terminal());
        assert!(job.completed_at.is_some());
        assert!(job.progress.len() <= WRITERS_PER_JOB);
        match job.status {
            JobStatus::Completed => {
                assert!(job.error.is_none());
                assert_eq!(job.output_url, format!("https://pub/final-{}.mp4", id));
            }
            JobStatus::Failed => {
                assert!(job.error.as_deref().unwrap().starts_with("attempt "));
                assert_eq!(job.output_url, "https://pub/out.mp4");
            }
            other => panic!("unexpected status {}", other),
        }
    }
}
