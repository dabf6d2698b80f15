// Background task registry
//
// Tracks in-flight pipeline work per session so callers can answer "is this
// session busy" and cancel everything for a session. Spawned work is
// awaitable; the triggering layer decides whether to wait or detach.
//
// The registry does not serialize stages: callers must not run two stages
// for the same session concurrently.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;

static ACTIVE_TASKS: Lazy<DashMap<String, TaskEntry>> = Lazy::new(DashMap::new);

struct TaskEntry {
    session_id: String,
    cancel_token: CancellationToken,
}

fn task_key(session_id: &str, stage: &str) -> String {
    format!("{}:{}", session_id, stage)
}

/// Spawn one stage's work under the registry.
///
/// Cancellation is checked once before the future starts; work already past
/// that point runs to completion so the session is never left with a
/// half-written stage.
pub fn spawn_stage<F>(
    session_id: &str,
    stage: &'static str,
    fut: F,
) -> JoinHandle<Result<(), PipelineError>>
where
    F: Future<Output = Result<(), PipelineError>> + Send + 'static,
{
    let key = task_key(session_id, stage);
    let cancel_token = CancellationToken::new();
    ACTIVE_TASKS.insert(
        key.clone(),
        TaskEntry {
            session_id: session_id.to_string(),
            cancel_token: cancel_token.clone(),
        },
    );

    let session_id = session_id.to_string();
    tokio::spawn(async move {
        let result = if cancel_token.is_cancelled() {
            log::info!("Session {}: {} cancelled before start", session_id, stage);
            Ok(())
        } else {
            fut.await
        };
        ACTIVE_TASKS.remove(&key);
        result
    })
}

/// Is any stage currently registered for this session?
pub fn is_session_processing(session_id: &str) -> bool {
    ACTIVE_TASKS
        .iter()
        .any(|entry| entry.value().session_id == session_id)
}

/// Cancel every not-yet-started task for a session. Returns how many tasks
/// were signalled.
pub fn cancel_session(session_id: &str) -> usize {
    let mut cancelled = 0;
    for entry in ACTIVE_TASKS.iter() {
        if entry.value().session_id == session_id {
            entry.value().cancel_token.cancel();
            cancelled += 1;
        }
    }
    if cancelled > 0 {
        log::info!("Cancelled {} pending task(s) for session {}", cancelled, session_id);
    }
    cancelled
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn registry_tracks_lifecycle() {
        assert!(!is_session_processing("lifecycle_sess"));

        let (release, released) = oneshot::channel::<()>();
        let handle = spawn_stage("lifecycle_sess", "fact_extraction", async move {
            let _ = released.await;
            Ok(())
        });

        // Yield so the spawned task registers as running
        tokio::task::yield_now().await;
        assert!(is_session_processing("lifecycle_sess"));

        release.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert!(!is_session_processing("lifecycle_sess"));
    }

    #[tokio::test]
    async fn cancel_skips_unstarted_work() {
        // Cancel lands before the runtime polls the future
        let handle = spawn_stage("cancel_sess", "assessment", async move {
            Err(PipelineError::GenerationFailed("should not run".into()))
        });
        assert_eq!(cancel_session("cancel_sess"), 1);

        // Either the cancel won the race and the stage was skipped, or the
        // future had already been polled to completion
        let result = handle.await.unwrap();
        if let Err(e) = result {
            assert!(matches!(e, PipelineError::GenerationFailed(_)));
        }
        assert!(!is_session_processing("cancel_sess"));
    }

    #[tokio::test]
    async fn cancelling_unknown_session_is_noop() {
        assert_eq!(cancel_session("ghost_sess"), 0);
    }
}
