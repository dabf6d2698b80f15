// Transcription orchestration
//
// Fetches the raw audio, runs speech recognition, persists the transcript
// and its metadata, then signals completion over the notification queue.
// The queue send is best effort; a delivery failure never fails a session
// that already has its transcript.

use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::PipelineConfig;
use crate::database::models::SessionStatus;
use crate::database::DatabaseManager;
use crate::error::PipelineError;
use crate::storage::{NotificationQueue, ObjectStore};
use crate::transcription::{TranscriptionProvider, TranscriptionResult};

/// Transcribe one session's audio end to end.
///
/// Audio with no recognizable speech still completes: the session gets an
/// empty transcript and metadata flagged `no_speech_detected`.
pub async fn run_transcription(
    db: &DatabaseManager,
    store: &dyn ObjectStore,
    provider: &dyn TranscriptionProvider,
    queue: &dyn NotificationQueue,
    config: &PipelineConfig,
    session_id: &str,
) -> Result<(), PipelineError> {
    match transcribe_session(db, store, provider, config, session_id).await {
        Ok(result) => {
            notify_completion(queue, config, session_id, &result).await;
            Ok(())
        }
        Err(e) => {
            let message = format!("transcription failed: {}", e);
            log::error!("Session {}: {}", session_id, message);
            if let Err(db_err) = db.set_session_error(session_id, &message) {
                log::error!("Failed to record error for session {}: {:#}", session_id, db_err);
            }
            if !e.is_precondition() {
                if let Err(db_err) = db.set_session_status(session_id, SessionStatus::Failed) {
                    log::error!("Failed to mark session {} failed: {:#}", session_id, db_err);
                }
            }
            Err(e)
        }
    }
}

async fn transcribe_session(
    db: &DatabaseManager,
    store: &dyn ObjectStore,
    provider: &dyn TranscriptionProvider,
    config: &PipelineConfig,
    session_id: &str,
) -> Result<TranscriptionResult, PipelineError> {
    let session = db
        .get_session(session_id)
        .map_err(|e| PipelineError::PersistenceFailed(format!("load session: {:#}", e)))?
        .ok_or_else(|| PipelineError::SessionNotFound(session_id.to_string()))?;

    if session.error_message.is_some() {
        if let Err(e) = db.clear_session_error(session_id) {
            log::warn!("Failed to clear stale error for session {}: {:#}", session_id, e);
        }
    }

    db.set_session_status(session_id, SessionStatus::Transcribing)
        .map_err(|e| PipelineError::PersistenceFailed(format!("set status: {:#}", e)))?;

    log::info!(
        "Session {}: fetching audio {}/{}",
        session_id,
        config.audio_bucket,
        session.audio_path
    );
    let audio = store
        .get_bytes(&config.audio_bucket, &session.audio_path)
        .await
        .map_err(|e| PipelineError::ObjectStoreFailed(format!("{:#}", e)))?;

    let result = provider
        .transcribe(&audio, &session.audio_path)
        .await
        .map_err(|e| PipelineError::TranscriptionFailed(e.to_string()))?;

    if result.no_speech_detected {
        log::warn!("Session {}: no speech detected in audio", session_id);
    } else {
        log::info!(
            "Session {}: transcribed {} chars, {} speakers, confidence {:.2}",
            session_id,
            result.transcript.chars().count(),
            result.speaker_count,
            result.confidence
        );
    }

    let metadata = json!({
        "confidence": result.confidence,
        "word_count": result.word_count,
        "utterances": result.utterances,
        "paragraphs": result.paragraphs,
        "speaker_count": result.speaker_count,
        "no_speech_detected": result.no_speech_detected,
        "model": result.model,
        "processing_time": result.processing_time,
    });

    db.store_transcription(
        session_id,
        &result.transcript,
        &metadata,
        result.duration_seconds(),
    )
    .map_err(|e| PipelineError::PersistenceFailed(format!("store transcription: {:#}", e)))?;

    Ok(result)
}

async fn notify_completion(
    queue: &dyn NotificationQueue,
    config: &PipelineConfig,
    session_id: &str,
    result: &TranscriptionResult,
) {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let payload = json!({
        "session_id": session_id,
        "no_speech_detected": result.no_speech_detected,
    });
    // One message per session in order, deduplicated per attempt
    let dedup_key = format!("{}-{}", session_id, timestamp);

    if let Err(e) = queue
        .send(&config.completion_queue, payload, session_id, &dedup_key)
        .await
    {
        log::error!(
            "Session {}: failed to signal transcription completion: {:#}",
            session_id,
            e
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::database::models::Session;
    use crate::storage::{FsObjectStore, InProcessQueue};
    use crate::transcription::{TranscriptionError, Utterance};
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct MockTranscriber {
        result: Result<TranscriptionResult, String>,
    }

    #[async_trait]
    impl TranscriptionProvider for MockTranscriber {
        fn model_name(&self) -> String {
            "mock/stt".to_string()
        }

        async fn transcribe(
            &self,
            _audio: &[u8],
            _filename: &str,
        ) -> Result<TranscriptionResult, TranscriptionError> {
            self.result
                .clone()
                .map_err(TranscriptionError::RequestFailed)
        }
    }

    fn spoken_result() -> TranscriptionResult {
        TranscriptionResult {
            transcript: "he stacks blocks all afternoon".to_string(),
            confidence: 0.92,
            word_count: 26,
            utterances: vec![Utterance {
                start: 0.0,
                end: 93.4,
                confidence: 0.92,
                transcript: "he stacks blocks all afternoon".to_string(),
                speaker: Some(0),
            }],
            paragraphs: Vec::new(),
            speaker_count: 1,
            no_speech_detected: false,
            model: "mock/stt".to_string(),
            processing_time: 1.5,
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        db: DatabaseManager,
        store: FsObjectStore,
        queue: InProcessQueue,
        config: PipelineConfig,
    }

    fn fixture_with_audio(session_id: &str) -> Fixture {
        let dir = tempdir().unwrap();
        let db = DatabaseManager::new(dir.path().join("test.db")).unwrap();
        let config = test_config();

        let session = Session::new(
            session_id.to_string(),
            "facility_1".into(),
            "child_1".into(),
            format!("recordings/facility_1/child_1/2025-06-01/{}.webm", session_id),
        );
        db.create_session(&session).unwrap();

        let audio_path = dir
            .path()
            .join(&config.audio_bucket)
            .join(&session.audio_path);
        std::fs::create_dir_all(audio_path.parent().unwrap()).unwrap();
        std::fs::write(&audio_path, b"fake webm").unwrap();

        Fixture {
            store: FsObjectStore::new(dir.path().to_path_buf()),
            queue: InProcessQueue::new(),
            _dir: dir,
            db,
            config,
        }
    }

    #[tokio::test]
    async fn successful_transcription_persists_and_notifies() {
        let fx = fixture_with_audio("sess_1");
        let provider = MockTranscriber {
            result: Ok(spoken_result()),
        };
        let mut receiver = fx.queue.take_receiver().unwrap();

        run_transcription(&fx.db, &fx.store, &provider, &fx.queue, &fx.config, "sess_1")
            .await
            .unwrap();

        let session = fx.db.get_session("sess_1").unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Transcribed);
        assert_eq!(
            session.transcript.as_deref(),
            Some("he stacks blocks all afternoon")
        );
        assert_eq!(session.duration_seconds, 94);
        let metadata = session.transcript_metadata.unwrap();
        assert_eq!(metadata["speaker_count"], 1);
        assert_eq!(metadata["no_speech_detected"], false);

        let message = receiver.recv().await.unwrap();
        assert_eq!(message.queue, "transcription-completed");
        assert_eq!(message.payload["session_id"], "sess_1");
        assert_eq!(message.group_key, "sess_1");
        assert!(message.dedup_key.starts_with("sess_1-"));
    }

    #[tokio::test]
    async fn silent_audio_completes_with_flag() {
        let fx = fixture_with_audio("sess_2");
        let provider = MockTranscriber {
            result: Ok(TranscriptionResult::no_speech("mock/stt".to_string(), 0.4)),
        };

        run_transcription(&fx.db, &fx.store, &provider, &fx.queue, &fx.config, "sess_2")
            .await
            .unwrap();

        let session = fx.db.get_session("sess_2").unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Transcribed);
        assert_eq!(session.transcript.as_deref(), Some(""));
        assert_eq!(session.duration_seconds, 0);
        assert_eq!(
            session.transcript_metadata.unwrap()["no_speech_detected"],
            true
        );
        assert!(session.error_message.is_none());
    }

    #[tokio::test]
    async fn provider_failure_marks_session_failed() {
        let fx = fixture_with_audio("sess_3");
        let provider = MockTranscriber {
            result: Err("deepgram 503".to_string()),
        };

        let err = run_transcription(&fx.db, &fx.store, &provider, &fx.queue, &fx.config, "sess_3")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::TranscriptionFailed(_)));

        let session = fx.db.get_session("sess_3").unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
        assert!(session
            .error_message
            .unwrap()
            .contains("transcription failed"));
    }

    #[tokio::test]
    async fn missing_audio_marks_session_failed() {
        let fx = fixture_with_audio("sess_4");
        std::fs::remove_file(
            fx._dir
                .path()
                .join(&fx.config.audio_bucket)
                .join("recordings/facility_1/child_1/2025-06-01/sess_4.webm"),
        )
        .unwrap();

        let provider = MockTranscriber {
            result: Ok(spoken_result()),
        };
        let err = run_transcription(&fx.db, &fx.store, &provider, &fx.queue, &fx.config, "sess_4")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ObjectStoreFailed(_)));

        let session = fx.db.get_session("sess_4").unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn queue_failure_does_not_fail_the_session() {
        let fx = fixture_with_audio("sess_5");
        let provider = MockTranscriber {
            result: Ok(spoken_result()),
        };
        // Dropping the receiver makes every send fail
        drop(fx.queue.take_receiver());

        run_transcription(&fx.db, &fx.store, &provider, &fx.queue, &fx.config, "sess_5")
            .await
            .unwrap();

        let session = fx.db.get_session("sess_5").unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Transcribed);
    }
}
