//! Pipeline error taxonomy
//!
//! Every stage invocation surfaces exactly one of these to the triggering
//! layer. Precondition errors (session missing, upstream artifact missing,
//! stored prompt missing) leave the session status untouched; execution
//! errors move the session to `failed`.

use std::fmt;

/// Error types for pipeline stage execution
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// No session record exists for the given id
    SessionNotFound(String),
    /// The previous stage has not run, or its artifact could not be unwrapped
    UpstreamArtifactMissing(String),
    /// The generation provider exhausted its retry budget or returned empty
    GenerationFailed(String),
    /// Prompt reuse was requested but no prompt is stored
    MissingPrompt(String),
    /// The transcription provider failed after retries
    TranscriptionFailed(String),
    /// Audio bytes could not be fetched from the object store
    ObjectStoreFailed(String),
    /// A record-store write failed at a point where it cannot be ignored
    PersistenceFailed(String),
}

impl PipelineError {
    /// True for errors raised before the stage actually started doing work.
    /// The executor leaves `status` alone for these; the session was never
    /// in flight.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PipelineError::SessionNotFound(_)
                | PipelineError::UpstreamArtifactMissing(_)
                | PipelineError::MissingPrompt(_)
        )
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::SessionNotFound(msg) => write!(f, "Session not found: {}", msg),
            PipelineError::UpstreamArtifactMissing(msg) => {
                write!(f, "Upstream artifact missing: {}", msg)
            }
            PipelineError::GenerationFailed(msg) => write!(f, "Generation failed: {}", msg),
            PipelineError::MissingPrompt(msg) => write!(f, "No stored prompt: {}", msg),
            PipelineError::TranscriptionFailed(msg) => write!(f, "Transcription failed: {}", msg),
            PipelineError::ObjectStoreFailed(msg) => write!(f, "Object store error: {}", msg),
            PipelineError::PersistenceFailed(msg) => write!(f, "Persistence error: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}
