// Transcription provider abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors that can occur during transcription
#[derive(Debug)]
pub enum TranscriptionError {
    AuthenticationFailed(String),
    RequestFailed(String),
    ProviderUnavailable(String),
    /// The provider answered with something we could not interpret
    InvalidResponse(String),
    Other(String),
}

impl std::fmt::Display for TranscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptionError::AuthenticationFailed(msg) => {
                write!(f, "Authentication failed: {}", msg)
            }
            TranscriptionError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            TranscriptionError::ProviderUnavailable(msg) => {
                write!(f, "Provider unavailable: {}", msg)
            }
            TranscriptionError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            TranscriptionError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for TranscriptionError {}

/// One contiguous speech segment with speaker attribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub start: f64,
    pub end: f64,
    pub confidence: f64,
    pub transcript: String,
    pub speaker: Option<u32>,
}

/// Paragraph-level grouping, when the backend provides one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    pub start: f64,
    pub end: f64,
    pub transcript: String,
}

/// Full output of one transcription run
///
/// Silence is not an error: `no_speech_detected` marks an audio file the
/// recognizer produced no words for, and the rest of the fields are empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub transcript: String,
    pub confidence: f64,
    pub word_count: usize,
    pub utterances: Vec<Utterance>,
    pub paragraphs: Vec<Paragraph>,
    pub speaker_count: usize,
    pub no_speech_detected: bool,
    pub model: String,
    /// Seconds spent in the provider call
    pub processing_time: f64,
}

impl TranscriptionResult {
    /// Empty result for audio with no recognizable speech
    pub fn no_speech(model: String, processing_time: f64) -> Self {
        Self {
            transcript: String::new(),
            confidence: 0.0,
            word_count: 0,
            utterances: Vec::new(),
            paragraphs: Vec::new(),
            speaker_count: 0,
            no_speech_detected: true,
            model,
            processing_time,
        }
    }

    /// End timestamp of the last utterance, in whole seconds
    pub fn duration_seconds(&self) -> i64 {
        self.utterances
            .last()
            .map(|u| u.end.ceil() as i64)
            .unwrap_or(0)
    }
}

/// A speech-recognition backend
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Provider-qualified model identifier, e.g. `deepgram/nova-2`
    fn model_name(&self) -> String;

    /// Transcribe one audio object. The filename carries the container
    /// format hint.
    async fn transcribe(
        &self,
        audio: &[u8],
        filename: &str,
    ) -> Result<TranscriptionResult, TranscriptionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_comes_from_last_utterance() {
        let mut result = TranscriptionResult::no_speech("deepgram/nova-2".to_string(), 0.1);
        assert_eq!(result.duration_seconds(), 0);

        result.utterances = vec![
            Utterance {
                start: 0.0,
                end: 4.2,
                confidence: 0.9,
                transcript: "a".to_string(),
                speaker: Some(0),
            },
            Utterance {
                start: 5.0,
                end: 130.4,
                confidence: 0.9,
                transcript: "b".to_string(),
                speaker: Some(1),
            },
        ];
        assert_eq!(result.duration_seconds(), 131);
    }
}
