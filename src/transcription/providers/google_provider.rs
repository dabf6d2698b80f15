// Google Cloud Speech-to-Text provider (synchronous recognize endpoint)

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};

use crate::config::TranscriptionConfig;
use crate::retry::{with_retry, RetryPolicy};
use crate::transcription::provider::{
    TranscriptionError, TranscriptionProvider, TranscriptionResult, Utterance,
};

const DEFAULT_BASE_URL: &str = "https://speech.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub struct GoogleSpeechProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    language: String,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognizeResult>,
}

#[derive(Deserialize)]
struct RecognizeResult {
    #[serde(default)]
    alternatives: Vec<RecognizeAlternative>,
}

#[derive(Deserialize)]
struct RecognizeAlternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    words: Vec<WordInfo>,
}

#[derive(Deserialize)]
struct WordInfo {
    #[serde(rename = "startTime")]
    start_time: Option<String>,
    #[serde(rename = "endTime")]
    end_time: Option<String>,
}

impl GoogleSpeechProvider {
    pub fn new(config: &TranscriptionConfig, retry: RetryPolicy) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            language: config.language.clone(),
            retry,
        }
    }

    async fn call_once(&self, audio: &[u8]) -> Result<RecognizeResponse, TranscriptionError> {
        let url = format!("{}/v1/speech:recognize?key={}", self.base_url, self.api_key);
        let encoded = base64::engine::general_purpose::STANDARD.encode(audio);
        let body = json!({
            "config": {
                "languageCode": self.language,
                "model": self.model,
                "enableAutomaticPunctuation": true,
                "enableWordTimeOffsets": true,
            },
            "audio": {"content": encoded}
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    TranscriptionError::ProviderUnavailable(e.to_string())
                } else {
                    TranscriptionError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::FORBIDDEN
            || status == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(TranscriptionError::AuthenticationFailed(
                "invalid Google Speech API key".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::RequestFailed(format!(
                "Google Speech returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl TranscriptionProvider for GoogleSpeechProvider {
    fn model_name(&self) -> String {
        format!("google/{}", self.model)
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        _filename: &str,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        let started = Instant::now();
        let response = with_retry(self.retry, || self.call_once(audio)).await?;
        let processing_time = started.elapsed().as_secs_f64();

        // One utterance per recognition result; the synchronous endpoint
        // does not diarize.
        let mut transcript_parts = Vec::new();
        let mut utterances = Vec::new();
        let mut confidence_sum = 0.0;
        let mut confidence_count = 0usize;

        for result in &response.results {
            let alt = match result.alternatives.first() {
                Some(a) => a,
                None => continue,
            };
            if alt.transcript.trim().is_empty() {
                continue;
            }

            let start = alt
                .words
                .first()
                .and_then(|w| w.start_time.as_deref())
                .and_then(parse_offset)
                .unwrap_or(0.0);
            let end = alt
                .words
                .last()
                .and_then(|w| w.end_time.as_deref())
                .and_then(parse_offset)
                .unwrap_or(start);

            transcript_parts.push(alt.transcript.clone());
            confidence_sum += alt.confidence;
            confidence_count += 1;
            utterances.push(Utterance {
                start,
                end,
                confidence: alt.confidence,
                transcript: alt.transcript.clone(),
                speaker: None,
            });
        }

        if transcript_parts.is_empty() {
            log::warn!("Google Speech detected no speech");
            return Ok(TranscriptionResult::no_speech(self.model_name(), processing_time));
        }

        let transcript = transcript_parts.join(" ");
        let word_count = transcript.chars().filter(|c| !c.is_whitespace()).count();
        let confidence = confidence_sum / confidence_count as f64;

        Ok(TranscriptionResult {
            transcript,
            confidence,
            word_count,
            utterances,
            paragraphs: Vec::new(),
            speaker_count: 0,
            no_speech_detected: false,
            model: self.model_name(),
            processing_time,
        })
    }
}

/// Google duration strings look like "12.300s"
fn parse_offset(raw: &str) -> Option<f64> {
    raw.trim_end_matches('s').parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_offsets() {
        assert_eq!(parse_offset("12.300s"), Some(12.3));
        assert_eq!(parse_offset("0s"), Some(0.0));
        assert_eq!(parse_offset("garbage"), None);
    }
}
