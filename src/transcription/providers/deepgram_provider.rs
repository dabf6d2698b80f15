// Deepgram pre-recorded transcription provider

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::config::TranscriptionConfig;
use crate::retry::{with_retry, RetryPolicy};
use crate::transcription::provider::{
    Paragraph, TranscriptionError, TranscriptionProvider, TranscriptionResult, Utterance,
};

const DEFAULT_BASE_URL: &str = "https://api.deepgram.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub struct DeepgramProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    language: String,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct ListenResponse {
    results: Option<ListenResults>,
}

#[derive(Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    utterances: Vec<RawUtterance>,
}

#[derive(Deserialize)]
struct Channel {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    confidence: f64,
    paragraphs: Option<ParagraphsWrapper>,
}

#[derive(Deserialize)]
struct ParagraphsWrapper {
    #[serde(default)]
    paragraphs: Vec<RawParagraph>,
}

#[derive(Deserialize)]
struct RawParagraph {
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    #[serde(default)]
    sentences: Vec<RawSentence>,
}

#[derive(Deserialize)]
struct RawSentence {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct RawUtterance {
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    transcript: String,
    speaker: Option<u32>,
}

impl DeepgramProvider {
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

    async fn call_once(
        &self,
        audio: &[u8],
        content_type: &str,
    ) -> Result<ListenResponse, TranscriptionError> {
        let url = format!("{}/v1/listen", self.base_url);

        let response = self
            .client
            .post(&url)
            .query(&[
                ("model", self.model.as_str()),
                ("language", self.language.as_str()),
                ("punctuate", "true"),
                ("diarize", "true"),
                ("smart_format", "true"),
                ("utterances", "true"),
                ("paragraphs", "true"),
                ("filler_words", "false"),
            ])
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", content_type)
            .body(audio.to_vec())
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
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TranscriptionError::AuthenticationFailed(
                "invalid Deepgram API key".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::RequestFailed(format!(
                "Deepgram returned {}: {}",
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
impl TranscriptionProvider for DeepgramProvider {
    fn model_name(&self) -> String {
        format!("deepgram/{}", self.model)
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        filename: &str,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        let content_type = content_type_for(filename);
        let started = Instant::now();

        let response =
            with_retry(self.retry, || self.call_once(audio, content_type)).await?;
        let processing_time = started.elapsed().as_secs_f64();

        let results = match response.results {
            Some(r) => r,
            None => return Ok(TranscriptionResult::no_speech(self.model_name(), processing_time)),
        };

        let alternative = results
            .channels
            .first()
            .and_then(|c| c.alternatives.first());

        let (transcript, confidence, paragraphs) = match alternative {
            Some(alt) => (
                alt.transcript.clone(),
                alt.confidence,
                alt.paragraphs
                    .as_ref()
                    .map(|w| {
                        w.paragraphs
                            .iter()
                            .map(|p| Paragraph {
                                start: p.start,
                                end: p.end,
                                transcript: p
                                    .sentences
                                    .iter()
                                    .map(|s| s.text.as_str())
                                    .collect::<Vec<_>>()
                                    .join(" "),
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            ),
            None => (String::new(), 0.0, Vec::new()),
        };

        if transcript.trim().is_empty() {
            log::warn!("Deepgram detected no speech in {}", filename);
            return Ok(TranscriptionResult::no_speech(self.model_name(), processing_time));
        }

        let utterances: Vec<Utterance> = results
            .utterances
            .into_iter()
            .map(|u| Utterance {
                start: u.start,
                end: u.end,
                confidence: u.confidence,
                transcript: u.transcript,
                speaker: u.speaker,
            })
            .collect();

        let speakers: HashSet<u32> = utterances.iter().filter_map(|u| u.speaker).collect();

        // Character count stands in for word count; the target language has
        // no whitespace word boundaries.
        let word_count = transcript.chars().filter(|c| !c.is_whitespace()).count();

        Ok(TranscriptionResult {
            transcript,
            confidence,
            word_count,
            utterances,
            paragraphs,
            speaker_count: speakers.len(),
            no_speech_detected: false,
            model: self.model_name(),
            processing_time,
        })
    }
}

fn content_type_for(filename: &str) -> &'static str {
    let extension = filename.rsplit('.').next().unwrap_or_default();
    match extension.to_ascii_lowercase().as_str() {
        "webm" => "audio/webm",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}
