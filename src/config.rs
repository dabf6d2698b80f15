//! Pipeline configuration
//!
//! Resolved once at process start and threaded through explicitly; nothing
//! downstream reads the environment ad hoc.

use anyhow::{bail, Context, Result};

use crate::retry::RetryPolicy;

/// Which generation backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationBackend {
    OpenAi,
    Gemini,
}

/// Which speech-recognition backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptionBackend {
    Deepgram,
    GoogleSpeech,
}

/// Generation provider settings
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub backend: GenerationBackend,
    pub model: String,
    pub api_key: String,
    /// Override for tests and self-hosted gateways
    pub base_url: Option<String>,
}

/// Transcription provider settings
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    pub backend: TranscriptionBackend,
    pub model: String,
    pub language: String,
    pub api_key: String,
    pub base_url: Option<String>,
}

/// Everything a pipeline invocation needs beyond its collaborator handles
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub generation: GenerationConfig,
    pub transcription: TranscriptionConfig,
    /// Output key of the structuring stage. The prompt contract has shipped
    /// under both `annotated_facts_v1` and `fact_clusters_v1`; keeping it as
    /// configuration keeps both schemes representable.
    pub stage2_output_key: String,
    /// Object-store bucket holding raw interview audio
    pub audio_bucket: String,
    /// Queue that receives the transcription-completed signal
    pub completion_queue: String,
    pub retry: RetryPolicy,
}

pub const DEFAULT_STAGE2_OUTPUT_KEY: &str = "annotated_facts_v1";

impl PipelineConfig {
    /// Build a config from the environment. Call once at startup.
    pub fn from_env() -> Result<Self> {
        let generation = match env_or("GENERATION_PROVIDER", "openai").as_str() {
            "openai" => GenerationConfig {
                backend: GenerationBackend::OpenAi,
                model: env_or("GENERATION_MODEL", "gpt-4o"),
                api_key: require("OPENAI_API_KEY")?,
                base_url: std::env::var("OPENAI_BASE_URL").ok(),
            },
            "gemini" => GenerationConfig {
                backend: GenerationBackend::Gemini,
                model: env_or("GENERATION_MODEL", "gemini-1.5-pro"),
                api_key: require("GEMINI_API_KEY")?,
                base_url: std::env::var("GEMINI_BASE_URL").ok(),
            },
            other => bail!("Unknown generation provider: {}", other),
        };

        let transcription = match env_or("TRANSCRIPTION_PROVIDER", "deepgram").as_str() {
            "deepgram" => TranscriptionConfig {
                backend: TranscriptionBackend::Deepgram,
                model: env_or("TRANSCRIPTION_MODEL", "nova-2"),
                language: env_or("TRANSCRIPTION_LANGUAGE", "ja"),
                api_key: require("DEEPGRAM_API_KEY")?,
                base_url: std::env::var("DEEPGRAM_BASE_URL").ok(),
            },
            "google" => TranscriptionConfig {
                backend: TranscriptionBackend::GoogleSpeech,
                model: env_or("TRANSCRIPTION_MODEL", "latest_long"),
                language: env_or("TRANSCRIPTION_LANGUAGE", "ja-JP"),
                api_key: require("GOOGLE_SPEECH_API_KEY")?,
                base_url: std::env::var("GOOGLE_SPEECH_BASE_URL").ok(),
            },
            other => bail!("Unknown transcription provider: {}", other),
        };

        Ok(Self {
            generation,
            transcription,
            stage2_output_key: env_or("STAGE2_OUTPUT_KEY", DEFAULT_STAGE2_OUTPUT_KEY),
            audio_bucket: env_or("AUDIO_BUCKET", "interview-audio"),
            completion_queue: env_or("COMPLETION_QUEUE", "transcription-completed"),
            retry: RetryPolicy::default(),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{} environment variable not set", key))
}


#[cfg(test)]
pub(crate) fn test_config() -> PipelineConfig {
    PipelineConfig {
        generation: GenerationConfig {
            backend: GenerationBackend::OpenAi,
            model: "gpt-4o".to_string(),
            api_key: "test-key".to_string(),
            base_url: None,
        },
        transcription: TranscriptionConfig {
            backend: TranscriptionBackend::Deepgram,
            model: "nova-2".to_string(),
            language: "ja".to_string(),
            api_key: "test-key".to_string(),
            base_url: None,
        },
        stage2_output_key: DEFAULT_STAGE2_OUTPUT_KEY.to_string(),
        audio_bucket: "interview-audio".to_string(),
        completion_queue: "transcription-completed".to_string(),
        retry: RetryPolicy::default(),
    }
}
