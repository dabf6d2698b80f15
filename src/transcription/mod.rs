// Transcription module

pub mod provider;
pub mod providers;

use std::sync::Arc;

use crate::config::{TranscriptionBackend, TranscriptionConfig};
use crate::retry::RetryPolicy;

pub use provider::{
    Paragraph, TranscriptionError, TranscriptionProvider, TranscriptionResult, Utterance,
};
pub use providers::{DeepgramProvider, GoogleSpeechProvider};

/// Build the configured transcription backend
pub fn create_transcription_provider(
    config: &TranscriptionConfig,
    retry: RetryPolicy,
) -> Arc<dyn TranscriptionProvider> {
    match config.backend {
        TranscriptionBackend::Deepgram => Arc::new(DeepgramProvider::new(config, retry)),
        TranscriptionBackend::GoogleSpeech => Arc::new(GoogleSpeechProvider::new(config, retry)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(backend: TranscriptionBackend, model: &str) -> TranscriptionConfig {
        TranscriptionConfig {
            backend,
            model: model.to_string(),
            language: "ja".to_string(),
            api_key: "test-key".to_string(),
            base_url: None,
        }
    }

    #[test]
    fn factory_selects_backend() {
        let provider = create_transcription_provider(
            &config_for(TranscriptionBackend::Deepgram, "nova-2"),
            RetryPolicy::default(),
        );
        assert_eq!(provider.model_name(), "deepgram/nova-2");

        let provider = create_transcription_provider(
            &config_for(TranscriptionBackend::GoogleSpeech, "latest_long"),
            RetryPolicy::default(),
        );
        assert_eq!(provider.model_name(), "google/latest_long");
    }
}
