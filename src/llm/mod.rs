// LLM generation module

pub mod provider;
pub mod providers;

use std::sync::Arc;

use crate::config::{GenerationBackend, GenerationConfig};
use crate::retry::RetryPolicy;

pub use provider::{GenerationError, GenerationProvider};
pub use providers::{GeminiProvider, OpenAiProvider};

/// Build the configured generation backend
pub fn create_generation_provider(
    config: &GenerationConfig,
    retry: RetryPolicy,
) -> Arc<dyn GenerationProvider> {
    match config.backend {
        GenerationBackend::OpenAi => Arc::new(OpenAiProvider::new(config, retry)),
        GenerationBackend::Gemini => Arc::new(GeminiProvider::new(config, retry)),
    }
}
