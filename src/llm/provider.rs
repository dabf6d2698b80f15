// Generation provider abstraction

use async_trait::async_trait;

/// Errors that can occur during text generation
#[derive(Debug)]
pub enum GenerationError {
    /// The provider rejected the API key
    AuthenticationFailed(String),
    /// Request-level failure (network, timeout, non-success status)
    RequestFailed(String),
    /// The provider endpoint could not be reached at all
    ProviderUnavailable(String),
    /// The provider answered but produced no usable text
    EmptyResponse,
    Other(String),
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::AuthenticationFailed(msg) => {
                write!(f, "Authentication failed: {}", msg)
            }
            GenerationError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            GenerationError::ProviderUnavailable(msg) => {
                write!(f, "Provider unavailable: {}", msg)
            }
            GenerationError::EmptyResponse => write!(f, "Provider returned an empty response"),
            GenerationError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for GenerationError {}

/// A text-generation backend
///
/// Implementations own their retry behavior; `generate` returns only after
/// the attempt budget is exhausted.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Provider-qualified model identifier, e.g. `openai/gpt-4o`
    fn model_name(&self) -> String;

    /// Produce a completion for a single-prompt request
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
