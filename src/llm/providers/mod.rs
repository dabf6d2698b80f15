// Generation provider implementations

pub mod gemini_provider;
pub mod openai_provider;

pub use gemini_provider::GeminiProvider;
pub use openai_provider::OpenAiProvider;
