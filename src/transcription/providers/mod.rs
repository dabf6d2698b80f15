// Transcription provider implementations

pub mod deepgram_provider;
pub mod google_provider;

pub use deepgram_provider::DeepgramProvider;
pub use google_provider::GoogleSpeechProvider;
