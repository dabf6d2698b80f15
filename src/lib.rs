//! Interview-to-support-plan pipeline
//!
//! Turns a recorded parent interview into an editable individual support
//! plan in four steps: speech recognition, fact extraction, fact
//! structuring, and assessment drafting. Each step persists its inputs and
//! outputs on the session record, so any step can be re-run in isolation
//! and failures are inspectable after the fact.
//!
//! The library is transport-agnostic: callers wire a [`database::DatabaseManager`],
//! an object store, a notification queue, and the configured providers into
//! the functions under [`pipeline`].

pub mod artifact;
pub mod config;
pub mod database;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod retry;
pub mod storage;
pub mod transcription;

pub use config::PipelineConfig;
pub use error::PipelineError;

/// Initialize env-driven logging. Safe to call more than once; later calls
/// are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .try_init();
}
