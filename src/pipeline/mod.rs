// Pipeline module
// Transcription, the three analysis stages, plan sync, and task tracking.

pub mod prompts;
pub mod stage;
pub mod sync;
pub mod tasks;
pub mod transcribe;

pub use stage::{
    assessment_stage, execute_stage, extraction_stage, structuring_stage, StageSpec,
};
pub use sync::sync_plan;
pub use tasks::{cancel_session, is_session_processing, spawn_stage};
pub use transcribe::run_transcription;
