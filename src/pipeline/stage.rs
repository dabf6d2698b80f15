// Stage execution
//
// All three analysis stages run through one executor; a stage is data (a
// `StageSpec`), not a separate code path. The executor owns status
// transitions and failure bookkeeping so individual stages cannot get them
// wrong.

use serde_json::Value;

use crate::artifact::StageArtifact;
use crate::config::PipelineConfig;
use crate::database::models::{SessionField, SessionStatus};
use crate::database::DatabaseManager;
use crate::error::PipelineError;
use crate::llm::GenerationProvider;
use crate::pipeline::{prompts, sync};

/// Builds a stage prompt from the session's stored artifacts
pub type PromptBuilder = fn(&crate::database::Session, &PipelineConfig) -> Result<String, PipelineError>;

/// Everything that distinguishes one analysis stage from another
pub struct StageSpec {
    pub name: &'static str,
    /// Column the generated prompt is persisted to
    pub prompt_field: SessionField,
    /// Column the parsed result is persisted to
    pub output_field: SessionField,
    /// Column recording which model produced the result
    pub model_field: Option<SessionField>,
    pub builder: PromptBuilder,
    /// Run plan sync after this stage succeeds
    pub sync_after: bool,
}

/// Stage 1: transcript -> extraction_v1
pub fn extraction_stage() -> StageSpec {
    StageSpec {
        name: "fact_extraction",
        prompt_field: SessionField::ExtractionPrompt,
        output_field: SessionField::ExtractionResult,
        model_field: Some(SessionField::ExtractionModel),
        builder: prompts::build_extraction_prompt,
        sync_after: false,
    }
}

/// Stage 2: extraction_v1 -> configured structuring key
pub fn structuring_stage() -> StageSpec {
    StageSpec {
        name: "fact_structuring",
        prompt_field: SessionField::StructuringPrompt,
        output_field: SessionField::StructuringResult,
        model_field: Some(SessionField::StructuringModel),
        builder: prompts::build_structuring_prompt,
        sync_after: false,
    }
}

/// Stage 3: structured facts -> assessment_v1, then plan sync
pub fn assessment_stage() -> StageSpec {
    StageSpec {
        name: "assessment",
        prompt_field: SessionField::AssessmentPrompt,
        output_field: SessionField::AssessmentResult,
        model_field: Some(SessionField::AssessmentModel),
        builder: prompts::build_assessment_prompt,
        sync_after: true,
    }
}

/// Run one stage for one session.
///
/// With `use_stored_prompt` the previously persisted prompt is reused
/// verbatim instead of rebuilding from upstream artifacts; re-running a
/// stage with an operator-edited prompt goes through this path.
///
/// Failure handling: the error message is always recorded on the session,
/// but only errors raised after the stage was underway move it to
/// `failed`. A precondition failure leaves the status where it was.
pub async fn execute_stage(
    db: &DatabaseManager,
    provider: &dyn GenerationProvider,
    config: &PipelineConfig,
    session_id: &str,
    spec: &StageSpec,
    use_stored_prompt: bool,
) -> Result<Value, PipelineError> {
    match run_stage(db, provider, config, session_id, spec, use_stored_prompt).await {
        Ok(result) => Ok(result),
        Err(e) => {
            let message = format!("{} failed: {}", spec.name, e);
            log::error!("Session {}: {}", session_id, message);
            if let Err(db_err) = db.set_session_error(session_id, &message) {
                log::error!("Failed to record error for session {}: {:#}", session_id, db_err);
            }
            if !e.is_precondition() {
                if let Err(db_err) = db.set_session_status(session_id, SessionStatus::Failed) {
                    log::error!("Failed to mark session {} failed: {:#}", session_id, db_err);
                }
            }
            Err(e)
        }
    }
}

async fn run_stage(
    db: &DatabaseManager,
    provider: &dyn GenerationProvider,
    config: &PipelineConfig,
    session_id: &str,
    spec: &StageSpec,
    use_stored_prompt: bool,
) -> Result<Value, PipelineError> {
    let session = db
        .get_session(session_id)
        .map_err(|e| PipelineError::PersistenceFailed(format!("load session: {:#}", e)))?
        .ok_or_else(|| PipelineError::SessionNotFound(session_id.to_string()))?;

    // Stale error from an earlier attempt; clearing is best effort
    if session.error_message.is_some() {
        if let Err(e) = db.clear_session_error(session_id) {
            log::warn!("Failed to clear stale error for session {}: {:#}", session_id, e);
        }
    }

    let prompt = if use_stored_prompt {
        session
            .text_field(spec.prompt_field)
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::MissingPrompt(format!(
                    "session {} has no stored {} prompt",
                    session_id, spec.name
                ))
            })?
    } else {
        let prompt = (spec.builder)(&session, config)?;
        // Persisted before generation so a later failure still leaves an
        // auditable prompt the reuse path can pick up; a lost write here
        // must fail the stage, not be papered over
        db.set_stage_prompt(session_id, spec.prompt_field, &prompt)
            .map_err(|e| PipelineError::PersistenceFailed(format!("store prompt: {:#}", e)))?;
        prompt
    };

    log::info!(
        "Session {}: running {} with {} ({} prompt chars)",
        session_id,
        spec.name,
        provider.model_name(),
        prompt.len()
    );

    db.set_session_status(session_id, SessionStatus::Analyzing)
        .map_err(|e| PipelineError::PersistenceFailed(format!("set status: {:#}", e)))?;

    let response = provider
        .generate(&prompt)
        .await
        .map_err(|e| PipelineError::GenerationFailed(e.to_string()))?;
    if response.trim().is_empty() {
        return Err(PipelineError::GenerationFailed(format!(
            "{} returned an empty response",
            provider.model_name()
        )));
    }

    let artifact = StageArtifact::parse_response(&response);
    if let StageArtifact::Wrapped(_) = &artifact {
        log::warn!(
            "Session {}: {} returned non-JSON output, storing as summary",
            session_id,
            spec.name
        );
    }
    let result = artifact.to_value();

    let model = provider.model_name();
    db.store_stage_result(
        session_id,
        spec.output_field,
        spec.model_field.map(|f| (f, model.as_str())),
        &result,
    )
    .map_err(|e| PipelineError::PersistenceFailed(format!("store result: {:#}", e)))?;

    db.set_session_status(session_id, SessionStatus::Completed)
        .map_err(|e| PipelineError::PersistenceFailed(format!("set status: {:#}", e)))?;

    if spec.sync_after {
        // Reload to pick up a plan linked while the stage ran
        let session = db
            .get_session(session_id)
            .map_err(|e| PipelineError::PersistenceFailed(format!("load session: {:#}", e)))?
            .ok_or_else(|| PipelineError::SessionNotFound(session_id.to_string()))?;
        sync::sync_plan(db, &session, &result)?;
    }

    log::info!("Session {}: {} completed", session_id, spec.name);
    Ok(result)
}
