// Stage prompt construction
//
// Each builder checks its upstream artifact, then assembles instructions,
// output contract, and input material into one prompt string. Builders fail
// with `UpstreamArtifactMissing` before any provider work happens.

use serde_json::Value;

use crate::artifact;
use crate::config::PipelineConfig;
use crate::database::models::{Session, SessionField};
use crate::error::PipelineError;

const EXTRACTION_INSTRUCTIONS: &str = r#"You are an assistant helping child-development support staff analyze an interview with a parent about their child.

Read the interview transcript below and extract every concrete, observable fact about the child. Work fact by fact; do not summarize.

Rules:
- KEEP: specific behaviors, abilities, difficulties, preferences, routines, reactions to settings, interactions with family and peers, health and sleep and meal details, concrete episodes, and direct quotes of the parent's wishes.
- IGNORE: greetings, scheduling talk, filler, and the interviewer's own commentary.
- Never infer a diagnosis. Record what was said, not what it might mean.
- When unsure whether something is a fact, keep it with confidence "low" rather than dropping it.
- Every fact must be traceable to the transcript. Do not invent details.
"#;

const EXTRACTION_SCHEMA: &str = r#"Respond with pure JSON only, no surrounding prose, in exactly this shape:

{
  "extraction_v1": {
    "basic_info": [FACT],
    "current_state": [FACT],
    "strengths": [FACT],
    "challenges": [FACT],
    "physical_sensory": [FACT],
    "medical_development": [FACT],
    "family_environment": [FACT],
    "parent_intentions": [FACT],
    "staff_notes": [FACT],
    "administrative_notes": [FACT],
    "unresolved_items": [FACT]
  }
}

where FACT is:

{"summary": "...", "detail": "...", "confidence": "high|medium|low"}

Empty categories stay as empty arrays."#;

const STRUCTURING_INSTRUCTIONS: &str = r#"You are an assistant helping child-development support staff organize extracted interview facts into assessment domains.

Annotate every fact below and assign it to exactly one domain. Carry each fact's wording through verbatim; annotation adds fields, it never rewrites.

Domains:
- social_communication: peer and adult interaction, turn-taking, play
- cognitive_behavior: attention, learning, routines, flexibility, emotion regulation
- health_daily_living: sleep, meals, toileting, self-care, medical
- motor_sensory: gross and fine motor skills, sensory responses
- language_communication: expressive and receptive language, alternative communication

For each fact record the setting it was observed in (home, school, therapy, or general), a background hypothesis for what may underlie the behavior, whether it indicates a strength with potential to build on, and a support priority.
"#;

fn structuring_schema(output_key: &str) -> String {
    format!(
        r#"Respond with pure JSON only, no surrounding prose, in exactly this shape:

{{
  "{output_key}": {{
    "social_communication": [FACT],
    "cognitive_behavior": [FACT],
    "health_daily_living": [FACT],
    "motor_sensory": [FACT],
    "language_communication": [FACT]
  }}
}}

where FACT is:

{{
  "fact": "<verbatim fact text>",
  "setting": "home|school|therapy|general",
  "background": "<hypothesis about what underlies this behavior>",
  "strength_potential": true,
  "priority": "high|normal"
}}

Empty domains stay as empty arrays."#
    )
}

const ASSESSMENT_INSTRUCTIONS: &str = r#"You are an assistant helping child-development support staff draft an individual support plan from structured assessment facts.

Using the domain-organized facts below, draft a complete support plan. Ground every goal and support item in the facts; prefer building on noted strengths. Timelines are counted from the plan start date and phrased in months.
"#;

const ASSESSMENT_SCHEMA: &str = r#"Respond with pure JSON only, no surrounding prose, in exactly this shape:

{
  "assessment_v1": {
    "support_policy": {
      "child_understanding": "...",
      "key_approaches": ["..."],
      "collaboration_notes": "..."
    },
    "family_child_intentions": {
      "child": "...",
      "parents": "..."
    },
    "long_term_goal": {
      "goal": "...",
      "timeline": "...",
      "rationale": "..."
    },
    "short_term_goals": [
      {"goal": "...", "timeline": "..."}
    ],
    "support_items": [
      {
        "category": "...",
        "target": "...",
        "methods": ["..."],
        "staff": "...",
        "timeline": "...",
        "notes": "...",
        "priority": "high|normal"
      }
    ],
    "family_support": {
      "goal": "...",
      "methods": ["..."],
      "timeline": "...",
      "notes": "..."
    },
    "transition_support": {
      "goal": "...",
      "methods": ["..."],
      "partner_organization": "...",
      "timeline": "...",
      "notes": "..."
    }
  }
}"#;

/// Stage 1: transcript -> extraction_v1
pub fn build_extraction_prompt(
    session: &Session,
    _config: &PipelineConfig,
) -> Result<String, PipelineError> {
    let transcript = session
        .transcript
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            PipelineError::UpstreamArtifactMissing(format!(
                "session {} has no transcript",
                session.id
            ))
        })?;

    let mut prompt = String::with_capacity(
        EXTRACTION_INSTRUCTIONS.len() + EXTRACTION_SCHEMA.len() + transcript.len() + 64,
    );
    prompt.push_str(EXTRACTION_INSTRUCTIONS);
    prompt.push('\n');
    prompt.push_str(EXTRACTION_SCHEMA);
    prompt.push_str("\n\n## Interview transcript\n\n");
    prompt.push_str(transcript);
    Ok(prompt)
}

/// Stage 2: extraction_v1 -> configured structuring key
pub fn build_structuring_prompt(
    session: &Session,
    config: &PipelineConfig,
) -> Result<String, PipelineError> {
    let extraction = require_artifact(
        session,
        session.json_field(SessionField::ExtractionResult),
        "extraction_v1",
        "fact extraction",
    )?;

    let schema = structuring_schema(&config.stage2_output_key);
    let input = pretty(&extraction);

    let mut prompt = String::with_capacity(
        STRUCTURING_INSTRUCTIONS.len() + schema.len() + input.len() + 64,
    );
    prompt.push_str(STRUCTURING_INSTRUCTIONS);
    prompt.push('\n');
    prompt.push_str(&schema);
    prompt.push_str("\n\n## Extracted facts\n\n");
    prompt.push_str(&input);
    Ok(prompt)
}

/// Stage 3: configured structuring key -> assessment_v1
pub fn build_assessment_prompt(
    session: &Session,
    config: &PipelineConfig,
) -> Result<String, PipelineError> {
    let structured = require_artifact(
        session,
        session.json_field(SessionField::StructuringResult),
        &config.stage2_output_key,
        "fact structuring",
    )?;

    let input = pretty(&structured);

    let mut prompt = String::with_capacity(
        ASSESSMENT_INSTRUCTIONS.len() + ASSESSMENT_SCHEMA.len() + input.len() + 64,
    );
    prompt.push_str(ASSESSMENT_INSTRUCTIONS);
    prompt.push('\n');
    prompt.push_str(ASSESSMENT_SCHEMA);
    prompt.push_str("\n\n## Structured assessment facts\n\n");
    prompt.push_str(&input);
    Ok(prompt)
}

fn require_artifact(
    session: &Session,
    stored: Option<&Value>,
    key: &str,
    stage_name: &str,
) -> Result<Value, PipelineError> {
    stored
        .and_then(|raw| artifact::extract_value(raw, key))
        .ok_or_else(|| {
            PipelineError::UpstreamArtifactMissing(format!(
                "session {} has no usable {} result ({})",
                session.id, stage_name, key
            ))
        })
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use serde_json::json;

    fn session_with_transcript() -> Session {
        let mut session = Session::new(
            "sess_1".into(),
            "facility_1".into(),
            "child_1".into(),
            "recordings/facility_1/child_1/2025-06-01/sess_1.webm".into(),
        );
        session.transcript = Some("The child lines up blocks for an hour.".to_string());
        session
    }

    #[test]
    fn extraction_prompt_embeds_transcript() {
        let session = session_with_transcript();
        let prompt = build_extraction_prompt(&session, &test_config()).unwrap();
        assert!(prompt.contains("lines up blocks"));
        assert!(prompt.contains("\"extraction_v1\""));
    }

    #[test]
    fn extraction_prompt_requires_transcript() {
        let mut session = session_with_transcript();
        session.transcript = Some("   ".to_string());
        let err = build_extraction_prompt(&session, &test_config()).unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamArtifactMissing(_)));
    }

    #[test]
    fn structuring_prompt_uses_configured_output_key() {
        let mut session = session_with_transcript();
        session.extraction_result = json!({
            "extraction_v1": {"strengths": [{"summary": "builds intricate towers"}]}
        })
        .into();

        let mut config = test_config();
        config.stage2_output_key = "fact_clusters_v1".to_string();
        let prompt = build_structuring_prompt(&session, &config).unwrap();
        assert!(prompt.contains("\"fact_clusters_v1\""));
        assert!(prompt.contains("builds intricate towers"));
    }

    #[test]
    fn structuring_prompt_unwraps_summary_shape() {
        let mut session = session_with_transcript();
        let inner = json!({"extraction_v1": {"strengths": []}});
        session.extraction_result = json!({
            "summary": format!("```json\n{}\n```", serde_json::to_string(&inner).unwrap())
        })
        .into();

        assert!(build_structuring_prompt(&session, &test_config()).is_ok());
    }

    #[test]
    fn assessment_prompt_requires_structuring_result() {
        let session = session_with_transcript();
        let err = build_assessment_prompt(&session, &test_config()).unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamArtifactMissing(_)));
    }

    #[test]
    fn assessment_prompt_embeds_structured_facts() {
        let mut session = session_with_transcript();
        session.structuring_result = json!({
            "annotated_facts_v1": {
                "social_communication": [{"fact": "greets the teacher unprompted"}]
            }
        })
        .into();

        let prompt = build_assessment_prompt(&session, &test_config()).unwrap();
        assert!(prompt.contains("greets the teacher unprompted"));
        assert!(prompt.contains("\"assessment_v1\""));
    }
}
