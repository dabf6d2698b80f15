// Database models - interview session

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle status of a session
///
/// uploaded -> transcribing -> transcribed -> analyzing -> completed,
/// with `failed` reachable from any in-flight stage and re-enterable by
/// re-invoking a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Uploaded,
    Transcribing,
    Transcribed,
    Analyzing,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Uploaded => "uploaded",
            SessionStatus::Transcribing => "transcribing",
            SessionStatus::Transcribed => "transcribed",
            SessionStatus::Analyzing => "analyzing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(SessionStatus::Uploaded),
            "transcribing" => Some(SessionStatus::Transcribing),
            "transcribed" => Some(SessionStatus::Transcribed),
            "analyzing" => Some(SessionStatus::Analyzing),
            "completed" => Some(SessionStatus::Completed),
            "failed" => Some(SessionStatus::Failed),
            _ => None,
        }
    }

    /// Terminal for the current stage; a re-invocation may still leave it
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage-addressable session columns
///
/// The executor reads and writes columns by this enum rather than by raw
/// strings, so only whitelisted columns ever reach SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionField {
    Transcript,
    TranscriptMetadata,
    ExtractionPrompt,
    ExtractionResult,
    ExtractionModel,
    StructuringPrompt,
    StructuringResult,
    StructuringModel,
    AssessmentPrompt,
    AssessmentResult,
    AssessmentModel,
}

impl SessionField {
    pub fn column(&self) -> &'static str {
        match self {
            SessionField::Transcript => "transcript",
            SessionField::TranscriptMetadata => "transcript_metadata",
            SessionField::ExtractionPrompt => "extraction_prompt",
            SessionField::ExtractionResult => "extraction_result",
            SessionField::ExtractionModel => "extraction_model",
            SessionField::StructuringPrompt => "structuring_prompt",
            SessionField::StructuringResult => "structuring_result",
            SessionField::StructuringModel => "structuring_model",
            SessionField::AssessmentPrompt => "assessment_prompt",
            SessionField::AssessmentResult => "assessment_result",
            SessionField::AssessmentModel => "assessment_model",
        }
    }
}

/// One interview recording and its derived artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub facility_id: String,
    pub subject_id: String,
    /// Object-store key of the raw audio
    pub audio_path: String,
    pub status: SessionStatus,
    pub duration_seconds: i64,
    pub recorded_at: String,
    pub transcript: Option<String>,
    pub transcript_metadata: Option<Value>,
    pub extraction_prompt: Option<String>,
    pub extraction_result: Option<Value>,
    pub extraction_model: Option<String>,
    pub structuring_prompt: Option<String>,
    pub structuring_result: Option<Value>,
    pub structuring_model: Option<String>,
    pub assessment_prompt: Option<String>,
    pub assessment_result: Option<Value>,
    pub assessment_model: Option<String>,
    /// Plan record fed by the sync step; absent until a plan is opened
    pub support_plan_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Session {
    pub fn new(id: String, facility_id: String, subject_id: String, audio_path: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id,
            facility_id,
            subject_id,
            audio_path,
            status: SessionStatus::Uploaded,
            duration_seconds: 0,
            recorded_at: now.clone(),
            transcript: None,
            transcript_metadata: None,
            extraction_prompt: None,
            extraction_result: None,
            extraction_model: None,
            structuring_prompt: None,
            structuring_result: None,
            structuring_model: None,
            assessment_prompt: None,
            assessment_result: None,
            assessment_model: None,
            support_plan_id: None,
            error_message: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Fresh session with a generated id and the canonical audio key for it
    pub fn create(facility_id: String, subject_id: String) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let date = chrono::Utc::now().format("%Y-%m-%d");
        let audio_path = format!(
            "recordings/{}/{}/{}/{}.webm",
            facility_id, subject_id, date, id
        );
        Self::new(id, facility_id, subject_id, audio_path)
    }

    /// Text-valued column access by field
    pub fn text_field(&self, field: SessionField) -> Option<&str> {
        match field {
            SessionField::Transcript => self.transcript.as_deref(),
            SessionField::ExtractionPrompt => self.extraction_prompt.as_deref(),
            SessionField::StructuringPrompt => self.structuring_prompt.as_deref(),
            SessionField::AssessmentPrompt => self.assessment_prompt.as_deref(),
            SessionField::ExtractionModel => self.extraction_model.as_deref(),
            SessionField::StructuringModel => self.structuring_model.as_deref(),
            SessionField::AssessmentModel => self.assessment_model.as_deref(),
            _ => None,
        }
    }

    /// JSON-valued column access by field
    pub fn json_field(&self, field: SessionField) -> Option<&Value> {
        match field {
            SessionField::TranscriptMetadata => self.transcript_metadata.as_ref(),
            SessionField::ExtractionResult => self.extraction_result.as_ref(),
            SessionField::StructuringResult => self.structuring_result.as_ref(),
            SessionField::AssessmentResult => self.assessment_result.as_ref(),
            _ => None,
        }
    }
}

/// Updates that can be applied to a session
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub status: Option<SessionStatus>,
    pub duration_seconds: Option<i64>,
    pub transcript: Option<String>,
    pub transcript_metadata: Option<Value>,
    pub support_plan_id: Option<String>,
    /// `Some(None)` clears the column
    pub error_message: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for status in [
            SessionStatus::Uploaded,
            SessionStatus::Transcribing,
            SessionStatus::Transcribed,
            SessionStatus::Analyzing,
            SessionStatus::Completed,
            SessionStatus::Failed,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("bogus"), None);
    }

    #[test]
    fn create_builds_canonical_audio_key() {
        let session = Session::create("facility_1".into(), "child_1".into());
        assert!(session.audio_path.starts_with("recordings/facility_1/child_1/"));
        assert!(session.audio_path.ends_with(&format!("{}.webm", session.id)));
        assert_eq!(session.status, SessionStatus::Uploaded);
    }

    #[test]
    fn terminal_states() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
        assert!(!SessionStatus::Analyzing.is_terminal());
    }
}
