// Sessions repository
// CRUD and stage-addressed column access for interview sessions.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde_json::Value;

use super::models::{Session, SessionField, SessionStatus, SessionUpdate};
use super::DatabaseManager;

const SESSION_COLUMNS: &str = "id, facility_id, subject_id, audio_path, status, duration_seconds, \
     recorded_at, transcript, transcript_metadata, \
     extraction_prompt, extraction_result, extraction_model, \
     structuring_prompt, structuring_result, structuring_model, \
     assessment_prompt, assessment_result, assessment_model, \
     support_plan_id, error_message, created_at, updated_at";

impl DatabaseManager {
    /// Create a new session record (status `uploaded`)
    pub fn create_session(&self, session: &Session) -> Result<String> {
        self.with_connection(|conn| create_session_impl(conn, session))
    }

    /// Get a session by id
    pub fn get_session(&self, id: &str) -> Result<Option<Session>> {
        self.with_connection(|conn| get_session_impl(conn, id))
    }

    /// Most recently recorded sessions for a subject
    pub fn get_recent_sessions(&self, subject_id: &str, limit: i64) -> Result<Vec<Session>> {
        self.with_connection(|conn| get_recent_sessions_impl(conn, subject_id, limit))
    }

    /// Apply a partial update
    pub fn update_session(&self, id: &str, updates: &SessionUpdate) -> Result<()> {
        self.with_connection(|conn| update_session_impl(conn, id, updates))
    }

    /// Move the session to a new status
    pub fn set_session_status(&self, id: &str, status: SessionStatus) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE interview_sessions SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), now(), id],
            )
            .context("Failed to update session status")?;
            Ok(())
        })
    }

    /// Clear any stale error message
    pub fn clear_session_error(&self, id: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE interview_sessions SET error_message = NULL WHERE id = ?1",
                params![id],
            )
            .context("Failed to clear session error")?;
            Ok(())
        })
    }

    /// Record a human-readable failure message, overwriting any prior one
    pub fn set_session_error(&self, id: &str, message: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE interview_sessions SET error_message = ?1, updated_at = ?2 WHERE id = ?3",
                params![message, now(), id],
            )
            .context("Failed to set session error")?;
            Ok(())
        })
    }

    /// Persist a stage prompt before the provider is called, so a later
    /// failure still leaves an auditable prompt.
    pub fn set_stage_prompt(&self, id: &str, field: SessionField, prompt: &str) -> Result<()> {
        self.with_connection(|conn| {
            let sql = format!(
                "UPDATE interview_sessions SET {} = ?1, updated_at = ?2 WHERE id = ?3",
                field.column()
            );
            conn.execute(&sql, params![prompt, now(), id])
                .with_context(|| format!("Failed to store {}", field.column()))?;
            Ok(())
        })
    }

    /// Persist a stage result and, when configured, the model that produced it
    pub fn store_stage_result(
        &self,
        id: &str,
        output: SessionField,
        model: Option<(SessionField, &str)>,
        result: &Value,
    ) -> Result<()> {
        self.with_connection(|conn| {
            let serialized =
                serde_json::to_string(result).context("Failed to serialize stage result")?;
            match model {
                Some((model_field, model_name)) => {
                    let sql = format!(
                        "UPDATE interview_sessions SET {} = ?1, {} = ?2, updated_at = ?3 WHERE id = ?4",
                        output.column(),
                        model_field.column()
                    );
                    conn.execute(&sql, params![serialized, model_name, now(), id])
                }
                None => {
                    let sql = format!(
                        "UPDATE interview_sessions SET {} = ?1, updated_at = ?2 WHERE id = ?3",
                        output.column()
                    );
                    conn.execute(&sql, params![serialized, now(), id])
                }
            }
            .with_context(|| format!("Failed to store {}", output.column()))?;
            Ok(())
        })
    }

    /// Persist a completed transcription and move to `transcribed`
    pub fn store_transcription(
        &self,
        id: &str,
        transcript: &str,
        metadata: &Value,
        duration_seconds: i64,
    ) -> Result<()> {
        self.with_connection(|conn| {
            let serialized = serde_json::to_string(metadata)
                .context("Failed to serialize transcript metadata")?;
            conn.execute(
                r#"
                UPDATE interview_sessions
                SET transcript = ?1,
                    transcript_metadata = ?2,
                    duration_seconds = ?3,
                    status = 'transcribed',
                    updated_at = ?4
                WHERE id = ?5
                "#,
                params![transcript, serialized, duration_seconds, now(), id],
            )
            .context("Failed to store transcription")?;
            Ok(())
        })
    }

    /// Attach a support plan record to the session
    pub fn link_support_plan(&self, id: &str, plan_id: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE interview_sessions SET support_plan_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![plan_id, now(), id],
            )
            .context("Failed to link support plan")?;
            Ok(())
        })
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn create_session_impl(conn: &Connection, session: &Session) -> Result<String> {
    conn.execute(
        r#"
        INSERT INTO interview_sessions (
            id, facility_id, subject_id, audio_path, status, duration_seconds,
            recorded_at, support_plan_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            session.id,
            session.facility_id,
            session.subject_id,
            session.audio_path,
            session.status.as_str(),
            session.duration_seconds,
            session.recorded_at,
            session.support_plan_id,
            session.created_at,
            session.updated_at,
        ],
    )
    .context("Failed to create session")?;

    Ok(session.id.clone())
}

fn get_session_impl(conn: &Connection, id: &str) -> Result<Option<Session>> {
    let sql = format!("SELECT {} FROM interview_sessions WHERE id = ?", SESSION_COLUMNS);
    let mut stmt = conn
        .prepare(&sql)
        .context("Failed to prepare get_session query")?;

    let result = stmt.query_row(params![id], row_to_session);

    match result {
        Ok(session) => Ok(Some(session)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context("Failed to get session"),
    }
}

fn get_recent_sessions_impl(conn: &Connection, subject_id: &str, limit: i64) -> Result<Vec<Session>> {
    let sql = format!(
        "SELECT {} FROM interview_sessions WHERE subject_id = ? ORDER BY recorded_at DESC LIMIT ?",
        SESSION_COLUMNS
    );
    let mut stmt = conn
        .prepare(&sql)
        .context("Failed to prepare get_recent_sessions query")?;

    let sessions = stmt
        .query_map(params![subject_id, limit], row_to_session)
        .context("Failed to query sessions")?;

    sessions
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect sessions")
}

fn update_session_impl(conn: &Connection, id: &str, updates: &SessionUpdate) -> Result<()> {
    let mut set_clauses = Vec::new();
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(status) = updates.status {
        set_clauses.push("status = ?");
        params_vec.push(Box::new(status.as_str().to_string()));
    }
    if let Some(duration) = updates.duration_seconds {
        set_clauses.push("duration_seconds = ?");
        params_vec.push(Box::new(duration));
    }
    if let Some(ref transcript) = updates.transcript {
        set_clauses.push("transcript = ?");
        params_vec.push(Box::new(transcript.clone()));
    }
    if let Some(ref metadata) = updates.transcript_metadata {
        set_clauses.push("transcript_metadata = ?");
        params_vec.push(Box::new(serde_json::to_string(metadata)?));
    }
    if let Some(ref plan_id) = updates.support_plan_id {
        set_clauses.push("support_plan_id = ?");
        params_vec.push(Box::new(plan_id.clone()));
    }
    if let Some(ref error_message) = updates.error_message {
        set_clauses.push("error_message = ?");
        params_vec.push(Box::new(error_message.clone()));
    }

    if set_clauses.is_empty() {
        return Ok(());
    }

    set_clauses.push("updated_at = ?");
    params_vec.push(Box::new(now()));
    params_vec.push(Box::new(id.to_string()));

    let query = format!(
        "UPDATE interview_sessions SET {} WHERE id = ?",
        set_clauses.join(", ")
    );

    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();

    conn.execute(&query, params_refs.as_slice())
        .context("Failed to update session")?;

    Ok(())
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let status_text: String = row.get(4)?;
    Ok(Session {
        id: row.get(0)?,
        facility_id: row.get(1)?,
        subject_id: row.get(2)?,
        audio_path: row.get(3)?,
        status: SessionStatus::parse(&status_text).unwrap_or(SessionStatus::Failed),
        duration_seconds: row.get(5)?,
        recorded_at: row.get(6)?,
        transcript: row.get(7)?,
        transcript_metadata: json_column(row.get(8)?),
        extraction_prompt: row.get(9)?,
        extraction_result: json_column(row.get(10)?),
        extraction_model: row.get(11)?,
        structuring_prompt: row.get(12)?,
        structuring_result: json_column(row.get(13)?),
        structuring_model: row.get(14)?,
        assessment_prompt: row.get(15)?,
        assessment_result: json_column(row.get(16)?),
        assessment_model: row.get(17)?,
        support_plan_id: row.get(18)?,
        error_message: row.get(19)?,
        created_at: row.get(20)?,
        updated_at: row.get(21)?,
    })
}

fn json_column(text: Option<String>) -> Option<Value> {
    let text = text?;
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Discarding unparseable JSON column: {}", e);
            None
        }
    }
}
