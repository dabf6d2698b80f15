// Database migrations
// Creates and updates the schema for interview sessions and support plans.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Current schema version
const SCHEMA_VERSION: i32 = 2;

/// Run all necessary migrations to bring the database up to date
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    if current_version < 2 {
        migrate_v2(conn)?;
    }

    debug_assert!(get_schema_version(conn)? == SCHEMA_VERSION);

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Initial schema creation (version 1)
fn migrate_v1(conn: &Connection) -> Result<()> {
    log::info!("Running database migration v1");

    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Interview sessions: one row per recording, plus every derived
        -- pipeline artifact. JSON columns are stored as serialized text.
        CREATE TABLE IF NOT EXISTS interview_sessions (
            id TEXT PRIMARY KEY NOT NULL,
            facility_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            audio_path TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'uploaded',
            duration_seconds INTEGER NOT NULL DEFAULT 0,
            recorded_at TEXT NOT NULL,
            transcript TEXT,
            transcript_metadata TEXT,
            extraction_prompt TEXT,
            extraction_result TEXT,
            structuring_prompt TEXT,
            structuring_result TEXT,
            assessment_prompt TEXT,
            assessment_result TEXT,
            support_plan_id TEXT,
            error_message TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_subject
            ON interview_sessions(subject_id, recorded_at);

        -- Support plans: two-tier columns. _ai_generated is written only by
        -- plan sync; _user_edited only by the edit surface.
        CREATE TABLE IF NOT EXISTS support_plans (
            id TEXT PRIMARY KEY NOT NULL,
            session_id TEXT,
            subject_id TEXT NOT NULL,
            child_intention_ai_generated TEXT,
            child_intention_user_edited TEXT,
            family_intention_ai_generated TEXT,
            family_intention_user_edited TEXT,
            general_policy_ai_generated TEXT,
            general_policy_user_edited TEXT,
            key_approaches_ai_generated TEXT,
            key_approaches_user_edited TEXT,
            long_term_goal_ai_generated TEXT,
            long_term_goal_user_edited TEXT,
            long_term_goal_timeline_ai_generated TEXT,
            long_term_goal_timeline_user_edited TEXT,
            long_term_goal_rationale_ai_generated TEXT,
            long_term_goal_rationale_user_edited TEXT,
            short_term_goals_ai_generated TEXT,
            short_term_goals_user_edited TEXT,
            support_items_ai_generated TEXT,
            support_items_user_edited TEXT,
            family_support_ai_generated TEXT,
            family_support_user_edited TEXT,
            transition_support_ai_generated TEXT,
            transition_support_user_edited TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_plans_subject ON support_plans(subject_id);

        INSERT INTO schema_version (version) VALUES (1);
    "#,
    )
    .context("Failed to run migration v1")?;

    Ok(())
}

/// Version 2: record which model produced each stage result
fn migrate_v2(conn: &Connection) -> Result<()> {
    log::info!("Running database migration v2");

    conn.execute_batch(
        r#"
        ALTER TABLE interview_sessions ADD COLUMN extraction_model TEXT;
        ALTER TABLE interview_sessions ADD COLUMN structuring_model TEXT;
        ALTER TABLE interview_sessions ADD COLUMN assessment_model TEXT;

        INSERT INTO schema_version (version) VALUES (2);
    "#,
    )
    .context("Failed to run migration v2")?;

    Ok(())
}
