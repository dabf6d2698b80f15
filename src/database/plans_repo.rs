// Support plans repository
// Writes are tier-scoped: sync writes only _ai_generated columns and the
// edit surface writes only _user_edited columns.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde_json::Value;

use super::models::{PlanAiFields, PlanField, SupportPlan};
use super::DatabaseManager;

impl DatabaseManager {
    /// Create an empty plan record
    pub fn create_plan(&self, plan: &SupportPlan) -> Result<String> {
        self.with_connection(|conn| create_plan_impl(conn, plan))
    }

    /// Get a plan by id
    pub fn get_plan(&self, id: &str) -> Result<Option<SupportPlan>> {
        self.with_connection(|conn| get_plan_impl(conn, id))
    }

    /// Overwrite the AI tier with the values one sync run produced.
    /// Fields the run left `None` keep their previous AI value, and
    /// user-edited columns are never touched. Returns whether any column
    /// was written.
    pub fn apply_ai_fields(&self, id: &str, fields: &PlanAiFields) -> Result<bool> {
        self.with_connection(|conn| apply_ai_fields_impl(conn, id, fields))
    }

    /// Record a user's edit to one field
    pub fn set_user_edited(&self, id: &str, field: PlanField, value: &Value) -> Result<()> {
        self.with_connection(|conn| {
            let stored: String = if field.is_json() {
                serde_json::to_string(value).context("Failed to serialize plan field")?
            } else {
                match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }
            };
            let sql = format!(
                "UPDATE support_plans SET {} = ?1, updated_at = ?2 WHERE id = ?3",
                field.user_column()
            );
            conn.execute(&sql, params![stored, now(), id])
                .with_context(|| format!("Failed to update {}", field.user_column()))?;
            Ok(())
        })
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn create_plan_impl(conn: &Connection, plan: &SupportPlan) -> Result<String> {
    conn.execute(
        r#"
        INSERT INTO support_plans (id, session_id, subject_id, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            plan.id,
            plan.session_id,
            plan.subject_id,
            plan.created_at,
            plan.updated_at,
        ],
    )
    .context("Failed to create support plan")?;

    Ok(plan.id.clone())
}

fn get_plan_impl(conn: &Connection, id: &str) -> Result<Option<SupportPlan>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT id, session_id, subject_id,
                   child_intention_ai_generated, child_intention_user_edited,
                   family_intention_ai_generated, family_intention_user_edited,
                   general_policy_ai_generated, general_policy_user_edited,
                   key_approaches_ai_generated, key_approaches_user_edited,
                   long_term_goal_ai_generated, long_term_goal_user_edited,
                   long_term_goal_timeline_ai_generated, long_term_goal_timeline_user_edited,
                   long_term_goal_rationale_ai_generated, long_term_goal_rationale_user_edited,
                   short_term_goals_ai_generated, short_term_goals_user_edited,
                   support_items_ai_generated, support_items_user_edited,
                   family_support_ai_generated, family_support_user_edited,
                   transition_support_ai_generated, transition_support_user_edited,
                   created_at, updated_at
            FROM support_plans WHERE id = ?
            "#,
        )
        .context("Failed to prepare get_plan query")?;

    let result = stmt.query_row(params![id], |row| {
        Ok(SupportPlan {
            id: row.get(0)?,
            session_id: row.get(1)?,
            subject_id: row.get(2)?,
            child_intention_ai_generated: row.get(3)?,
            child_intention_user_edited: row.get(4)?,
            family_intention_ai_generated: row.get(5)?,
            family_intention_user_edited: row.get(6)?,
            general_policy_ai_generated: row.get(7)?,
            general_policy_user_edited: row.get(8)?,
            key_approaches_ai_generated: json_column(row.get(9)?),
            key_approaches_user_edited: json_column(row.get(10)?),
            long_term_goal_ai_generated: row.get(11)?,
            long_term_goal_user_edited: row.get(12)?,
            long_term_goal_timeline_ai_generated: row.get(13)?,
            long_term_goal_timeline_user_edited: row.get(14)?,
            long_term_goal_rationale_ai_generated: row.get(15)?,
            long_term_goal_rationale_user_edited: row.get(16)?,
            short_term_goals_ai_generated: json_column(row.get(17)?),
            short_term_goals_user_edited: json_column(row.get(18)?),
            support_items_ai_generated: json_column(row.get(19)?),
            support_items_user_edited: json_column(row.get(20)?),
            family_support_ai_generated: json_column(row.get(21)?),
            family_support_user_edited: json_column(row.get(22)?),
            transition_support_ai_generated: json_column(row.get(23)?),
            transition_support_user_edited: json_column(row.get(24)?),
            created_at: row.get(25)?,
            updated_at: row.get(26)?,
        })
    });

    match result {
        Ok(plan) => Ok(Some(plan)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context("Failed to get support plan"),
    }
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

fn apply_ai_fields_impl(conn: &Connection, id: &str, fields: &PlanAiFields) -> Result<bool> {
    let mut set_clauses = Vec::new();
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    let push_text = |clauses: &mut Vec<&'static str>,
                         params_vec: &mut Vec<Box<dyn rusqlite::ToSql>>,
                         field: PlanField,
                         value: &Option<String>| {
        if let Some(text) = value {
            clauses.push(ai_set_clause(field));
            params_vec.push(Box::new(text.clone()));
        }
    };
    let push_json = |clauses: &mut Vec<&'static str>,
                     params_vec: &mut Vec<Box<dyn rusqlite::ToSql>>,
                     field: PlanField,
                     value: &Option<Value>|
     -> Result<()> {
        if let Some(json) = value {
            clauses.push(ai_set_clause(field));
            params_vec.push(Box::new(
                serde_json::to_string(json).context("Failed to serialize plan field")?,
            ));
        }
        Ok(())
    };

    push_text(&mut set_clauses, &mut params_vec, PlanField::ChildIntention, &fields.child_intention);
    push_text(&mut set_clauses, &mut params_vec, PlanField::FamilyIntention, &fields.family_intention);
    push_text(&mut set_clauses, &mut params_vec, PlanField::GeneralPolicy, &fields.general_policy);
    push_json(&mut set_clauses, &mut params_vec, PlanField::KeyApproaches, &fields.key_approaches)?;
    push_text(&mut set_clauses, &mut params_vec, PlanField::LongTermGoal, &fields.long_term_goal);
    push_text(
        &mut set_clauses,
        &mut params_vec,
        PlanField::LongTermGoalTimeline,
        &fields.long_term_goal_timeline,
    );
    push_text(
        &mut set_clauses,
        &mut params_vec,
        PlanField::LongTermGoalRationale,
        &fields.long_term_goal_rationale,
    );
    push_json(&mut set_clauses, &mut params_vec, PlanField::ShortTermGoals, &fields.short_term_goals)?;
    push_json(&mut set_clauses, &mut params_vec, PlanField::SupportItems, &fields.support_items)?;
    push_json(&mut set_clauses, &mut params_vec, PlanField::FamilySupport, &fields.family_support)?;
    push_json(
        &mut set_clauses,
        &mut params_vec,
        PlanField::TransitionSupport,
        &fields.transition_support,
    )?;

    if set_clauses.is_empty() {
        return Ok(false);
    }

    set_clauses.push("updated_at = ?");
    params_vec.push(Box::new(now()));
    params_vec.push(Box::new(id.to_string()));

    let query = format!(
        "UPDATE support_plans SET {} WHERE id = ?",
        set_clauses.join(", ")
    );

    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();

    let updated = conn
        .execute(&query, params_refs.as_slice())
        .context("Failed to apply AI plan fields")?;

    Ok(updated > 0)
}

fn ai_set_clause(field: PlanField) -> &'static str {
    match field {
        PlanField::ChildIntention => "child_intention_ai_generated = ?",
        PlanField::FamilyIntention => "family_intention_ai_generated = ?",
        PlanField::GeneralPolicy => "general_policy_ai_generated = ?",
        PlanField::KeyApproaches => "key_approaches_ai_generated = ?",
        PlanField::LongTermGoal => "long_term_goal_ai_generated = ?",
        PlanField::LongTermGoalTimeline => "long_term_goal_timeline_ai_generated = ?",
        PlanField::LongTermGoalRationale => "long_term_goal_rationale_ai_generated = ?",
        PlanField::ShortTermGoals => "short_term_goals_ai_generated = ?",
        PlanField::SupportItems => "support_items_ai_generated = ?",
        PlanField::FamilySupport => "family_support_ai_generated = ?",
        PlanField::TransitionSupport => "transition_support_ai_generated = ?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn create_test_db() -> (tempfile::TempDir, DatabaseManager) {
        let dir = tempdir().unwrap();
        let db = DatabaseManager::new(dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn test_create_and_get_plan() {
        let (_dir, db) = create_test_db();

        let plan = SupportPlan::new("plan_1".into(), "child_1".into(), Some("sess_1".into()));
        db.create_plan(&plan).unwrap();

        let loaded = db.get_plan("plan_1").unwrap().unwrap();
        assert_eq!(loaded.subject_id, "child_1");
        assert_eq!(loaded.session_id.as_deref(), Some("sess_1"));
        assert!(loaded.support_items_ai_generated.is_none());

        assert!(db.get_plan("missing").unwrap().is_none());
    }

    #[test]
    fn test_apply_ai_fields_leaves_user_tier() {
        let (_dir, db) = create_test_db();
        let plan = SupportPlan::new("plan_2".into(), "child_1".into(), None);
        db.create_plan(&plan).unwrap();

        db.set_user_edited("plan_2", PlanField::LongTermGoal, &json!("my edit"))
            .unwrap();

        let fields = PlanAiFields {
            long_term_goal: Some("ai goal".to_string()),
            support_items: Some(json!([{"category": "communication"}])),
            ..Default::default()
        };
        assert!(db.apply_ai_fields("plan_2", &fields).unwrap());

        let loaded = db.get_plan("plan_2").unwrap().unwrap();
        assert_eq!(loaded.long_term_goal_ai_generated.as_deref(), Some("ai goal"));
        assert_eq!(loaded.long_term_goal_user_edited.as_deref(), Some("my edit"));
        assert_eq!(
            loaded.support_items_ai_generated.as_ref().unwrap(),
            &json!([{"category": "communication"}])
        );

        // resolution prefers the edit
        assert_eq!(
            loaded.resolve(PlanField::LongTermGoal, Value::Null),
            json!("my edit")
        );
    }

    #[test]
    fn test_apply_empty_fields_is_noop() {
        let (_dir, db) = create_test_db();
        let plan = SupportPlan::new("plan_3".into(), "child_1".into(), None);
        db.create_plan(&plan).unwrap();

        let before = db.get_plan("plan_3").unwrap().unwrap();
        assert!(!db.apply_ai_fields("plan_3", &PlanAiFields::default()).unwrap());
        let after = db.get_plan("plan_3").unwrap().unwrap();
        assert_eq!(before.updated_at, after.updated_at);
    }

    #[test]
    fn test_user_edit_stores_json_fields_as_json() {
        let (_dir, db) = create_test_db();
        let plan = SupportPlan::new("plan_4".into(), "child_1".into(), None);
        db.create_plan(&plan).unwrap();

        let goals = json!([{"goal": "greet peers", "timeline": "3 months"}]);
        db.set_user_edited("plan_4", PlanField::ShortTermGoals, &goals)
            .unwrap();

        let loaded = db.get_plan("plan_4").unwrap().unwrap();
        assert_eq!(loaded.short_term_goals_user_edited.unwrap(), goals);
    }
}
