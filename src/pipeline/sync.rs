// Plan synchronization
//
// Projects a finished assessment result onto the session's support plan.
// Writes the AI tier only; user edits are never touched, so re-running a
// stage can refresh suggestions without destroying manual work.

use serde_json::Value;

use crate::artifact;
use crate::database::models::PlanAiFields;
use crate::database::{DatabaseManager, Session};
use crate::error::PipelineError;

/// Copy the assessment payload into the linked plan's AI-generated columns.
///
/// Skips quietly when the session has no plan or the result carries no
/// usable `assessment_v1` payload; sync is best effort by contract.
pub fn sync_plan(
    db: &DatabaseManager,
    session: &Session,
    result: &Value,
) -> Result<(), PipelineError> {
    let plan_id = match session.support_plan_id.as_deref() {
        Some(id) => id,
        None => {
            log::info!("Session {} has no support plan, skipping sync", session.id);
            return Ok(());
        }
    };

    let assessment = match artifact::extract_value(result, "assessment_v1") {
        Some(a) => a,
        None => {
            log::warn!(
                "Session {} assessment result has no assessment_v1 payload, skipping sync",
                session.id
            );
            return Ok(());
        }
    };

    let fields = plan_fields_from_assessment(&assessment);
    if fields.is_empty() {
        log::warn!("Session {} assessment payload mapped to no plan fields", session.id);
        return Ok(());
    }

    let updated = db
        .apply_ai_fields(plan_id, &fields)
        .map_err(|e| PipelineError::PersistenceFailed(format!("plan sync: {:#}", e)))?;

    if updated {
        log::info!("Synced assessment for session {} into plan {}", session.id, plan_id);
    } else {
        log::warn!("Plan {} not found while syncing session {}", plan_id, session.id);
    }
    Ok(())
}

/// Map assessment substructures onto plan columns, skipping empty values
fn plan_fields_from_assessment(assessment: &Value) -> PlanAiFields {
    let policy = &assessment["support_policy"];
    let intentions = &assessment["family_child_intentions"];
    let long_term = &assessment["long_term_goal"];

    PlanAiFields {
        child_intention: non_empty_str(&intentions["child"]),
        family_intention: non_empty_str(&intentions["parents"]),
        general_policy: non_empty_str(&policy["child_understanding"]),
        key_approaches: non_empty_array(&policy["key_approaches"]),
        long_term_goal: non_empty_str(&long_term["goal"]),
        long_term_goal_timeline: non_empty_str(&long_term["timeline"]),
        long_term_goal_rationale: non_empty_str(&long_term["rationale"]),
        short_term_goals: non_empty_array(&assessment["short_term_goals"]),
        support_items: non_empty_array(&assessment["support_items"]),
        family_support: non_empty_object(&assessment["family_support"]),
        transition_support: non_empty_object(&assessment["transition_support"]),
    }
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn non_empty_array(value: &Value) -> Option<Value> {
    value
        .as_array()
        .filter(|a| !a.is_empty())
        .map(|_| value.clone())
}

fn non_empty_object(value: &Value) -> Option<Value> {
    value
        .as_object()
        .filter(|o| !o.is_empty())
        .map(|_| value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{PlanField, SupportPlan};
    use serde_json::json;
    use tempfile::tempdir;

    fn create_test_db() -> (tempfile::TempDir, DatabaseManager) {
        let dir = tempdir().unwrap();
        let db = DatabaseManager::new(dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn session_with_plan(db: &DatabaseManager) -> Session {
        let mut session = Session::new(
            "sess_1".into(),
            "facility_1".into(),
            "child_1".into(),
            "recordings/facility_1/child_1/2025-06-01/sess_1.webm".into(),
        );
        let plan = SupportPlan::new("plan_1".into(), "child_1".into(), Some("sess_1".into()));
        db.create_plan(&plan).unwrap();
        session.support_plan_id = Some("plan_1".into());
        db.create_session(&session).unwrap();
        db.link_support_plan("sess_1", "plan_1").unwrap();
        session
    }

    fn assessment_result() -> Value {
        json!({
            "assessment_v1": {
                "support_policy": {
                    "child_understanding": "thrives with predictable routines",
                    "key_approaches": ["visual schedules", "advance warnings"],
                    "collaboration_notes": "share schedule with school"
                },
                "family_child_intentions": {
                    "child": "wants to play with classmates",
                    "parents": "hope for calmer mornings"
                },
                "long_term_goal": {
                    "goal": "join group activities without distress",
                    "timeline": "12 months",
                    "rationale": "builds on observed interest in peers"
                },
                "short_term_goals": [
                    {"goal": "greet one classmate daily", "timeline": "3 months"}
                ],
                "support_items": [
                    {"category": "social", "target": "turn-taking", "methods": ["board games"],
                     "staff": "lead therapist", "timeline": "6 months", "notes": "", "priority": "high"}
                ],
                "family_support": {"goal": "consistent bedtime", "methods": ["routine chart"],
                                   "timeline": "3 months", "notes": ""},
                "transition_support": {}
            }
        })
    }

    #[test]
    fn sync_fills_ai_tier_only() {
        let (_dir, db) = create_test_db();
        let session = session_with_plan(&db);

        db.set_user_edited("plan_1", PlanField::LongTermGoal, &json!("my own goal"))
            .unwrap();

        sync_plan(&db, &session, &assessment_result()).unwrap();

        let plan = db.get_plan("plan_1").unwrap().unwrap();
        assert_eq!(
            plan.long_term_goal_ai_generated.as_deref(),
            Some("join group activities without distress")
        );
        assert_eq!(plan.long_term_goal_user_edited.as_deref(), Some("my own goal"));
        assert_eq!(
            plan.child_intention_ai_generated.as_deref(),
            Some("wants to play with classmates")
        );
        assert_eq!(
            plan.support_items_ai_generated.as_ref().unwrap()[0]["priority"],
            "high"
        );
        // Empty object maps to nothing
        assert!(plan.transition_support_ai_generated.is_none());
    }

    #[test]
    fn sync_is_idempotent() {
        let (_dir, db) = create_test_db();
        let session = session_with_plan(&db);

        sync_plan(&db, &session, &assessment_result()).unwrap();
        let first = db.get_plan("plan_1").unwrap().unwrap();

        sync_plan(&db, &session, &assessment_result()).unwrap();
        let second = db.get_plan("plan_1").unwrap().unwrap();

        assert_eq!(
            first.long_term_goal_ai_generated,
            second.long_term_goal_ai_generated
        );
        assert_eq!(first.support_items_ai_generated, second.support_items_ai_generated);
    }

    #[test]
    fn sync_skips_without_plan() {
        let (_dir, db) = create_test_db();
        let session = Session::new(
            "sess_2".into(),
            "facility_1".into(),
            "child_1".into(),
            "recordings/facility_1/child_1/2025-06-01/sess_2.webm".into(),
        );
        db.create_session(&session).unwrap();

        // No plan linked: a no-op, not an error
        sync_plan(&db, &session, &assessment_result()).unwrap();
    }

    #[test]
    fn sync_skips_unusable_result() {
        let (_dir, db) = create_test_db();
        let session = session_with_plan(&db);

        sync_plan(&db, &session, &json!({"summary": "no json here"})).unwrap();

        let plan = db.get_plan("plan_1").unwrap().unwrap();
        assert!(plan.long_term_goal_ai_generated.is_none());
    }
}
