// Database models - support plan
//
// Every semantically meaningful plan field is stored twice: an
// `_ai_generated` column written only by the sync step, and a
// `_user_edited` column written only by the external edit surface. The
// effective value is resolved user-edited first.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The two-tier plan fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanField {
    ChildIntention,
    FamilyIntention,
    GeneralPolicy,
    KeyApproaches,
    LongTermGoal,
    LongTermGoalTimeline,
    LongTermGoalRationale,
    ShortTermGoals,
    SupportItems,
    FamilySupport,
    TransitionSupport,
}

impl PlanField {
    pub const ALL: [PlanField; 11] = [
        PlanField::ChildIntention,
        PlanField::FamilyIntention,
        PlanField::GeneralPolicy,
        PlanField::KeyApproaches,
        PlanField::LongTermGoal,
        PlanField::LongTermGoalTimeline,
        PlanField::LongTermGoalRationale,
        PlanField::ShortTermGoals,
        PlanField::SupportItems,
        PlanField::FamilySupport,
        PlanField::TransitionSupport,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            PlanField::ChildIntention => "child_intention",
            PlanField::FamilyIntention => "family_intention",
            PlanField::GeneralPolicy => "general_policy",
            PlanField::KeyApproaches => "key_approaches",
            PlanField::LongTermGoal => "long_term_goal",
            PlanField::LongTermGoalTimeline => "long_term_goal_timeline",
            PlanField::LongTermGoalRationale => "long_term_goal_rationale",
            PlanField::ShortTermGoals => "short_term_goals",
            PlanField::SupportItems => "support_items",
            PlanField::FamilySupport => "family_support",
            PlanField::TransitionSupport => "transition_support",
        }
    }

    pub fn ai_column(&self) -> &'static str {
        match self {
            PlanField::ChildIntention => "child_intention_ai_generated",
            PlanField::FamilyIntention => "family_intention_ai_generated",
            PlanField::GeneralPolicy => "general_policy_ai_generated",
            PlanField::KeyApproaches => "key_approaches_ai_generated",
            PlanField::LongTermGoal => "long_term_goal_ai_generated",
            PlanField::LongTermGoalTimeline => "long_term_goal_timeline_ai_generated",
            PlanField::LongTermGoalRationale => "long_term_goal_rationale_ai_generated",
            PlanField::ShortTermGoals => "short_term_goals_ai_generated",
            PlanField::SupportItems => "support_items_ai_generated",
            PlanField::FamilySupport => "family_support_ai_generated",
            PlanField::TransitionSupport => "transition_support_ai_generated",
        }
    }

    pub fn user_column(&self) -> &'static str {
        match self {
            PlanField::ChildIntention => "child_intention_user_edited",
            PlanField::FamilyIntention => "family_intention_user_edited",
            PlanField::GeneralPolicy => "general_policy_user_edited",
            PlanField::KeyApproaches => "key_approaches_user_edited",
            PlanField::LongTermGoal => "long_term_goal_user_edited",
            PlanField::LongTermGoalTimeline => "long_term_goal_timeline_user_edited",
            PlanField::LongTermGoalRationale => "long_term_goal_rationale_user_edited",
            PlanField::ShortTermGoals => "short_term_goals_user_edited",
            PlanField::SupportItems => "support_items_user_edited",
            PlanField::FamilySupport => "family_support_user_edited",
            PlanField::TransitionSupport => "transition_support_user_edited",
        }
    }

    /// JSON-valued fields are stored as serialized JSON text; the rest are
    /// plain text columns.
    pub fn is_json(&self) -> bool {
        matches!(
            self,
            PlanField::KeyApproaches
                | PlanField::ShortTermGoals
                | PlanField::SupportItems
                | PlanField::FamilySupport
                | PlanField::TransitionSupport
        )
    }
}

/// One plan record per interview/subject pairing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupportPlan {
    pub id: String,
    pub session_id: Option<String>,
    pub subject_id: String,

    pub child_intention_ai_generated: Option<String>,
    pub child_intention_user_edited: Option<String>,
    pub family_intention_ai_generated: Option<String>,
    pub family_intention_user_edited: Option<String>,
    pub general_policy_ai_generated: Option<String>,
    pub general_policy_user_edited: Option<String>,
    pub key_approaches_ai_generated: Option<Value>,
    pub key_approaches_user_edited: Option<Value>,
    pub long_term_goal_ai_generated: Option<String>,
    pub long_term_goal_user_edited: Option<String>,
    pub long_term_goal_timeline_ai_generated: Option<String>,
    pub long_term_goal_timeline_user_edited: Option<String>,
    pub long_term_goal_rationale_ai_generated: Option<String>,
    pub long_term_goal_rationale_user_edited: Option<String>,
    pub short_term_goals_ai_generated: Option<Value>,
    pub short_term_goals_user_edited: Option<Value>,
    pub support_items_ai_generated: Option<Value>,
    pub support_items_user_edited: Option<Value>,
    pub family_support_ai_generated: Option<Value>,
    pub family_support_user_edited: Option<Value>,
    pub transition_support_ai_generated: Option<Value>,
    pub transition_support_user_edited: Option<Value>,

    pub created_at: String,
    pub updated_at: String,
}

impl SupportPlan {
    pub fn new(id: String, subject_id: String, session_id: Option<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id,
            session_id,
            subject_id,
            created_at: now.clone(),
            updated_at: now,
            ..Default::default()
        }
    }

    /// Both tiers of a field as JSON values: (user_edited, ai_generated)
    pub fn tiers(&self, field: PlanField) -> (Option<Value>, Option<Value>) {
        fn text(v: &Option<String>) -> Option<Value> {
            v.as_ref().map(|s| Value::String(s.clone()))
        }
        match field {
            PlanField::ChildIntention => (
                text(&self.child_intention_user_edited),
                text(&self.child_intention_ai_generated),
            ),
            PlanField::FamilyIntention => (
                text(&self.family_intention_user_edited),
                text(&self.family_intention_ai_generated),
            ),
            PlanField::GeneralPolicy => (
                text(&self.general_policy_user_edited),
                text(&self.general_policy_ai_generated),
            ),
            PlanField::KeyApproaches => (
                self.key_approaches_user_edited.clone(),
                self.key_approaches_ai_generated.clone(),
            ),
            PlanField::LongTermGoal => (
                text(&self.long_term_goal_user_edited),
                text(&self.long_term_goal_ai_generated),
            ),
            PlanField::LongTermGoalTimeline => (
                text(&self.long_term_goal_timeline_user_edited),
                text(&self.long_term_goal_timeline_ai_generated),
            ),
            PlanField::LongTermGoalRationale => (
                text(&self.long_term_goal_rationale_user_edited),
                text(&self.long_term_goal_rationale_ai_generated),
            ),
            PlanField::ShortTermGoals => (
                self.short_term_goals_user_edited.clone(),
                self.short_term_goals_ai_generated.clone(),
            ),
            PlanField::SupportItems => (
                self.support_items_user_edited.clone(),
                self.support_items_ai_generated.clone(),
            ),
            PlanField::FamilySupport => (
                self.family_support_user_edited.clone(),
                self.family_support_ai_generated.clone(),
            ),
            PlanField::TransitionSupport => (
                self.transition_support_user_edited.clone(),
                self.transition_support_ai_generated.clone(),
            ),
        }
    }

    /// Effective value of a field: user-edited wins over AI-generated, and
    /// the caller's fallback covers fields neither tier has filled.
    pub fn resolve(&self, field: PlanField, fallback: Value) -> Value {
        let (user, ai) = self.tiers(field);
        user.or(ai).unwrap_or(fallback)
    }
}

/// AI-generated values produced by one sync run. Only non-empty values are
/// set; `apply_ai_fields` writes nothing for `None` entries.
#[derive(Debug, Clone, Default)]
pub struct PlanAiFields {
    pub child_intention: Option<String>,
    pub family_intention: Option<String>,
    pub general_policy: Option<String>,
    pub key_approaches: Option<Value>,
    pub long_term_goal: Option<String>,
    pub long_term_goal_timeline: Option<String>,
    pub long_term_goal_rationale: Option<String>,
    pub short_term_goals: Option<Value>,
    pub support_items: Option<Value>,
    pub family_support: Option<Value>,
    pub transition_support: Option<Value>,
}

impl PlanAiFields {
    pub fn is_empty(&self) -> bool {
        self.child_intention.is_none()
            && self.family_intention.is_none()
            && self.general_policy.is_none()
            && self.key_approaches.is_none()
            && self.long_term_goal.is_none()
            && self.long_term_goal_timeline.is_none()
            && self.long_term_goal_rationale.is_none()
            && self.short_term_goals.is_none()
            && self.support_items.is_none()
            && self.family_support.is_none()
            && self.transition_support.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolve_prefers_user_edit() {
        let mut plan = SupportPlan::new("plan_1".into(), "child_1".into(), None);
        plan.long_term_goal_ai_generated = Some("A".to_string());
        assert_eq!(
            plan.resolve(PlanField::LongTermGoal, Value::Null),
            json!("A")
        );

        plan.long_term_goal_user_edited = Some("B".to_string());
        assert_eq!(
            plan.resolve(PlanField::LongTermGoal, Value::Null),
            json!("B")
        );
    }

    #[test]
    fn column_names_follow_field_prefix() {
        for field in PlanField::ALL {
            assert_eq!(
                field.ai_column(),
                format!("{}_ai_generated", field.prefix())
            );
            assert_eq!(
                field.user_column(),
                format!("{}_user_edited", field.prefix())
            );
        }
    }

    #[test]
    fn resolve_falls_back_when_empty() {
        let plan = SupportPlan::new("plan_1".into(), "child_1".into(), None);
        assert_eq!(plan.resolve(PlanField::SupportItems, json!([])), json!([]));
    }
}
