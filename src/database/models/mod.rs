// Database models

pub mod plan;
pub mod session;

pub use plan::{PlanAiFields, PlanField, SupportPlan};
pub use session::{Session, SessionField, SessionStatus, SessionUpdate};
