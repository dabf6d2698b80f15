// Database module
// SQLite-backed persistence for sessions and support plans.

pub mod manager;
pub mod migrations;
pub mod models;
pub mod plans_repo;
pub mod sessions_repo;

pub use manager::DatabaseManager;
pub use models::{
    PlanAiFields, PlanField, Session, SessionField, SessionStatus, SessionUpdate, SupportPlan,
};
