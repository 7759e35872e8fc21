mod memory;
mod models;
mod postgres;

pub use memory::MemoryStore;
pub use models::*;
pub use postgres::PgStore;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::{
    Application, ApplicationDetails, ApplicationStatus, Assignment, FormKind, FormRecord, Reviewer,
    Slot,
};
use crate::error::AppResult;

pub type DbPool = Arc<PgPool>;

pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// The document store behind every workflow operation.
///
/// Writes are per-record and last-writer-wins, except sequence allocation,
/// which implementations must serialize.
#[async_trait]
pub trait Store: Send + Sync {
    /// Reserve the next submission sequence number for `year`.
    async fn allocate_sequence(&self, year: i32, prefix: &str) -> AppResult<u32>;
    async fn insert_application(&self, application: &Application) -> AppResult<()>;
    async fn get_application(&self, id: &str) -> AppResult<Option<Application>>;
    async fn list_applications(&self, status: Option<ApplicationStatus>) -> AppResult<Vec<Application>>;
    /// Replace the free-text fields; fails with `Locked` unless still pending.
    async fn update_details(&self, id: &str, details: &ApplicationDetails) -> AppResult<Application>;
    async fn set_status(&self, id: &str, status: ApplicationStatus) -> AppResult<Application>;
    async fn set_main_folder(&self, id: &str, code: &str) -> AppResult<Application>;
    async fn set_assignment(&self, id: &str, slot: Slot, assignment: &Assignment) -> AppResult<Application>;
    /// Applications with `reviewer_name` in any slot, each returned once.
    async fn applications_assigned_to(&self, reviewer_name: &str) -> AppResult<Vec<Application>>;

    async fn insert_reviewer(&self, reviewer: &Reviewer) -> AppResult<()>;
    async fn reviewer_by_code(&self, code: &str) -> AppResult<Option<Reviewer>>;
    async fn reviewer_by_name(&self, name: &str) -> AppResult<Option<Reviewer>>;
    async fn list_reviewers(&self) -> AppResult<Vec<Reviewer>>;
    async fn set_reviewer_active(&self, id: &str, active: bool) -> AppResult<Reviewer>;
    /// Insert `reviewers` only if the directory is empty. Returns whether it did.
    async fn seed_reviewers(&self, reviewers: &[Reviewer]) -> AppResult<bool>;

    async fn insert_form(&self, record: &FormRecord) -> AppResult<()>;
    async fn forms_of_kind(&self, kind: FormKind, submission_id: &str) -> AppResult<Vec<FormRecord>>;

    async fn forms_for_submission(&self, submission_id: &str) -> AppResult<Vec<FormRecord>> {
        let mut records = Vec::new();
        for kind in FormKind::ALL {
            records.extend(self.forms_of_kind(kind, submission_id).await?);
        }
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}

pub type SharedStore = Arc<dyn Store>;
