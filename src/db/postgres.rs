use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use super::models::{form_table, ApplicationRow, FormRow};
use super::{DbPool, Store};
use crate::domain::{
    Application, ApplicationDetails, ApplicationStatus, Assignment, FormKind, FormRecord, Reviewer,
    Slot,
};
use crate::error::{AppError, AppResult};

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }

    fn updated(id: &str, row: Option<ApplicationRow>) -> AppResult<Application> {
        match row {
            Some(row) => row.try_into(),
            None => Err(AppError::NotFound(format!("Application {}", id))),
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn allocate_sequence(&self, year: i32, _prefix: &str) -> AppResult<u32> {
        // Incremented under the row lock taken by ON CONFLICT, and never left
        // behind rows that were inserted or restored around the counter.
        let next: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO submission_counters (year, last_sequence)
            VALUES ($1, (SELECT COALESCE(MAX(sequence), 0) FROM applications WHERE year = $1) + 1)
            ON CONFLICT (year) DO UPDATE
                SET last_sequence = GREATEST(
                    submission_counters.last_sequence,
                    (SELECT COALESCE(MAX(sequence), 0) FROM applications WHERE year = $1)
                ) + 1
            RETURNING last_sequence
            "#,
        )
        .bind(year)
        .fetch_one(self.pool())
        .await?;

        u32::try_from(next).map_err(|_| AppError::UpstreamFailure(format!("sequence overflow: {}", next)))
    }

    async fn insert_application(&self, application: &Application) -> AppResult<()> {
        let d = &application.details;
        sqlx::query(
            r#"
            INSERT INTO applications (
                id, year, sequence, research_title, principal_investigator, course_program,
                adviser, email_address, files, status, main_folder,
                submission_date, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(&application.id)
        .bind(application.year)
        .bind(application.sequence)
        .bind(&d.research_title)
        .bind(&d.principal_investigator)
        .bind(&d.course_program)
        .bind(&d.adviser)
        .bind(&d.email_address)
        .bind(Json(&application.files))
        .bind(application.status.as_str())
        .bind(&application.main_folder)
        .bind(application.submission_date)
        .bind(application.created_at)
        .bind(application.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_application(&self, id: &str) -> AppResult<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(Application::try_from).transpose()
    }

    async fn list_applications(&self, status: Option<ApplicationStatus>) -> AppResult<Vec<Application>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, ApplicationRow>(
                    "SELECT * FROM applications WHERE status = $1 ORDER BY created_at DESC",
                )
                .bind(status.as_str())
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications ORDER BY created_at DESC")
                    .fetch_all(self.pool())
                    .await?
            }
        };
        rows.into_iter().map(Application::try_from).collect()
    }

    async fn update_details(&self, id: &str, details: &ApplicationDetails) -> AppResult<Application> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            r#"
            UPDATE applications
            SET research_title = $2, principal_investigator = $3, course_program = $4,
                adviser = $5, email_address = $6, updated_at = NOW()
            WHERE id = $1 AND status = 'Pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&details.research_title)
        .bind(&details.principal_investigator)
        .bind(&details.course_program)
        .bind(&details.adviser)
        .bind(&details.email_address)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => match self.get_application(id).await? {
                Some(app) => Err(AppError::Locked(format!(
                    "Application {} is {} and can no longer be edited",
                    id, app.status
                ))),
                None => Err(AppError::NotFound(format!("Application {}", id))),
            },
        }
    }

    async fn set_status(&self, id: &str, status: ApplicationStatus) -> AppResult<Application> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            "UPDATE applications SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(self.pool())
        .await?;
        Self::updated(id, row)
    }

    async fn set_main_folder(&self, id: &str, code: &str) -> AppResult<Application> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            "UPDATE applications SET main_folder = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(code)
        .fetch_optional(self.pool())
        .await?;
        Self::updated(id, row)
    }

    async fn set_assignment(&self, id: &str, slot: Slot, assignment: &Assignment) -> AppResult<Application> {
        let sql = format!(
            "UPDATE applications SET {slot}_name = $2, {slot}_form = $3, {slot}_status = $4, \
             updated_at = NOW() WHERE id = $1 RETURNING *",
            slot = slot.key()
        );
        let row = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(id)
            .bind(&assignment.reviewer_name)
            .bind(assignment.form.map(|f| f.as_str()).unwrap_or(""))
            .bind(assignment.status.as_str())
            .fetch_optional(self.pool())
            .await?;
        Self::updated(id, row)
    }

    async fn applications_assigned_to(&self, reviewer_name: &str) -> AppResult<Vec<Application>> {
        // Vacant slots hold '' and must not match.
        if reviewer_name.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, ApplicationRow>(
            r#"
            SELECT * FROM applications
            WHERE reviewer1_name = $1 OR reviewer2_name = $1 OR reviewer3_name = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(reviewer_name)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(Application::try_from).collect()
    }

    async fn insert_reviewer(&self, reviewer: &Reviewer) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO reviewers (id, name, code, is_active, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&reviewer.id)
        .bind(&reviewer.name)
        .bind(&reviewer.code)
        .bind(reviewer.is_active)
        .bind(reviewer.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn reviewer_by_code(&self, code: &str) -> AppResult<Option<Reviewer>> {
        Ok(sqlx::query_as::<_, Reviewer>("SELECT * FROM reviewers WHERE code = $1")
            .bind(code)
            .fetch_optional(self.pool())
            .await?)
    }

    async fn reviewer_by_name(&self, name: &str) -> AppResult<Option<Reviewer>> {
        Ok(sqlx::query_as::<_, Reviewer>(
            "SELECT * FROM reviewers WHERE name = $1 ORDER BY is_active DESC LIMIT 1",
        )
        .bind(name)
        .fetch_optional(self.pool())
        .await?)
    }

    async fn list_reviewers(&self) -> AppResult<Vec<Reviewer>> {
        Ok(sqlx::query_as::<_, Reviewer>("SELECT * FROM reviewers ORDER BY name")
            .fetch_all(self.pool())
            .await?)
    }

    async fn set_reviewer_active(&self, id: &str, active: bool) -> AppResult<Reviewer> {
        sqlx::query_as::<_, Reviewer>("UPDATE reviewers SET is_active = $2 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(active)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reviewer {}", id)))
    }

    async fn seed_reviewers(&self, reviewers: &[Reviewer]) -> AppResult<bool> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("LOCK TABLE reviewers IN EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviewers")
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for r in reviewers {
            sqlx::query(
                "INSERT INTO reviewers (id, name, code, is_active, created_at) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&r.id)
            .bind(&r.name)
            .bind(&r.code)
            .bind(r.is_active)
            .bind(r.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn insert_form(&self, record: &FormRecord) -> AppResult<()> {
        let sql = format!(
            r#"
            INSERT INTO {} (id, spup_rec_protocol_code, reviewer_id, reviewer_code, reviewer_name,
                            outcome, answers, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
            form_table(record.kind)
        );
        sqlx::query(&sql)
            .bind(&record.id)
            .bind(&record.spup_rec_protocol_code)
            .bind(&record.reviewer_id)
            .bind(&record.reviewer_code)
            .bind(&record.reviewer_name)
            .bind(&record.outcome)
            .bind(Json(&record.answers))
            .bind(record.created_at)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn forms_of_kind(&self, kind: FormKind, submission_id: &str) -> AppResult<Vec<FormRecord>> {
        let sql = format!(
            "SELECT * FROM {} WHERE spup_rec_protocol_code = $1 ORDER BY created_at",
            form_table(kind)
        );
        let rows = sqlx::query_as::<_, FormRow>(&sql)
            .bind(submission_id)
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(|r| r.into_record(kind)).collect())
    }
}
