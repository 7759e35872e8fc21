use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::Store;
use crate::domain::identifier::next_sequence;
use crate::domain::{
    Application, ApplicationDetails, ApplicationStatus, Assignment, FormKind, FormRecord, Reviewer,
    Slot,
};
use crate::error::{AppError, AppResult};

#[derive(Default)]
struct Inner {
    applications: HashMap<String, Application>,
    // Highest sequence handed out per year, including ones whose insert never landed.
    counters: HashMap<i32, u32>,
    reviewers: Vec<Reviewer>,
    forms: Vec<FormRecord>,
}

/// In-process store with the same semantics as `PgStore`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Application {}", id))
}

fn newest_first(mut apps: Vec<Application>) -> Vec<Application> {
    apps.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    apps
}

#[async_trait]
impl Store for MemoryStore {
    async fn allocate_sequence(&self, year: i32, prefix: &str) -> AppResult<u32> {
        let mut inner = self.inner.lock().await;
        let scanned = next_sequence(
            inner
                .applications
                .values()
                .filter(|a| a.year == year)
                .map(|a| a.id.as_str()),
            prefix,
        );
        let reserved = inner.counters.get(&year).copied().unwrap_or(0) + 1;
        let next = scanned.max(reserved);
        inner.counters.insert(year, next);
        Ok(next)
    }

    async fn insert_application(&self, application: &Application) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.applications.contains_key(&application.id) {
            return Err(AppError::Conflict(format!(
                "Application {} already exists",
                application.id
            )));
        }
        inner
            .applications
            .insert(application.id.clone(), application.clone());
        Ok(())
    }

    async fn get_application(&self, id: &str) -> AppResult<Option<Application>> {
        Ok(self.inner.lock().await.applications.get(id).cloned())
    }

    async fn list_applications(&self, status: Option<ApplicationStatus>) -> AppResult<Vec<Application>> {
        let inner = self.inner.lock().await;
        let apps = inner
            .applications
            .values()
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        Ok(newest_first(apps))
    }

    async fn update_details(&self, id: &str, details: &ApplicationDetails) -> AppResult<Application> {
        let mut inner = self.inner.lock().await;
        let app = inner.applications.get_mut(id).ok_or_else(|| not_found(id))?;
        if app.status != ApplicationStatus::Pending {
            return Err(AppError::Locked(format!(
                "Application {} is {} and can no longer be edited",
                id, app.status
            )));
        }
        app.details = details.clone();
        app.updated_at = Utc::now();
        Ok(app.clone())
    }

    async fn set_status(&self, id: &str, status: ApplicationStatus) -> AppResult<Application> {
        let mut inner = self.inner.lock().await;
        let app = inner.applications.get_mut(id).ok_or_else(|| not_found(id))?;
        app.status = status;
        app.updated_at = Utc::now();
        Ok(app.clone())
    }

    async fn set_main_folder(&self, id: &str, code: &str) -> AppResult<Application> {
        let mut inner = self.inner.lock().await;
        let app = inner.applications.get_mut(id).ok_or_else(|| not_found(id))?;
        app.main_folder = Some(code.to_string());
        app.updated_at = Utc::now();
        Ok(app.clone())
    }

    async fn set_assignment(&self, id: &str, slot: Slot, assignment: &Assignment) -> AppResult<Application> {
        let mut inner = self.inner.lock().await;
        let app = inner.applications.get_mut(id).ok_or_else(|| not_found(id))?;
        *app.slot_mut(slot) = assignment.clone();
        app.updated_at = Utc::now();
        Ok(app.clone())
    }

    async fn applications_assigned_to(&self, reviewer_name: &str) -> AppResult<Vec<Application>> {
        let inner = self.inner.lock().await;
        let apps = inner
            .applications
            .values()
            .filter(|a| !a.slots_held_by(reviewer_name).is_empty())
            .cloned()
            .collect();
        Ok(newest_first(apps))
    }

    async fn insert_reviewer(&self, reviewer: &Reviewer) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.reviewers.iter().any(|r| r.code == reviewer.code) {
            return Err(AppError::Conflict(format!(
                "Reviewer code '{}' is already in use",
                reviewer.code
            )));
        }
        inner.reviewers.push(reviewer.clone());
        Ok(())
    }

    async fn reviewer_by_code(&self, code: &str) -> AppResult<Option<Reviewer>> {
        let inner = self.inner.lock().await;
        Ok(inner.reviewers.iter().find(|r| r.code == code).cloned())
    }

    async fn reviewer_by_name(&self, name: &str) -> AppResult<Option<Reviewer>> {
        let inner = self.inner.lock().await;
        let mut matches: Vec<&Reviewer> = inner.reviewers.iter().filter(|r| r.name == name).collect();
        matches.sort_by_key(|r| !r.is_active);
        Ok(matches.first().map(|r| (*r).clone()))
    }

    async fn list_reviewers(&self) -> AppResult<Vec<Reviewer>> {
        let mut reviewers = self.inner.lock().await.reviewers.clone();
        reviewers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(reviewers)
    }

    async fn set_reviewer_active(&self, id: &str, active: bool) -> AppResult<Reviewer> {
        let mut inner = self.inner.lock().await;
        let reviewer = inner
            .reviewers
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Reviewer {}", id)))?;
        reviewer.is_active = active;
        Ok(reviewer.clone())
    }

    async fn seed_reviewers(&self, reviewers: &[Reviewer]) -> AppResult<bool> {
        let mut inner = self.inner.lock().await;
        if !inner.reviewers.is_empty() {
            return Ok(false);
        }
        inner.reviewers.extend_from_slice(reviewers);
        Ok(true)
    }

    async fn insert_form(&self, record: &FormRecord) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.applications.contains_key(&record.spup_rec_protocol_code) {
            return Err(not_found(&record.spup_rec_protocol_code));
        }
        inner.forms.push(record.clone());
        Ok(())
    }

    async fn forms_of_kind(&self, kind: FormKind, submission_id: &str) -> AppResult<Vec<FormRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .forms
            .iter()
            .filter(|f| f.kind == kind && f.spup_rec_protocol_code == submission_id)
            .cloned()
            .collect())
    }
}
