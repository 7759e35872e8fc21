use serde::Serialize;
use tracing::info;

use crate::db::Store;
use crate::domain::identifier::{protocol_code_pattern, suggested_protocol_code};
use crate::domain::{
    Application, ApplicationStatus, AssignedForm, Assignment, Slot, SlotStatus,
};
use crate::error::{AppError, AppResult};

/// One slot a reviewer holds on an application.
#[derive(Debug, Clone, Serialize)]
pub struct HeldSlot {
    pub slot: Slot,
    pub form: Option<AssignedForm>,
    pub status: SlotStatus,
}

/// An application as seen from a reviewer's dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct AssignedApplication {
    pub application: Application,
    pub slots: Vec<HeldSlot>,
}

async fn load(store: &dyn Store, id: &str) -> AppResult<Application> {
    store
        .get_application(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application {}", id)))
}

/// Bind a reviewer and form to a slot. The slot always restarts at `Pending`;
/// an empty name vacates it.
pub async fn assign(
    store: &dyn Store,
    submission_id: &str,
    slot: Slot,
    reviewer_name: &str,
    form: Option<AssignedForm>,
) -> AppResult<Assignment> {
    load(store, submission_id).await?;

    let assignment = if reviewer_name.is_empty() {
        Assignment::default()
    } else {
        let form = form.ok_or_else(|| {
            AppError::Validation("A review form is required when assigning a reviewer".to_string())
        })?;
        match store.reviewer_by_name(reviewer_name).await? {
            Some(r) if r.is_active => {}
            _ => return Err(AppError::NotFound(format!("Reviewer {}", reviewer_name))),
        }
        Assignment::to(reviewer_name, form)
    };

    let application = store.set_assignment(submission_id, slot, &assignment).await?;
    info!(
        "Assigned {} on {} to '{}' ({})",
        slot,
        submission_id,
        assignment.reviewer_name,
        assignment.form.map(|f| f.as_str()).unwrap_or("-")
    );
    Ok(application.slot(slot).clone())
}

/// Record a human-driven status change on one slot.
pub async fn set_slot_status(
    store: &dyn Store,
    submission_id: &str,
    slot: Slot,
    status: SlotStatus,
) -> AppResult<Assignment> {
    let application = load(store, submission_id).await?;
    let mut assignment = application.slot(slot).clone();
    if assignment.is_vacant() {
        return Err(AppError::Validation(format!("{} has no reviewer assigned", slot)));
    }
    assignment.status = status;

    let application = store.set_assignment(submission_id, slot, &assignment).await?;
    info!("{} on {} is now {}", slot, submission_id, status.as_str());
    Ok(application.slot(slot).clone())
}

/// Applications where `reviewer_name` holds at least one slot, each listed once.
pub async fn find_assigned_to(store: &dyn Store, reviewer_name: &str) -> AppResult<Vec<AssignedApplication>> {
    let applications = store.applications_assigned_to(reviewer_name).await?;
    let mut seen = std::collections::HashSet::new();

    Ok(applications
        .into_iter()
        .filter(|a| seen.insert(a.id.clone()))
        .filter_map(|application| {
            let slots: Vec<HeldSlot> = application
                .slots_held_by(reviewer_name)
                .into_iter()
                .map(|slot| {
                    let a = application.slot(slot);
                    HeldSlot {
                        slot,
                        form: a.form,
                        status: a.status,
                    }
                })
                .collect();
            if slots.is_empty() {
                None
            } else {
                Some(AssignedApplication { application, slots })
            }
        })
        .collect())
}

/// Persist an operator-entered protocol code if it matches the investigator's initials.
pub async fn assign_code(
    store: &dyn Store,
    prefix: &str,
    submission_id: &str,
    candidate: &str,
) -> AppResult<Application> {
    let application = load(store, submission_id).await?;
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return Err(AppError::Validation("Please enter a protocol code".to_string()));
    }

    let pattern = protocol_code_pattern(prefix, &application.details.principal_investigator)
        .map_err(|e| AppError::UpstreamFailure(format!("protocol code pattern: {}", e)))?;
    if !pattern.is_match(candidate) {
        return Err(AppError::InvalidFormat(format!(
            "Invalid protocol code format. Please use {}_YEAR_NUMBER_SR_INITIALS format",
            prefix
        )));
    }

    let application = store.set_main_folder(submission_id, candidate).await?;
    info!("Protocol code {} assigned to {}", candidate, submission_id);
    Ok(application)
}

pub fn suggest_code(prefix: &str, year: i32, application: &Application) -> String {
    suggested_protocol_code(prefix, year, &application.details.principal_investigator)
}

/// Explicit administrator sign-off on the whole application.
pub async fn complete(store: &dyn Store, submission_id: &str) -> AppResult<Application> {
    load(store, submission_id).await?;
    let application = store
        .set_status(submission_id, ApplicationStatus::Completed)
        .await?;
    info!("Application {} marked Completed", submission_id);
    Ok(application)
}
