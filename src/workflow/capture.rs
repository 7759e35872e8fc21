use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::Store;
use crate::domain::{FormHeader, FormKind, FormRecord, ReviewForm, ReviewerIdentity};
use crate::error::{AppError, AppResult};

/// Store a completed questionnaire on behalf of `identity`.
///
/// The submission must exist and the reviewer must hold a slot on it whose
/// assigned form is this kind. Records are append-only, and slot status is
/// left for the committee to advance.
pub async fn submit(
    store: &dyn Store,
    identity: &ReviewerIdentity,
    form: ReviewForm,
) -> AppResult<FormRecord> {
    if !identity.is_complete() {
        return Err(AppError::Unauthenticated);
    }
    form.validate().map_err(AppError::Validation)?;

    let kind = form.kind();
    let submission_id = form.header().spup_rec_protocol_code.trim().to_string();
    let application = store
        .get_application(&submission_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application {}", submission_id)))?;

    let entitled = application
        .slots_held_by(&identity.name)
        .into_iter()
        .any(|slot| application.slot(slot).form == Some(kind.assigned_form()));
    if !entitled {
        warn!(
            "{} tried to submit {} for {} without an assignment",
            identity.name, kind, submission_id
        );
        return Err(AppError::NotAssigned(format!(
            "You are not assigned the {} form for {}",
            kind.assigned_form().label(),
            submission_id
        )));
    }

    let record = FormRecord {
        id: Uuid::new_v4().to_string(),
        kind,
        spup_rec_protocol_code: submission_id,
        reviewer_id: identity.id.clone(),
        reviewer_code: identity.code.clone(),
        reviewer_name: identity.name.clone(),
        outcome: form.outcome().map(str::to_string),
        answers: form.to_json()?,
        created_at: Utc::now(),
    };
    store.insert_form(&record).await?;

    info!(
        "{} form {} saved for {} by {}",
        kind, record.id, record.spup_rec_protocol_code, record.reviewer_name
    );
    Ok(record)
}

/// Header fields a reviewer starts from when opening a form.
pub async fn prefill(store: &dyn Store, kind: FormKind, submission_id: &str) -> AppResult<FormHeader> {
    let application = store
        .get_application(submission_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application {}", submission_id)))?;
    tracing::debug!("Prefilling {} for {}", kind, submission_id);
    Ok(FormHeader::prefill(&application))
}

pub async fn list_for_submission(store: &dyn Store, submission_id: &str) -> AppResult<Vec<FormRecord>> {
    store.forms_for_submission(submission_id).await
}
