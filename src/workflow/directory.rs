use std::path::Path;
use tracing::{info, warn};

use crate::db::Store;
use crate::domain::{Reviewer, ReviewerIdentity, ReviewerSummary, SeedReviewer};
use crate::error::{AppError, AppResult};

/// Look a reviewer code up verbatim. No trimming or case folding happens
/// here; inactive entries do not resolve.
pub async fn resolve(store: &dyn Store, code: &str) -> AppResult<ReviewerIdentity> {
    match store.reviewer_by_code(code).await? {
        Some(r) if r.is_active => Ok(r.identity()),
        Some(_) => {
            warn!("Rejected code for deactivated reviewer");
            Err(AppError::NotFound("Reviewer".to_string()))
        }
        None => Err(AppError::NotFound("Reviewer".to_string())),
    }
}

/// Active reviewers for assignment pickers.
pub async fn list_all(store: &dyn Store) -> AppResult<Vec<ReviewerSummary>> {
    Ok(store
        .list_reviewers()
        .await?
        .into_iter()
        .filter(|r| r.is_active)
        .map(|r| r.summary())
        .collect())
}

/// Every entry, active or not, for the committee's directory page.
pub async fn roster(store: &dyn Store) -> AppResult<Vec<Reviewer>> {
    store.list_reviewers().await
}

pub async fn add(store: &dyn Store, name: &str, code: &str) -> AppResult<Reviewer> {
    let (name, code) = (name.trim(), code.trim());
    if name.is_empty() || code.is_empty() {
        return Err(AppError::Validation("Reviewer name and code are required".to_string()));
    }
    if store.reviewer_by_code(code).await?.is_some() {
        return Err(AppError::Conflict(format!("Reviewer code '{}' is already in use", code)));
    }

    let reviewer = Reviewer::new(name, code);
    store.insert_reviewer(&reviewer).await?;
    info!("Added reviewer {}", reviewer.name);
    Ok(reviewer)
}

pub async fn set_active(store: &dyn Store, id: &str, active: bool) -> AppResult<Reviewer> {
    let reviewer = store.set_reviewer_active(id, active).await?;
    info!(
        "Reviewer {} {}",
        reviewer.name,
        if active { "activated" } else { "deactivated" }
    );
    Ok(reviewer)
}

/// Populate an empty directory. Returns `false` if reviewers already exist.
pub async fn seed(store: &dyn Store, entries: &[SeedReviewer]) -> AppResult<bool> {
    let mut codes = std::collections::HashSet::new();
    let mut reviewers = Vec::with_capacity(entries.len());
    for entry in entries {
        let (name, code) = (entry.name.trim(), entry.code.trim());
        if name.is_empty() || code.is_empty() {
            return Err(AppError::Validation("Every seed entry needs a name and a code".to_string()));
        }
        if !codes.insert(code.to_string()) {
            return Err(AppError::Conflict(format!("Duplicate reviewer code '{}' in seed", code)));
        }
        reviewers.push(Reviewer::new(name, code));
    }

    let seeded = store.seed_reviewers(&reviewers).await?;
    if seeded {
        info!("Successfully added {} reviewers", reviewers.len());
    } else {
        info!("Reviewers already present. Skipping initialization.");
    }
    Ok(seeded)
}

pub async fn seed_from_file(store: &dyn Store, path: &Path) -> AppResult<bool> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::NotFound(format!("Reviewer seed file {} ({})", path.display(), e))
    })?;
    let entries: Vec<SeedReviewer> = serde_json::from_str(&raw)?;
    seed(store, &entries).await
}
