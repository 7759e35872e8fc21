use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

use crate::db::Store;
use crate::domain::{
    current_year, initials, Application, ApplicationDetails, ApplicationStatus, FileCategory,
    FileMeta, SubmissionId,
};
use crate::error::{AppError, AppResult};
use crate::storage::{blob_path, sanitize_file_name, BlobStore};

const ACCEPTED_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// One attachment as received from the applicant.
#[derive(Debug, Clone)]
pub struct Upload {
    pub category: FileCategory,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Settle on a content type for an upload: the declared one if acceptable,
/// otherwise whatever the extension says.
pub fn accepted_content_type(file_name: &str, declared: Option<&str>) -> Option<String> {
    if let Some(declared) = declared {
        if ACCEPTED_TYPES.contains(&declared) {
            return Some(declared.to_string());
        }
    }
    mime_guess::from_path(file_name)
        .iter_raw()
        .find(|m| ACCEPTED_TYPES.contains(m))
        .map(str::to_string)
}

struct Prepared {
    category: FileCategory,
    file_name: String,
    content_type: String,
    data: Vec<u8>,
}

fn prepare(uploads: Vec<Upload>) -> AppResult<Vec<Prepared>> {
    let mut seen_categories = HashSet::new();
    let mut seen_names = HashSet::new();
    let mut prepared = Vec::with_capacity(uploads.len());

    for upload in uploads {
        if !seen_categories.insert(upload.category) {
            return Err(AppError::Validation(format!(
                "Only one file may be attached for {}",
                upload.category.label()
            )));
        }
        if upload.data.is_empty() {
            return Err(AppError::Validation(format!(
                "The file for {} is empty",
                upload.category.label()
            )));
        }
        let mut file_name = sanitize_file_name(&upload.file_name).ok_or_else(|| {
            AppError::Validation(format!("Invalid file name for {}", upload.category.label()))
        })?;
        let content_type = accepted_content_type(&file_name, upload.content_type.as_deref())
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "{} must be a PDF, DOC or DOCX file",
                    upload.category.label()
                ))
            })?;
        // Two categories with the same original name would share a blob path.
        if !seen_names.insert(file_name.clone()) {
            file_name = format!("{}_{}", upload.category.key(), file_name);
            seen_names.insert(file_name.clone());
        }

        prepared.push(Prepared {
            category: upload.category,
            file_name,
            content_type,
            data: upload.data,
        });
    }
    Ok(prepared)
}

async fn remove_blobs(blobs: &dyn BlobStore, paths: &[String]) {
    for path in paths {
        if let Err(e) = blobs.delete(path).await {
            warn!("Failed to remove orphaned upload {}: {}", path, e);
        }
    }
}

/// Upload every file or none: on the first failure the blobs already written
/// are removed and the failing category is reported.
async fn upload_all(
    blobs: &dyn BlobStore,
    submission_id: &str,
    files: Vec<Prepared>,
) -> AppResult<BTreeMap<FileCategory, FileMeta>> {
    let mut written: Vec<String> = Vec::new();
    let mut metas = BTreeMap::new();

    for file in files {
        let path = blob_path(submission_id, &file.file_name);
        if let Err(e) = blobs.put(&path, &file.data).await {
            warn!(
                "Upload of {} for {} failed, rolling back {} file(s): {}",
                file.category.key(),
                submission_id,
                written.len(),
                e
            );
            remove_blobs(blobs, &written).await;
            return Err(AppError::UpstreamFailure(format!(
                "upload of {} failed: {}",
                file.category.label(),
                e
            )));
        }
        written.push(path.clone());
        metas.insert(
            file.category,
            FileMeta {
                name: file.file_name,
                content_type: file.content_type,
                size_bytes: file.data.len() as u64,
                storage_path: path,
            },
        );
    }
    Ok(metas)
}

/// Create a new application in the current year.
pub async fn submit(
    store: &dyn Store,
    blobs: &dyn BlobStore,
    prefix: &str,
    details: &ApplicationDetails,
    uploads: Vec<Upload>,
) -> AppResult<Application> {
    submit_in_year(store, blobs, prefix, current_year(), details, uploads).await
}

pub async fn submit_in_year(
    store: &dyn Store,
    blobs: &dyn BlobStore,
    prefix: &str,
    year: i32,
    details: &ApplicationDetails,
    uploads: Vec<Upload>,
) -> AppResult<Application> {
    let details = details.normalized().map_err(AppError::Validation)?;
    let files = prepare(uploads)?;

    let sequence = store.allocate_sequence(year, prefix).await?;
    let id = SubmissionId::new(prefix, year, sequence, &initials(&details.principal_investigator))
        .to_string();
    let sequence = i32::try_from(sequence)
        .map_err(|_| AppError::UpstreamFailure(format!("sequence {} out of range", sequence)))?;

    let files = upload_all(blobs, &id, files).await?;
    let paths: Vec<String> = files.values().map(|m| m.storage_path.clone()).collect();

    let application = Application::new(id, details, files, year, sequence);
    if let Err(e) = store.insert_application(&application).await {
        warn!("Failed to record application {}: {}", application.id, e);
        remove_blobs(blobs, &paths).await;
        return Err(e);
    }

    info!(
        "Application {} submitted with {} file(s)",
        application.id,
        application.files.len()
    );
    Ok(application)
}

pub async fn get(store: &dyn Store, id: &str) -> AppResult<Application> {
    store
        .get_application(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application {}", id)))
}

pub async fn list(store: &dyn Store, status: Option<ApplicationStatus>) -> AppResult<Vec<Application>> {
    store.list_applications(status).await
}

/// Edit the applicant-supplied fields. Only pending applications are editable.
pub async fn update_details(
    store: &dyn Store,
    id: &str,
    details: &ApplicationDetails,
) -> AppResult<Application> {
    let details = details.normalized().map_err(AppError::Validation)?;
    let application = store.update_details(id, &details).await?;
    info!("Application {} details updated", id);
    Ok(application)
}
