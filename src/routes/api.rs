use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::io::Write;
use std::sync::Arc;

use crate::domain::{
    Application, ApplicationDetails, ApplicationStatus, AssignedForm, Assignment, FileCategory,
    FormHeader, FormKind, FormRecord, Reviewer, ReviewerIdentity, ReviewerSummary, ReviewForm, Slot,
    SlotStatus,
};
use crate::error::{AppError, AppResult};
use crate::routes::extract::{ApiJson, ApiQuery};
use crate::state::AppState;
use crate::storage::SignedUrl;
use crate::workflow::tracker::AssignedApplication;
use crate::workflow::{capture, directory, intake, tracker};

pub const REVIEWER_CODE_HEADER: &str = "x-reviewer-code";

/// Resolve the reviewer making this request from the `x-reviewer-code` header.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> AppResult<ReviewerIdentity> {
    let code = headers
        .get(REVIEWER_CODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    match directory::resolve(state.store.as_ref(), code).await {
        Ok(identity) => Ok(identity),
        Err(AppError::NotFound(_)) => Err(AppError::Unauthenticated),
        Err(e) => Err(e),
    }
}

fn parse_slot(raw: &str) -> AppResult<Slot> {
    raw.parse().map_err(AppError::InvalidFormat)
}

fn parse_kind(raw: &str) -> AppResult<FormKind> {
    raw.parse().map_err(AppError::InvalidFormat)
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("Malformed upload: {}", e))
}

pub async fn submit_application(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<Application>)> {
    let mut details = ApplicationDetails::default();
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        if let Some(category) = FileCategory::from_key(&name) {
            let file_name = field.file_name().unwrap_or("").to_string();
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(multipart_error)?;
            // Browsers send empty parts for unused file inputs.
            if file_name.is_empty() && data.is_empty() {
                continue;
            }
            uploads.push(intake::Upload {
                category,
                file_name,
                content_type,
                data: data.to_vec(),
            });
            continue;
        }

        let text = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "researchTitle" => details.research_title = text,
            "principalInvestigator" => details.principal_investigator = text,
            "courseProgram" => details.course_program = text,
            "adviser" => details.adviser = text,
            "emailAddress" => details.email_address = text,
            other => tracing::debug!("Ignoring unknown upload field '{}'", other),
        }
    }

    let application = intake::submit(
        state.store.as_ref(),
        state.blobs.as_ref(),
        &state.config.id_prefix,
        &details,
        uploads,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(application)))
}

#[derive(Deserialize)]
pub struct ListQuery {
    status: Option<String>,
}

pub async fn list_applications(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> AppResult<Json<Vec<Application>>> {
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<ApplicationStatus>().map_err(AppError::InvalidFormat)?),
    };
    Ok(Json(intake::list(state.store.as_ref(), status).await?))
}

pub async fn get_application(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Application>> {
    Ok(Json(intake::get(state.store.as_ref(), &id).await?))
}

pub async fn update_application(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(details): ApiJson<ApplicationDetails>,
) -> AppResult<Json<Application>> {
    Ok(Json(
        intake::update_details(state.store.as_ref(), &id, &details).await?,
    ))
}

pub async fn complete_application(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Application>> {
    Ok(Json(tracker::complete(state.store.as_ref(), &id).await?))
}

#[derive(Deserialize)]
pub struct ProtocolCodeRequest {
    code: String,
}

pub async fn assign_protocol_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ProtocolCodeRequest>,
) -> AppResult<Json<Application>> {
    let application =
        tracker::assign_code(state.store.as_ref(), &state.config.id_prefix, &id, &body.code).await?;
    Ok(Json(application))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignSlotRequest {
    #[serde(default)]
    reviewer_name: String,
    #[serde(default)]
    form: String,
}

pub async fn assign_slot(
    State(state): State<Arc<AppState>>,
    Path((id, slot)): Path<(String, String)>,
    ApiJson(body): ApiJson<AssignSlotRequest>,
) -> AppResult<Json<Assignment>> {
    let slot = parse_slot(&slot)?;
    let form = match body.form.trim() {
        "" => None,
        raw => Some(raw.parse::<AssignedForm>().map_err(AppError::InvalidFormat)?),
    };
    let assignment = tracker::assign(
        state.store.as_ref(),
        &id,
        slot,
        body.reviewer_name.trim(),
        form,
    )
    .await?;
    Ok(Json(assignment))
}

#[derive(Deserialize)]
pub struct SlotStatusRequest {
    status: String,
}

pub async fn set_slot_status(
    State(state): State<Arc<AppState>>,
    Path((id, slot)): Path<(String, String)>,
    ApiJson(body): ApiJson<SlotStatusRequest>,
) -> AppResult<Json<Assignment>> {
    let slot = parse_slot(&slot)?;
    let status: SlotStatus = body.status.parse().map_err(AppError::InvalidFormat)?;
    Ok(Json(
        tracker::set_slot_status(state.store.as_ref(), &id, slot, status).await?,
    ))
}

pub async fn file_url(
    State(state): State<Arc<AppState>>,
    Path((id, category)): Path<(String, String)>,
) -> AppResult<Json<SignedUrl>> {
    let category = FileCategory::from_key(&category)
        .ok_or_else(|| AppError::InvalidFormat(format!("unknown file category '{}'", category)))?;
    let application = intake::get(state.store.as_ref(), &id).await?;
    let meta = application
        .files
        .get(&category)
        .ok_or_else(|| AppError::NotFound(format!("{} for {}", category.label(), id)))?;
    Ok(Json(state.signer.sign(&meta.storage_path)))
}

pub async fn download_all(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let application = intake::get(state.store.as_ref(), &id).await?;

    let mut contents = Vec::with_capacity(application.files.len());
    for meta in application.files.values() {
        contents.push((meta.name.as_str(), state.blobs.get(&meta.storage_path).await?));
    }

    let mut zip_data = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut zip_data));
        let options = zip::write::SimpleFileOptions::default().unix_permissions(0o644);
        let zip_err = |e: zip::result::ZipError| AppError::UpstreamFailure(format!("zip: {}", e));

        for (name, content) in &contents {
            zip.start_file(*name, options.clone()).map_err(zip_err)?;
            zip.write_all(content)?;
        }
        zip.finish().map_err(zip_err)?;
    }

    tracing::info!(
        "Bundled {} file(s) for {}",
        application.files.len(),
        application.id
    );
    let download_name = format!("{}_files.zip", application.id);
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", download_name),
            ),
        ],
        zip_data,
    )
        .into_response())
}

pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<FormRecord>>> {
    intake::get(state.store.as_ref(), &id).await?;
    Ok(Json(
        capture::list_for_submission(state.store.as_ref(), &id).await?,
    ))
}

pub async fn list_reviewers(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<ReviewerSummary>>> {
    Ok(Json(directory::list_all(state.store.as_ref()).await?))
}

#[derive(Deserialize)]
pub struct NewReviewerRequest {
    name: String,
    code: String,
}

pub async fn add_reviewer(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<NewReviewerRequest>,
) -> AppResult<(StatusCode, Json<Reviewer>)> {
    let reviewer = directory::add(state.store.as_ref(), &body.name, &body.code).await?;
    Ok((StatusCode::CREATED, Json(reviewer)))
}

#[derive(Deserialize)]
pub struct ActiveRequest {
    active: bool,
}

pub async fn set_reviewer_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ActiveRequest>,
) -> AppResult<Json<Reviewer>> {
    Ok(Json(
        directory::set_active(state.store.as_ref(), &id, body.active).await?,
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    code: String,
}

pub async fn reviewer_login(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<Json<ReviewerIdentity>> {
    Ok(Json(directory::resolve(state.store.as_ref(), &body.code).await?))
}

pub async fn reviewer_assignments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<AssignedApplication>>> {
    let identity = authenticate(&state, &headers).await?;
    Ok(Json(
        tracker::find_assigned_to(state.store.as_ref(), &identity.name).await?,
    ))
}

pub async fn form_prefill(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> AppResult<Json<FormHeader>> {
    let kind = parse_kind(&kind)?;
    Ok(Json(capture::prefill(state.store.as_ref(), kind, &id).await?))
}

pub async fn submit_form(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> AppResult<(StatusCode, Json<FormRecord>)> {
    let kind = parse_kind(&kind)?;
    let identity = authenticate(&state, &headers).await?;
    let form = ReviewForm::from_json(kind, body)?;
    let record = capture::submit(state.store.as_ref(), &identity, form).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn init_db(State(state): State<Arc<AppState>>) -> AppResult<Json<serde_json::Value>> {
    let seeded =
        directory::seed_from_file(state.store.as_ref(), &state.config.reviewer_seed_file).await?;
    let message = if seeded {
        "Reviewers initialized"
    } else {
        "Reviewers already present. Skipping initialization."
    };
    Ok(Json(serde_json::json!({
        "status": "success",
        "seeded": seeded,
        "message": message
    })))
}

#[derive(Deserialize)]
pub struct SignedQuery {
    expires: Option<i64>,
    signature: Option<String>,
}

pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    ApiQuery(query): ApiQuery<SignedQuery>,
) -> AppResult<Response> {
    let (Some(expires), Some(signature)) = (query.expires, query.signature) else {
        return Err(AppError::Unauthenticated);
    };
    state.signer.verify(&path, expires, &signature)?;

    let content = state.blobs.get(&path).await?;
    let filename = path.rsplit('/').next().unwrap_or(path.as_str());
    let mime = mime_guess::from_path(filename)
        .first_raw()
        .unwrap_or("application/octet-stream");

    Ok((
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", filename),
            ),
        ],
        content,
    )
        .into_response())
}
