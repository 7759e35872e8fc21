use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tera::Context;

use crate::domain::{current_year, AssignedForm, FileCategory, FormKind, Slot};
use crate::state::AppState;
use crate::workflow::{capture, directory, intake, tracker};

#[derive(Serialize)]
struct CategoryOption {
    key: &'static str,
    label: &'static str,
}

#[derive(Serialize)]
struct FormOption {
    value: &'static str,
    label: &'static str,
}

fn categories() -> Vec<CategoryOption> {
    FileCategory::ALL
        .into_iter()
        .map(|c| CategoryOption {
            key: c.key(),
            label: c.label(),
        })
        .collect()
}

pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut ctx = Context::new();
    ctx.insert("categories", &categories());
    ctx.insert("id_prefix", &state.config.id_prefix);
    render_template("index.html", &ctx)
}

pub async fn admin_dashboard(State(state): State<Arc<AppState>>) -> Response {
    let store = state.store.as_ref();
    let applications = match intake::list(store, None).await {
        Ok(a) => a,
        Err(e) => return e.into_response(),
    };
    let reviewers = match directory::roster(store).await {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };

    let mut ctx = Context::new();
    ctx.insert("applications", &applications);
    ctx.insert("reviewers", &reviewers);
    render_template("admin.html", &ctx).into_response()
}

#[derive(Serialize)]
struct SlotView {
    key: &'static str,
    number: usize,
    reviewer_name: String,
    form: &'static str,
    status: &'static str,
}

#[derive(Serialize)]
struct FileView {
    key: &'static str,
    label: &'static str,
    name: String,
    url: String,
}

pub async fn admin_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let store = state.store.as_ref();
    let application = match intake::get(store, &id).await {
        Ok(a) => a,
        Err(_) => return Redirect::to("/admin").into_response(),
    };
    let reviews = match capture::list_for_submission(store, &id).await {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };
    let reviewers = match directory::list_all(store).await {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };

    let slots: Vec<SlotView> = Slot::ALL
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            let a = application.slot(slot);
            SlotView {
                key: slot.key(),
                number: i + 1,
                reviewer_name: a.reviewer_name.clone(),
                form: a.form.map(|f| f.as_str()).unwrap_or(""),
                status: a.status.as_str(),
            }
        })
        .collect();

    let files: Vec<FileView> = application
        .files
        .iter()
        .map(|(category, meta)| FileView {
            key: category.key(),
            label: category.label(),
            name: meta.name.clone(),
            url: state.signer.sign(&meta.storage_path).url,
        })
        .collect();

    let forms: Vec<FormOption> = [
        AssignedForm::ProtocolReview,
        AssignedForm::InformedConsent,
        AssignedForm::ExemptionChecklist,
        AssignedForm::ResearchInstruments,
    ]
    .into_iter()
    .map(|f| FormOption {
        value: f.as_str(),
        label: f.label(),
    })
    .collect();

    let suggested_code = application.main_folder.clone().unwrap_or_else(|| {
        tracker::suggest_code(&state.config.id_prefix, current_year(), &application)
    });

    let mut ctx = Context::new();
    ctx.insert("app", &application);
    ctx.insert("slots", &slots);
    ctx.insert("files", &files);
    ctx.insert("reviews", &reviews);
    ctx.insert("reviewers", &reviewers);
    ctx.insert("forms", &forms);
    ctx.insert("suggested_code", &suggested_code);
    render_template("application.html", &ctx).into_response()
}

#[derive(Deserialize)]
pub struct ReviewerQuery {
    code: Option<String>,
}

#[derive(Serialize)]
struct AssignmentView {
    id: String,
    research_title: String,
    principal_investigator: String,
    slot: &'static str,
    form_label: &'static str,
    form_slug: Option<&'static str>,
    status: &'static str,
}

pub async fn reviewer_dashboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReviewerQuery>,
) -> Response {
    let store = state.store.as_ref();
    let mut ctx = Context::new();
    let code = query.code.unwrap_or_default();

    if code.is_empty() {
        ctx.insert("identity", &None::<()>);
        return render_template("reviewer.html", &ctx).into_response();
    }

    let identity = match directory::resolve(store, &code).await {
        Ok(identity) => identity,
        Err(_) => {
            ctx.insert("identity", &None::<()>);
            ctx.insert("error", "Invalid reviewer code. Please try again.");
            return render_template("reviewer.html", &ctx).into_response();
        }
    };

    let assigned = match tracker::find_assigned_to(store, &identity.name).await {
        Ok(a) => a,
        Err(e) => return e.into_response(),
    };
    let rows: Vec<AssignmentView> = assigned
        .iter()
        .flat_map(|a| {
            a.slots.iter().map(move |held| AssignmentView {
                id: a.application.id.clone(),
                research_title: a.application.details.research_title.clone(),
                principal_investigator: a.application.details.principal_investigator.clone(),
                slot: held.slot.key(),
                form_label: held.form.map(|f| f.label()).unwrap_or("Not set"),
                form_slug: held.form.and_then(FormKind::for_assigned).map(|k| k.slug()),
                status: held.status.as_str(),
            })
        })
        .collect();

    ctx.insert("identity", &Some(&identity));
    ctx.insert("assignments", &rows);
    render_template("reviewer.html", &ctx).into_response()
}

#[derive(Deserialize)]
pub struct EditQuery {
    id: Option<String>,
}

pub async fn edit_submission(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EditQuery>,
) -> impl IntoResponse {
    let mut ctx = Context::new();
    let id = query.id.unwrap_or_default();
    ctx.insert("id", &id);

    if !id.trim().is_empty() {
        match intake::get(state.store.as_ref(), id.trim()).await {
            Ok(app) => {
                ctx.insert("editable", &(app.status == crate::domain::ApplicationStatus::Pending));
                ctx.insert("app", &app);
            }
            Err(_) => ctx.insert("error", "No submission found with that ID."),
        }
    }
    render_template("edit_submission.html", &ctx)
}

fn render_template(name: &str, ctx: &Context) -> Html<String> {
    let tera = crate::templates::get_tera();
    let rendered = tera.render(name, ctx).unwrap_or_else(|e| {
        tracing::error!("Template {} failed to render: {:?}", name, e);
        format!("Template error: {}", name)
    });
    Html(rendered)
}
