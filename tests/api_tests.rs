use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use ethics_review::config::Config;
use ethics_review::db::MemoryStore;
use ethics_review::routes;
use ethics_review::state::AppState;
use ethics_review::storage::LocalBlobStore;
use ethics_review::workflow::directory;

const BOUNDARY: &str = "ethics-review-test-boundary";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    _dir: tempfile::TempDir,
}

fn test_app() -> TestApp {
    test_app_with(|_| {})
}

fn test_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::for_local(dir.path().to_path_buf());
    configure(&mut config);
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(LocalBlobStore::new(dir.path()));
    let state = Arc::new(AppState::new(Arc::new(config), store.clone(), blobs).unwrap());
    TestApp {
        router: routes::router(state),
        store,
        _dir: dir,
    }
}

fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for (name, file_name, data) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn send_json(router: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    send_raw(router, method, uri, &body.to_string()).await
}

async fn send_raw(router: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, bytes) = send(router, request).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    send(router, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn submit(router: &Router, pi: &str) -> Value {
    let body = multipart_body(
        &[
            ("researchTitle", "Sleep Hygiene and Academic Performance"),
            ("principalInvestigator", pi),
            ("courseProgram", "BS Nursing"),
            ("adviser", "Dr. Adviser"),
            ("emailAddress", "applicant@example.edu"),
        ],
        &[
            ("researchProposal", "proposal.pdf", b"%PDF-1.4 proposal"),
            ("informedConsent", "consent.pdf", b"%PDF-1.4 consent"),
        ],
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/applications")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, bytes) = send(router, request).await;
    assert_eq!(status, StatusCode::CREATED, "{}", String::from_utf8_lossy(&bytes));
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_multipart_submission_roundtrip() {
    let app = test_app();
    let created = submit(&app.router, "Jane Doe").await;
    let id = created["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("SPUP_"));
    assert!(id.ends_with("_00001_SR_JD"));
    assert_eq!(created["status"], "Pending");
    assert_eq!(created["reviewer1"]["reviewer_name"], "");
    assert_eq!(created["files"]["researchProposal"]["name"], "proposal.pdf");

    let (status, bytes) = get(&app.router, &format!("/api/applications/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    let fetched: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(fetched["researchTitle"], "Sleep Hygiene and Academic Performance");

    let (status, bytes) = get(&app.router, "/api/applications?status=Pending").await;
    assert_eq!(status, StatusCode::OK);
    let listed: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_application_is_json_404() {
    let app = test_app();
    let (status, bytes) = get(&app.router, "/api/applications/SPUP_2025_00042_SR_ZZ").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_protocol_code_validation() {
    let app = test_app();
    let created = submit(&app.router, "Jane Doe").await;
    let id = created["id"].as_str().unwrap();
    let uri = format!("/api/applications/{}/protocol-code", id);

    let (status, body) =
        send_json(&app.router, "POST", &uri, json!({"code": "SPUP_2025_00001_SR_AB"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Invalid protocol code format. Please use SPUP_YEAR_NUMBER_SR_INITIALS format"
    );

    let (status, body) =
        send_json(&app.router, "POST", &uri, json!({"code": " SPUP_2025_00001_SR_JD "})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mainFolder"], "SPUP_2025_00001_SR_JD");
}

#[tokio::test]
async fn test_reviewer_flow_over_http() {
    let app = test_app();
    directory::add(app.store.as_ref(), "Dr. Ana Reyes", "DRAR-001")
        .await
        .unwrap();
    let created = submit(&app.router, "Jane Doe").await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = get(&app.router, "/api/reviewer/assignments").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, slot) = send_json(
        &app.router,
        "PUT",
        &format!("/api/applications/{}/slots/1", id),
        json!({"reviewerName": "Dr. Ana Reyes", "form": "informed_consent"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slot["status"], "Pending");

    let (status, login) =
        send_json(&app.router, "POST", "/api/reviewer/login", json!({"code": "DRAR-001"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["name"], "Dr. Ana Reyes");

    let request = Request::builder()
        .uri("/api/reviewer/assignments")
        .header("x-reviewer-code", "DRAR-001")
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    let assigned: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(assigned[0]["application"]["id"], id.as_str());
    assert_eq!(assigned[0]["slots"][0]["form"], "informed_consent");

    let form = json!({"spupRecProtocolCode": id, "recommendation": "Approved"});
    let submit_form = |kind: &str, code: &str| {
        Request::builder()
            .method("POST")
            .uri(format!("/api/forms/{}", kind))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-reviewer-code", code)
            .body(Body::from(form.to_string()))
            .unwrap()
    };

    let (status, _) = send(&app.router, submit_form("protocol-review", "DRAR-001")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app.router, submit_form("informed-consent", "drar-001")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app.router, submit_form("informed-consent", "DRAR-001")).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, bytes) = get(&app.router, &format!("/api/applications/{}/reviews", id)).await;
    assert_eq!(status, StatusCode::OK);
    let reviews: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(reviews[0]["reviewerName"], "Dr. Ana Reyes");
    assert_eq!(reviews[0]["kind"], "informed_consent");
}

#[tokio::test]
async fn test_signed_file_links() {
    let app = test_app();
    let created = submit(&app.router, "Jane Doe").await;
    let id = created["id"].as_str().unwrap();

    let (status, bytes) = get(
        &app.router,
        &format!("/api/applications/{}/files/researchProposal/url", id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let signed: Value = serde_json::from_slice(&bytes).unwrap();
    let url = signed["url"].as_str().unwrap().to_string();

    let (status, bytes) = get(&app.router, &url).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"%PDF-1.4 proposal");

    let tampered = url.replace("proposal.pdf", "consent.pdf");
    let (status, _) = get(&app.router, &tampered).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let unsigned = url.split('?').next().unwrap().to_string();
    let (status, _) = get(&app.router, &unsigned).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get(
        &app.router,
        &format!("/api/applications/{}/files/questionnaire/url", id),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_zip_bundle_contains_every_attachment() {
    let app = test_app();
    let created = submit(&app.router, "Jane Doe").await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/applications/{}/files.zip", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort();
    assert_eq!(names, vec!["consent.pdf", "proposal.pdf"]);
}

#[tokio::test]
async fn test_pages_render() {
    let app = test_app();
    let (status, bytes) = get(&app.router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&bytes).contains("principalInvestigator"));

    let (status, bytes) = get(&app.router, "/reviewer?code=NOPE").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&bytes).contains("Invalid reviewer code"));

    let (status, _) = get(&app.router, "/admin").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_bodies_use_json_error_envelope() {
    let app = test_app();
    let created = submit(&app.router, "Jane Doe").await;
    let id = created["id"].as_str().unwrap();

    // Partial edits are rejected as a whole.
    let (status, body) = send_json(
        &app.router,
        "PUT",
        &format!("/api/applications/{}", id),
        json!({"researchTitle": "x"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");

    let (status, body) = send_raw(&app.router, "POST", "/api/reviewer/login", "not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, bytes) =
        get(&app.router, "/files/applications/x.pdf?expires=soon&signature=ab").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "error");

    let (status, fetched) = get(&app.router, &format!("/api/applications/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    let fetched: Value = serde_json::from_slice(&fetched).unwrap();
    assert_eq!(fetched["researchTitle"], "Sleep Hygiene and Academic Performance");
}

#[tokio::test]
async fn test_slot_status_over_http() {
    let app = test_app();
    directory::add(app.store.as_ref(), "Dr. Ana Reyes", "DRAR-001")
        .await
        .unwrap();
    let created = submit(&app.router, "Jane Doe").await;
    let id = created["id"].as_str().unwrap();
    let uri = format!("/api/applications/{}/slots/2/status", id);

    let (status, body) = send_json(&app.router, "PUT", &uri, json!({"status": "In Review"})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");

    let (status, _) = send_json(
        &app.router,
        "PUT",
        &format!("/api/applications/{}/slots/2", id),
        json!({"reviewerName": "Dr. Ana Reyes", "form": "protocol_review"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, slot) = send_json(&app.router, "PUT", &uri, json!({"status": "In Review"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slot["status"], "In Review");
    assert_eq!(slot["reviewer_name"], "Dr. Ana Reyes");

    let (status, _) = send_json(&app.router, "PUT", &uri, json!({"status": "Done"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(
        &app.router,
        "PUT",
        &format!("/api/applications/{}/slots/4/status", id),
        json!({"status": "Completed"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, bytes) = get(&app.router, &format!("/api/applications/{}", id)).await;
    let fetched: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(fetched["reviewer2"]["status"], "In Review");
    assert_eq!(fetched["reviewer1"]["reviewer_name"], "");
}

#[tokio::test]
async fn test_reviewer_directory_over_http() {
    let app = test_app();

    let (status, reviewer) = send_json(
        &app.router,
        "POST",
        "/api/reviewers",
        json!({"name": " Dr. Ana Reyes ", "code": "DRAR-001"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reviewer["name"], "Dr. Ana Reyes");
    assert_eq!(reviewer["isActive"], true);
    let reviewer_id = reviewer["id"].as_str().unwrap().to_string();

    let (status, body) = send_json(
        &app.router,
        "POST",
        "/api/reviewers",
        json!({"name": "Someone Else", "code": "DRAR-001"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");

    let uri = format!("/api/reviewers/{}/active", reviewer_id);
    let (status, updated) = send_json(&app.router, "PUT", &uri, json!({"active": false})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["isActive"], false);

    let (_, bytes) = get(&app.router, "/api/reviewers").await;
    let listed: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(listed.as_array().unwrap().is_empty());
    let (status, _) =
        send_json(&app.router, "POST", "/api/reviewer/login", json!({"code": "DRAR-001"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app.router, "PUT", &uri, json!({"active": true})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) =
        send_json(&app.router, "POST", "/api/reviewer/login", json!({"code": "DRAR-001"})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(
        &app.router,
        "PUT",
        "/api/reviewers/no-such-id/active",
        json!({"active": false}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_init_db_seeds_once() {
    let app = test_app_with(|config| {
        let seed = config.upload_folder.join("reviewers.json");
        std::fs::write(
            &seed,
            r#"[{"name": "Dr. Ana Reyes", "code": "DRAR-001"}, {"name": "Mr. Ben Cruz", "code": "MRBC-002"}]"#,
        )
        .unwrap();
        config.reviewer_seed_file = seed;
    });

    let (status, body) = send_json(&app.router, "POST", "/api/admin/init-db", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["seeded"], true);

    let (status, body) = send_json(&app.router, "POST", "/api/admin/init-db", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["seeded"], false);

    let (_, bytes) = get(&app.router, "/api/reviewers").await;
    let listed: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_init_db_without_seed_file_is_not_found() {
    let app = test_app_with(|config| {
        config.reviewer_seed_file = config.upload_folder.join("missing.json");
    });
    let (status, body) = send_json(&app.router, "POST", "/api/admin/init-db", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_form_prefill_over_http() {
    let app = test_app();
    let created = submit(&app.router, "Jane Doe").await;
    let id = created["id"].as_str().unwrap();

    let (status, bytes) = get(&app.router, &format!("/api/forms/protocol-review/prefill/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    let header: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(header["spupRecProtocolCode"], id);
    assert_eq!(header["protocolTitle"], "Sleep Hygiene and Academic Performance");
    assert_eq!(header["principalInvestigator"], "Jane Doe");
    assert_eq!(header["studySite"], "");

    let (status, _) = get(&app.router, &format!("/api/forms/research-instruments/prefill/{}", id)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app.router, "/api/forms/protocol-review/prefill/SPUP_2025_00099_SR_ZZ").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_complete_locks_details() {
    let app = test_app();
    let created = submit(&app.router, "Jane Doe").await;
    let id = created["id"].as_str().unwrap();

    let (status, completed) = send_json(
        &app.router,
        "POST",
        &format!("/api/applications/{}/complete", id),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "Completed");

    let (status, body) = send_json(
        &app.router,
        "PUT",
        &format!("/api/applications/{}", id),
        json!({
            "researchTitle": "Revised Title",
            "principalInvestigator": "Jane Doe",
            "courseProgram": "BS Nursing",
            "adviser": "Dr. Adviser",
            "emailAddress": "applicant@example.edu"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");

    let (status, _) = send_json(
        &app.router,
        "POST",
        "/api/applications/SPUP_2025_00099_SR_ZZ/complete",
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
