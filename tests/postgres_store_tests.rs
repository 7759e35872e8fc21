//! Run with `DATABASE_URL=... cargo test -- --ignored`.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use ethics_review::db::{self, PgStore, Store};
use ethics_review::domain::{
    Application, ApplicationDetails, ApplicationStatus, AssignedForm, Assignment, Reviewer, Slot,
};
use ethics_review::error::AppError;

async fn pg_store() -> Arc<PgStore> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
    let pool = db::create_pool(&url).await.unwrap();
    db::run_migrations(pool.as_ref()).await.unwrap();
    Arc::new(PgStore::new(pool))
}

fn unique_year() -> i32 {
    // Far-future years keep runs from colliding with real submissions.
    3000 + (uuid::Uuid::new_v4().as_u128() % 5000) as i32
}

#[tokio::test]
#[ignore]
async fn test_concurrent_allocation_is_unique() {
    let store = pg_store().await;
    let year = unique_year();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.allocate_sequence(year, "SPUP").await.unwrap() })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        assert!(seen.insert(handle.await.unwrap()));
    }
    let min = *seen.iter().min().unwrap();
    let max = *seen.iter().max().unwrap();
    assert_eq!(max - min, 15);
}

fn application(year: i32, sequence: u32) -> Application {
    Application::new(
        format!("SPUP_{}_{:05}_SR_JD", year, sequence),
        ApplicationDetails {
            research_title: "Title".to_string(),
            principal_investigator: "Jane Doe".to_string(),
            course_program: "BSN".to_string(),
            adviser: "Adviser".to_string(),
            email_address: "jane@example.edu".to_string(),
        },
        BTreeMap::new(),
        year,
        sequence as i32,
    )
}

#[tokio::test]
#[ignore]
async fn test_allocation_skips_restored_rows() {
    let store = pg_store().await;
    let year = unique_year();

    assert_eq!(store.allocate_sequence(year, "SPUP").await.unwrap(), 1);
    // A row restored from a backup lands ahead of the counter.
    store.insert_application(&application(year, 50)).await.unwrap();
    assert_eq!(store.allocate_sequence(year, "SPUP").await.unwrap(), 51);
}

#[tokio::test]
#[ignore]
async fn test_application_lifecycle() {
    let store = pg_store().await;
    let year = unique_year();
    let sequence = store.allocate_sequence(year, "SPUP").await.unwrap();
    let app = application(year, sequence);
    let id = app.id.clone();
    store.insert_application(&app).await.unwrap();
    assert!(matches!(
        store.insert_application(&app).await,
        Err(AppError::Conflict(_))
    ));

    let name = format!("Reviewer {}", uuid::Uuid::new_v4());
    let reviewer = Reviewer::new(&name, &uuid::Uuid::new_v4().to_string());
    store.insert_reviewer(&reviewer).await.unwrap();

    let assignment = Assignment::to(&name, AssignedForm::ExemptionChecklist);
    store.set_assignment(&id, Slot::Reviewer1, &assignment).await.unwrap();
    store.set_assignment(&id, Slot::Reviewer3, &assignment).await.unwrap();
    let assigned = store.applications_assigned_to(&name).await.unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].slots_held_by(&name), vec![Slot::Reviewer1, Slot::Reviewer3]);

    store.set_status(&id, ApplicationStatus::Completed).await.unwrap();
    assert!(matches!(
        store.update_details(&id, &app.details).await,
        Err(AppError::Locked(_))
    ));
}
