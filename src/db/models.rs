use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::BTreeMap;

use crate::domain::{
    Application, ApplicationDetails, Assignment, FileCategory, FileMeta, FormKind, FormRecord,
};
use crate::error::AppError;

#[derive(Debug, FromRow)]
pub struct ApplicationRow {
    pub id: String,
    pub year: i32,
    pub sequence: i32,
    pub research_title: String,
    pub principal_investigator: String,
    pub course_program: String,
    pub adviser: String,
    pub email_address: String,
    pub files: Json<BTreeMap<FileCategory, FileMeta>>,
    pub status: String,
    pub main_folder: Option<String>,
    pub reviewer1_name: String,
    pub reviewer1_form: String,
    pub reviewer1_status: String,
    pub reviewer2_name: String,
    pub reviewer2_form: String,
    pub reviewer2_status: String,
    pub reviewer3_name: String,
    pub reviewer3_form: String,
    pub reviewer3_status: String,
    pub submission_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn assignment(name: String, form: &str, status: &str) -> Result<Assignment, AppError> {
    let form = if form.is_empty() {
        None
    } else {
        Some(form.parse().map_err(AppError::UpstreamFailure)?)
    };
    Ok(Assignment {
        reviewer_name: name,
        form,
        status: status.parse().map_err(AppError::UpstreamFailure)?,
    })
}

impl TryFrom<ApplicationRow> for Application {
    type Error = AppError;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        Ok(Application {
            status: row.status.parse().map_err(AppError::UpstreamFailure)?,
            reviewer1: assignment(row.reviewer1_name, &row.reviewer1_form, &row.reviewer1_status)?,
            reviewer2: assignment(row.reviewer2_name, &row.reviewer2_form, &row.reviewer2_status)?,
            reviewer3: assignment(row.reviewer3_name, &row.reviewer3_form, &row.reviewer3_status)?,
            id: row.id,
            details: ApplicationDetails {
                research_title: row.research_title,
                principal_investigator: row.principal_investigator,
                course_program: row.course_program,
                adviser: row.adviser,
                email_address: row.email_address,
            },
            files: row.files.0,
            main_folder: row.main_folder,
            year: row.year,
            sequence: row.sequence,
            submission_date: row.submission_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct FormRow {
    pub id: String,
    pub spup_rec_protocol_code: String,
    pub reviewer_id: String,
    pub reviewer_code: String,
    pub reviewer_name: String,
    pub outcome: Option<String>,
    pub answers: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl FormRow {
    pub fn into_record(self, kind: FormKind) -> FormRecord {
        FormRecord {
            id: self.id,
            kind,
            spup_rec_protocol_code: self.spup_rec_protocol_code,
            reviewer_id: self.reviewer_id,
            reviewer_code: self.reviewer_code,
            reviewer_name: self.reviewer_name,
            outcome: self.outcome,
            answers: self.answers.0,
            created_at: self.created_at,
        }
    }
}

/// Table holding captured records of one form kind.
pub fn form_table(kind: FormKind) -> &'static str {
    kind.collection()
}
