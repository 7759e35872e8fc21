use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::assignment::{Assignment, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Pending,
    Completed,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "Pending",
            ApplicationStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ApplicationStatus::Pending),
            "Completed" => Ok(ApplicationStatus::Completed),
            other => Err(format!("unknown application status '{}'", other)),
        }
    }
}

/// The fixed set of documents an applicant may attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileCategory {
    ProtocolReview,
    EndorsementLetter,
    MinutesOfDefense,
    ResearchProposal,
    InformedConsent,
    TechnicalReview,
    Questionnaire,
    CurriculumVitae,
    PaymentProof,
}

impl FileCategory {
    pub const ALL: [FileCategory; 9] = [
        FileCategory::ProtocolReview,
        FileCategory::EndorsementLetter,
        FileCategory::MinutesOfDefense,
        FileCategory::ResearchProposal,
        FileCategory::InformedConsent,
        FileCategory::TechnicalReview,
        FileCategory::Questionnaire,
        FileCategory::CurriculumVitae,
        FileCategory::PaymentProof,
    ];

    /// Key used in multipart field names and in the stored `files` map.
    pub fn key(&self) -> &'static str {
        match self {
            FileCategory::ProtocolReview => "protocolReview",
            FileCategory::EndorsementLetter => "endorsementLetter",
            FileCategory::MinutesOfDefense => "minutesOfDefense",
            FileCategory::ResearchProposal => "researchProposal",
            FileCategory::InformedConsent => "informedConsent",
            FileCategory::TechnicalReview => "technicalReview",
            FileCategory::Questionnaire => "questionnaire",
            FileCategory::CurriculumVitae => "curriculumVitae",
            FileCategory::PaymentProof => "paymentProof",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileCategory::ProtocolReview => "Protocol Review Application",
            FileCategory::EndorsementLetter => "Endorsement Letter/Adviser's Certification",
            FileCategory::MinutesOfDefense => "Minutes of the Proposal Defense",
            FileCategory::ResearchProposal => "Research Proposal/Study Protocol",
            FileCategory::InformedConsent => "Informed Consent of the Study",
            FileCategory::TechnicalReview => "Technical Review Approval",
            FileCategory::Questionnaire => "Questionnaire",
            FileCategory::CurriculumVitae => "Curriculum Vitae of Researchers",
            FileCategory::PaymentProof => "Official Receipt/Proof of payment for ethics review",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

/// Metadata for one uploaded attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub storage_path: String,
}

/// Free-text attributes an applicant supplies and may edit while pending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDetails {
    pub research_title: String,
    pub principal_investigator: String,
    pub course_program: String,
    pub adviser: String,
    pub email_address: String,
}

impl ApplicationDetails {
    /// Trimmed copy, or the name of the first field that is missing.
    pub fn normalized(&self) -> Result<Self, String> {
        let details = Self {
            research_title: self.research_title.trim().to_string(),
            principal_investigator: self.principal_investigator.trim().to_string(),
            course_program: self.course_program.trim().to_string(),
            adviser: self.adviser.trim().to_string(),
            email_address: self.email_address.trim().to_string(),
        };

        let required = [
            ("researchTitle", &details.research_title),
            ("principalInvestigator", &details.principal_investigator),
            ("courseProgram", &details.course_program),
            ("adviser", &details.adviser),
            ("emailAddress", &details.email_address),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.is_empty()) {
            return Err(format!("{} is required", field));
        }
        if !details.email_address.contains('@') {
            return Err("emailAddress must be a valid email address".to_string());
        }

        Ok(details)
    }
}

/// One research-protocol application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    #[serde(flatten)]
    pub details: ApplicationDetails,
    pub files: BTreeMap<FileCategory, FileMeta>,
    pub status: ApplicationStatus,
    pub main_folder: Option<String>,
    pub reviewer1: Assignment,
    pub reviewer2: Assignment,
    pub reviewer3: Assignment,
    pub year: i32,
    pub sequence: i32,
    pub submission_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn new(
        id: String,
        details: ApplicationDetails,
        files: BTreeMap<FileCategory, FileMeta>,
        year: i32,
        sequence: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            details,
            files,
            status: ApplicationStatus::Pending,
            main_folder: None,
            reviewer1: Assignment::default(),
            reviewer2: Assignment::default(),
            reviewer3: Assignment::default(),
            year,
            sequence,
            submission_date: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn slot(&self, slot: Slot) -> &Assignment {
        match slot {
            Slot::Reviewer1 => &self.reviewer1,
            Slot::Reviewer2 => &self.reviewer2,
            Slot::Reviewer3 => &self.reviewer3,
        }
    }

    pub fn slot_mut(&mut self, slot: Slot) -> &mut Assignment {
        match slot {
            Slot::Reviewer1 => &mut self.reviewer1,
            Slot::Reviewer2 => &mut self.reviewer2,
            Slot::Reviewer3 => &mut self.reviewer3,
        }
    }

    /// Slots held by `reviewer_name`, in slot order.
    pub fn slots_held_by(&self, reviewer_name: &str) -> Vec<Slot> {
        if reviewer_name.is_empty() {
            return Vec::new();
        }
        Slot::ALL
            .into_iter()
            .filter(|s| self.slot(*s).reviewer_name == reviewer_name)
            .collect()
    }
}
