//! Structured reviewer questionnaires.
//!
//! Each form is captured once per submission and never edited afterwards.
//! Field names follow the stored document layout (camelCase).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::application::Application;
use super::assignment::AssignedForm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    ProtocolReview,
    InformedConsent,
    ExemptionChecklist,
}

impl FormKind {
    pub const ALL: [FormKind; 3] = [
        FormKind::ProtocolReview,
        FormKind::InformedConsent,
        FormKind::ExemptionChecklist,
    ];

    /// Table the captured records live in.
    pub fn collection(&self) -> &'static str {
        match self {
            FormKind::ProtocolReview => "protocols",
            FormKind::InformedConsent => "informed_consents",
            FormKind::ExemptionChecklist => "exemption_checklists",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            FormKind::ProtocolReview => "protocol-review",
            FormKind::InformedConsent => "informed-consent",
            FormKind::ExemptionChecklist => "exemption-checklist",
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.assigned_form().as_str()
    }

    /// The slot form value that entitles a reviewer to submit this kind.
    pub fn assigned_form(&self) -> AssignedForm {
        match self {
            FormKind::ProtocolReview => AssignedForm::ProtocolReview,
            FormKind::InformedConsent => AssignedForm::InformedConsent,
            FormKind::ExemptionChecklist => AssignedForm::ExemptionChecklist,
        }
    }

    pub fn for_assigned(form: AssignedForm) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.assigned_form() == form)
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormKind {
    type Err = String;

    /// Accepts both the slug (`protocol-review`) and the slot form value
    /// (`protocol_review`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormKind::ALL
            .into_iter()
            .find(|k| k.slug() == s || k.as_str() == s)
            .ok_or_else(|| format!("unknown review form '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssessmentValue {
    Yes,
    No,
    #[serde(rename = "Unable to assess")]
    UnableToAssess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YesNo {
    Yes,
    No,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentPoint {
    pub value: Option<AssessmentValue>,
    pub comments: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YesNoPoint {
    pub value: Option<YesNo>,
    pub comments: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Recommendation {
    #[default]
    Approved,
    #[serde(rename = "Minor Modifications Required")]
    MinorModifications,
    #[serde(rename = "Major Modifications Required")]
    MajorModifications,
    Disapproved,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Approved => "Approved",
            Recommendation::MinorModifications => "Minor Modifications Required",
            Recommendation::MajorModifications => "Major Modifications Required",
            Recommendation::Disapproved => "Disapproved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExemptionDecision {
    #[serde(rename = "Qualified for Exemption")]
    Qualified,
    #[serde(rename = "Unqualified for Exemption")]
    Unqualified,
}

impl ExemptionDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExemptionDecision::Qualified => "Qualified for Exemption",
            ExemptionDecision::Unqualified => "Unqualified for Exemption",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReviewType {
    #[default]
    #[serde(rename = "Full Review")]
    FullReview,
    Expedited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataAnonymity {
    Anonymized,
    Identifiable,
    #[serde(rename = "De-identified")]
    Deidentified,
}

/// Protocol facts printed at the top of every form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormHeader {
    pub spup_rec_protocol_code: String,
    pub submission_date: String,
    pub protocol_title: String,
    pub study_site: String,
    pub principal_investigator: String,
    pub course_program: String,
    pub sponsor: String,
}

impl FormHeader {
    pub fn prefill(application: &Application) -> Self {
        Self {
            spup_rec_protocol_code: application.id.clone(),
            submission_date: application.created_at.format("%Y-%m-%d").to_string(),
            protocol_title: application.details.research_title.clone(),
            principal_investigator: application.details.principal_investigator.clone(),
            course_program: application.details.course_program.clone(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScientificSoundness {
    pub study_objectives: AssessmentPoint,
    pub literature_review: AssessmentPoint,
    pub research_design: AssessmentPoint,
    pub data_collection: AssessmentPoint,
    pub inclusion_exclusion_criteria: AssessmentPoint,
    pub withdrawal_criteria: AssessmentPoint,
    pub facilities: AssessmentPoint,
    pub investigator_qualification: AssessmentPoint,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EthicalSoundness {
    pub privacy_confidentiality: AssessmentPoint,
    pub conflict_of_interest: AssessmentPoint,
    pub human_participants: AssessmentPoint,
    pub vulnerable_populations: AssessmentPoint,
    pub participant_selection: AssessmentPoint,
    pub risk_benefit_ratio: AssessmentPoint,
    pub informed_consent: AssessmentPoint,
    pub community_considerations: AssessmentPoint,
    pub collaborative_terms: AssessmentPoint,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProtocolAssessmentPoints {
    pub social_value: AssessmentPoint,
    pub scientific_soundness: ScientificSoundness,
    pub ethical_soundness: EthicalSoundness,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProtocolReviewForm {
    #[serde(flatten)]
    pub header: FormHeader,
    pub type_of_review: ReviewType,
    pub assessment_points: ProtocolAssessmentPoints,
    pub recommendation: Recommendation,
    pub justification: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConsentAssessmentPoints {
    pub research_purpose: AssessmentPoint,
    pub consent_procedures: AssessmentPoint,
    pub comprehensive_information: AssessmentPoint,
    pub protocol_consistency: AssessmentPoint,
    pub risks_disclosure: AssessmentPoint,
    pub understandable_language: AssessmentPoint,
    pub local_translation: AssessmentPoint,
    pub vulnerable_protection: AssessmentPoint,
    pub consent_types: AssessmentPoint,
    pub contact_information: AssessmentPoint,
    pub privacy_confidentiality: AssessmentPoint,
    pub participation_inducement: AssessmentPoint,
    pub support_provision: AssessmentPoint,
    pub injury_treatment: AssessmentPoint,
    pub compensation_provision: AssessmentPoint,
    pub participant_responsibilities: AssessmentPoint,
    pub benefits_description: AssessmentPoint,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InformedConsentForm {
    #[serde(flatten)]
    pub header: FormHeader,
    pub assessment_points: ConsentAssessmentPoints,
    pub recommendation: Recommendation,
    pub justification: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResearchType {
    pub quality_assurance: YesNoPoint,
    pub public_service_evaluation: YesNoPoint,
    pub health_surveillance: YesNoPoint,
    pub educational_evaluation: YesNoPoint,
    pub consumer_test: YesNoPoint,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataCollectionMethods {
    pub surveys: YesNoPoint,
    pub interviews: YesNoPoint,
    pub public_observations: YesNoPoint,
    pub existing_data: YesNoPoint,
    pub recordings: YesNoPoint,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExemptionProtocolAssessment {
    pub human_participants: YesNoPoint,
    pub biological_samples: YesNoPoint,
    pub public_data: YesNoPoint,
    pub human_interaction: YesNoPoint,
    pub research_type: ResearchType,
    pub data_collection: DataCollectionMethods,
    pub data_anonymity: Option<DataAnonymity>,
    pub data_anonymity_comments: String,
    pub foreseeable_risk: YesNoPoint,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RiskAssessment {
    pub vulnerable_groups: YesNoPoint,
    pub sensitive_topics: YesNoPoint,
    pub drugs: YesNoPoint,
    pub invasive_procedure: YesNoPoint,
    pub physical_stress: YesNoPoint,
    pub psychological_stress: YesNoPoint,
    pub deception: YesNoPoint,
    pub data_access: YesNoPoint,
    pub conflict_of_interest: YesNoPoint,
    pub other_ethical_dilemmas: YesNoPoint,
    pub blood_sampling: YesNoPoint,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExemptionChecklistForm {
    #[serde(flatten)]
    pub header: FormHeader,
    pub protocol_assessment: ExemptionProtocolAssessment,
    pub risk_assessment: RiskAssessment,
    pub decision: Option<ExemptionDecision>,
    pub justification: String,
}

/// A completed questionnaire of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewForm {
    ProtocolReview(ProtocolReviewForm),
    InformedConsent(InformedConsentForm),
    ExemptionChecklist(ExemptionChecklistForm),
}

impl ReviewForm {
    pub fn from_json(kind: FormKind, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            FormKind::ProtocolReview => ReviewForm::ProtocolReview(serde_json::from_value(value)?),
            FormKind::InformedConsent => ReviewForm::InformedConsent(serde_json::from_value(value)?),
            FormKind::ExemptionChecklist => {
                ReviewForm::ExemptionChecklist(serde_json::from_value(value)?)
            }
        })
    }

    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            ReviewForm::ProtocolReview(f) => serde_json::to_value(f),
            ReviewForm::InformedConsent(f) => serde_json::to_value(f),
            ReviewForm::ExemptionChecklist(f) => serde_json::to_value(f),
        }
    }

    pub fn kind(&self) -> FormKind {
        match self {
            ReviewForm::ProtocolReview(_) => FormKind::ProtocolReview,
            ReviewForm::InformedConsent(_) => FormKind::InformedConsent,
            ReviewForm::ExemptionChecklist(_) => FormKind::ExemptionChecklist,
        }
    }

    pub fn header(&self) -> &FormHeader {
        match self {
            ReviewForm::ProtocolReview(f) => &f.header,
            ReviewForm::InformedConsent(f) => &f.header,
            ReviewForm::ExemptionChecklist(f) => &f.header,
        }
    }

    /// The final recommendation or decision, as shown on the admin view.
    pub fn outcome(&self) -> Option<&'static str> {
        match self {
            ReviewForm::ProtocolReview(f) => Some(f.recommendation.as_str()),
            ReviewForm::InformedConsent(f) => Some(f.recommendation.as_str()),
            ReviewForm::ExemptionChecklist(f) => f.decision.map(|d| d.as_str()),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.header().spup_rec_protocol_code.trim().is_empty() {
            return Err("spupRecProtocolCode is required".to_string());
        }
        if let ReviewForm::ExemptionChecklist(f) = self {
            if f.decision.is_none() {
                return Err("decision is required".to_string());
            }
        }
        Ok(())
    }
}

/// A stored, immutable questionnaire result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormRecord {
    pub id: String,
    pub kind: FormKind,
    pub spup_rec_protocol_code: String,
    pub reviewer_id: String,
    pub reviewer_code: String,
    pub reviewer_name: String,
    pub outcome: Option<String>,
    pub answers: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
