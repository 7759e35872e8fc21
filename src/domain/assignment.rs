use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One of the three reviewer positions on an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Reviewer1,
    Reviewer2,
    Reviewer3,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Reviewer1, Slot::Reviewer2, Slot::Reviewer3];

    pub fn key(&self) -> &'static str {
        match self {
            Slot::Reviewer1 => "reviewer1",
            Slot::Reviewer2 => "reviewer2",
            Slot::Reviewer3 => "reviewer3",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "reviewer1" => Ok(Slot::Reviewer1),
            "2" | "reviewer2" => Ok(Slot::Reviewer2),
            "3" | "reviewer3" => Ok(Slot::Reviewer3),
            other => Err(format!("unknown reviewer slot '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SlotStatus {
    #[default]
    Pending,
    #[serde(rename = "In Review")]
    InReview,
    Completed,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Pending => "Pending",
            SlotStatus::InReview => "In Review",
            SlotStatus::Completed => "Completed",
        }
    }
}

impl FromStr for SlotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(SlotStatus::Pending),
            "In Review" => Ok(SlotStatus::InReview),
            "Completed" => Ok(SlotStatus::Completed),
            other => Err(format!("unknown slot status '{}'", other)),
        }
    }
}

/// Questionnaire a reviewer is asked to fill in for their slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignedForm {
    ProtocolReview,
    InformedConsent,
    ExemptionChecklist,
    ResearchInstruments,
}

impl AssignedForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignedForm::ProtocolReview => "protocol_review",
            AssignedForm::InformedConsent => "informed_consent",
            AssignedForm::ExemptionChecklist => "exemption_checklist",
            AssignedForm::ResearchInstruments => "research_instruments",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AssignedForm::ProtocolReview => "Protocol Review Form",
            AssignedForm::InformedConsent => "Informed Consent Checklist",
            AssignedForm::ExemptionChecklist => "Exemption Checklist",
            AssignedForm::ResearchInstruments => "Research Instruments Review Form",
        }
    }
}

impl FromStr for AssignedForm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "protocol_review" => Ok(AssignedForm::ProtocolReview),
            "informed_consent" => Ok(AssignedForm::InformedConsent),
            "exemption_checklist" => Ok(AssignedForm::ExemptionChecklist),
            "research_instruments" => Ok(AssignedForm::ResearchInstruments),
            other => Err(format!("unknown review form '{}'", other)),
        }
    }
}

/// A reviewer binding on one slot. An empty `reviewer_name` means unassigned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub reviewer_name: String,
    #[serde(with = "optional_form")]
    pub form: Option<AssignedForm>,
    pub status: SlotStatus,
}

impl Assignment {
    /// A fresh binding; reassignment always starts over at `Pending`.
    pub fn to(reviewer_name: &str, form: AssignedForm) -> Self {
        Self {
            reviewer_name: reviewer_name.to_string(),
            form: Some(form),
            status: SlotStatus::Pending,
        }
    }

    pub fn is_vacant(&self) -> bool {
        self.reviewer_name.is_empty()
    }
}

// Stored documents use "" for an unassigned form.
mod optional_form {
    use super::*;

    pub fn serialize<S: Serializer>(form: &Option<AssignedForm>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(form.map(|f| f.as_str()).unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<AssignedForm>, D::Error> {
        let raw = String::deserialize(d)?;
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse().map(Some).map_err(serde::de::Error::custom)
    }
}
