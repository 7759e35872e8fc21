use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directory entry. `code` is the reviewer's sole access credential.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reviewer {
    pub id: String,
    pub name: String,
    pub code: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Reviewer {
    pub fn new(name: &str, code: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            code: code.to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn identity(&self) -> ReviewerIdentity {
        ReviewerIdentity {
            id: self.id.clone(),
            code: self.code.clone(),
            name: self.name.clone(),
        }
    }

    pub fn summary(&self) -> ReviewerSummary {
        ReviewerSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// A resolved reviewer, passed explicitly into every reviewer-side operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewerIdentity {
    pub id: String,
    pub code: String,
    pub name: String,
}

impl ReviewerIdentity {
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.code.is_empty() && !self.name.is_empty()
    }
}

/// What assignment pickers need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerSummary {
    pub id: String,
    pub name: String,
}

/// Roster entry as read from the seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedReviewer {
    pub name: String,
    pub code: String,
}
