use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lead {
    pub id: Uuid,
    pub email: String,
    pub phone: String,
    pub name: String,
    pub notes: Option<String>,
    pub max_messages: i32,
    pub message_count: i32,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub next_scheduled_for: Option<NaiveDate>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    /// `message_count` of a freshly admitted lead, before the scheduler runs.
    pub fn draft(id: Uuid, email: String, phone: String, name: String, notes: Option<String>, max_messages: i32, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            email,
            phone,
            name,
            notes,
            max_messages,
            message_count: 0,
            last_sent_at: None,
            next_scheduled_for: None,
            status: LeadStatus::Active.as_str().to_string(),
            created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LeadStatus {
    Active,
    Completed,
    Failed,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Active => "active",
            LeadStatus::Completed => "completed",
            LeadStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LeadStatus::Active),
            "completed" => Ok(LeadStatus::Completed),
            "failed" => Ok(LeadStatus::Failed),
            other => Err(format!("unknown lead status: {other}")),
        }
    }
}

/// The validated-input contract the admission boundary hands the scheduler
/// (spec.md §6, "Admission input contract"). Well-formedness of the fields is
/// the front-end's job, not this crate's.
#[derive(Debug, Deserialize)]
pub struct CreateLeadRequest {
    pub email: String,
    pub phone: String,
    pub name: String,
    pub notes: Option<String>,
    pub max_messages: i32,
}
