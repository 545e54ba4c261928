use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::UserIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Blocked,
    Warned,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Pending => "PENDING",
            ReportStatus::Resolved => "RESOLVED",
            ReportStatus::Blocked => "BLOCKED",
            ReportStatus::Warned => "WARNED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "PENDING" => Some(ReportStatus::Pending),
            "RESOLVED" => Some(ReportStatus::Resolved),
            "BLOCKED" => Some(ReportStatus::Blocked),
            "WARNED" => Some(ReportStatus::Warned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub reported_id: Uuid,
    pub description: String,
    pub status: String,
    pub admin_comment: Option<String>,
    pub action_taken_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Report with its soft references resolved for the admin view.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDetail {
    pub id: Uuid,
    pub reporter: UserIdentity,
    pub reported: UserIdentity,
    pub description: String,
    pub status: String,
    pub admin_comment: Option<String>,
    pub action_taken_by: Option<UserIdentity>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
