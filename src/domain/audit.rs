use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::UserIdentity;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor: Option<UserIdentity>,
    pub action: String,
    pub details: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
