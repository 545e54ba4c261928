use anyhow::Result;
use serde_json::json;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::audit::AuditService;
use crate::domain::contact::{ContactRequest, ContactStatus};
use crate::domain::user::UserIdentity;
use crate::infra::db::Db;

#[derive(Debug, Default)]
pub struct ContactListFilter {
    pub status: Option<String>,
    pub admin_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub search: Option<String>,
    pub start_date: Option<OffsetDateTime>,
    pub end_date: Option<OffsetDateTime>,
}

pub enum RespondOutcome {
    Responded(ContactRequest),
    NotFound,
}

#[derive(Clone)]
pub struct ContactService {
    db: Db,
}

impl ContactService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn submit(&self, user_id: Uuid, subject: String, message: String) -> Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO contact_requests (user_id, subject, message, status) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(user_id)
        .bind(subject)
        .bind(message)
        .bind(ContactStatus::Pending.as_str())
        .fetch_one(self.db.pool())
        .await?;
        Ok(id)
    }

    pub async fn get(&self, contact_id: Uuid) -> Result<Option<ContactRequest>> {
        let row = sqlx::query(&detail_query("WHERE c.id = $1"))
            .bind(contact_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(contact_from_row))
    }

    pub async fn list(
        &self,
        filter: ContactListFilter,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<ContactRequest>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM contact_requests \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::uuid IS NULL OR admin_id = $2) \
               AND ($3::uuid IS NULL OR user_id = $3) \
               AND ($4::text IS NULL OR subject ILIKE '%' || $4 || '%' OR message ILIKE '%' || $4 || '%') \
               AND ($5::timestamptz IS NULL OR created_at >= $5) \
               AND ($6::timestamptz IS NULL OR created_at <= $6)",
        )
        .bind(&filter.status)
        .bind(filter.admin_id)
        .bind(filter.user_id)
        .bind(&filter.search)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_one(self.db.pool())
        .await?;

        let rows = sqlx::query(&detail_query(
            "WHERE ($1::text IS NULL OR c.status = $1) \
             AND ($2::uuid IS NULL OR c.admin_id = $2) \
             AND ($3::uuid IS NULL OR c.user_id = $3) \
             AND ($4::text IS NULL OR c.subject ILIKE '%' || $4 || '%' OR c.message ILIKE '%' || $4 || '%') \
             AND ($5::timestamptz IS NULL OR c.created_at >= $5) \
             AND ($6::timestamptz IS NULL OR c.created_at <= $6) \
             ORDER BY c.created_at DESC, c.id DESC \
             LIMIT $7 OFFSET $8",
        ))
        .bind(&filter.status)
        .bind(filter.admin_id)
        .bind(filter.user_id)
        .bind(&filter.search)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(limit)
        .bind((page - 1) * limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok((rows.into_iter().map(contact_from_row).collect(), total))
    }

    /// Response text, responding admin, status and timestamp land in one
    /// UPDATE.
    pub async fn respond(
        &self,
        admin_id: Uuid,
        contact_id: Uuid,
        response: String,
        status: ContactStatus,
    ) -> Result<RespondOutcome> {
        let mut tx = self.db.pool().begin().await?;
        let row = sqlx::query(
            "UPDATE contact_requests \
             SET admin_response = $2, admin_id = $3, status = $4, responded_at = now() \
             WHERE id = $1 \
             RETURNING subject, message",
        )
        .bind(contact_id)
        .bind(&response)
        .bind(admin_id)
        .bind(status.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let (subject, message): (String, String) = match row {
            Some(row) => (row.get("subject"), row.get("message")),
            None => {
                tx.rollback().await?;
                return Ok(RespondOutcome::NotFound);
            }
        };

        AuditService::record_with_tx(
            &mut tx,
            Some(admin_id),
            "RESPOND_TO_CONTACT_REQUEST",
            json!({
                "contact_id": contact_id,
                "subject": subject,
                "message": message,
                "status": status,
            }),
        )
        .await?;

        tx.commit().await?;

        let contact = self
            .get(contact_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("contact request vanished after update"))?;
        Ok(RespondOutcome::Responded(contact))
    }
}

fn detail_query(tail: &str) -> String {
    format!(
        "SELECT c.id, c.subject, c.message, c.status, c.admin_response, c.admin_id, \
                c.responded_at, c.created_at, \
                u.id AS user_id, u.username AS user_username, u.email AS user_email \
         FROM contact_requests c \
         JOIN users u ON u.id = c.user_id \
         {}",
        tail
    )
}

fn contact_from_row(row: sqlx::postgres::PgRow) -> ContactRequest {
    ContactRequest {
        id: row.get("id"),
        user: UserIdentity {
            id: row.get("user_id"),
            username: row.get("user_username"),
            email: row.get("user_email"),
        },
        subject: row.get("subject"),
        message: row.get("message"),
        status: row.get("status"),
        admin_response: row.get("admin_response"),
        admin_id: row.get("admin_id"),
        responded_at: row.get("responded_at"),
        created_at: row.get("created_at"),
    }
}
