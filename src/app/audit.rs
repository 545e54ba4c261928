use anyhow::Result;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::audit::AuditEntry;
use crate::domain::user::UserIdentity;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct AuditService {
    db: Db,
}

impl AuditService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn record(
        &self,
        actor_id: Option<Uuid>,
        action: &str,
        details: serde_json::Value,
    ) -> Result<()> {
        sqlx::query("INSERT INTO audit_log (actor_id, action, details) VALUES ($1, $2, $3)")
            .bind(actor_id)
            .bind(action)
            .bind(details)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Best-effort write: a failed audit insert never fails the mutation that
    /// triggered it.
    pub async fn record_best_effort(
        &self,
        actor_id: Option<Uuid>,
        action: &str,
        details: serde_json::Value,
    ) {
        if let Err(err) = self.record(actor_id, action, details).await {
            tracing::warn!(error = ?err, action, "failed to write audit entry");
        }
    }

    pub async fn record_with_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        actor_id: Option<Uuid>,
        action: &str,
        details: serde_json::Value,
    ) -> Result<()> {
        sqlx::query("INSERT INTO audit_log (actor_id, action, details) VALUES ($1, $2, $3)")
            .bind(actor_id)
            .bind(action)
            .bind(details)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn list(
        &self,
        search: Option<String>,
        start_date: Option<OffsetDateTime>,
        end_date: Option<OffsetDateTime>,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<AuditEntry>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM audit_log \
             WHERE ($1::text IS NULL OR action ILIKE '%' || $1 || '%') \
               AND ($2::timestamptz IS NULL OR created_at >= $2) \
               AND ($3::timestamptz IS NULL OR created_at <= $3)",
        )
        .bind(&search)
        .bind(start_date)
        .bind(end_date)
        .fetch_one(self.db.pool())
        .await?;

        let rows = sqlx::query(
            "SELECT a.id, a.actor_id, a.action, a.details, a.created_at, \
                    u.username AS actor_username, u.email AS actor_email \
             FROM audit_log a \
             LEFT JOIN users u ON u.id = a.actor_id \
             WHERE ($1::text IS NULL OR a.action ILIKE '%' || $1 || '%') \
               AND ($2::timestamptz IS NULL OR a.created_at >= $2) \
               AND ($3::timestamptz IS NULL OR a.created_at <= $3) \
             ORDER BY a.created_at DESC, a.id DESC \
             LIMIT $4 OFFSET $5",
        )
        .bind(&search)
        .bind(start_date)
        .bind(end_date)
        .bind(limit)
        .bind((page - 1) * limit)
        .fetch_all(self.db.pool())
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let actor = match row.get::<Option<Uuid>, _>("actor_id") {
                Some(id) => Some(UserIdentity {
                    id,
                    username: row.get::<Option<String>, _>("actor_username").unwrap_or_default(),
                    email: row.get::<Option<String>, _>("actor_email").unwrap_or_default(),
                }),
                None => None,
            };
            entries.push(AuditEntry {
                id: row.get("id"),
                actor,
                action: row.get("action"),
                details: row.get("details"),
                created_at: row.get("created_at"),
            });
        }

        Ok((entries, total))
    }
}
