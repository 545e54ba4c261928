use anyhow::Result;
use serde_json::json;
use sqlx::Row;
use uuid::Uuid;

use crate::app::audit::AuditService;
use crate::domain::report::{Report, ReportDetail, ReportStatus};
use crate::domain::user::UserIdentity;
use crate::infra::db::Db;

pub enum SubmitReportOutcome {
    Submitted(Report),
    SelfReport,
    AlreadyReported,
    ReportedUserNotFound,
}

pub enum UpdateReportOutcome {
    Updated,
    NotFound,
    AlreadyUpdated,
}

#[derive(Clone)]
pub struct ReportService {
    db: Db,
}

impl ReportService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn submit(
        &self,
        reporter_id: Uuid,
        reported_id: Uuid,
        description: String,
    ) -> Result<SubmitReportOutcome> {
        if reporter_id == reported_id {
            return Ok(SubmitReportOutcome::SelfReport);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(reported_id)
            .fetch_one(self.db.pool())
            .await?;
        if !exists {
            return Ok(SubmitReportOutcome::ReportedUserNotFound);
        }

        // The partial unique index on pending pairs makes the dedup check
        // atomic: a second pending report inserts zero rows.
        let row = sqlx::query(
            "INSERT INTO reports (reporter_id, reported_id, description, status) \
             VALUES ($1, $2, $3, 'PENDING') \
             ON CONFLICT (reporter_id, reported_id) WHERE status = 'PENDING' DO NOTHING \
             RETURNING id, reporter_id, reported_id, description, status, admin_comment, action_taken_by, created_at",
        )
        .bind(reporter_id)
        .bind(reported_id)
        .bind(&description)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(SubmitReportOutcome::Submitted(report_from_row(row))),
            None => Ok(SubmitReportOutcome::AlreadyReported),
        }
    }

    pub async fn get(&self, report_id: Uuid) -> Result<Option<ReportDetail>> {
        let row = sqlx::query(&detail_query("WHERE r.id = $1"))
            .bind(report_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(detail_from_row))
    }

    pub async fn list(
        &self,
        status: Option<String>,
        description: Option<String>,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<ReportDetail>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM reports \
             WHERE ($1::text IS NULL OR status ILIKE '%' || $1 || '%') \
               AND ($2::text IS NULL OR description ILIKE '%' || $2 || '%')",
        )
        .bind(&status)
        .bind(&description)
        .fetch_one(self.db.pool())
        .await?;

        let rows = sqlx::query(&detail_query(
            "WHERE ($1::text IS NULL OR r.status ILIKE '%' || $1 || '%') \
             AND ($2::text IS NULL OR r.description ILIKE '%' || $2 || '%') \
             ORDER BY r.created_at DESC, r.id DESC \
             LIMIT $3 OFFSET $4",
        ))
        .bind(&status)
        .bind(&description)
        .bind(limit)
        .bind((page - 1) * limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok((rows.into_iter().map(detail_from_row).collect(), total))
    }

    /// One-shot transition: only a report still in its initial pending state
    /// can be updated, enforced by the conditional UPDATE.
    pub async fn update_status(
        &self,
        admin_id: Uuid,
        report_id: Uuid,
        status: ReportStatus,
        admin_comment: Option<String>,
    ) -> Result<UpdateReportOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let result = sqlx::query(
            "UPDATE reports \
             SET status = $2, admin_comment = $3, action_taken_by = $4 \
             WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(report_id)
        .bind(status.as_str())
        .bind(&admin_comment)
        .bind(admin_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM reports WHERE id = $1)")
                    .bind(report_id)
                    .fetch_one(self.db.pool())
                    .await?;
            return if exists {
                Ok(UpdateReportOutcome::AlreadyUpdated)
            } else {
                Ok(UpdateReportOutcome::NotFound)
            };
        }

        AuditService::record_with_tx(
            &mut tx,
            Some(admin_id),
            "UPDATE_REPORT_STATUS",
            json!({
                "report_id": report_id,
                "status": status,
                "admin_comment": admin_comment,
            }),
        )
        .await?;

        tx.commit().await?;
        Ok(UpdateReportOutcome::Updated)
    }
}

fn detail_query(tail: &str) -> String {
    format!(
        "SELECT r.id, r.description, r.status, r.admin_comment, r.created_at, \
                reporter.id AS reporter_id, reporter.username AS reporter_username, reporter.email AS reporter_email, \
                reported.id AS reported_id, reported.username AS reported_username, reported.email AS reported_email, \
                actor.id AS actor_id, actor.username AS actor_username, actor.email AS actor_email \
         FROM reports r \
         JOIN users reporter ON reporter.id = r.reporter_id \
         JOIN users reported ON reported.id = r.reported_id \
         LEFT JOIN users actor ON actor.id = r.action_taken_by \
         {}",
        tail
    )
}

fn report_from_row(row: sqlx::postgres::PgRow) -> Report {
    Report {
        id: row.get("id"),
        reporter_id: row.get("reporter_id"),
        reported_id: row.get("reported_id"),
        description: row.get("description"),
        status: row.get("status"),
        admin_comment: row.get("admin_comment"),
        action_taken_by: row.get("action_taken_by"),
        created_at: row.get("created_at"),
    }
}

fn detail_from_row(row: sqlx::postgres::PgRow) -> ReportDetail {
    let action_taken_by = row.get::<Option<Uuid>, _>("actor_id").map(|id| UserIdentity {
        id,
        username: row.get::<Option<String>, _>("actor_username").unwrap_or_default(),
        email: row.get::<Option<String>, _>("actor_email").unwrap_or_default(),
    });
    ReportDetail {
        id: row.get("id"),
        reporter: UserIdentity {
            id: row.get("reporter_id"),
            username: row.get("reporter_username"),
            email: row.get("reporter_email"),
        },
        reported: UserIdentity {
            id: row.get("reported_id"),
            username: row.get("reported_username"),
            email: row.get("reported_email"),
        },
        description: row.get("description"),
        status: row.get("status"),
        admin_comment: row.get("admin_comment"),
        action_taken_by,
        created_at: row.get("created_at"),
    }
}
