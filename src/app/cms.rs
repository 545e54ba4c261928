use anyhow::Result;
use serde_json::json;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::audit::AuditService;
use crate::app::is_unique_violation;
use crate::domain::cms::{CmsPage, PageStatus};
use crate::infra::db::Db;

pub enum CreatePageOutcome {
    Created(CmsPage),
    NameExists,
}

pub enum UpdatePageOutcome {
    Updated,
    NotFound,
    NameExists,
}

#[derive(Debug, Default)]
pub struct PageListFilter {
    pub search: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<OffsetDateTime>,
    pub end_date: Option<OffsetDateTime>,
}

#[derive(Clone)]
pub struct CmsService {
    db: Db,
}

impl CmsService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Page names are unique, case-sensitively, enforced by the index.
    pub async fn create(
        &self,
        admin_id: Uuid,
        page_name: String,
        content: String,
        status: PageStatus,
    ) -> Result<CreatePageOutcome> {
        let mut tx = self.db.pool().begin().await?;
        let row = sqlx::query(
            "INSERT INTO cms_pages (page_name, content, status) \
             VALUES ($1, $2, $3) \
             RETURNING id, page_name, content, status, created_at",
        )
        .bind(&page_name)
        .bind(&content)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await;

        let row = match row {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => return Ok(CreatePageOutcome::NameExists),
            Err(err) => return Err(err.into()),
        };

        let page = page_from_row(row);

        AuditService::record_with_tx(
            &mut tx,
            Some(admin_id),
            "CREATE_CMS_PAGE",
            json!({
                "page_id": page.id,
                "page_name": page.page_name,
                "status": page.status,
            }),
        )
        .await?;

        tx.commit().await?;
        Ok(CreatePageOutcome::Created(page))
    }

    pub async fn get(&self, page_id: Uuid) -> Result<Option<CmsPage>> {
        let row = sqlx::query(
            "SELECT id, page_name, content, status, created_at FROM cms_pages WHERE id = $1",
        )
        .bind(page_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(page_from_row))
    }

    pub async fn list(
        &self,
        filter: PageListFilter,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<CmsPage>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM cms_pages \
             WHERE ($1::text IS NULL OR page_name ILIKE '%' || $1 || '%' OR content ILIKE '%' || $1 || '%') \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3::timestamptz IS NULL OR created_at >= $3) \
               AND ($4::timestamptz IS NULL OR created_at <= $4)",
        )
        .bind(&filter.search)
        .bind(&filter.status)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_one(self.db.pool())
        .await?;

        let rows = sqlx::query(
            "SELECT id, page_name, content, status, created_at \
             FROM cms_pages \
             WHERE ($1::text IS NULL OR page_name ILIKE '%' || $1 || '%' OR content ILIKE '%' || $1 || '%') \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3::timestamptz IS NULL OR created_at >= $3) \
               AND ($4::timestamptz IS NULL OR created_at <= $4) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5 OFFSET $6",
        )
        .bind(&filter.search)
        .bind(&filter.status)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(limit)
        .bind((page - 1) * limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok((rows.into_iter().map(page_from_row).collect(), total))
    }

    pub async fn update(
        &self,
        admin_id: Uuid,
        page_id: Uuid,
        page_name: Option<String>,
        content: Option<String>,
        status: Option<PageStatus>,
    ) -> Result<UpdatePageOutcome> {
        let mut tx = self.db.pool().begin().await?;
        let result = sqlx::query(
            "UPDATE cms_pages \
             SET page_name = COALESCE($2, page_name), \
                 content = COALESCE($3, content), \
                 status = COALESCE($4, status) \
             WHERE id = $1",
        )
        .bind(page_id)
        .bind(&page_name)
        .bind(&content)
        .bind(status.map(PageStatus::as_str))
        .execute(&mut *tx)
        .await;

        let result = match result {
            Ok(result) => result,
            Err(err) if is_unique_violation(&err) => return Ok(UpdatePageOutcome::NameExists),
            Err(err) => return Err(err.into()),
        };
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(UpdatePageOutcome::NotFound);
        }

        AuditService::record_with_tx(
            &mut tx,
            Some(admin_id),
            "UPDATE_CMS_PAGE",
            json!({
                "page_id": page_id,
                "page_name": page_name,
                "status": status,
            }),
        )
        .await?;

        tx.commit().await?;
        Ok(UpdatePageOutcome::Updated)
    }

    pub async fn delete(&self, admin_id: Uuid, page_id: Uuid) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;
        let result = sqlx::query("DELETE FROM cms_pages WHERE id = $1")
            .bind(page_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        AuditService::record_with_tx(
            &mut tx,
            Some(admin_id),
            "DELETE_CMS_PAGE",
            json!({ "page_id": page_id }),
        )
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

fn page_from_row(row: sqlx::postgres::PgRow) -> CmsPage {
    CmsPage {
        id: row.get("id"),
        page_name: row.get("page_name"),
        content: row.get("content"),
        status: row.get("status"),
        created_at: row.get("created_at"),
    }
}
