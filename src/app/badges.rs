use anyhow::Result;
use serde_json::json;
use sqlx::Row;
use std::collections::HashMap;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::audit::AuditService;
use crate::domain::badge::{Badge, BadgeMedia, BadgeType, DEFAULT_HTML_TEMPLATE};
use crate::infra::db::Db;
use crate::infra::storage::ObjectStorage;

pub struct NewBadge {
    pub title: String,
    pub badge_type: Option<BadgeType>,
    pub is_active: bool,
    pub icon_key: String,
    pub media: Option<NewBadgeMedia>,
}

pub struct NewBadgeMedia {
    pub media_type: String,
    pub media_key: String,
}

pub struct BadgeUpdate {
    pub title: Option<String>,
    pub badge_type: Option<BadgeType>,
    pub is_active: Option<bool>,
    pub icon_key: Option<String>,
    pub media: Option<NewBadgeMedia>,
}

#[derive(Debug, Default)]
pub struct BadgeListFilter {
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub start_date: Option<OffsetDateTime>,
    pub end_date: Option<OffsetDateTime>,
}

#[derive(Clone)]
pub struct BadgeService {
    db: Db,
    storage: ObjectStorage,
}

impl BadgeService {
    pub fn new(db: Db, storage: ObjectStorage) -> Self {
        Self { db, storage }
    }

    pub async fn create(&self, admin_id: Uuid, new: NewBadge) -> Result<Badge> {
        let html_content = match new.badge_type {
            Some(badge_type) => badge_type.html_template(),
            None => DEFAULT_HTML_TEMPLATE,
        };

        let mut tx = self.db.pool().begin().await?;
        let row = sqlx::query(
            "INSERT INTO badges (title, icon_key, html_content, badge_type, is_active) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, title, icon_key, html_content, badge_type, is_active, created_at",
        )
        .bind(&new.title)
        .bind(&new.icon_key)
        .bind(html_content)
        .bind(new.badge_type.map(BadgeType::as_str))
        .bind(new.is_active)
        .fetch_one(&mut *tx)
        .await?;

        let mut badge = badge_from_row(row);

        if let Some(media) = &new.media {
            sqlx::query(
                "INSERT INTO badge_media (badge_id, media_type, media_key) VALUES ($1, $2, $3)",
            )
            .bind(badge.id)
            .bind(&media.media_type)
            .bind(&media.media_key)
            .execute(&mut *tx)
            .await?;
            badge.media = Some(BadgeMedia {
                media_type: media.media_type.clone(),
                media_key: media.media_key.clone(),
            });
        }

        AuditService::record_with_tx(
            &mut tx,
            Some(admin_id),
            "CREATE_BADGE",
            json!({
                "badge_id": badge.id,
                "title": badge.title,
                "badge_type": badge.badge_type,
            }),
        )
        .await?;

        tx.commit().await?;
        Ok(badge)
    }

    pub async fn get(&self, badge_id: Uuid) -> Result<Option<Badge>> {
        let row = sqlx::query(
            "SELECT b.id, b.title, b.icon_key, b.html_content, b.badge_type, b.is_active, b.created_at, \
                    m.media_type, m.media_key \
             FROM badges b \
             LEFT JOIN badge_media m ON m.badge_id = b.id AND m.is_active \
             WHERE b.id = $1",
        )
        .bind(badge_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(badge_with_media_from_row))
    }

    pub async fn list(
        &self,
        filter: BadgeListFilter,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Badge>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM badges \
             WHERE ($1::text IS NULL OR title ILIKE '%' || $1 || '%') \
               AND ($2::boolean IS NULL OR is_active = $2) \
               AND ($3::timestamptz IS NULL OR created_at >= $3) \
               AND ($4::timestamptz IS NULL OR created_at <= $4)",
        )
        .bind(&filter.search)
        .bind(filter.is_active)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_one(self.db.pool())
        .await?;

        let rows = sqlx::query(
            "SELECT id, title, icon_key, html_content, badge_type, is_active, created_at \
             FROM badges \
             WHERE ($1::text IS NULL OR title ILIKE '%' || $1 || '%') \
               AND ($2::boolean IS NULL OR is_active = $2) \
               AND ($3::timestamptz IS NULL OR created_at >= $3) \
               AND ($4::timestamptz IS NULL OR created_at <= $4) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5 OFFSET $6",
        )
        .bind(&filter.search)
        .bind(filter.is_active)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(limit)
        .bind((page - 1) * limit)
        .fetch_all(self.db.pool())
        .await?;

        let mut badges: Vec<Badge> = rows.into_iter().map(badge_from_row).collect();

        let ids: Vec<Uuid> = badges.iter().map(|badge| badge.id).collect();
        let mut media_map = self.media_for_badges(&ids).await?;
        for badge in &mut badges {
            badge.media = media_map.remove(&badge.id);
        }

        Ok((badges, total))
    }

    pub async fn update(&self, admin_id: Uuid, badge_id: Uuid, update: BadgeUpdate) -> Result<bool> {
        let current = sqlx::query("SELECT icon_key FROM badges WHERE id = $1")
            .bind(badge_id)
            .fetch_optional(self.db.pool())
            .await?;

        let old_icon_key: String = match current {
            Some(row) => row.get("icon_key"),
            None => return Ok(false),
        };

        // Replacing the icon removes the previous object first; a storage
        // failure is logged but does not block the record update.
        if let Some(new_icon) = &update.icon_key {
            if *new_icon != old_icon_key {
                if let Err(err) = self.storage.delete_object(&old_icon_key).await {
                    tracing::warn!(error = ?err, key = %old_icon_key, "failed to delete replaced icon");
                }
            }
        }

        let mut tx = self.db.pool().begin().await?;
        sqlx::query(
            "UPDATE badges \
             SET title = COALESCE($2, title), \
                 badge_type = COALESCE($3, badge_type), \
                 is_active = COALESCE($4, is_active), \
                 icon_key = COALESCE($5, icon_key) \
             WHERE id = $1",
        )
        .bind(badge_id)
        .bind(update.title.as_deref())
        .bind(update.badge_type.map(BadgeType::as_str))
        .bind(update.is_active)
        .bind(update.icon_key.as_deref())
        .execute(&mut *tx)
        .await?;

        if let Some(media) = &update.media {
            sqlx::query(
                "INSERT INTO badge_media (badge_id, media_type, media_key) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (badge_id) \
                 DO UPDATE SET media_type = EXCLUDED.media_type, \
                               media_key = EXCLUDED.media_key, \
                               is_active = TRUE",
            )
            .bind(badge_id)
            .bind(&media.media_type)
            .bind(&media.media_key)
            .execute(&mut *tx)
            .await?;
        }

        AuditService::record_with_tx(
            &mut tx,
            Some(admin_id),
            "UPDATE_BADGE",
            json!({
                "badge_id": badge_id,
                "title": update.title,
                "badge_type": update.badge_type,
                "is_active": update.is_active,
                "icon_replaced": update.icon_key.is_some(),
                "media_replaced": update.media.is_some(),
            }),
        )
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Associated media rows cascade with the badge.
    pub async fn delete(&self, admin_id: Uuid, badge_id: Uuid) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;
        let result = sqlx::query("DELETE FROM badges WHERE id = $1")
            .bind(badge_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        AuditService::record_with_tx(
            &mut tx,
            Some(admin_id),
            "DELETE_BADGE",
            json!({ "badge_id": badge_id }),
        )
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn media_for_badges(&self, badge_ids: &[Uuid]) -> Result<HashMap<Uuid, BadgeMedia>> {
        if badge_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            "SELECT badge_id, media_type, media_key \
             FROM badge_media \
             WHERE badge_id = ANY($1) AND is_active",
        )
        .bind(badge_ids)
        .fetch_all(self.db.pool())
        .await?;

        let mut map = HashMap::new();
        for row in rows {
            let badge_id: Uuid = row.get("badge_id");
            map.insert(
                badge_id,
                BadgeMedia {
                    media_type: row.get("media_type"),
                    media_key: row.get("media_key"),
                },
            );
        }
        Ok(map)
    }
}

fn badge_from_row(row: sqlx::postgres::PgRow) -> Badge {
    Badge {
        id: row.get("id"),
        title: row.get("title"),
        icon_key: row.get("icon_key"),
        html_content: row.get("html_content"),
        badge_type: row.get("badge_type"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        media: None,
    }
}

fn badge_with_media_from_row(row: sqlx::postgres::PgRow) -> Badge {
    let media = row
        .get::<Option<String>, _>("media_type")
        .zip(row.get::<Option<String>, _>("media_key"))
        .map(|(media_type, media_key)| BadgeMedia {
            media_type,
            media_key,
        });
    let mut badge = badge_from_row(row);
    badge.media = media;
    badge
}
