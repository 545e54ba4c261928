use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use sqlx::Row;
use std::collections::HashMap;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::audit::AuditService;
use crate::app::auth::{hash_password, user_from_row};
use crate::app::is_unique_violation;
use crate::domain::badge::BadgeRef;
use crate::domain::user::{Role, User};
use crate::infra::db::Db;

/// Filters accepted by the admin user listing. The admin role itself is
/// always excluded from results.
#[derive(Debug, Default)]
pub struct UserListFilter {
    pub role: Option<String>,
    pub status: Option<String>,
    pub subscription: Option<String>,
    pub badge_id: Option<Uuid>,
    pub search: Option<String>,
    pub start_date: Option<OffsetDateTime>,
    pub end_date: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub struct UserWithBadges {
    #[serde(flatten)]
    pub user: User,
    pub badges: Vec<BadgeRef>,
}

#[derive(Debug, Serialize)]
pub struct UserStatistics {
    pub total_users: i64,
    pub active_users: i64,
    pub inactive_users: i64,
}

#[derive(Debug, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub assigned_badges: Vec<BadgeRef>,
    pub unassigned_badges: Vec<BadgeRef>,
}

pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

pub enum CreateUserOutcome {
    Created(User),
    EmailTaken,
}

pub struct UserUpdate {
    pub subscription: Option<String>,
    pub status: Option<String>,
    pub badge_id: Option<Uuid>,
    pub remove_badge_id: Option<Uuid>,
}

pub enum UpdateUserOutcome {
    Updated,
    UserNotFound,
    BadgeNotFound,
    AlreadyAssigned,
    NotAssigned,
}

pub enum BadgeGrantOutcome {
    Done,
    UserNotFound,
    BadgeNotFound,
    AlreadyAssigned,
    NotAssigned,
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        filter: UserListFilter,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<UserWithBadges>, UserStatistics)> {
        let stats_row = sqlx::query(
            "SELECT count(*) AS total, \
                    count(*) FILTER (WHERE status = 'ACTIVE') AS active, \
                    count(*) FILTER (WHERE status = 'INACTIVE') AS inactive \
             FROM users u \
             WHERE u.role <> 'ADMIN' \
               AND ($1::text IS NULL OR u.role = $1) \
               AND ($2::text IS NULL OR u.status = $2) \
               AND ($3::text IS NULL OR u.subscription = $3) \
               AND ($4::uuid IS NULL OR EXISTS (SELECT 1 FROM user_badges ub WHERE ub.user_id = u.id AND ub.badge_id = $4)) \
               AND ($5::text IS NULL OR u.username ILIKE '%' || $5 || '%' OR u.email ILIKE '%' || $5 || '%') \
               AND ($6::timestamptz IS NULL OR u.created_at >= $6) \
               AND ($7::timestamptz IS NULL OR u.created_at <= $7)",
        )
        .bind(&filter.role)
        .bind(&filter.status)
        .bind(&filter.subscription)
        .bind(filter.badge_id)
        .bind(&filter.search)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_one(self.db.pool())
        .await?;

        let statistics = UserStatistics {
            total_users: stats_row.get("total"),
            active_users: stats_row.get("active"),
            inactive_users: stats_row.get("inactive"),
        };

        let rows = sqlx::query(
            "SELECT u.id, u.username, u.email, u.avatar_key, u.role, u.status, u.subscription, u.mfa_enabled, u.created_at \
             FROM users u \
             WHERE u.role <> 'ADMIN' \
               AND ($1::text IS NULL OR u.role = $1) \
               AND ($2::text IS NULL OR u.status = $2) \
               AND ($3::text IS NULL OR u.subscription = $3) \
               AND ($4::uuid IS NULL OR EXISTS (SELECT 1 FROM user_badges ub WHERE ub.user_id = u.id AND ub.badge_id = $4)) \
               AND ($5::text IS NULL OR u.username ILIKE '%' || $5 || '%' OR u.email ILIKE '%' || $5 || '%') \
               AND ($6::timestamptz IS NULL OR u.created_at >= $6) \
               AND ($7::timestamptz IS NULL OR u.created_at <= $7) \
             ORDER BY u.created_at DESC, u.id DESC \
             LIMIT $8 OFFSET $9",
        )
        .bind(&filter.role)
        .bind(&filter.status)
        .bind(&filter.subscription)
        .bind(filter.badge_id)
        .bind(&filter.search)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(limit)
        .bind((page - 1) * limit)
        .fetch_all(self.db.pool())
        .await?;

        let users: Vec<User> = rows.into_iter().map(user_from_row).collect();
        let ids: Vec<Uuid> = users.iter().map(|user| user.id).collect();
        let mut badge_map = self.badges_for_users(&ids).await?;

        let results = users
            .into_iter()
            .map(|user| {
                let badges = badge_map.remove(&user.id).unwrap_or_default();
                UserWithBadges { user, badges }
            })
            .collect();

        Ok((results, statistics))
    }

    pub async fn create(&self, admin_id: Uuid, new_user: NewUser) -> Result<CreateUserOutcome> {
        let password_hash = hash_password(&new_user.password)?;

        let mut tx = self.db.pool().begin().await?;
        let inserted = sqlx::query(
            "INSERT INTO users (username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, username, email, avatar_key, role, status, subscription, mfa_enabled, created_at",
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(password_hash)
        .bind(new_user.role.as_str())
        .fetch_one(&mut *tx)
        .await;

        let user = match inserted {
            Ok(row) => user_from_row(row),
            Err(err) if is_unique_violation(&err) => {
                tx.rollback().await?;
                return Ok(CreateUserOutcome::EmailTaken);
            }
            Err(err) => return Err(err.into()),
        };

        AuditService::record_with_tx(
            &mut tx,
            Some(admin_id),
            "CREATE_USER",
            json!({ "user_id": user.id, "email": user.email, "role": user.role }),
        )
        .await?;

        tx.commit().await?;
        Ok(CreateUserOutcome::Created(user))
    }

    pub async fn get(&self, user_id: Uuid) -> Result<Option<UserDetail>> {
        let row = sqlx::query(
            "SELECT id, username, email, avatar_key, role, status, subscription, mfa_enabled, created_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let user = match row {
            Some(row) => user_from_row(row),
            None => return Ok(None),
        };

        let assigned = sqlx::query(
            "SELECT b.id, b.title \
             FROM user_badges ub \
             JOIN badges b ON b.id = ub.badge_id \
             WHERE ub.user_id = $1 AND b.is_active",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        let unassigned = sqlx::query(
            "SELECT b.id, b.title \
             FROM badges b \
             WHERE b.is_active \
               AND NOT EXISTS (SELECT 1 FROM user_badges ub WHERE ub.badge_id = b.id AND ub.user_id = $1)",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(Some(UserDetail {
            user,
            assigned_badges: assigned.into_iter().map(badge_ref_from_row).collect(),
            unassigned_badges: unassigned.into_iter().map(badge_ref_from_row).collect(),
        }))
    }

    pub async fn update(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        update: UserUpdate,
    ) -> Result<UpdateUserOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(
            "UPDATE users \
             SET subscription = COALESCE($2, subscription), \
                 status = COALESCE($3, status) \
             WHERE id = $1 \
             RETURNING email",
        )
        .bind(user_id)
        .bind(update.subscription.as_deref().map(str::to_ascii_uppercase))
        .bind(update.status.as_deref().map(str::to_ascii_uppercase))
        .fetch_optional(&mut *tx)
        .await?;

        let email: String = match row {
            Some(row) => row.get("email"),
            None => {
                tx.rollback().await?;
                return Ok(UpdateUserOutcome::UserNotFound);
            }
        };

        if let Some(badge_id) = update.badge_id {
            match grant_badge(&mut tx, user_id, badge_id).await? {
                GrantResult::Granted => {}
                GrantResult::BadgeNotFound => {
                    tx.rollback().await?;
                    return Ok(UpdateUserOutcome::BadgeNotFound);
                }
                GrantResult::AlreadyAssigned => {
                    tx.rollback().await?;
                    return Ok(UpdateUserOutcome::AlreadyAssigned);
                }
            }
        }

        if let Some(badge_id) = update.remove_badge_id {
            let removed = sqlx::query(
                "DELETE FROM user_badges WHERE user_id = $1 AND badge_id = $2",
            )
            .bind(user_id)
            .bind(badge_id)
            .execute(&mut *tx)
            .await?;
            if removed.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(UpdateUserOutcome::NotAssigned);
            }
        }

        AuditService::record_with_tx(
            &mut tx,
            Some(admin_id),
            "UPDATE_USER",
            json!({
                "user_id": user_id,
                "email": email,
                "subscription": update.subscription,
                "status": update.status,
                "badge_id": update.badge_id,
                "remove_badge_id": update.remove_badge_id,
            }),
        )
        .await?;

        tx.commit().await?;
        Ok(UpdateUserOutcome::Updated)
    }

    pub async fn assign_badge(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        badge_id: Uuid,
    ) -> Result<BadgeGrantOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            tx.rollback().await?;
            return Ok(BadgeGrantOutcome::UserNotFound);
        }

        match grant_badge(&mut tx, user_id, badge_id).await? {
            GrantResult::Granted => {}
            GrantResult::BadgeNotFound => {
                tx.rollback().await?;
                return Ok(BadgeGrantOutcome::BadgeNotFound);
            }
            GrantResult::AlreadyAssigned => {
                tx.rollback().await?;
                return Ok(BadgeGrantOutcome::AlreadyAssigned);
            }
        }

        AuditService::record_with_tx(
            &mut tx,
            Some(admin_id),
            "ASSIGN_BADGE",
            json!({ "user_id": user_id, "badge_id": badge_id }),
        )
        .await?;

        tx.commit().await?;
        Ok(BadgeGrantOutcome::Done)
    }

    pub async fn remove_badge(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        badge_id: Uuid,
    ) -> Result<BadgeGrantOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            tx.rollback().await?;
            return Ok(BadgeGrantOutcome::UserNotFound);
        }

        let removed = sqlx::query("DELETE FROM user_badges WHERE user_id = $1 AND badge_id = $2")
            .bind(user_id)
            .bind(badge_id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(BadgeGrantOutcome::NotAssigned);
        }

        AuditService::record_with_tx(
            &mut tx,
            Some(admin_id),
            "REMOVE_BADGE",
            json!({ "user_id": user_id, "badge_id": badge_id }),
        )
        .await?;

        tx.commit().await?;
        Ok(BadgeGrantOutcome::Done)
    }

    /// Batch-fetch active badges for a page of users and index them by owner.
    async fn badges_for_users(&self, user_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<BadgeRef>>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            "SELECT ub.user_id, b.id, b.title \
             FROM user_badges ub \
             JOIN badges b ON b.id = ub.badge_id \
             WHERE ub.user_id = ANY($1) AND b.is_active",
        )
        .bind(user_ids)
        .fetch_all(self.db.pool())
        .await?;

        let mut map: HashMap<Uuid, Vec<BadgeRef>> = HashMap::new();
        for row in rows {
            let owner: Uuid = row.get("user_id");
            map.entry(owner).or_default().push(badge_ref_from_row(row));
        }
        Ok(map)
    }
}

enum GrantResult {
    Granted,
    BadgeNotFound,
    AlreadyAssigned,
}

async fn grant_badge(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    badge_id: Uuid,
) -> Result<GrantResult> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM badges WHERE id = $1)")
        .bind(badge_id)
        .fetch_one(&mut **tx)
        .await?;
    if !exists {
        return Ok(GrantResult::BadgeNotFound);
    }

    // The composite primary key is the idempotence guard.
    let inserted = sqlx::query(
        "INSERT INTO user_badges (user_id, badge_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(badge_id)
    .execute(&mut **tx)
    .await?;

    if inserted.rows_affected() == 0 {
        Ok(GrantResult::AlreadyAssigned)
    } else {
        Ok(GrantResult::Granted)
    }
}

fn badge_ref_from_row(row: sqlx::postgres::PgRow) -> BadgeRef {
    BadgeRef {
        id: row.get("id"),
        title: row.get("title"),
    }
}
