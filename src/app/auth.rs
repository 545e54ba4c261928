use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use rand::Rng;
use serde_json::json;
use sha2::{Digest, Sha256};
use sqlx::Row;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app::audit::AuditService;
use crate::app::is_unique_violation;
use crate::domain::user::{Role, User};
use crate::infra::db::Db;
use crate::infra::mailer::Mailer;

const OTP_TTL_MINUTES: i64 = 10;
const RESET_TOKEN_TTL_HOURS: i64 = 1;

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: OffsetDateTime,
    pub refresh_expires_at: OffsetDateTime,
}

pub enum LoginOutcome {
    /// Credentials and role check out; tokens are issued by MFA verification.
    Accepted { user_id: Uuid, role: Role },
    NotFound,
    InvalidPassword,
    NotAdmin,
}

pub enum MfaSetupOutcome {
    Sent { email: String },
    NotFound,
}

pub enum MfaVerifyOutcome {
    Verified { tokens: TokenPair, role: Role },
    InvalidCode,
    ExpiredCode,
    NotFound,
}

pub enum ChangePasswordOutcome {
    Changed,
    InvalidPassword,
    NotFound,
}

pub enum UpdateProfileOutcome {
    Updated,
    EmailTaken,
    NotFound,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    access_key: [u8; 32],
    refresh_key: [u8; 32],
    access_ttl_minutes: u64,
    refresh_ttl_days: u64,
}

impl AuthService {
    pub fn new(
        db: Db,
        access_key: [u8; 32],
        refresh_key: [u8; 32],
        access_ttl_minutes: u64,
        refresh_ttl_days: u64,
    ) -> Self {
        Self {
            db,
            access_key,
            refresh_key,
            access_ttl_minutes,
            refresh_ttl_days,
        }
    }

    /// Seed the back-office admin account at startup if it does not exist.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<()> {
        let password_hash = hash_password(password)?;
        sqlx::query(
            "INSERT INTO users (username, email, password_hash, role) \
             VALUES ('admin', $1, $2, 'ADMIN') \
             ON CONFLICT (email) DO NOTHING",
        )
        .bind(email)
        .bind(password_hash)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let row = sqlx::query("SELECT id, password_hash, role FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self.db.pool())
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(LoginOutcome::NotFound),
        };

        let user_id: Uuid = row.get("id");
        let password_hash: String = row.get("password_hash");
        if password_hash.is_empty() || !verify_password(password, &password_hash)? {
            return Ok(LoginOutcome::InvalidPassword);
        }

        let role: String = row.get("role");
        let role = Role::parse(&role).ok_or_else(|| anyhow!("unknown role: {}", role))?;
        if role != Role::Admin {
            return Ok(LoginOutcome::NotAdmin);
        }

        AuditService::new(self.db.clone())
            .record_best_effort(Some(user_id), "LOGIN", json!({ "email": email }))
            .await;

        Ok(LoginOutcome::Accepted { user_id, role })
    }

    pub async fn setup_mfa(&self, user_id: Uuid, mailer: &Mailer) -> Result<MfaSetupOutcome> {
        let otp = generate_otp();
        let expires = OffsetDateTime::now_utc() + Duration::minutes(OTP_TTL_MINUTES);

        // MFA stays disabled until the code is verified.
        let row = sqlx::query(
            "UPDATE users \
             SET mfa_enabled = FALSE, mfa_method = 'EMAIL', mfa_otp = $2, mfa_otp_expires = $3 \
             WHERE id = $1 \
             RETURNING email",
        )
        .bind(user_id)
        .bind(&otp)
        .bind(expires)
        .fetch_optional(self.db.pool())
        .await?;

        let email: String = match row {
            Some(row) => row.get("email"),
            None => return Ok(MfaSetupOutcome::NotFound),
        };

        mailer.send_mfa_code(&email, &otp, expires).await?;
        Ok(MfaSetupOutcome::Sent { email })
    }

    pub async fn verify_mfa(&self, user_id: Uuid, otp: &str) -> Result<MfaVerifyOutcome> {
        // Consume the code in one conditional update so a matching, unexpired
        // OTP succeeds exactly once.
        let row = sqlx::query(
            "UPDATE users \
             SET mfa_enabled = TRUE, mfa_method = 'EMAIL', mfa_otp = NULL, mfa_otp_expires = NULL \
             WHERE id = $1 AND mfa_otp = $2 AND mfa_otp_expires > now() \
             RETURNING role",
        )
        .bind(user_id)
        .bind(otp)
        .fetch_optional(self.db.pool())
        .await?;

        if let Some(row) = row {
            let role: String = row.get("role");
            let role = Role::parse(&role).ok_or_else(|| anyhow!("unknown role: {}", role))?;
            let tokens = self.issue_token_pair(user_id, role).await?;

            AuditService::new(self.db.clone())
                .record_best_effort(Some(user_id), "VERIFY_MFA_CODE", json!({ "role": role }))
                .await;

            return Ok(MfaVerifyOutcome::Verified { tokens, role });
        }

        // A matching but stale code is cleared so it cannot be replayed.
        let cleared = sqlx::query(
            "UPDATE users \
             SET mfa_otp = NULL, mfa_otp_expires = NULL \
             WHERE id = $1 AND mfa_otp = $2 AND mfa_otp_expires <= now()",
        )
        .bind(user_id)
        .bind(otp)
        .execute(self.db.pool())
        .await?;
        if cleared.rows_affected() > 0 {
            return Ok(MfaVerifyOutcome::ExpiredCode);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;
        if exists {
            Ok(MfaVerifyOutcome::InvalidCode)
        } else {
            Ok(MfaVerifyOutcome::NotFound)
        }
    }

    /// Always reports success to the caller; only an existing account gets a
    /// token and an email.
    pub async fn forgot_password(
        &self,
        email: &str,
        mailer: &Mailer,
        frontend_base_url: &str,
    ) -> Result<()> {
        let row = sqlx::query("SELECT id, role FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self.db.pool())
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(()),
        };
        let user_id: Uuid = row.get("id");
        let role: String = row.get("role");

        let token = generate_reset_token();
        let expires = OffsetDateTime::now_utc() + Duration::hours(RESET_TOKEN_TTL_HOURS);

        sqlx::query(
            "UPDATE users SET reset_token_hash = $2, reset_token_expires = $3 WHERE id = $1",
        )
        .bind(user_id)
        .bind(hash_token(&token))
        .bind(expires)
        .execute(self.db.pool())
        .await?;

        let reset_url = format!("{}/reset-password?token={}", frontend_base_url, token);
        mailer.send_password_reset(email, &reset_url).await?;

        AuditService::new(self.db.clone())
            .record_best_effort(
                Some(user_id),
                "FORGOT_PASSWORD",
                json!({ "email": email, "role": role }),
            )
            .await;

        Ok(())
    }

    /// Returns false when the token is unknown or expired.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<bool> {
        let password_hash = hash_password(new_password)?;
        let row = sqlx::query(
            "UPDATE users \
             SET password_hash = $2, reset_token_hash = NULL, reset_token_expires = NULL \
             WHERE reset_token_hash = $1 AND reset_token_expires > now() \
             RETURNING id, email, role",
        )
        .bind(hash_token(token))
        .bind(password_hash)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(false),
        };

        let user_id: Uuid = row.get("id");
        let email: String = row.get("email");
        let role: String = row.get("role");
        AuditService::new(self.db.clone())
            .record_best_effort(
                Some(user_id),
                "RESET_PASSWORD",
                json!({ "email": email, "role": role }),
            )
            .await;

        Ok(true)
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<ChangePasswordOutcome> {
        let row = sqlx::query("SELECT password_hash, email, role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(ChangePasswordOutcome::NotFound),
        };

        let password_hash: String = row.get("password_hash");
        if !verify_password(current_password, &password_hash)? {
            return Ok(ChangePasswordOutcome::InvalidPassword);
        }

        let new_hash = hash_password(new_password)?;
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(new_hash)
            .execute(self.db.pool())
            .await?;

        let email: String = row.get("email");
        let role: String = row.get("role");
        AuditService::new(self.db.clone())
            .record_best_effort(
                Some(user_id),
                "CHANGE_PASSWORD",
                json!({ "email": email, "role": role }),
            )
            .await;

        Ok(ChangePasswordOutcome::Changed)
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, avatar_key, role, status, subscription, mfa_enabled, created_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(user_from_row))
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        username: Option<String>,
        email: Option<String>,
        avatar_key: Option<String>,
    ) -> Result<UpdateProfileOutcome> {
        let result = sqlx::query(
            "UPDATE users \
             SET username = COALESCE($2, username), \
                 email = COALESCE($3, email), \
                 avatar_key = COALESCE($4, avatar_key) \
             WHERE id = $1",
        )
        .bind(user_id)
        .bind(&username)
        .bind(&email)
        .bind(&avatar_key)
        .execute(self.db.pool())
        .await;

        let result = match result {
            Ok(result) => result,
            Err(err) if is_unique_violation(&err) => return Ok(UpdateProfileOutcome::EmailTaken),
            Err(err) => return Err(err.into()),
        };
        if result.rows_affected() == 0 {
            return Ok(UpdateProfileOutcome::NotFound);
        }

        AuditService::new(self.db.clone())
            .record_best_effort(
                Some(user_id),
                "UPDATE_PROFILE",
                json!({ "username": username, "email": email, "avatar_key": avatar_key }),
            )
            .await;

        Ok(UpdateProfileOutcome::Updated)
    }

    pub async fn authenticate_access_token(&self, token: &str) -> Result<Option<AuthSession>> {
        let claims = match self.decrypt_claims(token, self.access_key)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        if !has_token_type(&claims, "access") {
            return Ok(None);
        }
        let user_id = claim_uuid(&claims, "sub")?;
        let role = claims
            .get_claim("role")
            .and_then(|value| value.as_str())
            .and_then(Role::parse);
        let role = match role {
            Some(role) => role,
            None => return Ok(None),
        };
        Ok(Some(AuthSession { user_id, role }))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Option<(TokenPair, Role)>> {
        let (user_id, refresh_id) = match self.verify_refresh_token(refresh_token) {
            Ok((user_id, refresh_id)) => (user_id, refresh_id),
            Err(_) => return Ok(None),
        };
        let token_hash = hash_token(refresh_token);

        let mut tx = self.db.pool().begin().await?;
        let row = sqlx::query(
            "SELECT u.role \
             FROM refresh_tokens t \
             JOIN users u ON u.id = t.user_id \
             WHERE t.id = $1 \
               AND t.user_id = $2 \
               AND t.token_hash = $3 \
               AND t.revoked_at IS NULL \
               AND t.expires_at > now()",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await?;

        let role = match row {
            Some(row) => {
                let role: String = row.get("role");
                Role::parse(&role).ok_or_else(|| anyhow!("unknown role: {}", role))?
            }
            None => {
                tx.rollback().await?;
                return Ok(None);
            }
        };

        let tokens = self.issue_token_pair_with_tx(user_id, role, &mut tx).await?;
        sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked_at = now(), replaced_by = $1 \
             WHERE id = $2 AND revoked_at IS NULL",
        )
        .bind(tokens.refresh_id)
        .bind(refresh_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some((tokens.pair, role)))
    }

    pub async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<bool> {
        let (user_id, refresh_id) = match self.verify_refresh_token(refresh_token) {
            Ok((user_id, refresh_id)) => (user_id, refresh_id),
            Err(_) => return Ok(false),
        };
        let token_hash = hash_token(refresh_token);

        let result = sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked_at = now() \
             WHERE id = $1 AND user_id = $2 AND token_hash = $3 AND revoked_at IS NULL",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(token_hash)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn issue_token_pair(&self, user_id: Uuid, role: Role) -> Result<TokenPair> {
        let mut tx = self.db.pool().begin().await?;
        let tokens = self.issue_token_pair_with_tx(user_id, role, &mut tx).await?;
        tx.commit().await?;
        Ok(tokens.pair)
    }

    async fn issue_token_pair_with_tx(
        &self,
        user_id: Uuid,
        role: Role,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<IssuedTokens> {
        let (access_claims, access_expires_at) = self.build_access_claims(user_id, role)?;
        let access_key = SymmetricKey::<V4>::from(&self.access_key)?;
        let access_token = local::encrypt(&access_key, &access_claims, None, None)?;

        let refresh_id = Uuid::new_v4();
        let (refresh_claims, refresh_expires_at) =
            self.build_refresh_claims(user_id, refresh_id)?;
        let refresh_key = SymmetricKey::<V4>::from(&self.refresh_key)?;
        let refresh_token = local::encrypt(&refresh_key, &refresh_claims, None, None)?;
        let token_hash = hash_token(&refresh_token);

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(token_hash)
        .bind(refresh_expires_at)
        .execute(&mut **tx)
        .await?;

        Ok(IssuedTokens {
            refresh_id,
            pair: TokenPair {
                access_token,
                refresh_token,
                access_expires_at,
                refresh_expires_at,
            },
        })
    }

    fn build_access_claims(&self, user_id: Uuid, role: Role) -> Result<(Claims, OffsetDateTime)> {
        let duration = std::time::Duration::from_secs(self.access_ttl_minutes * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer("halo-admin")?;
        claims.audience("halo-admin")?;
        claims.subject(&user_id.to_string())?;
        claims.add_additional("typ", "access")?;
        claims.add_additional("role", role.as_str())?;
        let expires_at =
            OffsetDateTime::now_utc() + Duration::minutes(self.access_ttl_minutes as i64);
        Ok((claims, expires_at))
    }

    fn build_refresh_claims(
        &self,
        user_id: Uuid,
        refresh_id: Uuid,
    ) -> Result<(Claims, OffsetDateTime)> {
        let duration = std::time::Duration::from_secs(self.refresh_ttl_days * 24 * 60 * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer("halo-admin")?;
        claims.audience("halo-admin")?;
        claims.subject(&user_id.to_string())?;
        claims.token_identifier(&refresh_id.to_string())?;
        claims.add_additional("typ", "refresh")?;
        let expires_at = OffsetDateTime::now_utc() + Duration::days(self.refresh_ttl_days as i64);
        Ok((claims, expires_at))
    }

    fn verify_refresh_token(&self, token: &str) -> Result<(Uuid, Uuid)> {
        let claims = match self.decrypt_claims(token, self.refresh_key)? {
            Some(claims) => claims,
            None => return Err(anyhow!("invalid refresh token")),
        };
        if !has_token_type(&claims, "refresh") {
            return Err(anyhow!("invalid refresh token"));
        }
        let user_id = claim_uuid(&claims, "sub")?;
        let refresh_id = claim_uuid(&claims, "jti")?;
        Ok((user_id, refresh_id))
    }

    fn decrypt_claims(&self, token: &str, key_bytes: [u8; 32]) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&key_bytes)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with("halo-admin");
        rules.validate_audience_with("halo-admin");

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }
}

struct IssuedTokens {
    refresh_id: Uuid,
    pair: TokenPair,
}

pub(crate) fn user_from_row(row: sqlx::postgres::PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        avatar_key: row.get("avatar_key"),
        role: row.get("role"),
        status: row.get("status"),
        subscription: row.get("subscription"),
        mfa_enabled: row.get("mfa_enabled"),
        created_at: row.get("created_at"),
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(hash).map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    code.to_string()
}

fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

fn claim_uuid(claims: &Claims, name: &str) -> Result<Uuid> {
    let value = claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(Uuid::parse_str(value)?)
}

fn has_token_type(claims: &Claims, expected: &str) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .map(|value| value == expected)
        .unwrap_or(false)
}
