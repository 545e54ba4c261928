use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::audit::AuditService;
use crate::app::auth::{
    AuthService, ChangePasswordOutcome, LoginOutcome, MfaSetupOutcome, MfaVerifyOutcome, TokenPair,
    UpdateProfileOutcome,
};
use crate::app::badges::{BadgeListFilter, BadgeService, BadgeUpdate, NewBadge, NewBadgeMedia};
use crate::app::cms::{CmsService, CreatePageOutcome, PageListFilter, UpdatePageOutcome};
use crate::app::contact::{ContactListFilter, ContactService, RespondOutcome};
use crate::app::reports::{ReportService, SubmitReportOutcome, UpdateReportOutcome};
use crate::app::uploads::{UploadIntent, UploadOutcome, UploadService};
use crate::app::users::{
    BadgeGrantOutcome, CreateUserOutcome, NewUser, UpdateUserOutcome, UserListFilter, UserService,
    UserStatistics, UserUpdate, UserWithBadges,
};
use crate::domain::badge::BadgeType;
use crate::domain::cms::PageStatus;
use crate::domain::contact::ContactStatus;
use crate::domain::report::ReportStatus;
use crate::domain::user::{Role, Subscription, UserStatus};
use crate::http::envelope::{success, ApiResponse, Paged, Pagination};
use crate::http::{AdminUser, AppError, AuthUser};
use crate::AppState;

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.paseto_refresh_key,
        state.access_ttl_minutes,
        state.refresh_ttl_days,
    )
}

fn page_params(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(DEFAULT_PAGE).max(1);
    let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    (page, limit)
}

fn parse_date(value: Option<String>, field: &str) -> Result<Option<OffsetDateTime>, AppError> {
    let Some(value) = value else {
        return Ok(None);
    };
    OffsetDateTime::parse(&value, &Rfc3339)
        .map(Some)
        .map_err(|_| AppError::bad_request(format!("{} must be an RFC 3339 timestamp", field)))
}

fn validate_new_password(password: &str) -> Result<(), AppError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "password must be at least 8 characters",
        ));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "password must be at most 128 characters",
        ));
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_lower && has_upper && has_digit) {
        return Err(AppError::bad_request(
            "password must contain an uppercase letter, a lowercase letter and a digit",
        ));
    }
    Ok(())
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let status = if db { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub id: Uuid,
    pub role: String,
    pub mfa_required: bool,
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
    pub role: String,
}

impl AuthTokenResponse {
    fn new(tokens: TokenPair, role: Role) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
            role: role.as_str().to_string(),
        }
    }
}

/// Password check plus role gate. Tokens are only issued once the emailed
/// OTP is verified.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, AppError> {
    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "password must be at most 128 characters",
        ));
    }

    let service = auth_service(&state);
    let outcome = service
        .login(&payload.email, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    let (user_id, role) = match outcome {
        LoginOutcome::Accepted { user_id, role } => (user_id, role),
        LoginOutcome::NotFound => return Err(AppError::not_found("User not found")),
        LoginOutcome::InvalidPassword => return Err(AppError::unauthorized("Invalid credentials")),
        LoginOutcome::NotAdmin => {
            return Err(AppError::forbidden(
                "you are not authorized to perform this action",
            ))
        }
    };

    match service.setup_mfa(user_id, &state.mailer).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %user_id, "failed to send login code");
        AppError::internal("failed to send login code")
    })? {
        MfaSetupOutcome::Sent { .. } => {}
        MfaSetupOutcome::NotFound => return Err(AppError::not_found("User not found")),
    }

    Ok(success(
        LoginResponse {
            id: user_id,
            role: role.as_str().to_string(),
            mfa_required: true,
        },
        "OTP sent to your email",
    ))
}

#[derive(Deserialize)]
pub struct MfaSetupRequest {
    pub user_id: Uuid,
}

pub async fn setup_mfa(
    State(state): State<AppState>,
    Json(payload): Json<MfaSetupRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let service = auth_service(&state);
    let outcome = service
        .setup_mfa(payload.user_id, &state.mailer)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %payload.user_id, "failed to send OTP");
            AppError::internal("failed to send OTP")
        })?;

    match outcome {
        MfaSetupOutcome::Sent { .. } => Ok(success(Value::Null, "OTP sent to your email")),
        MfaSetupOutcome::NotFound => Err(AppError::not_found("User not found")),
    }
}

#[derive(Deserialize)]
pub struct MfaVerifyRequest {
    pub user_id: Uuid,
    pub otp: String,
}

pub async fn verify_mfa(
    State(state): State<AppState>,
    Json(payload): Json<MfaVerifyRequest>,
) -> Result<Json<ApiResponse<AuthTokenResponse>>, AppError> {
    if payload.otp.trim().is_empty() {
        return Err(AppError::bad_request("otp is required"));
    }

    let service = auth_service(&state);
    let outcome = service
        .verify_mfa(payload.user_id, payload.otp.trim())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %payload.user_id, "failed to verify OTP");
            AppError::internal("failed to verify OTP")
        })?;

    match outcome {
        MfaVerifyOutcome::Verified { tokens, role } => Ok(success(
            AuthTokenResponse::new(tokens, role),
            "Login successful",
        )),
        MfaVerifyOutcome::InvalidCode => Err(AppError::unauthorized("Invalid OTP")),
        MfaVerifyOutcome::ExpiredCode => Err(AppError::unauthorized("OTP has expired")),
        MfaVerifyOutcome::NotFound => Err(AppError::not_found("User not found")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<AuthTokenResponse>>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = auth_service(&state);
    let tokens = service
        .refresh(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?;

    match tokens {
        Some((tokens, role)) => Ok(success(
            AuthTokenResponse::new(tokens, role),
            "Token refreshed",
        )),
        None => Err(AppError::unauthorized("Invalid refresh token")),
    }
}

#[derive(Deserialize)]
pub struct RevokeRequest {
    pub refresh_token: String,
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Json(payload): Json<RevokeRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = auth_service(&state);
    service
        .revoke_refresh_token(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to revoke token");
            AppError::internal("failed to revoke token")
        })?;

    Ok(success(Value::Null, "Logged out successfully"))
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Always responds the same way so email addresses cannot be probed.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    if payload.email.trim().is_empty() {
        return Err(AppError::bad_request("email is required"));
    }

    let service = auth_service(&state);
    service
        .forgot_password(payload.email.trim(), &state.mailer, &state.frontend_base_url)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to process password reset request");
            AppError::internal("failed to process password reset request")
        })?;

    Ok(success(
        Value::Null,
        "If the email exists, a password reset link has been sent",
    ))
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    if payload.token.trim().is_empty() {
        return Err(AppError::bad_request("token is required"));
    }
    validate_new_password(&payload.new_password)?;

    let service = auth_service(&state);
    let reset = service
        .reset_password(payload.token.trim(), &payload.new_password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to reset password");
            AppError::internal("failed to reset password")
        })?;

    if reset {
        Ok(success(Value::Null, "Password reset successfully"))
    } else {
        Err(AppError::bad_request("Invalid or expired reset token"))
    }
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    validate_new_password(&payload.new_password)?;

    let service = auth_service(&state);
    let outcome = service
        .change_password(auth.user_id, &payload.current_password, &payload.new_password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to change password");
            AppError::internal("failed to change password")
        })?;

    match outcome {
        ChangePasswordOutcome::Changed => Ok(success(Value::Null, "Password changed successfully")),
        ChangePasswordOutcome::InvalidPassword => {
            Err(AppError::unauthorized("Current password is incorrect"))
        }
        ChangePasswordOutcome::NotFound => Err(AppError::not_found("User not found")),
    }
}

pub async fn get_profile(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<crate::domain::user::User>>, AppError> {
    let service = auth_service(&state);
    let user = service.get_profile(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch profile");
        AppError::internal("failed to fetch profile")
    })?;

    match user {
        Some(user) => Ok(success(user, "Profile fetched successfully")),
        None => Err(AppError::not_found("User not found")),
    }
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub avatar_key: Option<String>,
}

pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<crate::domain::user::User>>, AppError> {
    let service = auth_service(&state);
    let outcome = service
        .update_profile(
            auth.user_id,
            payload.username,
            payload.email,
            payload.avatar_key,
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to update profile");
            AppError::internal("failed to update profile")
        })?;

    match outcome {
        UpdateProfileOutcome::Updated => {}
        UpdateProfileOutcome::EmailTaken => {
            return Err(AppError::conflict("Email already in use"))
        }
        UpdateProfileOutcome::NotFound => return Err(AppError::not_found("User not found")),
    }

    let user = service.get_profile(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch profile");
        AppError::internal("failed to fetch profile")
    })?;

    match user {
        Some(user) => Ok(success(user, "Profile updated successfully")),
        None => Err(AppError::not_found("User not found")),
    }
}

#[derive(Deserialize)]
pub struct UsersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub subscription: Option<String>,
    pub badge_id: Option<Uuid>,
    pub search: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Serialize)]
pub struct UsersListResponse {
    pub results: Vec<UserWithBadges>,
    pub statistics: UserStatistics,
    pub pagination: Pagination,
}

pub async fn get_users(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<UsersQuery>,
) -> Result<Json<ApiResponse<UsersListResponse>>, AppError> {
    let (page, limit) = page_params(query.page, query.limit);
    let filter = UserListFilter {
        role: query.role,
        status: query.status,
        subscription: query.subscription,
        badge_id: query.badge_id,
        search: query.search,
        start_date: parse_date(query.start_date, "start_date")?,
        end_date: parse_date(query.end_date, "end_date")?,
    };

    let service = UserService::new(state.db.clone());
    let (users, statistics) = service.list(filter, page, limit).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list users");
        AppError::internal("failed to list users")
    })?;

    let pagination = Pagination::new(statistics.total_users, page, limit);
    Ok(success(
        UsersListResponse {
            results: users,
            statistics,
            pagination,
        },
        "Users fetched successfully",
    ))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
}

pub async fn create_user(
    admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<ApiResponse<crate::domain::user::User>>, AppError> {
    if payload.username.trim().is_empty() || payload.email.trim().is_empty() {
        return Err(AppError::bad_request("username and email are required"));
    }
    validate_new_password(&payload.password)?;
    let role = match payload.role.as_deref() {
        Some(value) => Role::parse(&value.to_ascii_uppercase())
            .ok_or_else(|| AppError::bad_request("Invalid role"))?,
        None => Role::User,
    };

    let service = UserService::new(state.db.clone());
    let outcome = service
        .create(
            admin.user_id,
            NewUser {
                username: payload.username,
                email: payload.email,
                password: payload.password,
                role,
            },
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to create user");
            AppError::internal("failed to create user")
        })?;

    match outcome {
        CreateUserOutcome::Created(user) => Ok(success(user, "User created successfully")),
        CreateUserOutcome::EmailTaken => Err(AppError::conflict("Email already in use")),
    }
}

pub async fn get_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<crate::app::users::UserDetail>>, AppError> {
    let service = UserService::new(state.db.clone());
    let detail = service.get(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;

    match detail {
        Some(detail) => Ok(success(detail, "User fetched successfully")),
        None => Err(AppError::not_found("User not found")),
    }
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub subscription: Option<String>,
    pub status: Option<String>,
    pub badge_id: Option<Uuid>,
    pub remove_badge_id: Option<Uuid>,
}

pub async fn update_user(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let subscription = match payload.subscription {
        Some(value) => Some(
            Subscription::parse(&value)
                .ok_or_else(|| AppError::bad_request("Invalid subscription"))?,
        ),
        None => None,
    };
    let status = match payload.status {
        Some(value) => Some(
            UserStatus::parse(&value).ok_or_else(|| AppError::bad_request("Invalid status"))?,
        ),
        None => None,
    };

    let service = UserService::new(state.db.clone());
    let outcome = service
        .update(
            admin.user_id,
            id,
            UserUpdate {
                subscription: subscription.map(|s| s.as_str().to_string()),
                status: status.map(|s| s.as_str().to_string()),
                badge_id: payload.badge_id,
                remove_badge_id: payload.remove_badge_id,
            },
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to update user");
            AppError::internal("failed to update user")
        })?;

    match outcome {
        UpdateUserOutcome::Updated => Ok(success(Value::Null, "User updated successfully")),
        UpdateUserOutcome::UserNotFound => Err(AppError::not_found("User not found")),
        UpdateUserOutcome::BadgeNotFound => Err(AppError::not_found("Badge not found")),
        UpdateUserOutcome::AlreadyAssigned => {
            Err(AppError::conflict("User already has this badge"))
        }
        UpdateUserOutcome::NotAssigned => {
            Err(AppError::bad_request("User does not have this badge"))
        }
    }
}

#[derive(Deserialize)]
pub struct BadgeGrantRequest {
    pub user_id: Uuid,
    pub badge_id: Uuid,
}

fn map_grant_outcome(
    outcome: BadgeGrantOutcome,
    message: &str,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    match outcome {
        BadgeGrantOutcome::Done => Ok(success(Value::Null, message)),
        BadgeGrantOutcome::UserNotFound => Err(AppError::not_found("User not found")),
        BadgeGrantOutcome::BadgeNotFound => Err(AppError::not_found("Badge not found")),
        BadgeGrantOutcome::AlreadyAssigned => {
            Err(AppError::conflict("User already has this badge"))
        }
        BadgeGrantOutcome::NotAssigned => {
            Err(AppError::bad_request("User does not have this badge"))
        }
    }
}

pub async fn assign_badge(
    admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<BadgeGrantRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let service = UserService::new(state.db.clone());
    let outcome = service
        .assign_badge(admin.user_id, payload.user_id, payload.badge_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %payload.user_id, "failed to assign badge");
            AppError::internal("failed to assign badge")
        })?;

    map_grant_outcome(outcome, "Badge assigned successfully")
}

pub async fn remove_badge(
    admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<BadgeGrantRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let service = UserService::new(state.db.clone());
    let outcome = service
        .remove_badge(admin.user_id, payload.user_id, payload.badge_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %payload.user_id, "failed to remove badge");
            AppError::internal("failed to remove badge")
        })?;

    map_grant_outcome(outcome, "Badge removed successfully")
}

#[derive(Deserialize)]
pub struct BadgeMediaPayload {
    pub media_type: String,
    pub media_key: String,
}

#[derive(Deserialize)]
pub struct CreateBadgeRequest {
    pub title: String,
    pub badge_type: Option<String>,
    pub is_active: Option<bool>,
    pub icon_key: String,
    pub media: Option<BadgeMediaPayload>,
}

fn parse_badge_type(value: Option<String>) -> Result<Option<BadgeType>, AppError> {
    match value {
        Some(value) => BadgeType::parse(&value)
            .map(Some)
            .ok_or_else(|| AppError::bad_request("Invalid badge type")),
        None => Ok(None),
    }
}

pub async fn create_badge(
    admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateBadgeRequest>,
) -> Result<Json<ApiResponse<crate::domain::badge::Badge>>, AppError> {
    if payload.title.trim().is_empty() {
        return Err(AppError::bad_request("title is required"));
    }
    if payload.icon_key.trim().is_empty() {
        return Err(AppError::bad_request("icon_key is required"));
    }
    let badge_type = parse_badge_type(payload.badge_type)?;

    let service = BadgeService::new(state.db.clone(), state.storage.clone());
    let badge = service
        .create(
            admin.user_id,
            NewBadge {
                title: payload.title,
                badge_type,
                is_active: payload.is_active.unwrap_or(true),
                icon_key: payload.icon_key,
                media: payload.media.map(|media| NewBadgeMedia {
                    media_type: media.media_type,
                    media_key: media.media_key,
                }),
            },
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to create badge");
            AppError::internal("failed to create badge")
        })?;

    Ok(success(badge, "Badge created successfully"))
}

#[derive(Deserialize)]
pub struct BadgesQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub async fn get_badges(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<BadgesQuery>,
) -> Result<Json<ApiResponse<Paged<crate::domain::badge::Badge>>>, AppError> {
    let (page, limit) = page_params(query.page, query.limit);
    let filter = BadgeListFilter {
        search: query.search,
        is_active: query.is_active,
        start_date: parse_date(query.start_date, "start_date")?,
        end_date: parse_date(query.end_date, "end_date")?,
    };

    let service = BadgeService::new(state.db.clone(), state.storage.clone());
    let (badges, total) = service.list(filter, page, limit).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list badges");
        AppError::internal("failed to list badges")
    })?;

    Ok(success(
        Paged {
            results: badges,
            pagination: Pagination::new(total, page, limit),
        },
        "Badges fetched successfully",
    ))
}

pub async fn get_badge(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<crate::domain::badge::Badge>>, AppError> {
    let service = BadgeService::new(state.db.clone(), state.storage.clone());
    let badge = service.get(id).await.map_err(|err| {
        tracing::error!(error = ?err, badge_id = %id, "failed to fetch badge");
        AppError::internal("failed to fetch badge")
    })?;

    match badge {
        Some(badge) => Ok(success(badge, "Badge fetched successfully")),
        None => Err(AppError::not_found("Badge not found")),
    }
}

#[derive(Deserialize)]
pub struct UpdateBadgeRequest {
    pub title: Option<String>,
    pub badge_type: Option<String>,
    pub is_active: Option<bool>,
    pub icon_key: Option<String>,
    pub media: Option<BadgeMediaPayload>,
}

pub async fn update_badge(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBadgeRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let badge_type = parse_badge_type(payload.badge_type)?;

    let service = BadgeService::new(state.db.clone(), state.storage.clone());
    let updated = service
        .update(
            admin.user_id,
            id,
            BadgeUpdate {
                title: payload.title,
                badge_type,
                is_active: payload.is_active,
                icon_key: payload.icon_key,
                media: payload.media.map(|media| NewBadgeMedia {
                    media_type: media.media_type,
                    media_key: media.media_key,
                }),
            },
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, badge_id = %id, "failed to update badge");
            AppError::internal("failed to update badge")
        })?;

    if updated {
        Ok(success(Value::Null, "Badge updated successfully"))
    } else {
        Err(AppError::not_found("Badge not found"))
    }
}

pub async fn delete_badge(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let service = BadgeService::new(state.db.clone(), state.storage.clone());
    let deleted = service.delete(admin.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, badge_id = %id, "failed to delete badge");
        AppError::internal("failed to delete badge")
    })?;

    if deleted {
        Ok(success(Value::Null, "Badge deleted successfully"))
    } else {
        Err(AppError::not_found("Badge not found"))
    }
}

#[derive(Deserialize)]
pub struct SubmitReportRequest {
    pub reported_id: Uuid,
    pub description: String,
}

pub async fn report_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<SubmitReportRequest>,
) -> Result<Json<ApiResponse<crate::domain::report::Report>>, AppError> {
    if payload.description.trim().is_empty() {
        return Err(AppError::bad_request("description is required"));
    }

    let service = ReportService::new(state.db.clone());
    let outcome = service
        .submit(auth.user_id, payload.reported_id, payload.description)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, reporter_id = %auth.user_id, "failed to submit report");
            AppError::internal("failed to submit report")
        })?;

    match outcome {
        SubmitReportOutcome::Submitted(report) => {
            Ok(success(report, "Report submitted successfully"))
        }
        SubmitReportOutcome::SelfReport => {
            Err(AppError::bad_request("You cannot report yourself"))
        }
        SubmitReportOutcome::AlreadyReported => {
            Err(AppError::conflict("You have already reported this user"))
        }
        SubmitReportOutcome::ReportedUserNotFound => {
            Err(AppError::not_found("Reported user not found"))
        }
    }
}

#[derive(Deserialize)]
pub struct ReportsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub search: Option<String>,
}

pub async fn get_reports(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<ReportsQuery>,
) -> Result<Json<ApiResponse<Paged<crate::domain::report::ReportDetail>>>, AppError> {
    let (page, limit) = page_params(query.page, query.limit);

    let service = ReportService::new(state.db.clone());
    let (reports, total) = service
        .list(query.status, query.search, page, limit)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list reports");
            AppError::internal("failed to list reports")
        })?;

    Ok(success(
        Paged {
            results: reports,
            pagination: Pagination::new(total, page, limit),
        },
        "Reports fetched successfully",
    ))
}

pub async fn get_report(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<crate::domain::report::ReportDetail>>, AppError> {
    let service = ReportService::new(state.db.clone());
    let report = service.get(id).await.map_err(|err| {
        tracing::error!(error = ?err, report_id = %id, "failed to fetch report");
        AppError::internal("failed to fetch report")
    })?;

    match report {
        Some(report) => Ok(success(report, "Report fetched successfully")),
        None => Err(AppError::not_found("Report not found")),
    }
}

#[derive(Deserialize)]
pub struct UpdateReportRequest {
    pub status: String,
    pub admin_comment: Option<String>,
}

pub async fn update_report_status(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReportRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let status = ReportStatus::parse(&payload.status)
        .filter(|status| *status != ReportStatus::Pending)
        .ok_or_else(|| AppError::bad_request("Invalid report status"))?;

    let service = ReportService::new(state.db.clone());
    let outcome = service
        .update_status(admin.user_id, id, status, payload.admin_comment)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, report_id = %id, "failed to update report");
            AppError::internal("failed to update report")
        })?;

    match outcome {
        UpdateReportOutcome::Updated => {
            Ok(success(Value::Null, "Report status updated successfully"))
        }
        UpdateReportOutcome::NotFound => Err(AppError::not_found("Report not found")),
        UpdateReportOutcome::AlreadyUpdated => Err(AppError::conflict("Report already updated")),
    }
}

#[derive(Deserialize)]
pub struct CreatePageRequest {
    pub page_name: String,
    pub content: String,
    pub status: Option<String>,
}

fn parse_page_status(value: Option<String>) -> Result<Option<PageStatus>, AppError> {
    match value {
        Some(value) => PageStatus::parse(&value)
            .map(Some)
            .ok_or_else(|| AppError::bad_request("Invalid page status")),
        None => Ok(None),
    }
}

pub async fn create_cms_page(
    admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePageRequest>,
) -> Result<Json<ApiResponse<crate::domain::cms::CmsPage>>, AppError> {
    if payload.page_name.trim().is_empty() {
        return Err(AppError::bad_request("page_name is required"));
    }
    if payload.content.trim().is_empty() {
        return Err(AppError::bad_request("content is required"));
    }
    let status = parse_page_status(payload.status)?.unwrap_or(PageStatus::Draft);

    let service = CmsService::new(state.db.clone());
    let outcome = service
        .create(admin.user_id, payload.page_name, payload.content, status)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to create page");
            AppError::internal("failed to create page")
        })?;

    match outcome {
        CreatePageOutcome::Created(page) => Ok(success(page, "Page created successfully")),
        CreatePageOutcome::NameExists => Err(AppError::conflict("Page name already exists")),
    }
}

#[derive(Deserialize)]
pub struct PagesQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub async fn get_cms_pages(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<PagesQuery>,
) -> Result<Json<ApiResponse<Paged<crate::domain::cms::CmsPage>>>, AppError> {
    let (page, limit) = page_params(query.page, query.limit);
    let filter = PageListFilter {
        search: query.search,
        status: query.status,
        start_date: parse_date(query.start_date, "start_date")?,
        end_date: parse_date(query.end_date, "end_date")?,
    };

    let service = CmsService::new(state.db.clone());
    let (pages, total) = service.list(filter, page, limit).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list pages");
        AppError::internal("failed to list pages")
    })?;

    Ok(success(
        Paged {
            results: pages,
            pagination: Pagination::new(total, page, limit),
        },
        "Pages fetched successfully",
    ))
}

pub async fn get_cms_page(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<crate::domain::cms::CmsPage>>, AppError> {
    let service = CmsService::new(state.db.clone());
    let page = service.get(id).await.map_err(|err| {
        tracing::error!(error = ?err, page_id = %id, "failed to fetch page");
        AppError::internal("failed to fetch page")
    })?;

    match page {
        Some(page) => Ok(success(page, "Page fetched successfully")),
        None => Err(AppError::not_found("Page not found")),
    }
}

#[derive(Deserialize)]
pub struct UpdatePageRequest {
    pub page_name: Option<String>,
    pub content: Option<String>,
    pub status: Option<String>,
}

pub async fn update_cms_page(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePageRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let status = parse_page_status(payload.status)?;

    let service = CmsService::new(state.db.clone());
    let outcome = service
        .update(admin.user_id, id, payload.page_name, payload.content, status)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, page_id = %id, "failed to update page");
            AppError::internal("failed to update page")
        })?;

    match outcome {
        UpdatePageOutcome::Updated => Ok(success(Value::Null, "Page updated successfully")),
        UpdatePageOutcome::NotFound => Err(AppError::not_found("Page not found")),
        UpdatePageOutcome::NameExists => Err(AppError::conflict("Page name already exists")),
    }
}

pub async fn delete_cms_page(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let service = CmsService::new(state.db.clone());
    let deleted = service.delete(admin.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, page_id = %id, "failed to delete page");
        AppError::internal("failed to delete page")
    })?;

    if deleted {
        Ok(success(Value::Null, "Page deleted successfully"))
    } else {
        Err(AppError::not_found("Page not found"))
    }
}

#[derive(Deserialize)]
pub struct ContactUsRequest {
    pub subject: String,
    pub message: String,
}

pub async fn contact_us(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ContactUsRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    if payload.subject.trim().is_empty() || payload.message.trim().is_empty() {
        return Err(AppError::bad_request("subject and message are required"));
    }

    let service = ContactService::new(state.db.clone());
    let id = service
        .submit(auth.user_id, payload.subject, payload.message)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to submit contact request");
            AppError::internal("failed to submit contact request")
        })?;

    Ok(success(
        json!({ "id": id }),
        "Contact request submitted successfully",
    ))
}

#[derive(Deserialize)]
pub struct ContactRequestsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub admin_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub search: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub async fn get_contact_requests(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<ContactRequestsQuery>,
) -> Result<Json<ApiResponse<Paged<crate::domain::contact::ContactRequest>>>, AppError> {
    let (page, limit) = page_params(query.page, query.limit);
    let filter = ContactListFilter {
        status: query.status,
        admin_id: query.admin_id,
        user_id: query.user_id,
        search: query.search,
        start_date: parse_date(query.start_date, "start_date")?,
        end_date: parse_date(query.end_date, "end_date")?,
    };

    let service = ContactService::new(state.db.clone());
    let (requests, total) = service.list(filter, page, limit).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list contact requests");
        AppError::internal("failed to list contact requests")
    })?;

    Ok(success(
        Paged {
            results: requests,
            pagination: Pagination::new(total, page, limit),
        },
        "Contact requests fetched successfully",
    ))
}

pub async fn get_contact_request(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<crate::domain::contact::ContactRequest>>, AppError> {
    let service = ContactService::new(state.db.clone());
    let request = service.get(id).await.map_err(|err| {
        tracing::error!(error = ?err, contact_id = %id, "failed to fetch contact request");
        AppError::internal("failed to fetch contact request")
    })?;

    match request {
        Some(request) => Ok(success(request, "Contact request fetched successfully")),
        None => Err(AppError::not_found("Contact request not found")),
    }
}

#[derive(Deserialize)]
pub struct RespondRequest {
    pub response: String,
    pub status: Option<String>,
}

pub async fn respond_to_contact_request(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondRequest>,
) -> Result<Json<ApiResponse<crate::domain::contact::ContactRequest>>, AppError> {
    if payload.response.trim().is_empty() {
        return Err(AppError::bad_request("response is required"));
    }
    let status = match payload.status {
        Some(value) => ContactStatus::parse(&value)
            .ok_or_else(|| AppError::bad_request("Invalid contact request status"))?,
        None => ContactStatus::Resolved,
    };

    let service = ContactService::new(state.db.clone());
    let outcome = service
        .respond(admin.user_id, id, payload.response, status)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, contact_id = %id, "failed to respond to contact request");
            AppError::internal("failed to respond to contact request")
        })?;

    match outcome {
        RespondOutcome::Responded(request) => Ok(success(request, "Response sent successfully")),
        RespondOutcome::NotFound => Err(AppError::not_found("Contact request not found")),
    }
}

#[derive(Deserialize)]
pub struct AuditQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub async fn get_audit_log(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<ApiResponse<Paged<crate::domain::audit::AuditEntry>>>, AppError> {
    let (page, limit) = page_params(query.page, query.limit);
    let start_date = parse_date(query.start_date, "start_date")?;
    let end_date = parse_date(query.end_date, "end_date")?;

    let service = AuditService::new(state.db.clone());
    let (entries, total) = service
        .list(query.search, start_date, end_date, page, limit)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list audit log");
            AppError::internal("failed to list audit log")
        })?;

    Ok(success(
        Paged {
            results: entries,
            pagination: Pagination::new(total, page, limit),
        },
        "Audit log fetched successfully",
    ))
}

#[derive(Deserialize)]
pub struct CreateUploadRequest {
    pub content_type: String,
}

pub async fn create_upload(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateUploadRequest>,
) -> Result<Json<ApiResponse<UploadIntent>>, AppError> {
    let service = UploadService::new(state.storage.clone());
    let outcome = service
        .create_upload(payload.content_type, state.upload_url_ttl_seconds)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to create upload");
            AppError::internal("failed to create upload")
        })?;

    match outcome {
        UploadOutcome::Created(intent) => Ok(success(intent, "Upload URL created successfully")),
        UploadOutcome::UnsupportedType => Err(AppError::bad_request("Unsupported content type")),
    }
}
