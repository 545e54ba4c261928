//! Authentication tests
//!
//! Login role gating, the email OTP flow, token lifecycle, and the
//! password reset / change flows.

mod common;

use axum::http::StatusCode;
use common::{app, DEFAULT_PASSWORD};
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

// ===========================================================================
// Login
// ===========================================================================

#[tokio::test]
async fn login_admin_requires_otp() {
    let app = app().await;
    let admin = app.create_admin("login_ok").await;

    let resp = app
        .post_json(
            "/auth/login",
            json!({ "email": admin.email, "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    assert_eq!(data["id"].as_str().unwrap(), admin.id.to_string());
    assert_eq!(data["role"], "ADMIN");
    assert_eq!(data["mfa_required"], true);
    // No tokens until the OTP is verified
    assert!(data.get("access_token").is_none());

    // An OTP was generated and a login audit row written
    assert!(app.stored_otp(admin.id).await.is_some());
    assert_eq!(app.audit_count("LOGIN", Some(admin.id)).await, 1);
}

#[tokio::test]
async fn login_rejects_non_admin_role() {
    let app = app().await;
    let user = app.create_user("login_user_role").await;

    let resp = app
        .post_json(
            "/auth/login",
            json!({ "email": user.email, "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    // No OTP side effects for rejected logins
    assert!(app.stored_otp(user.id).await.is_none());
}

#[tokio::test]
async fn login_invalid_password() {
    let app = app().await;
    let admin = app.create_admin("login_badpw").await;

    let resp = app
        .post_json(
            "/auth/login",
            json!({ "email": admin.email, "password": "wrong_password" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "Invalid credentials");
    assert_eq!(app.audit_count("LOGIN", Some(admin.id)).await, 0);
}

#[tokio::test]
async fn login_nonexistent_user() {
    let app = app().await;

    let resp = app
        .post_json(
            "/auth/login",
            json!({ "email": "nobody_auth@example.com", "password": "whatever123" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn login_empty_fields() {
    let app = app().await;

    let resp = app
        .post_json("/auth/login", json!({ "email": "", "password": "" }), None)
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// OTP verification
// ===========================================================================

#[tokio::test]
async fn otp_verifies_exactly_once() {
    let app = app().await;
    let admin = app.create_admin("otp_once").await;

    app.post_json(
        "/auth/login",
        json!({ "email": admin.email, "password": DEFAULT_PASSWORD }),
        None,
    )
    .await;
    let otp = app.stored_otp(admin.id).await.expect("otp stored");

    let resp = app
        .post_json(
            "/auth/mfa/verify",
            json!({ "user_id": admin.id, "otp": otp }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    assert!(data["access_token"].is_string());
    assert!(data["refresh_token"].is_string());
    assert_eq!(data["role"], "ADMIN");

    // The code is consumed by the first successful verification
    assert!(app.stored_otp(admin.id).await.is_none());
    let replay = app
        .post_json(
            "/auth/mfa/verify",
            json!({ "user_id": admin.id, "otp": otp }),
            None,
        )
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
    assert_eq!(replay.error_message(), "Invalid OTP");
}

#[tokio::test]
async fn expired_otp_is_cleared() {
    let app = app().await;
    let admin = app.create_admin("otp_expired").await;

    sqlx::query(
        "UPDATE users SET mfa_otp = '123456', mfa_otp_expires = now() - interval '1 minute' \
         WHERE id = $1",
    )
    .bind(admin.id)
    .execute(app.pool())
    .await
    .unwrap();

    let resp = app
        .post_json(
            "/auth/mfa/verify",
            json!({ "user_id": admin.id, "otp": "123456" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "OTP has expired");
    // The stale code is removed so it cannot be retried
    assert!(app.stored_otp(admin.id).await.is_none());
}

#[tokio::test]
async fn wrong_otp_preserves_stored_code() {
    let app = app().await;
    let admin = app.create_admin("otp_wrong").await;

    app.post_json(
        "/auth/login",
        json!({ "email": admin.email, "password": DEFAULT_PASSWORD }),
        None,
    )
    .await;
    let otp = app.stored_otp(admin.id).await.expect("otp stored");

    let resp = app
        .post_json(
            "/auth/mfa/verify",
            json!({ "user_id": admin.id, "otp": "000000" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "Invalid OTP");

    // A wrong guess does not invalidate the real code
    assert_eq!(app.stored_otp(admin.id).await, Some(otp.clone()));

    let resp = app
        .post_json(
            "/auth/mfa/verify",
            json!({ "user_id": admin.id, "otp": otp }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

// ===========================================================================
// Token lifecycle
// ===========================================================================

#[tokio::test]
async fn refresh_rotates_token() {
    let app = app().await;
    let admin = app.create_admin("refresh_rotate").await;

    let resp = app
        .post_json(
            "/auth/refresh",
            json!({ "refresh_token": admin.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    assert!(data["access_token"].is_string());
    let new_refresh = data["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(new_refresh, admin.refresh_token);

    // The old token was revoked by rotation
    let replay = app
        .post_json(
            "/auth/refresh",
            json!({ "refresh_token": admin.refresh_token }),
            None,
        )
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);

    let resp = app
        .post_json("/auth/refresh", json!({ "refresh_token": new_refresh }), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn revoked_token_cannot_refresh() {
    let app = app().await;
    let admin = app.create_admin("revoke").await;

    let resp = app
        .post_json(
            "/auth/revoke",
            json!({ "refresh_token": admin.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .post_json(
            "/auth/refresh",
            json!({ "refresh_token": admin.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn access_token_is_not_a_refresh_token() {
    let app = app().await;
    let admin = app.create_admin("token_type").await;

    let resp = app
        .post_json(
            "/auth/refresh",
            json!({ "refresh_token": admin.access_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// Password reset
// ===========================================================================

#[tokio::test]
async fn forgot_password_is_enumeration_safe() {
    let app = app().await;
    let admin = app.create_admin("forgot_known").await;

    let known = app
        .post_json("/auth/forgot-password", json!({ "email": admin.email }), None)
        .await;
    let unknown = app
        .post_json(
            "/auth/forgot-password",
            json!({ "email": "ghost_forgot@example.com" }),
            None,
        )
        .await;

    // Identical response either way
    assert_eq!(known.status, StatusCode::OK);
    assert_eq!(unknown.status, StatusCode::OK);
    assert_eq!(known.message(), unknown.message());

    // Known email gets a token and an audit row, the unknown one leaves no trace
    let token_hash: Option<String> =
        sqlx::query_scalar("SELECT reset_token_hash FROM users WHERE id = $1")
            .bind(admin.id)
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert!(token_hash.is_some());
    assert_eq!(app.audit_count("FORGOT_PASSWORD", Some(admin.id)).await, 1);

    let ghost_rows: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM audit_log \
         WHERE action = 'FORGOT_PASSWORD' AND details->>'email' = 'ghost_forgot@example.com'",
    )
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(ghost_rows, 0);
}

#[tokio::test]
async fn reset_token_is_single_use() {
    let app = app().await;
    let admin = app.create_admin("reset_once").await;

    let token = format!("reset-token-{}", Uuid::new_v4());
    sqlx::query(
        "UPDATE users SET reset_token_hash = $2, reset_token_expires = now() + interval '1 hour' \
         WHERE id = $1",
    )
    .bind(admin.id)
    .bind(sha256_hex(&token))
    .execute(app.pool())
    .await
    .unwrap();

    let resp = app
        .post_json(
            "/auth/reset-password",
            json!({ "token": token, "new_password": "BrandNewPassw0rd" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(app.audit_count("RESET_PASSWORD", Some(admin.id)).await, 1);

    let replay = app
        .post_json(
            "/auth/reset-password",
            json!({ "token": token, "new_password": "AnotherPassw0rd" }),
            None,
        )
        .await;
    assert_eq!(replay.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expired_reset_token_is_rejected() {
    let app = app().await;
    let admin = app.create_admin("reset_expired").await;

    let token = format!("reset-token-{}", Uuid::new_v4());
    sqlx::query(
        "UPDATE users SET reset_token_hash = $2, reset_token_expires = now() - interval '1 minute' \
         WHERE id = $1",
    )
    .bind(admin.id)
    .bind(sha256_hex(&token))
    .execute(app.pool())
    .await
    .unwrap();

    let resp = app
        .post_json(
            "/auth/reset-password",
            json!({ "token": token, "new_password": "BrandNewPassw0rd" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn change_password_requires_current_password() {
    let app = app().await;
    let admin = app.create_admin("change_pw").await;

    let resp = app
        .post_json(
            "/auth/change-password",
            json!({ "current_password": "not-the-password", "new_password": "NewPassword1" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app
        .post_json(
            "/auth/change-password",
            json!({ "current_password": DEFAULT_PASSWORD, "new_password": "NewPassword1" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(app.audit_count("CHANGE_PASSWORD", Some(admin.id)).await, 1);
}

#[tokio::test]
async fn new_password_requires_mixed_characters() {
    let app = app().await;
    let admin = app.create_admin("change_pw_weak").await;

    // Missing uppercase, missing digit, missing lowercase
    for weak in ["alllowercase1", "NoDigitsHere", "ALLUPPERCASE1"] {
        let resp = app
            .post_json(
                "/auth/change-password",
                json!({ "current_password": DEFAULT_PASSWORD, "new_password": weak }),
                Some(&admin.access_token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "accepted {:?}", weak);
    }

    let resp = app
        .post_json(
            "/auth/reset-password",
            json!({ "token": "irrelevant", "new_password": "alllowercase1" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    // The stored hash still matches the original password
    let resp = app
        .post_json(
            "/auth/change-password",
            json!({ "current_password": DEFAULT_PASSWORD, "new_password": "StillValid1" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn audit_failures_do_not_block_the_caller() {
    let app = app().await;
    let _ = app.pool();

    // A second pool we can close underneath the audit writer
    let config = halo_admin::config::AppConfig::from_env().unwrap();
    let db = halo_admin::infra::db::Db::connect(&config).await.unwrap();
    db.pool().close().await;

    let audit = halo_admin::app::audit::AuditService::new(db);
    assert!(audit.record(None, "LOGIN", json!({})).await.is_err());
    // Best-effort writes swallow the same failure
    audit.record_best_effort(None, "LOGIN", json!({})).await;
}

// ===========================================================================
// Profile
// ===========================================================================

#[tokio::test]
async fn profile_roundtrip() {
    let app = app().await;
    let admin = app.create_admin("profile").await;

    let resp = app.get("/auth/profile", Some(&admin.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["email"].as_str().unwrap(), admin.email);

    let resp = app
        .patch_json(
            "/auth/profile",
            json!({ "username": "renamed_admin_profile" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["username"], "renamed_admin_profile");
}

#[tokio::test]
async fn profile_update_rejects_taken_email() {
    let app = app().await;
    let admin = app.create_admin("profile_email_a").await;
    let other = app.create_admin("profile_email_b").await;

    let resp = app
        .patch_json(
            "/auth/profile",
            json!({ "email": other.email }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn profile_requires_token() {
    let app = app().await;

    let resp = app.get("/auth/profile", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}
