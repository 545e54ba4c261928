use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/mfa/setup", post(handlers::setup_mfa))
        .route("/auth/mfa/verify", post(handlers::verify_mfa))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/revoke", post(handlers::revoke_token))
        .route("/auth/forgot-password", post(handlers::forgot_password))
        .route("/auth/reset-password", post(handlers::reset_password))
        .route("/auth/change-password", post(handlers::change_password))
        .route("/auth/profile", get(handlers::get_profile))
        .route("/auth/profile", patch(handlers::update_profile))
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(handlers::get_users))
        .route("/admin/users", post(handlers::create_user))
        .route("/admin/users/:id", get(handlers::get_user))
        .route("/admin/users/:id", put(handlers::update_user))
        .route("/admin/badges", post(handlers::create_badge))
        .route("/admin/badges", get(handlers::get_badges))
        .route("/admin/badges/assign", post(handlers::assign_badge))
        .route("/admin/badges/remove", post(handlers::remove_badge))
        .route("/admin/badges/:id", get(handlers::get_badge))
        .route("/admin/badges/:id", put(handlers::update_badge))
        .route("/admin/badges/:id", delete(handlers::delete_badge))
        .route("/admin/reports", get(handlers::get_reports))
        .route("/admin/reports/:id", get(handlers::get_report))
        .route("/admin/reports/:id", patch(handlers::update_report_status))
        .route("/admin/cms-pages", post(handlers::create_cms_page))
        .route("/admin/cms-pages", get(handlers::get_cms_pages))
        .route("/admin/cms-pages/:id", get(handlers::get_cms_page))
        .route("/admin/cms-pages/:id", put(handlers::update_cms_page))
        .route("/admin/cms-pages/:id", delete(handlers::delete_cms_page))
        .route("/admin/contact-requests", get(handlers::get_contact_requests))
        .route(
            "/admin/contact-requests/:id",
            get(handlers::get_contact_request),
        )
        .route(
            "/admin/contact-requests/:id/respond",
            put(handlers::respond_to_contact_request),
        )
        .route("/admin/audit-log", get(handlers::get_audit_log))
        .route("/admin/uploads", post(handlers::create_upload))
}

pub fn user() -> Router<AppState> {
    Router::new()
        .route("/user/reports", post(handlers::report_user))
        .route("/user/contact-us", post(handlers::contact_us))
}
