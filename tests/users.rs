//! Admin user management tests

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

#[tokio::test]
async fn users_list_requires_admin_role() {
    let app = app().await;
    let user = app.create_user("users_forbidden").await;

    let resp = app.get("/admin/users", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app.get("/admin/users", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_creates_user_through_the_api() {
    let app = app().await;
    let admin = app.create_admin("create_user_admin").await;
    let email = format!("created_{}@example.com", uuid::Uuid::new_v4());

    let resp = app
        .post_json(
            "/admin/users",
            json!({ "username": "created_member", "email": email, "password": "Welcome2Halo" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["role"], "USER");
    assert_eq!(resp.data()["status"], "ACTIVE");
    assert_eq!(app.audit_count("CREATE_USER", Some(admin.id)).await, 1);

    // The created account can authenticate (non-admin, so the role gate fires)
    let resp = app
        .post_json(
            "/auth/login",
            json!({ "email": email, "password": "Welcome2Halo" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    // Duplicate email is a conflict
    let resp = app
        .post_json(
            "/admin/users",
            json!({ "username": "created_twin", "email": email, "password": "Welcome2Halo" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "Email already in use");
}

#[tokio::test]
async fn create_user_validates_input_and_role() {
    let app = app().await;
    let admin = app.create_admin("create_user_checks").await;
    let user = app.create_user("create_user_nonadmin").await;

    let resp = app
        .post_json(
            "/admin/users",
            json!({ "username": "x", "email": "weak_pw@example.com", "password": "short1A" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .post_json(
            "/admin/users",
            json!({
                "username": "x",
                "email": "bad_role@example.com",
                "password": "Welcome2Halo",
                "role": "SUPERUSER",
            }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "Invalid role");

    let resp = app
        .post_json(
            "/admin/users",
            json!({ "username": "x", "email": "who@example.com", "password": "Welcome2Halo" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn users_list_excludes_admins_and_reports_statistics() {
    let app = app().await;
    let admin = app.create_admin("users_list_admin").await;
    let user = app.create_user("users_list_member").await;

    let resp = app
        .get(
            &format!("/admin/users?search={}", user.username),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let data = resp.data();
    let results = data["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"].as_str().unwrap(), user.id.to_string());
    assert_eq!(data["statistics"]["total_users"], 1);
    assert_eq!(data["statistics"]["active_users"], 1);
    assert_eq!(data["pagination"]["total"], 1);

    // The admin account itself never shows up
    let resp = app
        .get(
            &format!("/admin/users?search={}", admin.username),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.data()["results"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn users_list_filters_by_status() {
    let app = app().await;
    let admin = app.create_admin("users_filter_admin").await;
    let user = app.create_user("users_filter_inactive").await;

    sqlx::query("UPDATE users SET status = 'INACTIVE' WHERE id = $1")
        .bind(user.id)
        .execute(app.pool())
        .await
        .unwrap();

    let resp = app
        .get(
            &format!("/admin/users?status=INACTIVE&search={}", user.username),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    assert_eq!(data["results"].as_array().unwrap().len(), 1);
    assert_eq!(data["statistics"]["inactive_users"], 1);

    let resp = app
        .get(
            &format!("/admin/users?status=ACTIVE&search={}", user.username),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.data()["results"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn user_detail_splits_assigned_and_unassigned_badges() {
    let app = app().await;
    let admin = app.create_admin("users_detail_admin").await;
    let user = app.create_user("users_detail_member").await;
    let assigned = app.create_badge("Detail Assigned Badge").await;
    let unassigned = app.create_badge("Detail Unassigned Badge").await;

    sqlx::query("INSERT INTO user_badges (user_id, badge_id) VALUES ($1, $2)")
        .bind(user.id)
        .bind(assigned)
        .execute(app.pool())
        .await
        .unwrap();

    let resp = app
        .get(
            &format!("/admin/users/{}", user.id),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let data = resp.data();
    let assigned_ids: Vec<&str> = data["assigned_badges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_str().unwrap())
        .collect();
    let unassigned_ids: Vec<&str> = data["unassigned_badges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_str().unwrap())
        .collect();

    assert!(assigned_ids.contains(&assigned.to_string().as_str()));
    assert!(!assigned_ids.contains(&unassigned.to_string().as_str()));
    assert!(unassigned_ids.contains(&unassigned.to_string().as_str()));
    assert!(!unassigned_ids.contains(&assigned.to_string().as_str()));
}

#[tokio::test]
async fn update_user_changes_subscription_and_status() {
    let app = app().await;
    let admin = app.create_admin("users_update_admin").await;
    let user = app.create_user("users_update_member").await;

    let resp = app
        .put_json(
            &format!("/admin/users/{}", user.id),
            json!({ "subscription": "premium", "status": "inactive" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let (subscription, status): (String, String) =
        sqlx::query_as("SELECT subscription, status FROM users WHERE id = $1")
            .bind(user.id)
            .fetch_one(app.pool())
            .await
            .unwrap();
    // Values are normalized to uppercase on write
    assert_eq!(subscription, "PREMIUM");
    assert_eq!(status, "INACTIVE");
    assert_eq!(app.audit_count("UPDATE_USER", Some(admin.id)).await, 1);
}

#[tokio::test]
async fn update_unknown_user_is_not_found() {
    let app = app().await;
    let admin = app.create_admin("users_update_missing").await;

    let resp = app
        .put_json(
            &format!("/admin/users/{}", uuid::Uuid::new_v4()),
            json!({ "status": "INACTIVE" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn badge_assignment_roundtrip() {
    let app = app().await;
    let admin = app.create_admin("badge_grant_admin").await;
    let user = app.create_user("badge_grant_member").await;
    let badge = app.create_badge("Grant Roundtrip Badge").await;

    let resp = app
        .post_json(
            "/admin/badges/assign",
            json!({ "user_id": user.id, "badge_id": badge }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(app.audit_count("ASSIGN_BADGE", Some(admin.id)).await, 1);

    // Assigning twice is rejected, not silently duplicated
    let resp = app
        .post_json(
            "/admin/badges/assign",
            json!({ "user_id": user.id, "badge_id": badge }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "User already has this badge");

    let resp = app
        .post_json(
            "/admin/badges/remove",
            json!({ "user_id": user.id, "badge_id": badge }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    // Removing again fails because nothing is assigned
    let resp = app
        .post_json(
            "/admin/badges/remove",
            json!({ "user_id": user.id, "badge_id": badge }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "User does not have this badge");
}

#[tokio::test]
async fn assign_unknown_badge_is_not_found() {
    let app = app().await;
    let admin = app.create_admin("badge_grant_missing").await;
    let user = app.create_user("badge_grant_missing_member").await;

    let resp = app
        .post_json(
            "/admin/badges/assign",
            json!({ "user_id": user.id, "badge_id": uuid::Uuid::new_v4() }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "Badge not found");
}
