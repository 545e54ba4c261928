//! Abuse report tests

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

#[tokio::test]
async fn submit_report() {
    let app = app().await;
    let reporter = app.create_user("report_submit_a").await;
    let reported = app.create_user("report_submit_b").await;

    let resp = app
        .post_json(
            "/user/reports",
            json!({ "reported_id": reported.id, "description": "spam profile" }),
            Some(&reporter.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let data = resp.data();
    assert_eq!(data["status"], "PENDING");
    assert_eq!(data["reporter_id"].as_str().unwrap(), reporter.id.to_string());
    assert_eq!(data["reported_id"].as_str().unwrap(), reported.id.to_string());
}

#[tokio::test]
async fn cannot_report_yourself() {
    let app = app().await;
    let user = app.create_user("report_self").await;

    let resp = app
        .post_json(
            "/user/reports",
            json!({ "reported_id": user.id, "description": "me" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "You cannot report yourself");
}

#[tokio::test]
async fn cannot_report_unknown_user() {
    let app = app().await;
    let reporter = app.create_user("report_ghost").await;

    let resp = app
        .post_json(
            "/user/reports",
            json!({ "reported_id": uuid::Uuid::new_v4(), "description": "ghost" }),
            Some(&reporter.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn one_pending_report_per_pair() {
    let app = app().await;
    let admin = app.create_admin("report_pair_admin").await;
    let reporter = app.create_user("report_pair_a").await;
    let reported = app.create_user("report_pair_b").await;

    let resp = app
        .post_json(
            "/user/reports",
            json!({ "reported_id": reported.id, "description": "first" }),
            Some(&reporter.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let report_id = resp.data()["id"].as_str().unwrap().to_string();

    // A second report while the first is pending is rejected
    let resp = app
        .post_json(
            "/user/reports",
            json!({ "reported_id": reported.id, "description": "second" }),
            Some(&reporter.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "You have already reported this user");

    // Once resolved, the same pair can be reported again
    let resp = app
        .patch_json(
            &format!("/admin/reports/{}", report_id),
            json!({ "status": "RESOLVED", "admin_comment": "handled" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .post_json(
            "/user/reports",
            json!({ "reported_id": reported.id, "description": "again" }),
            Some(&reporter.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn report_resolution_is_one_shot() {
    let app = app().await;
    let admin = app.create_admin("report_oneshot_admin").await;
    let reporter = app.create_user("report_oneshot_a").await;
    let reported = app.create_user("report_oneshot_b").await;

    let resp = app
        .post_json(
            "/user/reports",
            json!({ "reported_id": reported.id, "description": "harassment" }),
            Some(&reporter.access_token),
        )
        .await;
    let report_id = resp.data()["id"].as_str().unwrap().to_string();

    let resp = app
        .patch_json(
            &format!("/admin/reports/{}", report_id),
            json!({ "status": "BLOCKED", "admin_comment": "blocked the account" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        app.audit_count("UPDATE_REPORT_STATUS", Some(admin.id)).await,
        1
    );

    // The second transition is refused, the first decision stands
    let resp = app
        .patch_json(
            &format!("/admin/reports/{}", report_id),
            json!({ "status": "WARNED" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "Report already updated");

    let status: String = sqlx::query_scalar("SELECT status FROM reports WHERE id = $1::uuid")
        .bind(&report_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(status, "BLOCKED");
}

#[tokio::test]
async fn report_cannot_be_reset_to_pending() {
    let app = app().await;
    let admin = app.create_admin("report_pending_admin").await;
    let reporter = app.create_user("report_pending_a").await;
    let reported = app.create_user("report_pending_b").await;

    let resp = app
        .post_json(
            "/user/reports",
            json!({ "reported_id": reported.id, "description": "scam" }),
            Some(&reporter.access_token),
        )
        .await;
    let report_id = resp.data()["id"].as_str().unwrap().to_string();

    let resp = app
        .patch_json(
            &format!("/admin/reports/{}", report_id),
            json!({ "status": "PENDING" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn report_listing_resolves_identities() {
    let app = app().await;
    let admin = app.create_admin("report_list_admin").await;
    let reporter = app.create_user("report_list_a").await;
    let reported = app.create_user("report_list_b").await;

    app.post_json(
        "/user/reports",
        json!({ "reported_id": reported.id, "description": "identity listing check" }),
        Some(&reporter.access_token),
    )
    .await;

    let resp = app
        .get(
            "/admin/reports?search=identity%20listing%20check",
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let data = resp.data();
    let results = data["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0]["reporter"]["username"].as_str().unwrap(),
        reporter.username
    );
    assert_eq!(
        results[0]["reported"]["email"].as_str().unwrap(),
        reported.email
    );
    assert!(results[0]["action_taken_by"].is_null());
}

#[tokio::test]
async fn reports_admin_surface_requires_admin() {
    let app = app().await;
    let user = app.create_user("report_role_member").await;

    let resp = app.get("/admin/reports", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}
