//! Contact request and audit log tests

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

#[tokio::test]
async fn submit_and_respond_to_contact_request() {
    let app = app().await;
    let admin = app.create_admin("contact_flow_admin").await;
    let user = app.create_user("contact_flow_member").await;

    let resp = app
        .post_json(
            "/user/contact-us",
            json!({ "subject": "Billing question", "message": "I was charged twice" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let contact_id = resp.data()["id"].as_str().unwrap().to_string();

    let resp = app
        .put_json(
            &format!("/admin/contact-requests/{}/respond", contact_id),
            json!({ "response": "Refunded the duplicate charge" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let data = resp.data();
    assert_eq!(data["status"], "RESOLVED");
    assert_eq!(data["admin_response"], "Refunded the duplicate charge");
    assert_eq!(data["admin_id"].as_str().unwrap(), admin.id.to_string());
    assert!(data["responded_at"].is_string());
    assert_eq!(data["user"]["email"].as_str().unwrap(), user.email);
    assert_eq!(
        app.audit_count("RESPOND_TO_CONTACT_REQUEST", Some(admin.id))
            .await,
        1
    );
}

#[tokio::test]
async fn respond_to_unknown_request_is_not_found() {
    let app = app().await;
    let admin = app.create_admin("contact_missing_admin").await;

    let resp = app
        .put_json(
            &format!("/admin/contact-requests/{}/respond", uuid::Uuid::new_v4()),
            json!({ "response": "hello?" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn contact_list_filters_by_user() {
    let app = app().await;
    let admin = app.create_admin("contact_list_admin").await;
    let user = app.create_user("contact_list_member").await;

    app.post_json(
        "/user/contact-us",
        json!({ "subject": "Feature idea", "message": "dark mode please" }),
        Some(&user.access_token),
    )
    .await;

    let resp = app
        .get(
            &format!("/admin/contact-requests?user_id={}", user.id),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let data = resp.data();
    let results = data["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["subject"], "Feature idea");
    assert_eq!(results[0]["status"], "PENDING");
}

#[tokio::test]
async fn contact_submission_requires_body_fields() {
    let app = app().await;
    let user = app.create_user("contact_empty_member").await;

    let resp = app
        .post_json(
            "/user/contact-us",
            json!({ "subject": "", "message": "" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// Audit log
// ===========================================================================

#[tokio::test]
async fn audit_log_lists_actions_with_actor_identity() {
    let app = app().await;
    let admin = app.create_admin("audit_list_admin").await;

    // Produce an audited mutation
    let resp = app
        .post_json(
            "/admin/cms-pages",
            json!({
                "page_name": format!("audited-{}", uuid::Uuid::new_v4()),
                "content": "audited",
            }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .get(
            "/admin/audit-log?search=CREATE_CMS_PAGE&limit=50",
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let data = resp.data();
    let results = data["results"].as_array().unwrap();
    let mine = results
        .iter()
        .find(|entry| entry["actor"]["id"].as_str() == Some(&admin.id.to_string()))
        .expect("audit entry for this admin");
    assert_eq!(mine["action"], "CREATE_CMS_PAGE");
    assert_eq!(mine["actor"]["email"].as_str().unwrap(), admin.email);
    assert!(mine["details"]["page_name"].is_string());
}

#[tokio::test]
async fn audit_log_requires_admin_role() {
    let app = app().await;
    let user = app.create_user("audit_role_member").await;

    let resp = app.get("/admin/audit-log", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}
