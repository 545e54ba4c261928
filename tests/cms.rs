//! CMS page tests

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn page_lifecycle() {
    let app = app().await;
    let admin = app.create_admin("cms_lifecycle_admin").await;
    let name = format!("lifecycle-{}", Uuid::new_v4());

    let resp = app
        .post_json(
            "/admin/cms-pages",
            json!({ "page_name": name, "content": "<h1>Hello</h1>", "status": "PUBLISHED" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    assert_eq!(data["page_name"].as_str().unwrap(), name);
    assert_eq!(data["status"], "PUBLISHED");
    let page_id = data["id"].as_str().unwrap().to_string();
    assert_eq!(app.audit_count("CREATE_CMS_PAGE", Some(admin.id)).await, 1);

    let resp = app
        .put_json(
            &format!("/admin/cms-pages/{}", page_id),
            json!({ "content": "<h1>Hello v2</h1>", "status": "UNPUBLISHED" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .get(
            &format!("/admin/cms-pages/{}", page_id),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.data()["content"], "<h1>Hello v2</h1>");
    assert_eq!(resp.data()["status"], "UNPUBLISHED");

    let resp = app
        .delete(
            &format!("/admin/cms-pages/{}", page_id),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .get(
            &format!("/admin/cms-pages/{}", page_id),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn page_defaults_to_draft() {
    let app = app().await;
    let admin = app.create_admin("cms_draft_admin").await;
    let name = format!("draft-{}", Uuid::new_v4());

    let resp = app
        .post_json(
            "/admin/cms-pages",
            json!({ "page_name": name, "content": "draft body" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["status"], "DRAFT");
}

#[tokio::test]
async fn page_name_collision_on_create() {
    let app = app().await;
    let admin = app.create_admin("cms_collide_admin").await;
    let name = format!("collide-{}", Uuid::new_v4());

    let resp = app
        .post_json(
            "/admin/cms-pages",
            json!({ "page_name": name, "content": "one" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .post_json(
            "/admin/cms-pages",
            json!({ "page_name": name, "content": "two" }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "Page name already exists");
}

#[tokio::test]
async fn page_name_collision_on_rename() {
    let app = app().await;
    let admin = app.create_admin("cms_rename_admin").await;
    let first = format!("rename-a-{}", Uuid::new_v4());
    let second = format!("rename-b-{}", Uuid::new_v4());

    app.post_json(
        "/admin/cms-pages",
        json!({ "page_name": first, "content": "a" }),
        Some(&admin.access_token),
    )
    .await;
    let resp = app
        .post_json(
            "/admin/cms-pages",
            json!({ "page_name": second, "content": "b" }),
            Some(&admin.access_token),
        )
        .await;
    let second_id = resp.data()["id"].as_str().unwrap().to_string();

    let resp = app
        .put_json(
            &format!("/admin/cms-pages/{}", second_id),
            json!({ "page_name": first }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "Page name already exists");
}

#[tokio::test]
async fn page_rejects_invalid_status() {
    let app = app().await;
    let admin = app.create_admin("cms_status_admin").await;

    let resp = app
        .post_json(
            "/admin/cms-pages",
            json!({
                "page_name": format!("status-{}", Uuid::new_v4()),
                "content": "x",
                "status": "ARCHIVED",
            }),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn page_list_filters_by_status() {
    let app = app().await;
    let admin = app.create_admin("cms_list_admin").await;
    let name = format!("listable-{}", Uuid::new_v4());

    app.post_json(
        "/admin/cms-pages",
        json!({ "page_name": name, "content": "listable", "status": "PUBLISHED" }),
        Some(&admin.access_token),
    )
    .await;

    let resp = app
        .get(
            &format!("/admin/cms-pages?search={}&status=PUBLISHED", name),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    assert_eq!(data["results"].as_array().unwrap().len(), 1);
    assert_eq!(data["pagination"]["total"], 1);

    let resp = app
        .get(
            &format!("/admin/cms-pages?search={}&status=DRAFT", name),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.data()["results"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn pages_require_admin_role() {
    let app = app().await;
    let user = app.create_user("cms_role_member").await;

    let resp = app
        .post_json(
            "/admin/cms-pages",
            json!({ "page_name": "nope", "content": "nope" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}
