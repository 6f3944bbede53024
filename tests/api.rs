use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use sales_reconciler::api::OPERATOR_HEADER;
use sales_reconciler::config::AppConfig;
use sales_reconciler::db::{DEMO_ADMIN_ID, DEMO_USER_ID};
use sales_reconciler::{router, AppState, MemoryStorage, MemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

fn app() -> Router {
    let state = AppState::new(
        Arc::new(MemoryStore::with_demo_data()),
        Arc::new(MemoryStorage::new()),
        &AppConfig::default(),
    );
    router(state)
}

fn request(method: Method, uri: &str, operator: Option<Uuid>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = operator {
        builder = builder.header(OPERATOR_HEADER, id.to_string());
    }
    builder.body(body).unwrap()
}

fn json_request(method: Method, uri: &str, operator: Uuid, value: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(OPERATOR_HEADER, operator.to_string())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(value.to_string()))
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, req).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_needs_no_session() {
    let app = app();
    let (status, body) = send(&app, request(Method::GET, "/health", None, Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn missing_or_unknown_operator_is_unauthorized() {
    let app = app();
    let (status, body) = send_json(&app, request(Method::GET, "/api/workflow", None, Body::empty())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send_json(
        &app,
        request(Method::GET, "/api/workflow", Some(Uuid::new_v4()), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let app = app();
    let (status, _) = send_json(
        &app,
        request(Method::GET, "/api/admin/users", Some(DEMO_USER_ID), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send_json(
        &app,
        request(Method::GET, "/api/admin/users", Some(DEMO_ADMIN_ID), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn disabled_user_is_locked_out() {
    let app = app();
    let (status, _) = send_json(
        &app,
        json_request(
            Method::PUT,
            &format!("/api/admin/users/{DEMO_USER_ID}/status"),
            DEMO_ADMIN_ID,
            json!({ "status": "disabled" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(
        &app,
        request(Method::GET, "/api/workflow", Some(DEMO_USER_ID), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn sku_mappings_are_admin_managed() {
    let app = app();
    let (status, body) = send_json(
        &app,
        request(Method::GET, "/api/sku-mappings", Some(DEMO_USER_ID), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 10);

    let new_mapping = json!({ "market_sku": "NEW SKU", "variant_description": "New Variant" });
    let (status, _) = send_json(
        &app,
        json_request(Method::POST, "/api/sku-mappings", DEMO_USER_ID, new_mapping.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send_json(
        &app,
        json_request(Method::POST, "/api/sku-mappings", DEMO_ADMIN_ID, new_mapping),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = send_json(
        &app,
        request(
            Method::DELETE,
            &format!("/api/sku-mappings/{id}"),
            Some(DEMO_ADMIN_ID),
            Body::empty(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(
        &app,
        request(
            Method::DELETE,
            &format!("/api/sku-mappings/{id}"),
            Some(DEMO_ADMIN_ID),
            Body::empty(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_flow_over_http() {
    let app = app();
    let user = Some(DEMO_USER_ID);

    let template = "SURVEYOR,VARIANT DESCRIPTION,QUANTITY (in M)\nS1,Classic RT,\nS2,Classic RT,\n";
    let (status, body) = send_json(
        &app,
        request(Method::POST, "/api/template?file_name=plan.csv", user, Body::from(template)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let sales = "DS Name,Market SKU,Invoice Qty\nRavi,BNC CHOC TWST RS10,4\n";
    let (status, body) = send_json(
        &app,
        request(Method::POST, "/api/uploads/sales?file_name=march.csv", user, Body::from(sales)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["agents"], json!(["Ravi"]));

    let (status, body) = send_json(
        &app,
        request(Method::POST, "/api/uploads/complete", user, Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["data"]["agents"], json!(["Ravi"]));

    let (status, _) = send_json(
        &app,
        json_request(
            Method::PUT,
            "/api/uploads/agents",
            DEMO_USER_ID,
            json!({ "assignments": { "Ravi": "S2" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_json(
        &app,
        request(Method::POST, "/api/uploads/complete", user, Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let upload_id = body["data"]["upload_id"].as_str().unwrap().to_string();

    let (status, csv) = send(
        &app,
        request(
            Method::GET,
            &format!("/api/uploads/{upload_id}/output"),
            user,
            Body::empty(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        String::from_utf8(csv).unwrap(),
        "SURVEYOR,VARIANT DESCRIPTION,QUANTITY (in M)\nS1,Classic RT,0\nS2,Classic RT,4\n"
    );

    let (status, csv) = send(
        &app,
        request(
            Method::GET,
            &format!("/api/admin/uploads/{upload_id}/raw-summary"),
            Some(DEMO_ADMIN_ID),
            Body::empty(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        String::from_utf8(csv).unwrap(),
        "DS Name,Market SKU,Total Invoice Qty\nRavi,BNC CHOC TWST RS10,4\n"
    );
}

#[tokio::test]
async fn sales_before_template_is_a_conflict() {
    let app = app();
    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            "/api/uploads/sales?file_name=march.csv",
            Some(DEMO_USER_ID),
            Body::from("DS Name,Market SKU,Invoice Qty\nA,B,1\n"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Please upload a template first");
}
