//! End-to-end HTTP tests against the full router.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use tower::ServiceExt;

mod common;
use common::*;

fn app(db: &TestDb, clock: std::sync::Arc<FixedClock>) -> Router {
    keyvend::app(test_state(db, clock))
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).expect("Response should be valid JSON")
}

/// Create a salesperson with a real password through the admin API.
async fn admin_create_salesperson(app: &Router, username: &str, password: &str) -> Value {
    let response = send(
        app,
        request(
            "POST",
            "/admin/salespeople",
            Some(ADMIN_TOKEN),
            Some(json!({
                "username": username,
                "password": password,
                "name": "Sales Person",
                "commission_rate": 0.1
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

async fn login(app: &Router, username: &str, password: &str) -> Response {
    send(
        app,
        request(
            "POST",
            "/salesperson/login",
            None,
            Some(json!({ "username": username, "password": password })),
        ),
    )
    .await
}

#[tokio::test]
async fn test_health() {
    let db = test_db();
    let app = app(&db, test_clock());

    let response = send(&app, request("GET", "/health", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let db = test_db();
    let app = app(&db, test_clock());

    let response = send(&app, request("GET", "/admin/software", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "UNAUTHORIZED");

    let response = send(&app, request("GET", "/admin/software", Some("wrong"), None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, request("GET", "/admin/software", Some(ADMIN_TOKEN), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_catalog_mint_and_activate_flow() {
    let db = test_db();
    let app = app(&db, test_clock());

    let software = json_body(
        send(
            &app,
            request(
                "POST",
                "/admin/software",
                Some(ADMIN_TOKEN),
                Some(json!({ "name": "Editor", "version": "2.1.0" })),
            ),
        )
        .await,
    )
    .await;
    let software_id = software["id"].as_i64().unwrap();

    let key_type = json_body(
        send(
            &app,
            request(
                "POST",
                "/admin/key-types",
                Some(ADMIN_TOKEN),
                Some(json!({ "name": "Daily", "hours": 24, "price": 1.5 })),
            ),
        )
        .await,
    )
    .await;
    let key_type_id = key_type["id"].as_i64().unwrap();

    let response = send(
        &app,
        request(
            "POST",
            &format!("/admin/software/{}/key-types", software_id),
            Some(ADMIN_TOKEN),
            Some(json!({ "key_type_id": key_type_id })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        request(
            "POST",
            "/admin/keys",
            Some(ADMIN_TOKEN),
            Some(json!({ "software_id": software_id, "key_type_id": key_type_id, "count": 2 })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let minted = json_body(response).await;
    let minted = minted.as_array().unwrap();
    assert_eq!(minted.len(), 2);
    let code = minted[0]["code"].as_str().unwrap().to_string();
    let key_code = minted[0]["key_code"].as_str().unwrap().to_string();

    let activate = json!({
        "code": code,
        "key_code": key_code,
        "software_id": software_id,
        "device_info": "laptop"
    });
    let response = send(&app, request("POST", "/keys/activate", None, Some(activate.clone()))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let key = json_body(response).await;
    assert_eq!(key["status"], "used");
    assert_eq!(key["expired_at"], NOW + 24 * 3600);

    let response = send(&app, request("POST", "/keys/activate", None, Some(activate))).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["code"], "INVALID_STATE");

    let response = send(
        &app,
        request("GET", &format!("/keys/status?key_code={}", key_code), None, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "used");
}

#[tokio::test]
async fn test_validation_errors_are_json() {
    let db = test_db();
    let app = app(&db, test_clock());

    let response = send(
        &app,
        request(
            "POST",
            "/admin/keys",
            Some(ADMIN_TOKEN),
            Some(json!({ "software_id": "not-a-number" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "VALIDATION_ERROR");

    let response = send(&app, request("GET", "/keys/status", None, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, request("GET", "/admin/keys/abc", Some(ADMIN_TOKEN), None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_salesperson_login_and_me() {
    let db = test_db();
    let app = app(&db, test_clock());
    let created = admin_create_salesperson(&app, "alice", "hunter22").await;
    assert!(created.get("password_hash").is_none());

    let response = login(&app, "alice", "hunter22").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(body["salesperson"]["username"], "alice");
    assert_eq!(body["salesperson"]["last_login_at"], NOW);

    let response = send(&app, request("GET", "/me", Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let me = json_body(response).await;
    assert_eq!(me["id"], created["id"]);
    assert_eq!(me["level"], 0);

    let response = send(&app, request("GET", "/me", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The admin token is not a salesperson token
    let response = send(&app, request("GET", "/me", Some(ADMIN_TOKEN), None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_suspended_salesperson_loses_access() {
    let db = test_db();
    let app = app(&db, test_clock());
    let created = admin_create_salesperson(&app, "bob", "hunter22").await;
    let id = created["id"].as_i64().unwrap();
    let token = json_body(login(&app, "bob", "hunter22").await).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = send(
        &app,
        request(
            "PUT",
            &format!("/admin/salespeople/{}", id),
            Some(ADMIN_TOKEN),
            Some(json!({ "status": "suspended" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, request("GET", "/me", Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = login(&app, "bob", "hunter22").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_login_lockout() {
    let db = test_db();
    let clock = test_clock();
    let app = app(&db, clock.clone());
    admin_create_salesperson(&app, "carol", "hunter22").await;

    for _ in 0..LOGIN_MAX_ATTEMPTS - 1 {
        let response = login(&app, "carol", "wrong-password").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let response = login(&app, "carol", "wrong-password").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = json_body(response).await;
    assert_eq!(body["code"], "TOO_MANY_REQUESTS");
    assert_eq!(body["minutes"], 15);

    // Locked even with the right password
    let response = login(&app, "carol", "hunter22").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    clock.advance(15 * 60);
    let response = login(&app, "carol", "hunter22").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_salesperson_sells_and_exports() {
    let db = test_db();
    let clock = test_clock();
    let app = app(&db, clock.clone());
    let (software, key_type) = {
        let conn = db.pool.get().unwrap();
        seed_catalog(&conn, clock.as_ref())
    };
    let created = admin_create_salesperson(&app, "dave", "hunter22").await;
    let id = created["id"].as_i64().unwrap();

    let response = send(
        &app,
        request(
            "POST",
            &format!("/admin/salespeople/{}/products", id),
            Some(ADMIN_TOKEN),
            Some(json!({
                "software_id": software.id,
                "key_type_id": key_type.id,
                "commission_rate": 0.2,
                "key_gen_limit": 10
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let token = json_body(login(&app, "dave", "hunter22").await).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = send(
        &app,
        request(
            "POST",
            "/me/keys",
            Some(&token),
            Some(json!({
                "software_id": software.id,
                "key_type_id": key_type.id,
                "count": 3,
                "customer_name": "Acme"
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = json_body(response).await;
    assert_eq!(outcome["keys"].as_array().unwrap().len(), 3);
    assert_eq!(outcome["sale"]["customer_name"], "Acme");
    assert!(outcome.get("cascade_error").is_none());

    let response = send(
        &app,
        request(
            "POST",
            "/me/keys",
            Some(&token),
            Some(json!({ "software_id": software.id, "key_type_id": key_type.id, "count": 8 })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(response).await["code"], "INTEGRITY_VIOLATION");

    let response = send(&app, request("GET", "/me/keys/export", Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("attachment"));
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let csv = String::from_utf8(body.to_vec()).unwrap();
    assert_eq!(csv.lines().count(), 4);

    let response = send(&app, request("GET", "/me/commission", Some(&token), None)).await;
    let stats = json_body(response).await;
    assert!((stats["total_sales"].as_f64().unwrap() - 29.97).abs() < 1e-9);
}

#[tokio::test]
async fn test_invitation_flow_over_http() {
    let db = test_db();
    let app = app(&db, test_clock());
    admin_create_salesperson(&app, "erin", "hunter22").await;
    admin_create_salesperson(&app, "frank", "hunter22").await;
    let erin = json_body(login(&app, "erin", "hunter22").await).await["token"]
        .as_str()
        .unwrap()
        .to_string();
    let frank = json_body(login(&app, "frank", "hunter22").await).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = send(
        &app,
        request(
            "POST",
            "/me/invitations",
            Some(&erin),
            Some(json!({ "email": "frank@example.com" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let invitation = json_body(response).await;
    let code = invitation["invite_code"].as_str().unwrap().to_string();

    let response = send(
        &app,
        request("POST", &format!("/me/invitations/{}/reject", code), Some(&erin), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        request("POST", &format!("/me/invitations/{}/accept", code), Some(&frank), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, request("GET", "/me/hierarchy", Some(&erin), None)).await;
    let view = json_body(response).await;
    assert_eq!(view["children_count"], 1);
    assert_eq!(view["children"][0]["username"], "frank");

    let response = send(&app, request("GET", "/me/hierarchy", Some(&frank), None)).await;
    let view = json_body(response).await;
    assert_eq!(view["level"], 1);
    assert_eq!(view["parent"]["username"], "erin");
}
