/// Integration tests for the TaskVault API
///
/// Router tests run against a lazily-connected pool and only exercise paths
/// that are rejected before any query. The scenarios at the bottom need a
/// running PostgreSQL (`DATABASE_URL`) and are ignored by default:
///
/// ```bash
/// cargo test -p taskvault-api --test integration_test -- --ignored
/// ```

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{unique, TestContext};
use serde_json::json;
use taskvault_shared::auth::jwt::{create_token, Claims};
use taskvault_shared::models::user::Role;
use tower::ServiceExt;

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let ctx = TestContext::new();

    let (status, body) = ctx.send("GET", "/api/v1/tasks", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No token provided");
    assert_eq!(body["success"], false);
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn test_malformed_authorization_header_is_rejected() {
    let ctx = TestContext::new();

    for header in ["Token abc", "Bearer", "Bearer a b"] {
        let request = Request::builder()
            .uri("/api/v1/tasks")
            .header("authorization", header)
            .body(Body::empty())
            .unwrap();

        let (status, body) = ctx.call(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "header {:?}", header);
        assert_eq!(body["message"], "Invalid token format");
    }
}

#[tokio::test]
async fn test_garbage_and_foreign_tokens_are_rejected() {
    let ctx = TestContext::new();

    let (status, body) = ctx.send("GET", "/api/v1/tasks", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid token");

    let foreign = create_token(
        &Claims::new(1, Role::Admin),
        "some-other-secret-that-is-32-bytes-long",
    )
    .unwrap();
    let (status, body) = ctx.send("GET", "/api/v1/tasks", Some(&foreign), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let ctx = TestContext::new();
    let claims = Claims::with_expiration(1, Role::Member, chrono::Duration::seconds(-60));
    let token = create_token(&claims, &ctx.config.jwt.secret).unwrap();

    let (status, body) = ctx.send("GET", "/api/v1/tasks", Some(&token), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token expired");
}

#[tokio::test]
async fn test_member_cannot_list_users() {
    let ctx = TestContext::new();
    let token = ctx.token_for(7, Role::Member);

    let (status, body) = ctx.send("GET", "/api/v1/users", Some(&token), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_member_cannot_touch_other_users() {
    let ctx = TestContext::new();
    let token = ctx.token_for(7, Role::Member);

    let (status, _) = ctx.send("GET", "/api/v1/users/8", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.send("DELETE", "/api/v1/users/8", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_non_numeric_id_is_bad_request() {
    let ctx = TestContext::new();
    let token = ctx.token_for(7, Role::Member);

    let (status, body) = ctx.send("GET", "/api/v1/users/abc", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid user ID");

    let (status, body) = ctx.send("GET", "/api/v1/tasks/abc", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid task ID");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let ctx = TestContext::new();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/register")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = ctx.call(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_register_validation_is_bad_request() {
    let ctx = TestContext::new();

    let (status, body) = ctx
        .send(
            "POST",
            "/api/v1/register",
            None,
            Some(json!({ "username": "al@ce", "email": "alice@x.com", "password": "secret1" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "username");
}

#[tokio::test]
async fn test_invalid_task_status_is_bad_request() {
    let ctx = TestContext::new();
    let token = ctx.token_for(7, Role::Member);

    let (status, _) = ctx
        .send(
            "POST",
            "/api/v1/tasks",
            Some(&token),
            Some(json!({ "title": "T", "description": "D", "status": "done" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unsafe_upload_name_is_not_found() {
    let ctx = TestContext::new();
    let token = ctx.token_for(7, Role::Member);

    let (status, body) = ctx
        .send("GET", "/api/v1/upload/..secret", Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "File not found");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let ctx = TestContext::new();

    let (status, _) = ctx.send("GET", "/api/v2/nothing", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limit_headers_are_set() {
    let ctx = TestContext::new();

    let request = Request::builder()
        .uri("/api/v1/tasks")
        .body(Body::empty())
        .unwrap();
    let response = ctx.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-ratelimit-limit"], "10000");
    assert!(response.headers().contains_key("x-ratelimit-remaining"));
}

#[tokio::test]
async fn test_cors_preflight_is_answered() {
    let ctx = TestContext::new();

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/v1/tasks")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "GET")
        .body(Body::empty())
        .unwrap();
    let response = ctx.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn test_responses_are_compressed_on_request() {
    let ctx = TestContext::new();

    let request = Request::builder()
        .uri("/api/v1/tasks")
        .header("accept-encoding", "gzip")
        .body(Body::empty())
        .unwrap();
    let response = ctx.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["content-encoding"], "gzip");
}

#[tokio::test]
async fn test_profile_update_follows_registration_rules() {
    let ctx = TestContext::new();
    let token = ctx.token_for(7, Role::Member);

    let (status, body) = ctx
        .send("PUT", "/api/v1/users/7", Some(&token), Some(json!({ "username": "al@ce" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "username");

    let (status, body) = ctx
        .send("PUT", "/api/v1/users/7", Some(&token), Some(json!({ "email": "alice@localhost" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "email");
}

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_register_then_duplicate_conflicts() {
    let ctx = TestContext::with_database().await.unwrap();
    let username = unique("alice");
    let register = json!({
        "username": username,
        "email": format!("{}@x.com", username),
        "password": "secret1",
    });

    let (status, body) = ctx
        .send("POST", "/api/v1/register", None, Some(register.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "User created successfully");
    assert!(body["data"]["id"].is_number());

    let (status, body) = ctx.send("POST", "/api/v1/register", None, Some(register)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_login_rejects_wrong_password() {
    let ctx = TestContext::with_database().await.unwrap();
    let username = unique("alice");
    let (user_id, token) = ctx.register_and_login(&username).await;
    assert!(!token.is_empty());

    let (status, body) = ctx
        .send(
            "POST",
            "/api/v1/login",
            None,
            Some(json!({ "username": username, "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, body) = ctx
        .send(
            "POST",
            "/api/v1/login",
            None,
            Some(json!({ "username": unique("nobody"), "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, body) = ctx
        .send("GET", &format!("/api/v1/users/{}", user_id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], username.as_str());
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_security_code_is_decrypted_on_read() {
    let ctx = TestContext::with_database().await.unwrap();
    let (_, token) = ctx.register_and_login(&unique("alice")).await;

    let (status, body) = ctx
        .send(
            "POST",
            "/api/v1/tasks",
            Some(&token),
            Some(json!({ "title": "T", "description": "D", "status": "pending", "security_code": "42" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let task_id = body["data"]["id"].as_i64().unwrap();

    let stored: Option<String> =
        sqlx::query_scalar("SELECT security_code FROM tasks WHERE id = $1")
            .bind(task_id as i32)
            .fetch_one(&ctx.db)
            .await
            .unwrap();
    assert_ne!(stored.as_deref(), Some("42"));

    let uri = format!("/api/v1/tasks/{}", task_id);

    let (status, body) = ctx.send("GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task found");
    assert_eq!(body["data"]["security_code"], "42");

    let (status, body) = ctx.send("GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task found (from cache)");
    assert_eq!(body["data"]["security_code"], "42");
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_task_access_is_owner_or_admin() {
    let ctx = TestContext::with_database().await.unwrap();
    let (_, alice) = ctx.register_and_login(&unique("alice")).await;
    let (bob_id, bob) = ctx.register_and_login(&unique("bob")).await;

    let (_, body) = ctx
        .send(
            "POST",
            "/api/v1/tasks",
            Some(&alice),
            Some(json!({ "title": "T", "description": "D", "status": "pending" })),
        )
        .await;
    let uri = format!("/api/v1/tasks/{}", body["data"]["id"]);

    let (status, _) = ctx.send("GET", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .send("PUT", &uri, Some(&bob), Some(json!({ "title": "mine now" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.send("DELETE", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = ctx.send("GET", "/api/v1/tasks", Some(&bob), None).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));

    let admin = ctx.token_for(bob_id, Role::Admin);
    let (status, body) = ctx.send("GET", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "T");
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_invalid_status_update_leaves_task_unchanged() {
    let ctx = TestContext::with_database().await.unwrap();
    let (_, token) = ctx.register_and_login(&unique("alice")).await;

    let (_, body) = ctx
        .send(
            "POST",
            "/api/v1/tasks",
            Some(&token),
            Some(json!({ "title": "T", "description": "D", "status": "pending" })),
        )
        .await;
    let uri = format!("/api/v1/tasks/{}", body["data"]["id"]);

    let (status, _) = ctx
        .send("PUT", &uri, Some(&token), Some(json!({ "status": "done" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = ctx.send("GET", &uri, Some(&token), None).await;
    assert_eq!(body["data"]["status"], "pending");

    let (status, body) = ctx
        .send("PUT", &uri, Some(&token), Some(json!({ "status": "completed" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");

    let (_, body) = ctx.send("GET", &uri, Some(&token), None).await;
    assert_eq!(body["message"], "Task found (from cache)");
    assert_eq!(body["data"]["status"], "completed");
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_user_with_tasks_cannot_be_deleted() {
    let ctx = TestContext::with_database().await.unwrap();
    let (user_id, token) = ctx.register_and_login(&unique("carol")).await;
    let uri = format!("/api/v1/users/{}", user_id);

    let (_, body) = ctx
        .send(
            "POST",
            "/api/v1/tasks",
            Some(&token),
            Some(json!({ "title": "T", "description": "D", "status": "pending" })),
        )
        .await;
    let task_uri = format!("/api/v1/tasks/{}", body["data"]["id"]);

    let (status, _) = ctx.send("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = ctx.send("DELETE", &task_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx.send("GET", &task_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx.send("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx.send("GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_profile_picture_for_missing_user_leaves_no_file() {
    let ctx = TestContext::with_database().await.unwrap();
    let token = ctx.token_for(i32::MAX, Role::Member);
    let dir = ctx.config.upload.dir.clone();
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let before = std::fs::read_dir(&dir).unwrap().count();

    let boundary = "taskvault-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"profile_picture\"; filename=\"me.png\"\r\n\
         Content-Type: image/png\r\n\r\npng-bytes\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/upload/profile_picture")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap();

    let (status, body) = ctx.call(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), before);
}
