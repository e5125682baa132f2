#![cfg(feature = "web")]

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use chart_studio::app::{AppState, router};
use chart_studio::login::AuthService;
use chart_studio::tokens::TokenIssuer;
use chart_studio::users::UserStore;
use chart_studio::{Config, MemoryChartStore};

const BOUNDARY: &str = "studio-test-boundary";

struct TestApp {
    app: Router,
    uploads: TempDir,
    _data: TempDir,
}

async fn test_app() -> TestApp {
    let data = tempfile::tempdir().unwrap();
    let uploads = tempfile::tempdir().unwrap();

    let upload_dir = uploads.path().to_string_lossy().to_string();
    let config = Config::from_lookup(|key| match key {
        "STUDIO_UPLOAD_DIR" => Some(upload_dir.clone()),
        _ => None,
    })
    .unwrap();

    let users = UserStore::open(data.path()).await.unwrap();
    let auth = AuthService::new(users, TokenIssuer::new(config.auth.clone()));
    let state = Arc::new(AppState {
        config,
        charts: Arc::new(MemoryChartStore::new()),
        auth,
    });

    TestApp {
        app: router(state),
        uploads,
        _data: data,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn multipart(fields: &[(&str, &str)], csv: Option<(&str, &str)>) -> Vec<u8> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    if let Some((file_name, contents)) = csv {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"csvFile\"; filename=\"{file_name}\"\r\nContent-Type: text/csv\r\n\r\n{contents}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body.into_bytes()
}

fn upload_request(token: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::post("/api/v1/graphs/create-from-csv").header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

fn staged_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// Register and log in, returning the access token
async fn sign_in(app: &Router, username: &str) -> String {
    let (status, _) = send(
        app,
        post_json(
            "/api/v1/users/register",
            json!({ "username": username, "email": format!("{username}@example.com"), "password": "pw" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        post_json(
            "/api/v1/users/login",
            json!({ "username": username, "password": "pw" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["accessToken"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn empty_community_feed_is_not_found() {
    let t = test_app().await;
    let (status, body) = send(&t.app, get("/api/v1/graphs/community-feed", None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "No graphs found in the community feed.");
}

#[tokio::test]
async fn login_sets_cookies_and_returns_tokens() {
    let t = test_app().await;
    send(
        &t.app,
        post_json(
            "/api/v1/users/register",
            json!({ "username": "ada", "email": "ada@example.com", "password": "pw" }),
        ),
    )
    .await;

    let response = t
        .app
        .clone()
        .oneshot(post_json(
            "/api/v1/users/login",
            json!({ "email": "ada@example.com", "password": "pw" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("accessToken=") && c.contains("HttpOnly")));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=")));
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("accessToken=") && c.contains("Max-Age=86400"))
    );
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("refreshToken=") && c.contains("Max-Age=864000"))
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["data"]["user"]["username"], "ada");
    assert!(body["data"]["refreshToken"].is_string());
    assert!(body["data"]["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let t = test_app().await;

    let (status, _) = send(&t.app, get("/api/v1/users/current-user", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&t.app, get("/api/v1/users/current-user", Some("garbage"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let token = sign_in(&t.app, "ada").await;
    let (status, body) = send(&t.app, get("/api/v1/users/current-user", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "ada");
}

#[tokio::test]
async fn access_cookie_authenticates() {
    let t = test_app().await;
    let token = sign_in(&t.app, "ada").await;

    let request = Request::get("/api/v1/users/current-user")
        .header(header::COOKIE, format!("accessToken={token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn upload_creates_chart_and_cleans_up() {
    let t = test_app().await;
    let token = sign_in(&t.app, "ada").await;

    let body = multipart(
        &[
            ("chartType", "line"),
            ("columns", r#"["month","rain","sun"]"#),
            ("tags", "weather"),
        ],
        Some(("weather.csv", "month,rain,sun\njan,10,3\nfeb,12,4\nmar,9,6\n")),
    );
    let (status, created) = send(&t.app, upload_request(Some(&token), body)).await;

    assert_eq!(status, StatusCode::CREATED, "{created}");
    let doc = &created["data"];
    assert_eq!(doc["name"], "weather");
    assert_eq!(doc["kind"], "line");
    assert_eq!(doc["data"].as_array().unwrap().len(), 2);
    assert_eq!(doc["data"][0]["x"], json!([0, 1, 2]));
    assert_eq!(doc["tags"], json!(["line", "csv-upload", "weather"]));
    assert_eq!(staged_files(t.uploads.path()), 0);

    let id = doc["id"].as_str().unwrap();
    let (status, fetched) = send(&t.app, get(&format!("/api/v1/graphs/{id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"], *doc);

    let (status, mine) = send(&t.app, get("/api/v1/graphs/mine", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["data"].as_array().unwrap().len(), 1);

    let (status, feed) = send(&t.app, get("/api/v1/graphs/community-feed", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn rejected_upload_is_cleaned_up_and_not_stored() {
    let t = test_app().await;
    let token = sign_in(&t.app, "ada").await;

    let body = multipart(
        &[("chartType", "scatter"), ("columns", r#"["name","score"]"#)],
        Some(("scores.csv", "name,score\nada,10\nbob,12\n")),
    );
    let (status, body) = send(&t.app, upload_request(Some(&token), body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("numeric"));
    assert_eq!(staged_files(t.uploads.path()), 0);

    let (status, _) = send(&t.app, get("/api/v1/graphs/community-feed", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_without_file_or_columns_is_bad_request() {
    let t = test_app().await;
    let token = sign_in(&t.app, "ada").await;

    let body = multipart(&[("chartType", "bar"), ("columns", r#"["a"]"#)], None);
    let (status, body) = send(&t.app, upload_request(Some(&token), body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No CSV file was uploaded");

    let body = multipart(&[("chartType", "bar")], Some(("a.csv", "a\n1\n")));
    let (status, body) = send(&t.app, upload_request(Some(&token), body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "At least one column must be selected");
    assert_eq!(staged_files(t.uploads.path()), 0);
}

#[tokio::test]
async fn upload_requires_authentication() {
    let t = test_app().await;
    let body = multipart(&[("chartType", "bar"), ("columns", r#"["a"]"#)], Some(("a.csv", "a\n1\n")));

    let (status, _) = send(&t.app, upload_request(None, body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(staged_files(t.uploads.path()), 0);
}

#[tokio::test]
async fn unknown_chart_is_not_found() {
    let t = test_app().await;
    let (status, body) = send(&t.app, get("/api/v1/graphs/does-not-exist", None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Graph does-not-exist not found");
}

#[tokio::test]
async fn refresh_via_body_rotates_tokens() {
    let t = test_app().await;
    sign_in(&t.app, "ada").await;
    let (_, login) = send(
        &t.app,
        post_json("/api/v1/users/login", json!({ "username": "ada", "password": "pw" })),
    )
    .await;
    let refresh = login["data"]["refreshToken"].as_str().unwrap().to_string();

    let (status, body) = send(
        &t.app,
        post_json("/api/v1/users/refresh-token", json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["data"]["refreshToken"], json!(refresh));

    let (status, _) = send(
        &t.app,
        post_json("/api/v1/users/refresh-token", json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let t = test_app().await;
    sign_in(&t.app, "ada").await;

    let (status, body) = send(
        &t.app,
        post_json(
            "/api/v1/users/register",
            json!({ "username": "ada", "email": "other@example.com", "password": "pw" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

fn patch_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::patch(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn update_account_details() {
    let t = test_app().await;
    let ada = sign_in(&t.app, "ada").await;
    sign_in(&t.app, "bob").await;

    let (status, body) = send(
        &t.app,
        patch_json(
            "/api/v1/users/update-account",
            &ada,
            json!({ "fullName": "Ada Lovelace", "email": "ada@engine.org" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["full_name"], "Ada Lovelace");
    assert_eq!(body["data"]["email"], "ada@engine.org");

    let (_, me) = send(&t.app, get("/api/v1/users/current-user", Some(&ada))).await;
    assert_eq!(me["data"]["email"], "ada@engine.org");

    let (status, body) = send(
        &t.app,
        patch_json(
            "/api/v1/users/update-account",
            &ada,
            json!({ "fullName": "Ada", "email": "bob@example.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, body) = send(
        &t.app,
        patch_json("/api/v1/users/update-account", &ada, json!({ "email": "x@y.z" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Full name and email are required");
}

#[tokio::test]
async fn update_account_requires_authentication() {
    let t = test_app().await;
    let request = Request::patch("/api/v1/users/update-account")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "fullName": "A", "email": "a@b.c" }).to_string()))
        .unwrap();

    let (status, _) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
