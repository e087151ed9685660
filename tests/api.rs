//! Drives the filter tree with `warp::test`. Most requests here are answered
//! before a database query runs, so the pool never has to connect; the
//! `#[sqlx::test]` cases get a migrated database from `DATABASE_URL`.

use foodgram::{
    jwt::SessionKeys,
    media::MediaStore,
    state::{AppState, SharedState},
    Cache,
};
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use warp::http::StatusCode;

fn state() -> SharedState {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://foodgram@localhost/foodgram_test")
        .expect("lazy pool");
    state_with(pool)
}

fn state_with(pool: PgPool) -> SharedState {
    let keys = SessionKeys::new("test-secret", 1).expect("keys");
    AppState::new(pool, Cache::disabled(), keys, MediaStore::new("media"))
}

async fn request(method: &str, path: &str, body: Option<&str>, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = warp::test::request().method(method).path(path);
    if let Some(body) = body {
        builder = builder
            .header("content-type", "application/json")
            .body(body.to_string());
    }
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Token {token}"));
    }

    let response = builder.reply(&foodgram::api(state())).await;
    let body = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
    (response.status(), body)
}

#[tokio::test]
async fn me_requires_credentials() {
    let (status, body) = request("GET", "/api/users/me/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body,
        json!({ "detail": "Authentication credentials were not provided." })
    );
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let (status, body) = request("GET", "/api/users/me/", None, Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "detail": "Invalid token." }));
}

#[tokio::test]
async fn bad_token_is_rejected_on_public_endpoints() {
    let (status, _) = request("GET", "/api/recipes/", None, Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_session_cookie_is_rejected() {
    let response = warp::test::request()
        .method("GET")
        .path("/api/users/me/")
        .header("cookie", "session=not-a-jwt")
        .reply(&foodgram::api(state()))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn writes_require_credentials() {
    for (method, path) in [
        ("POST", "/api/recipes/"),
        ("PATCH", "/api/recipes/1/"),
        ("DELETE", "/api/recipes/1/"),
        ("POST", "/api/recipes/1/favorite/"),
        ("DELETE", "/api/recipes/1/shopping_cart/"),
        ("GET", "/api/recipes/download_shopping_cart/"),
        ("POST", "/api/users/2/subscribe/"),
        ("GET", "/api/users/subscriptions/"),
        ("POST", "/api/users/set_password/"),
        ("POST", "/api/auth/token/logout/"),
        ("POST", "/api/tags/"),
        ("POST", "/api/ingredients/"),
    ] {
        let (status, _) = request(method, path, Some("{}"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {path}");
    }
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let (status, body) = request("GET", "/api/nothing/", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Not found." }));

    let (status, _) = request("GET", "/api/users/someone/", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_method_is_not_allowed() {
    let (status, _) = request("PUT", "/api/recipes/1/", Some("{}"), None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let (status, body) = request("POST", "/api/users/", Some("{not json"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("errors").is_some(), "{body}");
}

#[tokio::test]
async fn registration_reports_the_first_invalid_field() {
    let (status, body) = request("POST", "/api/users/", Some("{}"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "email": ["This field is required."] }));

    let payload = json!({
        "email": "cook@example.com",
        "username": "bad name",
        "first_name": "Ann",
        "last_name": "Cook",
        "password": "secret",
    })
    .to_string();
    let (status, body) = request("POST", "/api/users/", Some(&payload), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("username").is_some(), "{body}");
}

#[tokio::test]
async fn login_requires_both_fields() {
    let (status, body) = request("POST", "/api/auth/token/login/", Some("{}"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "email": ["This field is required."] }));

    let (status, body) = request(
        "POST",
        "/api/auth/token/login/",
        Some(r#"{"email": "cook@example.com"}"#),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "password": ["This field is required."] }));
}

#[tokio::test]
async fn pagination_parameters_are_validated() {
    let (status, _) = request("GET", "/api/recipes/?page=abc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = request("GET", "/api/users/?page=0", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Invalid page." }));

    let path = format!("/api/users/?page={}&limit=100", i64::MAX);
    let (status, body) = request("GET", &path, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Invalid page." }));
}

#[tokio::test]
async fn recipe_filters_are_validated() {
    let (status, _) = request("GET", "/api/recipes/?is_favorited=maybe", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request("GET", "/api/recipes/?author=someone", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test]
#[ignore = "needs a postgres server in DATABASE_URL"]
async fn page_past_the_end_is_not_found(pool: PgPool) {
    let api = foodgram::api(state_with(pool));

    let response = warp::test::request()
        .path("/api/users/")
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body, json!({ "count": 0, "next": null, "previous": null, "results": [] }));

    let response = warp::test::request()
        .path("/api/users/?page=2")
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body, json!({ "detail": "Invalid page." }));
}
