mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::json;

use common::{Form, TestApp};

#[tokio::test]
async fn login_stores_the_issued_refresh_token() {
    let app = TestApp::new();
    app.register("alice", "secret-pw").await;

    let resp = app.login("ALICE", "secret-pw").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["statusCode"], 200);
    assert_eq!(resp.body["success"], true);

    let data = resp.data();
    assert!(data["user"].get("password").is_none());
    assert!(data["user"].get("refreshToken").is_none());
    let refresh = data["refreshToken"].as_str().unwrap();
    assert!(!data["accessToken"].as_str().unwrap().is_empty());

    let stored = app.db().get_user_by_username("alice").unwrap().unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some(refresh));

    let access_cookie = resp.cookie("accessToken").unwrap();
    assert!(access_cookie.contains("HttpOnly"));
    assert!(access_cookie.contains("Path=/"));
    assert!(resp.cookie("refreshToken").unwrap().contains(refresh));
}

#[tokio::test]
async fn login_by_email_works() {
    let app = TestApp::new();
    app.register("alice", "secret-pw").await;

    let resp = app
        .json(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "email": "Alice@Example.com", "password": "secret-pw" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["user"]["username"], "alice");
}

#[tokio::test]
async fn login_failures() {
    let app = TestApp::new();
    app.register("alice", "secret-pw").await;

    let resp = app.json("POST", "/api/v1/users/login", None, json!({ "password": "x" })).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.message(), "Email or username is required");
    assert_eq!(resp.body["success"], false);

    let resp = app.json("POST", "/api/v1/users/login", None, json!({ "username": "alice" })).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.message(), "Password is required");

    let resp = app.login("nobody", "secret-pw").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.body["statusCode"], 404);

    let resp = app.login("alice", "wrong").await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.message(), "Invalid credentials");
}

#[tokio::test]
async fn refresh_rotates_and_old_token_is_rejected() {
    let app = TestApp::new();
    let (_, _, refresh) = app.signed_in("alice").await;

    let resp = app
        .json("POST", "/api/v1/users/refresh-token", None, json!({ "refreshToken": refresh }))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let rotated = resp.data()["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(rotated, refresh);

    let stored = app.db().get_user_by_username("alice").unwrap().unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some(rotated.as_str()));

    // Validly signed, but no longer the stored one.
    let resp = app
        .json("POST", "/api/v1/users/refresh-token", None, json!({ "refreshToken": refresh }))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.message(), "Refresh token expired or used");
}

#[tokio::test]
async fn refresh_reads_the_cookie() {
    let app = TestApp::new();
    let (_, _, refresh) = app.signed_in("alice").await;

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/users/refresh-token")
        .header(header::COOKIE, format!("refreshToken={refresh}"))
        .body(Body::empty())
        .unwrap();
    let resp = app.send(req).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.cookie("accessToken").is_some());
}

#[tokio::test]
async fn refresh_rejects_missing_and_forged_tokens() {
    let app = TestApp::new();
    let (_, access, _) = app.signed_in("alice").await;

    let resp = app.json("POST", "/api/v1/users/refresh-token", None, json!({})).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.message(), "Unauthorized request");

    // An access token is signed with the other secret.
    let resp = app
        .json("POST", "/api/v1/users/refresh-token", None, json!({ "refreshToken": access }))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.message(), "Invalid refresh token");
}

#[tokio::test]
async fn logout_clears_cookies_and_stored_token() {
    let app = TestApp::new();
    let (_, access, refresh) = app.signed_in("alice").await;

    let resp = app.json("POST", "/api/v1/users/logout", Some(&access), json!({})).await;
    assert_eq!(resp.status, StatusCode::OK);
    for name in ["accessToken", "refreshToken"] {
        let cookie = resp.cookie(name).unwrap();
        assert!(cookie.contains("Max-Age=0"), "{cookie}");
    }

    let stored = app.db().get_user_by_username("alice").unwrap().unwrap();
    assert!(stored.refresh_token.is_none());

    let resp = app
        .json("POST", "/api/v1/users/refresh-token", None, json!({ "refreshToken": refresh }))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = TestApp::new();
    let (id, access, _) = app.signed_in("alice").await;

    let resp = app.get("/api/v1/users/currentUser", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.message(), "Unauthorized request");

    let resp = app.get("/api/v1/users/currentUser", Some("not-a-jwt")).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.message(), "Invalid access token");

    let resp = app.get("/api/v1/users/currentUser", Some(&access)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["_id"], id.as_str());
    assert_eq!(resp.data()["username"], "alice");

    let req = Request::builder()
        .uri("/api/v1/users/currentUser")
        .header(header::COOKIE, format!("accessToken={access}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(req).await.status, StatusCode::OK);
}

#[tokio::test]
async fn token_of_deleted_user_is_rejected() {
    let app = TestApp::new();
    let (id, access, _) = app.signed_in("alice").await;
    app.db().delete_user(&id).unwrap();

    let resp = app.get("/api/v1/users/currentUser", Some(&access)).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.message(), "Invalid access token");
}

#[tokio::test]
async fn healthcheck_answers_ok() {
    let app = TestApp::new();
    let resp = app.get("/api/v1/healthcheck", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data(), "OK");
}

#[tokio::test]
async fn password_whitespace_is_kept_verbatim() {
    let app = TestApp::new();
    let form = Form::new()
        .text("fullname", "Alice")
        .text("email", "alice@example.com")
        .text("username", "alice")
        .text("password", "  pass phrase  ")
        .file("avatar", "me.png", b"avatar-bytes");
    let resp = app.multipart("POST", "/api/v1/users/register", None, form).await;
    assert_eq!(resp.status, StatusCode::CREATED, "{:?}", resp.body);

    assert_eq!(app.login("alice", "  pass phrase  ").await.status, StatusCode::OK);
    assert_eq!(app.login("alice", "pass phrase").await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refreshes_redeem_a_token_once() {
    let app = TestApp::new();
    let (_, _, refresh) = app.signed_in("alice").await;

    let body = json!({ "refreshToken": refresh });
    let (a, b) = tokio::join!(
        app.json("POST", "/api/v1/users/refresh-token", None, body.clone()),
        app.json("POST", "/api/v1/users/refresh-token", None, body.clone()),
    );

    let mut statuses = [a.status, b.status];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::UNAUTHORIZED]);

    let winner = if a.status == StatusCode::OK { &a } else { &b };
    let loser = if a.status == StatusCode::OK { &b } else { &a };
    assert_eq!(loser.message(), "Refresh token expired or used");

    let stored = app.db().get_user_by_username("alice").unwrap().unwrap();
    assert_eq!(
        stored.refresh_token.as_deref(),
        winner.data()["refreshToken"].as_str()
    );
}
