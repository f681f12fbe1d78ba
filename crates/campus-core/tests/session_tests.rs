mod support;

use campus_core::{ApiError, CredentialStore, PortalRole, TokenPair};
use reqwest::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use support::{fresh_token, user_json, Harness};

#[tokio::test]
async fn login_stores_tokens_and_user() {
    let h = Harness::new().await;
    let access = fresh_token("login");
    Mock::given(method("POST"))
        .and(path("/api/users/login/"))
        .and(body_json(json!({"username": "lecturer01", "password": "s3cret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": access,
            "refresh": "refresh-login",
            "user": user_json()
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let login = h.client.login("lecturer01", "s3cret").await.expect("login");
    assert_eq!(login.user.username, "lecturer01");
    assert_eq!(login.user.primary_role(), PortalRole::Lecturer);

    assert_eq!(h.pair(), Some(TokenPair::new(access, "refresh-login")));
    let cached = h.cached_user().expect("user cached");
    assert!(cached.has_permission("mark_attendance"));
    assert_eq!(h.client.restore_session().unwrap(), Some(cached));
}

#[tokio::test]
async fn failed_login_leaves_store_empty() {
    let h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/api/users/login/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid credentials"})))
        .mount(&h.server)
        .await;

    let err = h.client.login("lecturer01", "wrong").await.unwrap_err();
    assert!(matches!(err, ApiError::LoginFailed(StatusCode::UNAUTHORIZED)));
    assert!(h.pair().is_none());
    assert!(h.cached_user().is_none());
    assert_eq!(h.spy.count(), 0);
}

#[tokio::test]
async fn logout_revokes_and_clears() {
    let access = fresh_token("session");
    let h = Harness::with_pair(TokenPair::new(access.clone(), "refresh-1")).await;
    Mock::given(method("POST"))
        .and(path("/api/users/logout/"))
        .and(header("authorization", format!("Bearer {}", access).as_str()))
        .and(body_json(json!({"refresh": "refresh-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Successfully logged out"})))
        .expect(1)
        .mount(&h.server)
        .await;

    h.client.logout().await.expect("logout");
    assert!(h.pair().is_none());
    assert!(h.cached_user().is_none());
    assert_eq!(h.client.restore_session().unwrap(), None);
}

#[tokio::test]
async fn logout_clears_even_when_server_fails() {
    let h = Harness::with_pair(TokenPair::new(fresh_token("session"), "refresh-1")).await;
    Mock::given(method("POST"))
        .and(path("/api/users/logout/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Invalid token"})))
        .expect(1)
        .mount(&h.server)
        .await;

    h.client.logout().await.expect("logout");
    assert!(h.pair().is_none());
    assert!(h.cached_user().is_none());
}

#[tokio::test]
async fn logout_without_session_skips_server() {
    let h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/api/users/logout/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    h.client.logout().await.expect("logout");
}

#[tokio::test]
async fn restore_requires_full_pair() {
    let h = Harness::new().await;
    h.store.set_cached_user(&support::user()).unwrap();
    assert_eq!(h.client.restore_session().unwrap(), None);
}

#[tokio::test]
async fn check_permission_maps_forbidden_to_false() {
    let h = Harness::with_pair(TokenPair::new(fresh_token("session"), "refresh-1")).await;
    Mock::given(method("GET"))
        .and(path("/api/users/check-permission/mark_attendance/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"has_permission": true})))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/check-permission/manage_users/"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"has_permission": false})))
        .mount(&h.server)
        .await;

    assert!(h.client.check_permission("mark_attendance").await.unwrap());
    assert!(!h.client.check_permission("manage_users").await.unwrap());
    assert!(h.pair().is_some());
}

#[tokio::test]
async fn refresh_tokens_normalizes_failures_to_none() {
    let h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/api/users/token/refresh/"))
        .and(body_json(json!({"refresh": "garbled"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users/token/refresh/"))
        .and(body_json(json!({"refresh": "rotating"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "a2", "refresh": ""})))
        .mount(&h.server)
        .await;

    assert!(h.client.refresh_tokens("").await.is_none());
    assert!(h.client.refresh_tokens("garbled").await.is_none());
    // An empty rotated token is not a rotation.
    assert_eq!(
        h.client.refresh_tokens("rotating").await,
        Some(TokenPair::new("a2", "rotating"))
    );
}
