// Integration tests for the SwiftLink client
//
// These tests drive the real reqwest transport against a mock HTTP server
// to verify the full request path: bearer attachment, expired-token
// renewal, replay, session termination and the links API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use mockito::{Matcher, Server};
use serde_json::json;

use swiftlink_core::auth::{MemoryStore, RenewalError};
use swiftlink_core::{ApiClient, ApiError, Config, Credential, CredentialStore, Subscription};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

/// Unsigned JWT-shaped token carrying the given email.
fn jwt(email: &str, jti: u32) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        json!({ "sub": format!("user-{}", jti), "email": email, "exp": 4102444800u64, "jti": jti })
            .to_string(),
    );
    format!("{}.{}.signature", header, payload)
}

struct TestClient {
    api: ApiClient,
    durable: MemoryStore,
    terminations: Arc<AtomicUsize>,
    _subscription: Subscription,
}

impl TestClient {
    fn new(base_url: String) -> Self {
        let config = Config {
            api_base_url: base_url,
            public_url: "https://sw.ift".to_string(),
            ..Config::default()
        };
        let durable = MemoryStore::new();
        let api = ApiClient::new(&config, CredentialStore::new(durable.clone()))
            .expect("Failed to create API client");

        let terminations = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&terminations);
        let subscription = api.on_session_event(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        Self {
            api,
            durable,
            terminations,
            _subscription: subscription,
        }
    }

    fn logged_in(base_url: String, access: &str, refresh: &str) -> Self {
        let client = Self::new(base_url);
        client.api.store().set_short(Credential::new(access));
        client.api.store().set_long(Credential::new(refresh));
        client
    }

    fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }
}

const LINK_JSON: &str = r#"{"code": "abc", "url": "https://www.rust-lang.org", "revoked": false, "createdAt": "2024-05-01T12:00:00Z"}"#;

// ==================================================================================================
// Session Lifecycle
// ==================================================================================================

#[tokio::test]
async fn test_login_stores_credentials_and_decodes_session() {
    let mut server = Server::new_async().await;
    let access = jwt("ada@example.com", 1);
    let login = server
        .mock("POST", "/auth/login")
        .match_body(Matcher::Json(json!({ "email": "ada@example.com", "password": "hunter2" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "accessToken": access, "refreshToken": "R1" }).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = TestClient::new(server.url());
    let session = client
        .api
        .login("ada@example.com", "hunter2")
        .await
        .expect("login should succeed")
        .expect("token should decode");

    login.assert_async().await;
    assert_eq!(session.subject, "ada@example.com");
    assert!(client.api.is_authenticated());
    assert_eq!(client.durable.peek().as_deref(), Some("R1"));
}

#[tokio::test]
async fn test_login_rejection_stores_nothing() {
    let mut server = Server::new_async().await;
    let _login = server
        .mock("POST", "/auth/login")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message": "Invalid credentials"}"#)
        .create_async()
        .await;

    let client = TestClient::new(server.url());
    let err = client
        .api
        .login("ada@example.com", "wrong")
        .await
        .expect_err("login should fail");

    assert!(err.is_unauthorized());
    assert_eq!(err.to_string(), "Request failed (401 Unauthorized): Invalid credentials");
    assert!(!client.api.is_authenticated());
    assert!(client.durable.peek().is_none());
    assert_eq!(client.terminations(), 0);
}

#[tokio::test]
async fn test_restore_session_uses_refresh_token() {
    let mut server = Server::new_async().await;
    let access = jwt("ada@example.com", 2);
    let refresh = server
        .mock("POST", "/auth/refresh")
        .match_body(Matcher::Json(json!({ "refreshToken": "R1" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "accessToken": access, "refreshToken": "R2" }).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = TestClient::new(server.url());
    client.api.store().set_long(Credential::new("R1"));

    let session = client.api.restore_session().await.expect("restore should succeed");

    refresh.assert_async().await;
    assert_eq!(session.map(|s| s.subject).as_deref(), Some("ada@example.com"));
    assert_eq!(client.durable.peek().as_deref(), Some("R2"));
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let mut server = Server::new_async().await;
    let logout = server
        .mock("POST", "/auth/logout")
        .match_header("authorization", "Bearer T1")
        .match_body(Matcher::Json(json!({ "refreshToken": "R1" })))
        .with_status(200)
        .with_body(r#"{"message": "Logged out"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = TestClient::logged_in(server.url(), "T1", "R1");
    client.api.logout().await;

    logout.assert_async().await;
    assert!(client.api.store().short().is_none());
    assert!(client.durable.peek().is_none());
    assert_eq!(client.terminations(), 0);
}

#[tokio::test]
async fn test_logout_with_expired_token_revokes_rotated_refresh_token() {
    let mut server = Server::new_async().await;
    let stale = server
        .mock("POST", "/auth/logout")
        .match_header("authorization", "Bearer T1")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"code": "TOKEN_EXPIRED", "message": "Access token expired"}"#)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/auth/refresh")
        .match_body(Matcher::Json(json!({ "refreshToken": "R1" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"accessToken": "T2", "refreshToken": "R2"}"#)
        .expect(1)
        .create_async()
        .await;
    let logout = server
        .mock("POST", "/auth/logout")
        .match_header("authorization", "Bearer T2")
        .match_body(Matcher::Json(json!({ "refreshToken": "R2" })))
        .with_status(200)
        .with_body(r#"{"message": "Logged out"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = TestClient::logged_in(server.url(), "T1", "R1");
    client.api.logout().await;

    stale.assert_async().await;
    refresh.assert_async().await;
    logout.assert_async().await;
    assert!(client.api.store().short().is_none());
    assert!(client.durable.peek().is_none());
    assert_eq!(client.terminations(), 0);
}

// ==================================================================================================
// Renewal
// ==================================================================================================

#[tokio::test]
async fn test_expired_token_is_renewed_and_request_replayed() {
    let mut server = Server::new_async().await;
    let stale = server
        .mock("GET", "/links/me/links")
        .match_header("authorization", "Bearer T1")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"code": "TOKEN_EXPIRED", "message": "Access token expired"}"#)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/auth/refresh")
        .match_body(Matcher::Json(json!({ "refreshToken": "R1" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"accessToken": "T2", "refreshToken": "R2"}"#)
        .expect(1)
        .create_async()
        .await;
    let fresh = server
        .mock("GET", "/links/me/links")
        .match_header("authorization", "Bearer T2")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(r#"{{"data": [{}]}}"#, LINK_JSON))
        .expect(1)
        .create_async()
        .await;

    let client = TestClient::logged_in(server.url(), "T1", "R1");
    let links = client.api.list_links().await.expect("replay should succeed");

    stale.assert_async().await;
    refresh.assert_async().await;
    fresh.assert_async().await;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].code, "abc");
    assert_eq!(client.durable.peek().as_deref(), Some("R2"));
    assert_eq!(client.terminations(), 0);
}

#[tokio::test]
async fn test_refused_refresh_terminates_session() {
    let mut server = Server::new_async().await;
    let _stale = server
        .mock("GET", "/links/me/links")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"code": "TOKEN_EXPIRED"}"#)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/auth/refresh")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message": "Invalid refresh token"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = TestClient::logged_in(server.url(), "T1", "R1");
    let err = client.api.list_links().await.expect_err("renewal should fail");

    refresh.assert_async().await;
    match err {
        ApiError::Renewal(RenewalError::Rejected { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid refresh token");
        }
        other => panic!("expected rejected renewal, got {}", other),
    }
    assert!(client.api.store().short().is_none());
    assert!(client.durable.peek().is_none());
    assert_eq!(client.terminations(), 1);
}

#[tokio::test]
async fn test_unauthorized_without_expired_code_passes_through() {
    let mut server = Server::new_async().await;
    let _denied = server
        .mock("GET", "/links/me/links")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"code": "INVALID_TOKEN", "message": "Token signature invalid"}"#)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/auth/refresh")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let client = TestClient::logged_in(server.url(), "T1", "R1");
    let err = client.api.list_links().await.expect_err("should pass through");

    refresh.assert_async().await;
    assert_eq!(err.code(), Some("INVALID_TOKEN"));
    assert_eq!(client.durable.peek().as_deref(), Some("R1"));
    assert_eq!(client.terminations(), 0);
}

#[tokio::test]
async fn test_transport_failure_does_not_renew() {
    // Reserve a port, then free it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let client = TestClient::logged_in(format!("http://{}", addr), "T1", "R1");
    let err = client.api.list_links().await.expect_err("nothing is listening");

    assert!(matches!(err, ApiError::Network(_)));
    assert_eq!(client.durable.peek().as_deref(), Some("R1"));
    assert_eq!(client.terminations(), 0);
}

// ==================================================================================================
// Links
// ==================================================================================================

#[tokio::test]
async fn test_create_link_anonymously() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/links")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::Json(json!({ "url": "https://www.rust-lang.org" })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(format!(r#"{{"message": "Short link created", "data": {}}}"#, LINK_JSON))
        .expect(1)
        .create_async()
        .await;

    let client = TestClient::new(server.url());
    let link = client
        .api
        .create_link("  https://www.rust-lang.org ")
        .await
        .expect("create should succeed");

    create.assert_async().await;
    assert_eq!(client.api.short_url(&link.code), "https://sw.ift/r/abc");
}

#[tokio::test]
async fn test_resolve_and_delete_link() {
    let mut server = Server::new_async().await;
    let resolve = server
        .mock("GET", "/links/abc")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(r#"{{"data": {}}}"#, LINK_JSON))
        .expect(1)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/links/abc")
        .match_header("authorization", "Bearer T1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message": "Link deleted"}"#)
        .expect(1)
        .create_async()
        .await;
    let _missing = server
        .mock("GET", "/links/gone")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message": "Link not found or has been revoked"}"#)
        .create_async()
        .await;

    let client = TestClient::logged_in(server.url(), "T1", "R1");

    let link = client.api.resolve_link("abc").await.expect("resolve");
    assert_eq!(link.url, "https://www.rust-lang.org");

    let message = client.api.delete_link("abc").await.expect("delete");
    assert_eq!(message.as_deref(), Some("Link deleted"));

    let err = client.api.resolve_link("gone").await.expect_err("missing link");
    assert!(err.is_not_found());

    resolve.assert_async().await;
    delete.assert_async().await;
}
