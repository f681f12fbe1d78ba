#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use campus_core::{
    ApiClient, CredentialStore, Endpoints, MemoryCredentialStore, SessionUser, TerminationReason,
    TokenPair,
};
use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::MockServer;

/// An unsigned JWT whose payload carries `exp`.
pub fn token_expiring_at(exp: i64, tag: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        json!({"token_type": "access", "exp": exp, "jti": tag, "user_id": 1}).to_string(),
    );
    format!("{}.{}.sig-{}", header, payload, tag)
}

pub fn fresh_token(tag: &str) -> String {
    token_expiring_at((Utc::now() + Duration::hours(1)).timestamp(), tag)
}

pub fn expired_token(tag: &str) -> String {
    token_expiring_at((Utc::now() - Duration::minutes(5)).timestamp(), tag)
}

pub fn user_json() -> serde_json::Value {
    json!({
        "id": 42,
        "username": "lecturer01",
        "email": "lecturer01@cumt.edu.kh",
        "is_staff": true,
        "is_superuser": false,
        "roles": [{"id": 3, "name": "Lecturer", "description": "Teaching staff"}],
        "permissions": [{"id": 9, "name": "Mark attendance", "code": "mark_attendance"}]
    })
}

pub fn user() -> SessionUser {
    serde_json::from_value(user_json()).expect("user fixture")
}

/// Records every session-terminated notification.
#[derive(Default, Clone)]
pub struct HookSpy {
    calls: Arc<AtomicUsize>,
    reasons: Arc<Mutex<Vec<TerminationReason>>>,
}

impl HookSpy {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reasons(&self) -> Vec<TerminationReason> {
        self.reasons.lock().expect("spy lock poisoned").clone()
    }
}

pub struct Harness {
    pub server: MockServer,
    pub store: Arc<MemoryCredentialStore>,
    pub spy: HookSpy,
    pub client: ApiClient,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_store(MemoryCredentialStore::new()).await
    }

    pub async fn with_pair(pair: TokenPair) -> Self {
        let harness = Self::new().await;
        harness.store.set_pair(&pair).expect("seed pair");
        harness.store.set_cached_user(&user()).expect("seed user");
        harness
    }

    pub async fn with_store(store: MemoryCredentialStore) -> Self {
        let server = MockServer::start().await;
        let store = Arc::new(store);
        let spy = HookSpy::default();
        let hook_spy = spy.clone();
        let client = ApiClient::new(
            Endpoints::new(format!("{}/api", server.uri())),
            store.clone(),
        )
        .expect("client")
        .on_session_terminated(move |reason| {
            hook_spy.calls.fetch_add(1, Ordering::SeqCst);
            hook_spy
                .reasons
                .lock()
                .expect("spy lock poisoned")
                .push(reason);
        });
        Self {
            server,
            store,
            spy,
            client,
        }
    }

    pub fn pair(&self) -> Option<TokenPair> {
        self.store.get_pair().expect("store read")
    }

    pub fn cached_user(&self) -> Option<SessionUser> {
        self.store.get_cached_user().expect("store read")
    }
}
