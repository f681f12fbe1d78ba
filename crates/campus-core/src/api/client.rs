//! API client for communicating with the campus portal REST API.
//!
//! Every request goes through [`ApiClient::execute`], which attaches the
//! stored bearer token, refreshes an access token that has already
//! expired before the request leaves the process, and ends the session
//! when the server answers 401.

use std::fmt;
use std::sync::Arc;

use reqwest::{header, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::{ApiError, Endpoints};
use crate::auth::{CredentialStore, TokenPair};
use crate::config::Config;
use crate::models::{
    LoginRequest, LoginResponse, LogoutRequest, PermissionCheck, RefreshRequest, RefreshResponse,
    SessionUser,
};

/// Why the session was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The access token expired and could not be refreshed.
    Expired,
    /// The server rejected the credentials with 401.
    Rejected,
}

/// Called once each time a request ends the session, after the store has
/// been cleared. The UI layer uses it to navigate to its login view.
pub type SessionTerminatedHook = Arc<dyn Fn(TerminationReason) + Send + Sync>;

/// Method, headers and body of a request, before credentials are attached.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: header::HeaderMap,
    pub body: Option<String>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn header(mut self, name: header::HeaderName, value: header::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `body` as the JSON request body
    pub fn json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self, ApiError> {
        let json = serde_json::to_string(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to serialize body: {}", e)))?;
        Ok(self.body(json))
    }
}

/// API client for the campus portal.
/// Clone is cheap - the HTTP client, store, hook and refresh lock are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    endpoints: Endpoints,
    store: Arc<dyn CredentialStore>,
    on_session_terminated: SessionTerminatedHook,
    // Held while a refresh is in flight so concurrent requests reuse its result.
    refresh_lock: Arc<Mutex<()>>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

fn log_session_terminated(reason: TerminationReason) {
    warn!(?reason, "Session terminated, login required");
}

impl ApiClient {
    /// Create a new API client. No request timeout is applied.
    pub fn new(endpoints: Endpoints, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        let client = Client::builder().build()?;
        Ok(Self::with_http_client(client, endpoints, store))
    }

    /// Create a client from the loaded configuration and the store it selects.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let store = config.credential_store()?;
        Ok(Self::with_http_client(builder.build()?, config.endpoints(), store))
    }

    pub fn with_http_client(
        client: Client,
        endpoints: Endpoints,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            client,
            endpoints,
            store,
            on_session_terminated: Arc::new(log_session_terminated),
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Replace the session-terminated callback
    pub fn on_session_terminated(
        mut self,
        hook: impl Fn(TerminationReason) + Send + Sync + 'static,
    ) -> Self {
        self.on_session_terminated = Arc::new(hook);
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    // ===== Session =====

    /// Authenticate and persist the returned tokens and user.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let response = self
            .client
            .post(self.endpoints.login())
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Login request failed");
                ApiError::Network(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, username, "Login rejected");
            return Err(ApiError::LoginFailed(status));
        }

        let text = response.text().await?;
        let login: LoginResponse = serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse login response: {}", e)))?;

        self.store
            .set_pair(&TokenPair::new(login.access.clone(), login.refresh.clone()))?;
        self.store.set_cached_user(&login.user)?;
        info!(username = %login.user.username, "Logged in");
        Ok(login)
    }

    /// Tell the server to revoke the refresh token, then clear the store.
    /// Server-side failures are logged and ignored; the local session is
    /// always cleared.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let pair = match self.store.get_pair() {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Could not read credentials for logout");
                None
            }
        };

        if let Some(pair) = pair {
            let result = self
                .client
                .post(self.endpoints.logout())
                .bearer_auth(&pair.access)
                .json(&LogoutRequest {
                    refresh: &pair.refresh,
                })
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => debug!("Server-side logout done"),
                Ok(response) => warn!(status = %response.status(), "Logout API call failed"),
                Err(e) => warn!(error = %e, "Logout API call failed"),
            }
        }

        self.store.clear_all()?;
        info!("Logged out");
        Ok(())
    }

    /// The cached user, but only while a full token pair is stored.
    pub fn restore_session(&self) -> Result<Option<SessionUser>, ApiError> {
        if self.store.get_pair()?.is_none() {
            return Ok(None);
        }
        Ok(self.store.get_cached_user()?)
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// Returns `None` on any failure. When the server does not rotate the
    /// refresh token, the one passed in is kept.
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Option<TokenPair> {
        if refresh_token.is_empty() {
            debug!("No refresh token available");
            return None;
        }

        let response = match self
            .client
            .post(self.endpoints.token_refresh())
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Token refresh rejected");
            return None;
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to read token refresh response");
                return None;
            }
        };
        let parsed: RefreshResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Failed to parse token refresh response");
                return None;
            }
        };

        let refresh = parsed
            .refresh
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| refresh_token.to_string());
        debug!("Access token refreshed");
        Some(TokenPair::new(parsed.access, refresh))
    }

    // ===== Request pipeline =====

    /// Clear the store and notify the hook. Clearing is best effort: a
    /// store failure must not keep the session alive.
    fn terminate_session(&self, reason: TerminationReason) {
        if let Err(e) = self.store.clear_all() {
            warn!(error = %e, "Failed to clear credential store");
        }
        (self.on_session_terminated)(reason);
    }

    /// Produce a usable access token for a pair whose access token expired.
    async fn renew_access(&self, stale: TokenPair) -> Result<String, ApiError> {
        let _guard = self.refresh_lock.lock().await;

        // Another request may have refreshed (or ended the session) while
        // this one waited for the lock.
        let current = self.store.get_pair()?;
        let refresh_token = match current {
            Some(ref pair) if pair.access != stale.access && !pair.access_expired() => {
                debug!("Using token refreshed by a concurrent request");
                return Ok(pair.access.clone());
            }
            Some(ref pair) => pair.refresh.clone(),
            None => return Err(ApiError::SessionExpired),
        };

        match self.refresh_tokens(&refresh_token).await {
            Some(pair) => {
                if let Err(e) = self.store.set_pair(&pair) {
                    warn!(error = %e, "Failed to persist refreshed tokens");
                }
                Ok(pair.access)
            }
            None => {
                self.terminate_session(TerminationReason::Expired);
                Err(ApiError::SessionExpired)
            }
        }
    }

    fn build_headers(
        &self,
        caller: &header::HeaderMap,
        access: Option<&str>,
    ) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        for (name, value) in caller {
            headers.insert(name.clone(), value.clone());
        }
        if let Some(access) = access {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {}", access))
                .map_err(|_| ApiError::InvalidRequest("access token is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Send a request to `target` and parse the JSON response.
    ///
    /// `target` is an absolute URL or a path under the API base URL. An
    /// empty response body parses as JSON `null`.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        target: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let url = self.endpoints.resolve(target);

        let access = match self.store.get_pair()? {
            None => None,
            Some(pair) if pair.access_expired() => {
                debug!(url = %url, "Access token expired before send, refreshing");
                Some(self.renew_access(pair).await?)
            }
            Some(pair) => Some(pair.access),
        };

        let headers = self.build_headers(&options.headers, access.as_deref())?;
        let mut request = self
            .client
            .request(options.method.clone(), &url)
            .headers(headers);
        if let Some(body) = options.body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            error!(url = %url, error = %e, "API request failed");
            ApiError::Network(e)
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(url = %url, "Server rejected credentials");
            self.terminate_session(TerminationReason::Rejected);
            return Err(ApiError::AuthenticationRejected);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %url, %status, "API request returned error status");
            return Err(ApiError::from_status(status, &body));
        }

        let text = response.text().await?;
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    // ===== Verb helpers =====

    pub async fn get<T: DeserializeOwned>(&self, target: &str) -> Result<T, ApiError> {
        self.execute(target, RequestOptions::new(Method::GET)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        target: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(target, RequestOptions::new(Method::POST).json(body)?)
            .await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        target: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(target, RequestOptions::new(Method::PUT).json(body)?)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, target: &str) -> Result<T, ApiError> {
        self.execute(target, RequestOptions::new(Method::DELETE)).await
    }

    /// Ask the server whether the current user holds `code`.
    /// A 403 answer means "no".
    pub async fn check_permission(&self, code: &str) -> Result<bool, ApiError> {
        match self
            .get::<PermissionCheck>(&self.endpoints.check_permission(code))
            .await
        {
            Ok(check) => Ok(check.has_permission),
            Err(ApiError::Http { status, .. }) if status == StatusCode::FORBIDDEN => Ok(false),
            Err(e) => Err(e),
        }
    }
}
