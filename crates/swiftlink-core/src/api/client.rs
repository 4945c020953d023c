//! API client for the SwiftLink REST API.
//!
//! `AuthApi` performs the credential exchanges (login, registration,
//! renewal) over plain HTTP. `ApiClient` ties it to the credential store,
//! the renewal coordinator and the request pipeline, and exposes the
//! session and links operations applications call.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Method, Request, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::pipeline::{HttpTransport, RequestPipeline, Transport};
use super::ApiError;
use crate::auth::{
    Credential, CredentialStore, RenewalBackend, RenewalCoordinator, RenewalError, Session,
    SessionEvent, SessionEventBus, Subscription,
};
use crate::config::Config;
use crate::models::{
    short_url, CreateLinkRequest, DataEnvelope, Link, LoginRequest, MessageEnvelope,
    MessageResponse, RefreshRequest, TokenPair,
};

/// Maximum accepted length for a short link code.
const MAX_CODE_LENGTH: usize = 64;

/// Credential exchanges. These never carry a bearer token and never go
/// through the request pipeline.
#[derive(Clone)]
pub struct AuthApi {
    client: Client,
    base_url: String,
}

impl AuthApi {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, ApiError> {
        self.exchange("auth/login", &LoginRequest { email, password })
            .await
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<TokenPair, ApiError> {
        self.exchange("auth/register", &LoginRequest { email, password })
            .await
    }

    pub async fn refresh(&self, refresh_token: &Credential) -> Result<TokenPair, ApiError> {
        self.exchange(
            "auth/refresh",
            &RefreshRequest {
                refresh_token: refresh_token.expose(),
            },
        )
        .await
    }

    async fn exchange<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<TokenPair, ApiError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        let response = check_response(response).await?;
        parse_json(response, &url).await
    }
}

#[async_trait]
impl RenewalBackend for AuthApi {
    async fn renew(&self, refresh_token: &Credential) -> Result<TokenPair, RenewalError> {
        self.refresh(refresh_token).await.map_err(|e| match e {
            ApiError::Status {
                status,
                message,
                body,
                ..
            } => RenewalError::Rejected {
                status: status.as_u16(),
                message: message.unwrap_or(body),
            },
            other => RenewalError::Transport(other.to_string()),
        })
    }
}

/// High-level client: session management plus the links API.
pub struct ApiClient {
    http: Client,
    base_url: String,
    public_url: String,
    auth: AuthApi,
    backend: Arc<dyn RenewalBackend>,
    pipeline: RequestPipeline,
    events: SessionEventBus,
}

impl ApiClient {
    /// Build a client from configuration, opening the configured credential store.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = CredentialStore::open(config.credential_backend)?;
        Self::new(config, store)
    }

    pub fn new(config: &Config, store: CredentialStore) -> Result<Self> {
        let transport = HttpTransport::new(config.request_timeout())?;
        let http = transport.client().clone();
        let auth = AuthApi::new(http.clone(), config.base_url());
        Ok(Self::with_parts(
            config,
            store,
            http,
            Arc::new(transport),
            Arc::new(auth),
        ))
    }

    /// Assemble a client around an explicit transport and renewal backend.
    pub fn with_parts(
        config: &Config,
        store: CredentialStore,
        http: Client,
        transport: Arc<dyn Transport>,
        backend: Arc<dyn RenewalBackend>,
    ) -> Self {
        let store = Arc::new(store);
        let events = SessionEventBus::new();
        let renewal = Arc::new(
            RenewalCoordinator::new(Arc::clone(&backend), Arc::clone(&store), events.clone())
                .with_timeout(config.renewal_timeout()),
        );
        let pipeline = RequestPipeline::new(transport, store, renewal, config.expired_code.clone());
        let auth = AuthApi::new(http.clone(), config.base_url());

        Self {
            http,
            base_url: config.base_url().to_string(),
            public_url: config.public_url.clone(),
            auth,
            backend,
            pipeline,
            events,
        }
    }

    pub fn events(&self) -> &SessionEventBus {
        &self.events
    }

    /// Shorthand for `events().subscribe(...)`.
    pub fn on_session_event<F>(&self, handler: F) -> Subscription
    where
        F: Fn(SessionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    pub fn store(&self) -> &CredentialStore {
        self.pipeline.store()
    }

    pub fn session(&self) -> Option<Session> {
        self.store().session()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    // ===== Session Lifecycle =====

    /// Resume a previous session from the stored refresh token.
    ///
    /// Returns `Ok(None)` when there is nothing to resume. A refused refresh
    /// token clears the store and publishes `SessionEvent::Terminated`.
    pub async fn restore_session(&self) -> Result<Option<Session>, ApiError> {
        if self.store().long().is_none() {
            debug!("No stored session to resume");
            return Ok(None);
        }
        self.pipeline.renewal().request_renewal().await?;
        let session = self.session();
        info!(subject = ?session.as_ref().map(|s| &s.subject), "Session restored");
        Ok(session)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Option<Session>, ApiError> {
        let pair = self.auth.login(email, password).await?;
        Ok(self.establish(pair))
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<Option<Session>, ApiError> {
        let pair = self.auth.register(email, password).await?;
        Ok(self.establish(pair))
    }

    /// Revoke the refresh token server-side (best effort) and forget both
    /// credentials locally regardless of the outcome.
    ///
    /// Never publishes `SessionEvent::Terminated`: the server call bypasses
    /// the renewal coordinator.
    pub async fn logout(&self) {
        if let Some(refresh_token) = self.store().long() {
            if let Err(e) = self.revoke(refresh_token).await {
                warn!(error = %e, "Server-side logout failed, clearing local session anyway");
            }
        }
        self.store().clear();
        info!("Logged out");
    }

    /// `POST auth/logout` for the current refresh token. Without a usable
    /// access token the pair is rotated first and the rotated refresh token
    /// is the one revoked, so no live token is left behind on the server.
    async fn revoke(&self, refresh_token: Credential) -> Result<(), ApiError> {
        if let Some(access_token) = self.store().short() {
            match self.send_logout(&access_token, &refresh_token).await {
                Err(e) if e.is_credential_expired(self.pipeline.expired_code()) => {
                    debug!("Access token expired, rotating before logout");
                }
                result => return result,
            }
        }
        let pair = self.backend.renew(&refresh_token).await?;
        self.send_logout(&pair.access_token, &pair.refresh_token).await
    }

    async fn send_logout(&self, access_token: &Credential, refresh_token: &Credential) -> Result<(), ApiError> {
        let body = RefreshRequest {
            refresh_token: refresh_token.expose(),
        };
        let request = self.build(Method::POST, "auth/logout", Some(&body))?;
        self.pipeline.send_once(request, access_token).await?;
        Ok(())
    }

    fn establish(&self, pair: TokenPair) -> Option<Session> {
        self.store().set_pair(pair);
        let session = self.session();
        if session.is_none() {
            warn!("Access token payload could not be decoded");
        }
        session
    }

    // ===== Links =====

    /// Shorten a URL. Works anonymously; logged-in links are owned by the user.
    pub async fn create_link(&self, url: &str) -> Result<Link, ApiError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ApiError::InvalidRequest("URL must not be empty".to_string()));
        }
        let response: MessageEnvelope<Link> = self
            .post("links", &CreateLinkRequest { url })
            .await?;
        Ok(response.data)
    }

    pub async fn resolve_link(&self, code: &str) -> Result<Link, ApiError> {
        let path = Self::link_path(code)?;
        let response: DataEnvelope<Link> = self.get(&path).await?;
        Ok(response.data)
    }

    /// Links owned by the current user.
    pub async fn list_links(&self) -> Result<Vec<Link>, ApiError> {
        let response: DataEnvelope<Vec<Link>> = self.get("links/me/links").await?;
        Ok(response.data)
    }

    /// Delete one of the current user's links, returning the server's message.
    pub async fn delete_link(&self, code: &str) -> Result<Option<String>, ApiError> {
        let path = Self::link_path(code)?;
        let request = self.build::<()>(Method::DELETE, &path, None)?;
        let response = self.pipeline.send(request).await?;
        let url = response.url().to_string();
        let body: MessageResponse = parse_json(response, &url).await?;
        Ok(body.message)
    }

    pub fn short_url(&self, code: &str) -> String {
        short_url(&self.public_url, code)
    }

    fn link_path(code: &str) -> Result<String, ApiError> {
        if Self::is_valid_code(code) {
            Ok(format!("links/{}", code))
        } else {
            Err(ApiError::InvalidRequest(format!("Invalid link code: {:?}", code)))
        }
    }

    /// Short codes are URL-safe tokens: ASCII letters, digits, `-` and `_`.
    fn is_valid_code(code: &str) -> bool {
        !code.is_empty()
            && code.len() <= MAX_CODE_LENGTH
            && code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    // ===== Request Helpers =====

    fn build<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Request, ApiError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut builder = self.http.request(method, &url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.build()?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self.build::<()>(Method::GET, path, None)?;
        let url = request.url().to_string();
        let response = self.pipeline.send(request).await?;
        parse_json(response, &url).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = self.build(Method::POST, path, Some(body))?;
        let url = request.url().to_string();
        let response = self.pipeline.send(request).await?;
        parse_json(response, &url).await
    }
}

/// Check if response is successful, returning an error with body if not.
async fn check_response(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ApiError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
    })
}
