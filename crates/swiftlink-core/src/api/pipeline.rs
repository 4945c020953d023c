//! Authenticated request pipeline.
//!
//! Every call to the backend goes through `RequestPipeline::send`, which
//! attaches the current access token, and on an expired-token response waits
//! for the `RenewalCoordinator` and replays the request once with the new
//! token. Everything else comes back to the caller as the server sent it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Request, Response};
use tracing::{debug, warn};

use super::ApiError;
use crate::auth::{Credential, CredentialStore, RenewalCoordinator};

/// Sends one request on the wire.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response, reqwest::Error>;
}

/// `Transport` over a pooled `reqwest::Client`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: Request) -> Result<Response, reqwest::Error> {
        self.client.execute(request).await
    }
}

pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    renewal: Arc<RenewalCoordinator>,
    expired_code: String,
}

impl RequestPipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        renewal: Arc<RenewalCoordinator>,
        expired_code: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            store,
            renewal,
            expired_code: expired_code.into(),
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn renewal(&self) -> &Arc<RenewalCoordinator> {
        &self.renewal
    }

    pub fn expired_code(&self) -> &str {
        &self.expired_code
    }

    /// Send a request with an explicit token. No renewal, no replay.
    pub async fn send_once(&self, mut request: Request, token: &Credential) -> Result<Response, ApiError> {
        authorize(&mut request, Some(token))?;
        debug!(method = %request.method(), url = %request.url(), "Sending request without renewal");
        let response = self.transport.execute(request).await?;
        check(response).await
    }

    /// Send a request, renewing the access token and replaying once if the
    /// server reports it expired.
    ///
    /// Returns the successful response, or the error the caller should see:
    /// the server's own error, a network failure, or the renewal failure.
    pub async fn send(&self, mut request: Request) -> Result<Response, ApiError> {
        let method = request.method().clone();
        let url = request.url().clone();

        authorize(&mut request, self.store.short().as_ref())?;
        let replay = request.try_clone();

        debug!(%method, %url, "Sending request");
        let response = self.transport.execute(request).await?;
        let error = match check(response).await {
            Ok(response) => return Ok(response),
            Err(error) => error,
        };

        if !error.is_credential_expired(&self.expired_code) {
            return Err(error);
        }

        let Some(mut replay) = replay else {
            warn!(%method, %url, "Access token expired but request body cannot be replayed");
            return Err(error);
        };

        debug!(%method, %url, "Access token expired, waiting for renewal");
        let token = self.renewal.request_renewal().await?;
        authorize(&mut replay, Some(&token))?;

        // The replay's outcome is final, whatever it is.
        debug!(%method, %url, "Replaying request with renewed token");
        let response = self.transport.execute(replay).await?;
        check(response).await
    }
}

fn authorize(request: &mut Request, token: Option<&Credential>) -> Result<(), ApiError> {
    match token {
        Some(token) => {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
                .map_err(|_| ApiError::InvalidRequest("access token is not a valid header value".to_string()))?;
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        None => {
            request.headers_mut().remove(AUTHORIZATION);
        }
    }
    Ok(())
}

/// Pass a successful response through, turn anything else into an `ApiError`.
async fn check(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }
}
