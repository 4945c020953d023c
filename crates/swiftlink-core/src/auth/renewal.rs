//! Single-flight renewal of the access token.
//!
//! The first caller to ask for a renewal while the coordinator is idle runs
//! the refresh exchange. Everyone who asks while it is in flight is queued
//! and receives the same outcome, in the order they joined, once it
//! completes. The queue is drained together with the transition back to
//! `Idle`, so a later caller always starts a fresh exchange.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::credentials::{Credential, CredentialStore};
use super::events::{SessionEvent, SessionEventBus};
use crate::models::TokenPair;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenewalError {
    #[error("No refresh token available - please log in again")]
    MissingCredential,

    #[error("Refresh token rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Refresh request failed: {0}")]
    Transport(String),

    #[error("Refresh request timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Renewal was abandoned before it completed")]
    Abandoned,
}

/// The refresh exchange itself. Implemented over HTTP by `AuthApi`.
#[async_trait]
pub trait RenewalBackend: Send + Sync {
    async fn renew(&self, refresh_token: &Credential) -> Result<TokenPair, RenewalError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalState {
    Idle,
    Renewing,
}

type Waiter = oneshot::Sender<Result<Credential, RenewalError>>;

struct Episode {
    state: RenewalState,
    waiters: VecDeque<Waiter>,
}

pub struct RenewalCoordinator {
    backend: Arc<dyn RenewalBackend>,
    store: Arc<CredentialStore>,
    events: SessionEventBus,
    timeout: Option<Duration>,
    episode: Mutex<Episode>,
}

impl RenewalCoordinator {
    pub fn new(
        backend: Arc<dyn RenewalBackend>,
        store: Arc<CredentialStore>,
        events: SessionEventBus,
    ) -> Self {
        Self {
            backend,
            store,
            events,
            timeout: None,
            episode: Mutex::new(Episode {
                state: RenewalState::Idle,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Bound the refresh exchange; hitting the bound counts as a failed renewal.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> RenewalState {
        self.lock().state
    }

    /// Callers currently queued behind the in-flight exchange.
    pub fn pending_waiters(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Obtain a fresh access token, sharing any exchange already in flight.
    ///
    /// On failure the credential store is cleared and one
    /// `SessionEvent::Terminated` is published for the whole batch.
    pub async fn request_renewal(&self) -> Result<Credential, RenewalError> {
        let queued = {
            let mut episode = self.lock();
            match episode.state {
                RenewalState::Renewing => {
                    let (tx, rx) = oneshot::channel();
                    episode.waiters.push_back(tx);
                    debug!(position = episode.waiters.len(), "Renewal in flight, queued");
                    Some(rx)
                }
                RenewalState::Idle => {
                    episode.state = RenewalState::Renewing;
                    None
                }
            }
        };

        if let Some(rx) = queued {
            return rx.await.unwrap_or(Err(RenewalError::Abandoned));
        }

        let leader = Leader {
            coordinator: self,
            armed: true,
        };
        let result = self.exchange().await;
        leader.finish(result)
    }

    async fn exchange(&self) -> Result<TokenPair, RenewalError> {
        // Keychain and file reads block; keep them off the async workers.
        let store = Arc::clone(&self.store);
        let refresh_token = tokio::task::spawn_blocking(move || store.long())
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Refresh token lookup panicked, treating as absent");
                None
            });
        let Some(refresh_token) = refresh_token else {
            warn!("No refresh token stored, cannot renew session");
            return Err(RenewalError::MissingCredential);
        };

        debug!("Refreshing access token");
        let call = self.backend.renew(&refresh_token);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(RenewalError::TimedOut(limit))),
            None => call.await,
        }
    }

    fn drain(&self) -> VecDeque<Waiter> {
        let mut episode = self.lock();
        episode.state = RenewalState::Idle;
        std::mem::take(&mut episode.waiters)
    }

    fn lock(&self) -> MutexGuard<'_, Episode> {
        self.episode.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns the `Renewing` window for the caller that started it.
/// If that caller's future is dropped mid-exchange, queued waiters are
/// released with `Abandoned` and the state returns to `Idle`.
struct Leader<'a> {
    coordinator: &'a RenewalCoordinator,
    armed: bool,
}

impl Leader<'_> {
    fn finish(mut self, result: Result<TokenPair, RenewalError>) -> Result<Credential, RenewalError> {
        self.armed = false;
        let coordinator = self.coordinator;

        match &result {
            Ok(pair) => coordinator.store.set_pair(pair.clone()),
            Err(_) => coordinator.store.clear(),
        }

        let waiters = coordinator.drain();
        let outcome = result.map(|pair| pair.access_token);
        match &outcome {
            Ok(_) => info!(waiters = waiters.len(), "Access token renewed"),
            Err(e) => warn!(error = %e, waiters = waiters.len(), "Session renewal failed"),
        }

        for waiter in waiters {
            // A waiter that gave up has dropped its receiver.
            let _ = waiter.send(outcome.clone());
        }

        if outcome.is_err() {
            coordinator.events.publish(SessionEvent::Terminated);
        }
        outcome
    }
}

impl Drop for Leader<'_> {
    fn drop(&mut self) {
        if self.armed {
            let waiters = self.coordinator.drain();
            warn!(waiters = waiters.len(), "Renewal abandoned by its caller");
        }
    }
}
