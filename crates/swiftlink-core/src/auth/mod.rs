//! Authentication module for managing credentials and sessions.
//!
//! This module provides:
//! - `CredentialStore`: access token in memory, refresh token in durable storage
//! - `Session`: identity view decoded from the access token
//! - `SessionEventBus`: notifies the application when a session is terminated
//! - `RenewalCoordinator`: single-flight access token renewal
//!
//! Access tokens expire quickly; the coordinator swaps in a new one using the
//! refresh token, and discards both if the server refuses.

pub mod credentials;
pub mod events;
pub mod renewal;
pub mod session;

pub use credentials::{Credential, CredentialStore, DurableStore, FileStore, KeyringStore, MemoryStore};
pub use events::{SessionEvent, SessionEventBus, Subscription};
pub use renewal::{RenewalBackend, RenewalCoordinator, RenewalError, RenewalState};
pub use session::Session;
