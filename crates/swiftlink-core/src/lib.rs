//! Core library for the SwiftLink client.
//!
//! Everything a front end needs to talk to the SwiftLink backend lives here:
//! - `auth`: credential storage, session decoding, termination events and
//!   single-flight credential renewal
//! - `api`: the authenticated request pipeline and the typed API client
//! - `models`: wire types for auth exchanges and short links
//! - `config`: client configuration loaded from disk and the environment

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, RequestPipeline};
pub use auth::{
    Credential, CredentialStore, RenewalCoordinator, RenewalError, Session, SessionEvent,
    SessionEventBus, Subscription,
};
pub use config::Config;
