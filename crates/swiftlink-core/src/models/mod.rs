//! Wire types for the SwiftLink API.
//!
//! Auth exchanges (login, registration, renewal, logout) share the
//! `TokenPair` response shape. Link types mirror the backend's camelCase
//! JSON and add a few client-side helpers for display.

pub mod auth;
pub mod link;

pub use auth::{LoginRequest, RefreshRequest, TokenPair};
pub use link::{
    filter_links, short_url, Click, CreateLinkRequest, DataEnvelope, Link, LinkStats,
    MessageEnvelope, MessageResponse,
};
