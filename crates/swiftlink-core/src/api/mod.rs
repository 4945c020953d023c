//! REST API client module for the SwiftLink backend.
//!
//! This module provides the `ApiClient` for logging in, managing the session
//! and working with short links, and the `RequestPipeline` every
//! authenticated call goes through.
//!
//! The API uses JWT bearer access tokens that expire quickly; an expired
//! token is renewed once with the refresh token and the request replayed.

pub mod client;
pub mod error;
pub mod pipeline;

pub use client::{ApiClient, AuthApi};
pub use error::ApiError;
pub use pipeline::{HttpTransport, RequestPipeline, Transport};
pub use reqwest::StatusCode;
