//! REST API client module for the portfolio content API.
//!
//! This module provides the `ApiClient` for communicating with the
//! external content API: JWT token endpoints plus the account endpoints
//! the admin panel uses to end sessions.
//!
//! The API uses JWT bearer token authentication obtained through the
//! `/token/` endpoint.

pub mod client;
pub mod error;

pub use client::{ApiClient, TokenPair, DEFAULT_API_URL};
pub use error::ApiError;
