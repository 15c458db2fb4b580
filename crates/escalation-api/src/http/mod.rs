//! HTTP/REST API layer for the league backend.
//!
//! Axum-based REST API at `/api/v1/` with API key authentication,
//! permission checks, envelope response format, a GET response cache and
//! CORS support.

pub mod cache;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
