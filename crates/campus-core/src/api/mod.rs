//! REST API client module for the campus portal backend.
//!
//! This module provides the `ApiClient`, which attaches bearer
//! credentials to outgoing requests, refreshes an expired access token
//! before sending, and tears the session down when the server rejects it.

pub mod client;
pub mod endpoints;
pub mod error;

pub use client::{ApiClient, RequestOptions, SessionTerminatedHook, TerminationReason};
pub use endpoints::Endpoints;
pub use error::ApiError;
