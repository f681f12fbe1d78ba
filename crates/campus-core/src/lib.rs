//! Core library for the campus administration portal client.
//!
//! - `api`: the authenticated request pipeline (`ApiClient`) with
//!   transparent token refresh and session termination
//! - `auth`: credential pair, expiry decoding, and credential stores
//! - `models`: session user and auth wire types
//! - `config`: on-disk configuration and directory locations

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, Endpoints, RequestOptions, SessionTerminatedHook, TerminationReason};
pub use auth::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore, TokenPair,
};
pub use config::{Config, CredentialBackend};
pub use models::{LoginResponse, Permission, PortalRole, Role, SessionUser};
