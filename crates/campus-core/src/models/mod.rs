//! Data models for the portal's authentication surface.
//!
//! - `SessionUser`, `Role`, `Permission`: the cached identity and its
//!   authorization helpers
//! - `PortalRole`: which portal (admin, staff, lecturer, student) a user lands in
//! - Login, refresh and logout request/response bodies

pub mod auth;
pub mod user;

pub use auth::{LoginRequest, LoginResponse, LogoutRequest, PermissionCheck, RefreshRequest, RefreshResponse};
pub use user::{Permission, PortalRole, Role, SessionUser};
