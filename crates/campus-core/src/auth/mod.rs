//! Authentication module for managing credentials and the cached session.
//!
//! This module provides:
//! - `TokenPair` and expiry decoding of access tokens
//! - `CredentialStore`: the storage contract the API client consumes
//! - `MemoryCredentialStore`: process-local store for tests and one-off runs
//! - `KeyringCredentialStore`: OS-level credential storage via keyring
//! - `FileCredentialStore`: session file in the cache directory,
//!   optionally sealed with a passphrase

pub mod credentials;
pub mod session;
pub mod store;
pub mod token;
mod vault;

pub use credentials::KeyringCredentialStore;
pub use session::FileCredentialStore;
pub use store::{CredentialStore, MemoryCredentialStore};
pub use token::TokenPair;
