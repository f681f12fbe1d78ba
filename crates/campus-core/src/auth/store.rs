use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};

use super::TokenPair;
use crate::models::SessionUser;

/// Storage contract for the session credentials and the cached user.
///
/// Implementations report a pair only when both halves are present; a
/// store left holding one half (for example after an interrupted clear)
/// reads as having no credentials.
pub trait CredentialStore: Send + Sync {
    fn get_pair(&self) -> Result<Option<TokenPair>>;
    fn set_pair(&self, pair: &TokenPair) -> Result<()>;
    /// Remove access token, refresh token and cached user.
    fn clear_all(&self) -> Result<()>;
    fn get_cached_user(&self) -> Result<Option<SessionUser>>;
    fn set_cached_user(&self, user: &SessionUser) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryState {
    access: Option<String>,
    refresh: Option<String>,
    user: Option<SessionUser>,
}

/// Process-local credential store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    state: Mutex<MemoryState>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the two halves independently, as a key-value medium would allow.
    pub fn seed_raw(&self, access: Option<&str>, refresh: Option<&str>) -> Result<()> {
        let mut state = self.lock()?;
        state.access = access.map(str::to_string);
        state.refresh = refresh.map(str::to_string);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("credential store lock poisoned"))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get_pair(&self) -> Result<Option<TokenPair>> {
        let state = self.lock()?;
        Ok(match (&state.access, &state.refresh) {
            (Some(access), Some(refresh)) => Some(TokenPair::new(access, refresh)),
            _ => None,
        })
    }

    fn set_pair(&self, pair: &TokenPair) -> Result<()> {
        let mut state = self.lock()?;
        state.access = Some(pair.access.clone());
        state.refresh = Some(pair.refresh.clone());
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        *self.lock()? = MemoryState::default();
        Ok(())
    }

    fn get_cached_user(&self) -> Result<Option<SessionUser>> {
        Ok(self.lock()?.user.clone())
    }

    fn set_cached_user(&self, user: &SessionUser) -> Result<()> {
        self.lock()?.user = Some(user.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> SessionUser {
        serde_json::from_str(r#"{"id":1,"username":"dara","email":"dara@example.edu"}"#).unwrap()
    }

    #[test]
    fn test_memory_store_pair_and_user() {
        let store = MemoryCredentialStore::new();
        assert!(store.get_pair().unwrap().is_none());

        store.set_pair(&TokenPair::new("a", "r")).unwrap();
        store.set_cached_user(&user()).unwrap();
        assert_eq!(store.get_pair().unwrap(), Some(TokenPair::new("a", "r")));
        assert_eq!(store.get_cached_user().unwrap().unwrap().username, "dara");

        store.clear_all().unwrap();
        assert!(store.get_pair().unwrap().is_none());
        assert!(store.get_cached_user().unwrap().is_none());
    }

    #[test]
    fn test_partial_pair_reads_as_absent() {
        let store = MemoryCredentialStore::new();
        store.seed_raw(Some("access-only"), None).unwrap();
        assert!(store.get_pair().unwrap().is_none());

        store.seed_raw(None, Some("refresh-only")).unwrap();
        assert!(store.get_pair().unwrap().is_none());
    }
}
