use anyhow::{Context, Result};
use keyring::Entry;
use tracing::warn;

use super::{CredentialStore, TokenPair};
use crate::models::SessionUser;

const SERVICE_NAME: &str = "campus-portal";

/// Keychain account names, one entry per stored item
const ACCESS_KEY: &str = "access_token";
const REFRESH_KEY: &str = "refresh_token";
const USER_KEY: &str = "user_data";

/// Credential store backed by the OS keychain.
///
/// Entries are opened once and reused, so reads see what this store wrote
/// even on keyring backends that keep state per entry.
pub struct KeyringCredentialStore {
    access: Entry,
    refresh: Entry,
    user: Entry,
}

impl KeyringCredentialStore {
    pub fn new(service: &str) -> Result<Self> {
        Ok(Self {
            access: open_entry(service, ACCESS_KEY)?,
            refresh: open_entry(service, REFRESH_KEY)?,
            user: open_entry(service, USER_KEY)?,
        })
    }

    /// Store under the default `campus-portal` service name.
    pub fn open_default() -> Result<Self> {
        Self::new(SERVICE_NAME)
    }
}

fn open_entry(service: &str, key: &str) -> Result<Entry> {
    Entry::new(service, key).context("Failed to create keyring entry")
}

fn read(entry: &Entry, key: &str) -> Result<Option<String>> {
    match entry.get_password() {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {} from keychain", key)),
    }
}

fn write(entry: &Entry, key: &str, value: &str) -> Result<()> {
    entry
        .set_password(value)
        .with_context(|| format!("Failed to store {} in keychain", key))
}

fn delete(entry: &Entry, key: &str) -> Result<()> {
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to delete {} from keychain", key)),
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get_pair(&self) -> Result<Option<TokenPair>> {
        let access = read(&self.access, ACCESS_KEY)?;
        let refresh = read(&self.refresh, REFRESH_KEY)?;
        match (access, refresh) {
            (Some(access), Some(refresh)) => Ok(Some(TokenPair { access, refresh })),
            (None, None) => Ok(None),
            _ => {
                warn!("Keychain holds only half of the token pair, ignoring it");
                Ok(None)
            }
        }
    }

    fn set_pair(&self, pair: &TokenPair) -> Result<()> {
        write(&self.access, ACCESS_KEY, &pair.access)?;
        write(&self.refresh, REFRESH_KEY, &pair.refresh)
    }

    fn clear_all(&self) -> Result<()> {
        // Attempt every entry even if one fails, then report the first failure.
        let results = [
            delete(&self.access, ACCESS_KEY),
            delete(&self.refresh, REFRESH_KEY),
            delete(&self.user, USER_KEY),
        ];
        results.into_iter().collect()
    }

    fn get_cached_user(&self) -> Result<Option<SessionUser>> {
        match read(&self.user, USER_KEY)? {
            Some(json) => {
                let user = serde_json::from_str(&json).context("Failed to parse cached user")?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    fn set_cached_user(&self, user: &SessionUser) -> Result<()> {
        let json = serde_json::to_string(user)?;
        write(&self.user, USER_KEY, &json)
    }
}
