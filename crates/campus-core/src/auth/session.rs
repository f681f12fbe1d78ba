#[cfg(unix)]
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{vault, CredentialStore, TokenPair};
use crate::models::SessionUser;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Sealed session file name, used when a passphrase is configured
const SEALED_SESSION_FILE: &str = "session.enc";

/// On-disk session layout. Each item is optional so a half-written
/// file still parses; `get_pair` decides what counts as a pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    access: Option<String>,
    #[serde(default)]
    refresh: Option<String>,
    #[serde(default)]
    user: Option<SessionUser>,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
}

/// Credential store persisted as a file in the cache directory.
pub struct FileCredentialStore {
    cache_dir: PathBuf,
    passphrase: Option<String>,
    // Serializes read-modify-write cycles within this process.
    io_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            passphrase: None,
            io_lock: Mutex::new(()),
        }
    }

    /// Seal the session file with ChaCha20-Poly1305 under this passphrase
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn session_path(&self) -> PathBuf {
        let name = if self.passphrase.is_some() {
            SEALED_SESSION_FILE
        } else {
            SESSION_FILE
        };
        self.cache_dir.join(name)
    }

    fn load(&self, path: &Path) -> Result<SessionFile> {
        if !path.exists() {
            return Ok(SessionFile::default());
        }
        let bytes = std::fs::read(path).context("Failed to read session file")?;
        let json = match self.passphrase {
            Some(ref passphrase) => vault::open(passphrase, &bytes)?,
            None => bytes,
        };
        serde_json::from_slice(&json).context("Failed to parse session file")
    }

    fn save(&self, path: &Path, session: &SessionFile) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(session)?;
        let bytes = match self.passphrase {
            Some(ref passphrase) => vault::seal(passphrase, &json)?,
            None => json,
        };
        write_private(path, &bytes).context("Failed to write session file")?;
        debug!(path = %path.display(), "Session saved");
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut SessionFile)) -> Result<()> {
        let _guard = self
            .io_lock
            .lock()
            .map_err(|_| anyhow!("session file lock poisoned"))?;
        let path = self.session_path();
        let mut session = self.load(&path)?;
        apply(&mut session);
        session.saved_at = Some(Utc::now());
        self.save(&path, &session)
    }

    fn read(&self) -> Result<SessionFile> {
        let _guard = self
            .io_lock
            .lock()
            .map_err(|_| anyhow!("session file lock poisoned"))?;
        self.load(&self.session_path())
    }
}

/// Write the session file readable by the owner only.
#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::fs::{OpenOptions, Permissions};
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; tighten files left by older versions.
    file.set_permissions(Permissions::from_mode(0o600))?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, bytes)
}

impl CredentialStore for FileCredentialStore {
    fn get_pair(&self) -> Result<Option<TokenPair>> {
        let session = self.read()?;
        match (session.access, session.refresh) {
            (Some(access), Some(refresh)) => Ok(Some(TokenPair { access, refresh })),
            (None, None) => Ok(None),
            _ => {
                warn!("Session file holds only half of the token pair, ignoring it");
                Ok(None)
            }
        }
    }

    fn set_pair(&self, pair: &TokenPair) -> Result<()> {
        self.update(|session| {
            session.access = Some(pair.access.clone());
            session.refresh = Some(pair.refresh.clone());
        })
    }

    fn clear_all(&self) -> Result<()> {
        let _guard = self
            .io_lock
            .lock()
            .map_err(|_| anyhow!("session file lock poisoned"))?;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove session file")?;
        }
        Ok(())
    }

    fn get_cached_user(&self) -> Result<Option<SessionUser>> {
        Ok(self.read()?.user)
    }

    fn set_cached_user(&self, user: &SessionUser) -> Result<()> {
        self.update(|session| session.user = Some(user.clone()))
    }
}
