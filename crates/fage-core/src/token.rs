//! Durable storage for the session token
//!
//! One opaque bearer token lives under a fixed key. The file-backed store keeps
//! it in `<data_local_dir>/fage/fage_token` with owner-only permissions.

use crate::error::{CoreError, StorageError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fixed storage key for the session token
pub const TOKEN_STORAGE_KEY: &str = "fage_token";

/// Opaque bearer token issued by the session owner
///
/// `Debug` never prints the value, so tokens can flow through `tracing` fields.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// Single-key durable token storage
///
/// The session store is the only writer.
pub trait TokenStorage: Send + Sync {
    fn load(&self) -> Result<Option<SessionToken>, StorageError>;
    fn store(&self, token: &SessionToken) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

/// File-backed token storage
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_local_dir>/fage/fage_token`
    pub fn default_path() -> Result<PathBuf, CoreError> {
        dirs::data_local_dir()
            .map(|dir| dir.join("fage").join(TOKEN_STORAGE_KEY))
            .ok_or(CoreError::DirectoryNotFound { kind: "data" })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_err(&self, source: std::io::Error) -> StorageError {
        StorageError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<SessionToken>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(SessionToken::new(token)))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn store(&self, token: &SessionToken) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.write_err(e))?;
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path).map_err(|e| self.write_err(e))?;
        file.write_all(token.expose().as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| self.write_err(e))?;

        debug!(path = %self.path.display(), "Session token stored");
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Session token cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// In-memory token storage (tests and `--ephemeral` sessions)
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    slot: Mutex<Option<SessionToken>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: SessionToken) -> Self {
        Self {
            slot: Mutex::new(Some(token)),
        }
    }

    /// Current stored value, without going through the trait
    pub fn peek(&self) -> Option<SessionToken> {
        self.slot.lock().clone()
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<SessionToken>, StorageError> {
        Ok(self.slot.lock().clone())
    }

    fn store(&self, token: &SessionToken) -> Result<(), StorageError> {
        *self.slot.lock() = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.slot.lock() = None;
        Ok(())
    }
}
