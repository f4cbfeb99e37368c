//! Credential persistence.
//!
//! Secrets are addressed by opaque [`CredentialKey`]s. Blank values are
//! treated as absent, matching what a user clearing a prompt expects.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

/// Secrets the client needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    /// Particle user access token
    UserToken,
    /// Particle device id of the light
    DeviceId,
}

impl CredentialKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserToken => "trafficlight.usertoken",
            Self::DeviceId => "trafficlight.particleId",
        }
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read a secret. Missing and blank secrets both read as `None`.
    async fn get(&self, key: CredentialKey) -> Result<Option<String>>;

    async fn set(&self, key: CredentialKey, value: &str) -> Result<()>;

    /// Remove a secret. Removing a missing secret is not an error.
    async fn delete(&self, key: CredentialKey) -> Result<()>;
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Process-local store, used by tests and embedders that manage secrets
/// themselves.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    values: RwLock<HashMap<CredentialKey, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: CredentialKey, value: impl Into<String>) -> Self {
        self.values.write().insert(key, value.into());
        self
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: CredentialKey) -> Result<Option<String>> {
        Ok(non_blank(self.values.read().get(&key)))
    }

    async fn set(&self, key: CredentialKey, value: &str) -> Result<()> {
        self.values.write().insert(key, value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: CredentialKey) -> Result<()> {
        self.values.write().remove(&key);
        Ok(())
    }
}

/// Stores secrets as a flat TOML table in a single file.
///
/// ```toml
/// "trafficlight.usertoken" = "..."
/// "trafficlight.particleId" = "..."
/// ```
///
/// The file is re-read on every `get`, so edits by another process take
/// effect on the next scheduler tick.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        toml::from_str(&content).map_err(|e| {
            Error::credential_file(format!("failed to parse {}: {e}", self.path.display()))
        })
    }

    async fn save(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string(values).map_err(|e| {
            Error::credential_file(format!("failed to encode {}: {e}", self.path.display()))
        })?;

        // Readers re-load on every tick, so the file is replaced in one rename
        // and never observed half written.
        let tmp_path = self.tmp_path();
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&tmp_path).await?;
        // `mode` only applies on creation; a stale temp file keeps its own.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await?;
        }
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        debug!(path = %self.path.display(), "Saved credentials");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: CredentialKey) -> Result<Option<String>> {
        let values = self.load().await?;
        Ok(non_blank(values.get(key.as_str())))
    }

    async fn set(&self, key: CredentialKey, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load().await?;
        values.insert(key.as_str().to_owned(), value.to_owned());
        self.save(&values).await
    }

    async fn delete(&self, key: CredentialKey) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load().await?;
        if values.remove(key.as_str()).is_some() {
            self.save(&values).await?;
        }
        Ok(())
    }
}
