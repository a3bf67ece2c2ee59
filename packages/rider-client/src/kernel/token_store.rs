//! File-backed session token storage

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::BaseTokenStore;

const SESSION_FILE: &str = "session.json";

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    token: String,
    stored_at: DateTime<Utc>,
}

/// Keeps the last session token in a JSON file, by default
/// `~/.config/rider/session.json`.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Platform config directory location, if the platform has one
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("rider").join(SESSION_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BaseTokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<String>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        match serde_json::from_str::<StoredSession>(&data) {
            Ok(stored) => {
                debug!("Loaded session token stored at {}", stored.stored_at);
                Ok(Some(stored.token))
            }
            Err(e) => {
                // Unreadable file is treated as no session
                warn!("Ignoring corrupt session file {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    async fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let stored = StoredSession {
            token: token.to_string(),
            stored_at: Utc::now(),
        };
        let data = serde_json::to_string_pretty(&stored)?;
        tokio::fs::write(&self.path, data)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}
