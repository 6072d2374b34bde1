use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::AppConfig;
use crate::error::{AppError, Result};

/// Configuration store backed by a TOML file
///
/// Uses `ArcSwap` for lock-free reads, providing high performance for
/// frequent configuration access in the hub's relay hot paths.
#[derive(Clone)]
pub struct ConfigStore {
    path: PathBuf,
    /// Lock-free cache using ArcSwap for zero-cost reads
    cache: Arc<ArcSwap<AppConfig>>,
    change_tx: broadcast::Sender<ConfigChange>,
}

/// Configuration change event
#[derive(Debug, Clone)]
pub struct ConfigChange {
    pub key: String,
}

impl ConfigStore {
    /// Create a new configuration store
    ///
    /// Loads the file at `path`, or writes the default configuration there
    /// when the file does not exist yet.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let config = Self::load_config(path).await?;
        let cache = Arc::new(ArcSwap::from_pointee(config));

        let (change_tx, _) = broadcast::channel(16);

        Ok(Self {
            path: path.to_path_buf(),
            cache,
            change_tx,
        })
    }

    /// Load configuration from the file, creating a default one when missing
    async fn load_config(path: &Path) -> Result<AppConfig> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => toml::from_str(&raw).map_err(|e| AppError::Config(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = AppConfig::default();
                Self::save_config_to_file(path, &config).await?;
                Ok(config)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Save configuration to the file
    async fn save_config_to_file(path: &Path, config: &AppConfig) -> Result<()> {
        let toml =
            toml::to_string_pretty(config).map_err(|e| AppError::Config(e.to_string()))?;
        tokio::fs::write(path, toml).await?;
        Ok(())
    }

    /// Get current configuration (lock-free, zero-copy)
    pub fn get(&self) -> Arc<AppConfig> {
        self.cache.load_full()
    }

    /// Update configuration with a closure
    ///
    /// Read-modify-write; for concurrent updates the last write wins, which
    /// is acceptable for infrequent user-initiated configuration changes.
    pub async fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut AppConfig),
    {
        let current = self.cache.load();
        let mut config = (**current).clone();
        f(&mut config);

        Self::save_config_to_file(&self.path, &config).await?;
        self.cache.store(Arc::new(config));

        let _ = self.change_tx.send(ConfigChange {
            key: "app_config".to_string(),
        });

        Ok(())
    }

    /// Subscribe to configuration changes
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChange> {
        self.change_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_config_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("livehub.toml");

        let store = assert_ok!(ConfigStore::new(&path).await);

        // Check default config (lock-free, no await needed)
        let config = store.get();
        assert_eq!(config.web.http_port, 8086);

        // Update config
        assert_ok!(
            store
                .update(|c| {
                    c.web.http_port = 9000;
                    c.transcribe.enabled = false;
                })
                .await
        );

        let config = store.get();
        assert_eq!(config.web.http_port, 9000);
        assert!(!config.transcribe.enabled);

        // Create new store instance and verify persistence
        let store2 = assert_ok!(ConfigStore::new(&path).await);
        let config = store2.get();
        assert_eq!(config.web.http_port, 9000);
        assert!(!config.transcribe.enabled);
    }

    #[tokio::test]
    async fn test_missing_file_creates_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fresh.toml");
        assert!(!path.exists());

        let store = ConfigStore::new(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(store.get().hub.heartbeat_secs, 30);
    }

    #[tokio::test]
    async fn test_change_notification() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("livehub.toml");

        let store = ConfigStore::new(&path).await.unwrap();
        let mut rx = store.subscribe();

        store.update(|c| c.hub.heartbeat_secs = 10).await.unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.key, "app_config");
    }
}
