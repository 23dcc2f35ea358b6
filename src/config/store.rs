//! Configuration object lookup.
//!
//! Resolves a [`ConfigReference`] to a [`BackendConfig`]. The adapter treats
//! the result as an immutable value and resolves it again on every call, so
//! edits to a stored object take effect on the next call.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use super::backend::{BackendConfig, ConfigReference};
use crate::errors::{Error, Result};

/// File extensions tried, in order, by [`DirectoryConfigStore`].
const CONFIG_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Provider of backend configuration objects.
#[async_trait]
pub trait ConfigResolver: Send + Sync {
    /// Look up a configuration object by reference.
    ///
    /// Fails with `NotFound` if no such object exists and `InvalidConfig` if it
    /// exists but is malformed.
    async fn resolve_config(&self, reference: &ConfigReference) -> Result<BackendConfig>;
}

/// Reads configuration documents from `<dir>/<name>.{yaml,yml,json}`.
#[derive(Debug, Clone)]
pub struct DirectoryConfigStore {
    dir: PathBuf,
}

impl DirectoryConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn candidates(&self, name: &str) -> Result<Vec<PathBuf>> {
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name == "."
            || name == ".."
        {
            return Err(Error::invalid_config(format!("invalid config reference name '{}'", name)));
        }
        Ok(CONFIG_EXTENSIONS.iter().map(|ext| self.dir.join(format!("{}.{}", name, ext))).collect())
    }
}

#[async_trait]
impl ConfigResolver for DirectoryConfigStore {
    async fn resolve_config(&self, reference: &ConfigReference) -> Result<BackendConfig> {
        for path in self.candidates(&reference.name)? {
            match tokio::fs::read_to_string(&path).await {
                Ok(document) => {
                    debug!(config = %reference.name, path = %path.display(), "Loaded backend config");
                    return BackendConfig::from_yaml(&document).map_err(|e| match e {
                        Error::InvalidConfig(message) => Error::invalid_config(format!(
                            "config '{}' ({}): {}",
                            reference.name,
                            path.display(),
                            message
                        )),
                        other => other,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(Error::source_unreachable(format!(
                        "cannot read config '{}' from {}: {}",
                        reference.name,
                        path.display(),
                        e
                    )))
                }
            }
        }

        Err(Error::not_found(format!(
            "config '{}' not found in {}",
            reference.name,
            self.dir.display()
        )))
    }
}

/// In-memory configuration objects, for embedding and tests.
#[derive(Debug, Default)]
pub struct StaticConfigStore {
    configs: RwLock<HashMap<String, StoredConfig>>,
}

#[derive(Debug, Clone)]
enum StoredConfig {
    Parsed(BackendConfig),
    Document(String),
}

impl StaticConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an already-built config under `name`.
    pub fn insert(&self, name: impl Into<String>, config: BackendConfig) {
        if let Ok(mut configs) = self.configs.write() {
            configs.insert(name.into(), StoredConfig::Parsed(config));
        }
    }

    /// Stores a raw document under `name`; it is parsed on every lookup.
    pub fn insert_document(&self, name: impl Into<String>, document: impl Into<String>) {
        if let Ok(mut configs) = self.configs.write() {
            configs.insert(name.into(), StoredConfig::Document(document.into()));
        }
    }

    pub fn remove(&self, name: &str) {
        if let Ok(mut configs) = self.configs.write() {
            configs.remove(name);
        }
    }
}

#[async_trait]
impl ConfigResolver for StaticConfigStore {
    async fn resolve_config(&self, reference: &ConfigReference) -> Result<BackendConfig> {
        let stored = self
            .configs
            .read()
            .map_err(|_| Error::source_unreachable("config store lock poisoned"))?
            .get(&reference.name)
            .cloned();

        match stored {
            Some(StoredConfig::Parsed(config)) => {
                config.check()?;
                Ok(config)
            }
            Some(StoredConfig::Document(document)) => BackendConfig::from_yaml(&document),
            None => Err(Error::not_found(format!("config '{}' not found", reference.name))),
        }
    }
}
