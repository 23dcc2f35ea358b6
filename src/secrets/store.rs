//! The three public operations over a [`BackendConfig`].
//!
//! Each call authenticates, builds a mount-bound backend, performs one
//! operation and drops the client and token. Every failure is wrapped with the
//! operation and secret name; its kind is preserved.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use super::auth::Authenticator;
use super::backends::KvBackend;
use super::client::ClientFactory;
use super::credentials::CredentialResolver;
use super::types::{ScopedSecretName, SecretRecord};
use crate::config::{BackendConfig, Settings};
use crate::errors::{Operation, Result};

/// Secret store over Vault KV, configured per call.
#[derive(Debug, Clone)]
pub struct VaultSecretStore {
    factory: ClientFactory,
    authenticator: Authenticator,
}

impl VaultSecretStore {
    pub fn new(resolver: Arc<dyn CredentialResolver>, request_timeout: Duration) -> Self {
        Self {
            factory: ClientFactory::new(resolver.clone(), request_timeout),
            authenticator: Authenticator::new(resolver),
        }
    }

    /// Creates a store using the timeout and service-account path from `settings`.
    pub fn from_settings(resolver: Arc<dyn CredentialResolver>, settings: &Settings) -> Self {
        Self::new(resolver, settings.request_timeout())
            .with_service_account_token_path(settings.service_account_token_path.clone())
    }

    pub fn with_service_account_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.authenticator = self.authenticator.with_service_account_token_path(path);
        self
    }

    /// Connect, authenticate and bind to the configured mount.
    async fn open(&self, config: &BackendConfig) -> Result<Box<dyn KvBackend>> {
        config.check()?;
        let connection = self.factory.connect(config).await?;
        let token = self.authenticator.authenticate(&config.auth, &connection).await?;
        debug!(server = %connection.server(), "Opened Vault session");
        Ok(self.factory.build(connection, token, &config.mount_path, config.version))
    }

    /// Fetch the current record for `name`.
    #[instrument(
        skip(self, config, name),
        fields(server = %config.server, mount = %config.mount_path, version = %config.version, secret = %name)
    )]
    pub async fn get_secret(&self, config: &BackendConfig, name: &ScopedSecretName) -> Result<SecretRecord> {
        let result = async { self.open(config).await?.read(name).await }.await;
        result.map_err(|e| e.in_operation(Operation::GetSecret, name.as_str()))
    }

    /// Make `name` hold exactly `desired`. Returns whether anything was written.
    #[instrument(
        skip(self, config, name, desired),
        fields(server = %config.server, mount = %config.mount_path, version = %config.version, secret = %name)
    )]
    pub async fn apply_secret(
        &self,
        config: &BackendConfig,
        name: &ScopedSecretName,
        desired: &SecretRecord,
    ) -> Result<bool> {
        let result = async { self.open(config).await?.upsert(name, desired).await }.await;
        result.map_err(|e| e.in_operation(Operation::ApplySecret, name.as_str()))
    }

    /// Permanently remove `name`. Succeeds if it is already absent.
    #[instrument(
        skip(self, config, name),
        fields(server = %config.server, mount = %config.mount_path, version = %config.version, secret = %name)
    )]
    pub async fn delete_keys(&self, config: &BackendConfig, name: &ScopedSecretName) -> Result<()> {
        let result = async { self.open(config).await?.delete(name).await }.await;
        result.map_err(|e| e.in_operation(Operation::DeleteKeys, name.as_str()))
    }
}
