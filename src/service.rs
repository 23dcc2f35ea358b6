//! # Secret Store Service
//!
//! Entry point for a transport layer. Each request names a configuration
//! object; the service resolves it fresh on every call and runs the operation
//! through [`VaultSecretStore`]. Failures carry the operation and secret name
//! and keep their [`ErrorKind`](crate::errors::ErrorKind).

use std::sync::Arc;

use tracing::{error, info};

use crate::config::{ConfigReference, ConfigResolver, DirectoryConfigStore, Settings};
use crate::errors::{Error, Operation, Result};
use crate::secrets::{
    CredentialResolver, DefaultCredentialResolver, DirectorySecretStore, ScopedSecretName,
    SecretRecord, VaultSecretStore,
};

/// GetSecret, ApplySecret and DeleteKeys over referenced backend configs.
#[derive(Clone)]
pub struct SecretStoreService {
    configs: Arc<dyn ConfigResolver>,
    store: VaultSecretStore,
}

impl std::fmt::Debug for SecretStoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStoreService").field("store", &self.store).finish()
    }
}

impl SecretStoreService {
    pub fn new(configs: Arc<dyn ConfigResolver>, store: VaultSecretStore) -> Self {
        Self { configs, store }
    }

    /// Wires the directory-backed config and secret stores described by `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut resolver = DefaultCredentialResolver::new();
        if let Some(dir) = &settings.secrets_dir {
            resolver = resolver.with_secret_store(Arc::new(DirectorySecretStore::new(dir)));
        }
        let resolver: Arc<dyn CredentialResolver> = Arc::new(resolver);

        Self::new(
            Arc::new(DirectoryConfigStore::new(&settings.config_dir)),
            VaultSecretStore::from_settings(resolver, settings),
        )
    }

    pub async fn get_secret(&self, reference: &ConfigReference, name: &str) -> Result<SecretRecord> {
        let result = async {
            let name = ScopedSecretName::new(name)?;
            let config = self.configs.resolve_config(reference).await?;
            self.store.get_secret(&config, &name).await
        }
        .await;

        let result = wrap(result, Operation::GetSecret, name);
        if let Err(e) = &result {
            if !e.is_not_found() {
                error!(config = %reference.name, secret = %name, kind = %e.kind(), error = %e, "GetSecret failed");
            }
        }
        result
    }

    pub async fn apply_secret(
        &self,
        reference: &ConfigReference,
        name: &str,
        desired: &SecretRecord,
    ) -> Result<bool> {
        let result = async {
            let name = ScopedSecretName::new(name)?;
            let config = self.configs.resolve_config(reference).await?;
            self.store.apply_secret(&config, &name, desired).await
        }
        .await;

        match wrap(result, Operation::ApplySecret, name) {
            Ok(changed) => {
                info!(config = %reference.name, secret = %name, changed, "ApplySecret completed");
                Ok(changed)
            }
            Err(e) => {
                error!(config = %reference.name, secret = %name, kind = %e.kind(), error = %e, "ApplySecret failed");
                Err(e)
            }
        }
    }

    pub async fn delete_keys(&self, reference: &ConfigReference, name: &str) -> Result<()> {
        let result = async {
            let name = ScopedSecretName::new(name)?;
            let config = self.configs.resolve_config(reference).await?;
            self.store.delete_keys(&config, &name).await
        }
        .await;

        let result = wrap(result, Operation::DeleteKeys, name);
        if let Err(e) = &result {
            error!(config = %reference.name, secret = %name, kind = %e.kind(), error = %e, "DeleteKeys failed");
        }
        result
    }
}

/// Wraps faults raised before the store was reached; the store wraps its own.
fn wrap<T>(result: Result<T>, operation: Operation, name: &str) -> Result<T> {
    result.map_err(|e| match e {
        wrapped @ Error::Operation { .. } => wrapped,
        other => other.in_operation(operation, name),
    })
}
