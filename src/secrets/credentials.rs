//! Credential material resolution.
//!
//! Turns a [`CredentialSource`] into raw bytes. Tokens, service-account JWTs
//! and CA bundles are all resolved through here. Resolved bytes are returned
//! as [`SecretBytes`] and never logged; log events carry only the source kind
//! and its selector.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::types::SecretBytes;
use crate::config::{CredentialSource, SecretKeySelector};
use crate::errors::{Error, Result};

/// Fetches credential bytes from a source descriptor.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Resolve `source` to raw bytes.
    ///
    /// Fails with `NotFound` when the source does not exist and
    /// `SourceUnreachable` when it exists but cannot be read.
    async fn resolve(&self, source: &CredentialSource) -> Result<SecretBytes>;
}

/// Store of referenced secrets, keyed by namespace, name and key.
#[async_trait]
pub trait SecretReferenceStore: Send + Sync {
    async fn get(&self, selector: &SecretKeySelector) -> Result<SecretBytes>;
}

/// Reads referenced secrets from `<root>/<namespace>/<name>/<key>`, the layout
/// of projected secret volumes.
#[derive(Debug, Clone)]
pub struct DirectorySecretStore {
    root: PathBuf,
}

impl DirectorySecretStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, selector: &SecretKeySelector) -> Result<PathBuf> {
        for (field, value) in [
            ("namespace", &selector.namespace),
            ("name", &selector.name),
            ("key", &selector.key),
        ] {
            if value.is_empty()
                || value.contains('/')
                || value.contains('\\')
                || value == "."
                || value == ".."
            {
                return Err(Error::invalid_config(format!(
                    "secret reference {} '{}' is not a valid path component",
                    field, value
                )));
            }
        }
        Ok(self.root.join(&selector.namespace).join(&selector.name).join(&selector.key))
    }
}

#[async_trait]
impl SecretReferenceStore for DirectorySecretStore {
    async fn get(&self, selector: &SecretKeySelector) -> Result<SecretBytes> {
        let path = self.path_for(selector)?;
        read_file(&path).await.map_err(|e| match e {
            Error::NotFound(_) => Error::not_found(format!(
                "key '{}' of secret {}/{} not found",
                selector.key, selector.namespace, selector.name
            )),
            other => other,
        })
    }
}

/// Resolves environment and filesystem sources directly and secret
/// references through an optional [`SecretReferenceStore`].
#[derive(Clone, Default)]
pub struct DefaultCredentialResolver {
    secrets: Option<Arc<dyn SecretReferenceStore>>,
}

impl DefaultCredentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables `Secret` sources.
    pub fn with_secret_store(mut self, store: Arc<dyn SecretReferenceStore>) -> Self {
        self.secrets = Some(store);
        self
    }
}

impl std::fmt::Debug for DefaultCredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultCredentialResolver")
            .field("secret_store", &self.secrets.is_some())
            .finish()
    }
}

#[async_trait]
impl CredentialResolver for DefaultCredentialResolver {
    async fn resolve(&self, source: &CredentialSource) -> Result<SecretBytes> {
        debug!(source = source.kind(), "Resolving credential");

        match source {
            CredentialSource::None => {
                Err(Error::not_found("credential source is None, no credential to resolve"))
            }
            CredentialSource::Secret(selector) => match &self.secrets {
                Some(store) => store.get(selector).await,
                None => Err(Error::source_unreachable(format!(
                    "no secret store configured to resolve {}/{}",
                    selector.namespace, selector.name
                ))),
            },
            CredentialSource::Environment { name } => match std::env::var_os(name) {
                Some(value) => Ok(SecretBytes::new(value.into_encoded_bytes())),
                None => Err(Error::not_found(format!("environment variable '{}' is not set", name))),
            },
            CredentialSource::Filesystem { path } => read_file(path).await,
        }
    }
}

async fn read_file(path: &Path) -> Result<SecretBytes> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(SecretBytes::new(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::not_found(format!("file '{}' does not exist", path.display())))
        }
        Err(e) => Err(Error::source_unreachable(format!(
            "cannot read '{}': {}",
            path.display(),
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn selector(namespace: &str, name: &str, key: &str) -> SecretKeySelector {
        SecretKeySelector {
            namespace: namespace.to_string(),
            name: name.to_string(),
            key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_resolve_environment() {
        std::env::set_var("ESS_VAULT_TEST_CREDENTIAL", "s.token");
        let resolver = DefaultCredentialResolver::new();

        let bytes = resolver
            .resolve(&CredentialSource::Environment { name: "ESS_VAULT_TEST_CREDENTIAL".into() })
            .await
            .unwrap();
        assert_eq!(bytes.expose_secret(), b"s.token");

        std::env::remove_var("ESS_VAULT_TEST_CREDENTIAL");
        let err = resolver
            .resolve(&CredentialSource::Environment { name: "ESS_VAULT_TEST_CREDENTIAL".into() })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_resolve_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, b"file-token\n").unwrap();

        let resolver = DefaultCredentialResolver::new();
        let bytes =
            resolver.resolve(&CredentialSource::Filesystem { path: path.clone() }).await.unwrap();
        assert_eq!(bytes.expose_secret(), b"file-token\n");

        let err = resolver
            .resolve(&CredentialSource::Filesystem { path: dir.path().join("missing") })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_resolve_none_fails() {
        let err = DefaultCredentialResolver::new().resolve(&CredentialSource::None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_resolve_secret_without_store_is_unreachable() {
        let err = DefaultCredentialResolver::new()
            .resolve(&CredentialSource::Secret(selector("vault-system", "vault-token", "token")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SourceUnreachable(_)));
    }

    #[tokio::test]
    async fn test_resolve_secret_from_directory_store() {
        let dir = tempfile::tempdir().unwrap();
        let secret_dir = dir.path().join("vault-system").join("vault-ca");
        std::fs::create_dir_all(&secret_dir).unwrap();
        std::fs::write(secret_dir.join("ca.crt"), b"-----BEGIN CERTIFICATE-----").unwrap();

        let resolver = DefaultCredentialResolver::new()
            .with_secret_store(Arc::new(DirectorySecretStore::new(dir.path())));

        let bytes = resolver
            .resolve(&CredentialSource::Secret(selector("vault-system", "vault-ca", "ca.crt")))
            .await
            .unwrap();
        assert_eq!(bytes.expose_secret(), b"-----BEGIN CERTIFICATE-----");

        let err = resolver
            .resolve(&CredentialSource::Secret(selector("vault-system", "vault-ca", "tls.key")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("tls.key"));
    }

    #[tokio::test]
    async fn test_directory_store_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectorySecretStore::new(dir.path());

        let err = store.get(&selector("..", "etc", "passwd")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);

        let err = store.get(&selector("ns", "a/b", "key")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }
}
