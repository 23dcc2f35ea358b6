//! Vault KV secret store.
//!
//! A call flows through these pieces in order:
//!
//! - [`credentials`]: resolve a credential source (secret reference,
//!   environment variable or file) to bytes
//! - [`auth`]: turn the configured auth method into a [`SessionToken`]
//! - [`client`]: build an HTTP connection trusting the configured CA bundle
//!   and bind it to one mount and KV version
//! - [`backends`]: read, upsert and delete against KV v1 or v2
//! - [`detect`]: decide whether an upsert would change anything
//!
//! [`VaultSecretStore`] ties them together behind the GetSecret, ApplySecret
//! and DeleteKeys operations.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use ess_vault::config::BackendConfig;
//! use ess_vault::secrets::{DefaultCredentialResolver, ScopedSecretName, SecretRecord, VaultSecretStore};
//!
//! let config = BackendConfig::from_yaml(document)?;
//! let store = VaultSecretStore::new(Arc::new(DefaultCredentialResolver::new()), Duration::from_secs(15));
//!
//! let name = ScopedSecretName::new("db-creds")?;
//! let desired = SecretRecord::new().with_field("user", "alice").with_field("pass", "s3cr3t");
//! let changed = store.apply_secret(&config, &name, &desired).await?;
//! let record = store.get_secret(&config, &name).await?;
//! ```
//!
//! # Security
//!
//! Credential bytes and session tokens are wrapped in zeroizing types whose
//! `Debug` output is redacted. Secret values are never logged; log events carry
//! names, mounts, field counts and status codes only.

pub mod auth;
pub mod backends;
pub mod client;
pub mod credentials;
pub mod detect;
pub mod store;
pub mod types;

pub use auth::Authenticator;
pub use backends::{KvBackend, KvV1Backend, KvV2Backend};
pub use client::{ClientFactory, MountClient, VaultConnection};
pub use credentials::{
    CredentialResolver, DefaultCredentialResolver, DirectorySecretStore, SecretReferenceStore,
};
pub use detect::detect;
pub use store::VaultSecretStore;
pub use types::{ScopedSecretName, SecretBytes, SecretRecord, SessionToken};
