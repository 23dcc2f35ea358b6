//! # ess-vault
//!
//! A secret-store adapter over HashiCorp Vault's KV secrets engine (versions 1
//! and 2). An orchestrator asks it to fetch, upsert or delete a named secret
//! and names, per call, a configuration object describing how to reach and
//! authenticate against Vault.
//!
//! ## Architecture
//!
//! ```text
//! SecretStoreService → ConfigResolver → VaultSecretStore
//!                                           ↓
//!          CredentialResolver → Authenticator → ClientFactory → KvBackend (v1 | v2)
//!                                                                  ↓
//!                                                            change detection
//! ```
//!
//! Nothing is cached between calls: the config is resolved, a client is built
//! and a session token obtained for every operation.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use ess_vault::{config::ConfigReference, secrets::SecretRecord, Result, SecretStoreService, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let settings = Settings::from_env()?;
//!     let service = SecretStoreService::from_settings(&settings);
//!
//!     let vault = ConfigReference::new("vault-internal");
//!     let desired = SecretRecord::new().with_field("user", "alice").with_field("pass", "s3cr3t");
//!     let changed = service.apply_secret(&vault, "db-creds", &desired).await?;
//!     let record = service.get_secret(&vault, "db-creds").await?;
//!     assert!(changed || record == desired);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod observability;
pub mod secrets;
pub mod service;

// Re-export commonly used types and traits
pub use config::{BackendConfig, Settings};
pub use errors::{Error, ErrorKind, Result};
pub use service::SecretStoreService;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
