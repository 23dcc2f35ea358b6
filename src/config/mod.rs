//! # Configuration Management
//!
//! Two layers of configuration:
//!
//! - [`Settings`]: process-level settings for the adapter (timeouts, where
//!   config objects and referenced secrets live, log format), read from
//!   `ESS_VAULT_*` environment variables.
//! - [`BackendConfig`]: the per-call configuration object describing one Vault
//!   backend, resolved through a [`ConfigResolver`].

pub mod backend;
pub mod store;

use std::path::PathBuf;
use std::time::Duration;

use validator::Validate;

use crate::errors::{Error, Result};

pub use backend::{
    Auth, BackendConfig, ConfigReference, CredentialSource, KubernetesAuth, KvVersion,
    SecretKeySelector, TokenAuth, DEFAULT_KUBERNETES_MOUNT_PATH,
};
pub use store::{ConfigResolver, DirectoryConfigStore, StaticConfigStore};

/// Path where Kubernetes mounts the pod's service-account token.
pub const DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Default directory holding backend config documents.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/ess-vault/configs";

const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 15;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(Error::invalid_config(format!("unknown log format '{}'", other))),
        }
    }
}

/// Process-level adapter settings
#[derive(Debug, Clone, Validate)]
pub struct Settings {
    /// Timeout applied to every Vault HTTP request, in seconds
    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub request_timeout_seconds: u64,

    /// Default service-account token for Kubernetes auth
    pub service_account_token_path: PathBuf,

    /// Directory of backend config documents
    pub config_dir: PathBuf,

    /// Root of referenced secrets (`<root>/<namespace>/<name>/<key>`)
    pub secrets_dir: Option<PathBuf>,

    /// Log output format
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
            service_account_token_path: PathBuf::from(DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH),
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            secrets_dir: None,
            log_format: LogFormat::Text,
        }
    }
}

impl Settings {
    /// Create settings from environment variables
    ///
    /// - `ESS_VAULT_REQUEST_TIMEOUT_SECONDS` (default: 15)
    /// - `ESS_VAULT_SERVICE_ACCOUNT_TOKEN_PATH`
    /// - `ESS_VAULT_CONFIG_DIR` (default: `/etc/ess-vault/configs`)
    /// - `ESS_VAULT_SECRETS_DIR` (unset: `Secret` credential sources are unavailable)
    /// - `ESS_VAULT_LOG_FORMAT` (`text` or `json`)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let request_timeout_seconds = match std::env::var("ESS_VAULT_REQUEST_TIMEOUT_SECONDS") {
            Ok(value) => value.parse().map_err(|e| {
                Error::invalid_config(format!("Invalid request timeout '{}': {}", value, e))
            })?,
            Err(_) => defaults.request_timeout_seconds,
        };

        let service_account_token_path = std::env::var("ESS_VAULT_SERVICE_ACCOUNT_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.service_account_token_path);

        let config_dir = std::env::var("ESS_VAULT_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.config_dir);

        let secrets_dir = std::env::var("ESS_VAULT_SECRETS_DIR").ok().map(PathBuf::from);

        let log_format = match std::env::var("ESS_VAULT_LOG_FORMAT") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.log_format,
        };

        let settings = Self {
            request_timeout_seconds,
            service_account_token_path,
            config_dir,
            secrets_dir,
            log_format,
        };
        settings.check()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn check(&self) -> Result<()> {
        Validate::validate(self)
            .map_err(|e| Error::invalid_config(format!("Invalid settings: {}", e)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}
