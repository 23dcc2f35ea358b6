//! # Backend Configuration
//!
//! The per-call configuration object describing how to reach and authenticate
//! against a Vault KV engine. Documents use the camelCase layout of the
//! `VaultConfig` configuration object:
//!
//! ```yaml
//! server: https://vault.acme.org
//! mountPath: secret
//! version: v2
//! caBundle:
//!   source: Filesystem
//!   fs:
//!     path: /etc/vault/ca.crt
//! auth:
//!   method: Kubernetes
//!   kubernetes:
//!     role: ess-plugin
//! ```
//!
//! The auth block and every credential source are validated while they are
//! deserialized: a `method` without its matching sub-field (or with a
//! sub-field for a different method) never produces a [`BackendConfig`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::errors::{Error, Result};

/// Default mount of the Kubernetes auth method.
pub const DEFAULT_KUBERNETES_MOUNT_PATH: &str = "kubernetes";

/// Reference to a named configuration object held by a [`super::ConfigResolver`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigReference {
    pub name: String,
}

impl ConfigReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// API version of the Vault KV secrets engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KvVersion {
    V1,
    #[default]
    V2,
}

impl KvVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

impl std::fmt::Display for KvVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for one Vault KV backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Vault server URL, e.g. "https://vault.acme.org"
    #[validate(url(message = "server must be an absolute URL"))]
    pub server: String,

    /// Mount path of the KV secrets engine
    #[validate(custom(function = "validate_mount_path"))]
    pub mount_path: String,

    /// Vault Enterprise namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// KV engine version
    #[serde(default)]
    pub version: KvVersion,

    /// CA bundle used to verify the Vault server certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<CredentialSource>,

    /// Authentication method
    pub auth: Auth,
}

impl BackendConfig {
    /// Parses a configuration document.
    ///
    /// Accepts a bare document or a full object wrapping it under a `spec` key.
    /// Parse and validation failures are reported as `InvalidConfig`.
    pub fn from_yaml(document: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Wrapped {
            spec: BackendConfig,
        }

        let value: serde_yaml::Value = serde_yaml::from_str(document)
            .map_err(|e| Error::invalid_config(format!("unparseable config document: {}", e)))?;

        let config = match value.get("spec") {
            Some(_) => serde_yaml::from_value::<Wrapped>(value).map(|wrapped| wrapped.spec),
            None => serde_yaml::from_value::<BackendConfig>(value),
        }
        .map_err(|e| Error::invalid_config(e.to_string()))?;

        config.check()?;
        Ok(config)
    }

    /// Runs field validation, mapping failures to `InvalidConfig`.
    pub fn check(&self) -> Result<()> {
        Validate::validate(self)
            .and_then(|_| self.auth.validate())
            .map_err(|e| Error::invalid_config(format!("invalid backend config: {}", e)))?;

        let scheme = self.server.split("://").next().unwrap_or_default();
        if scheme != "http" && scheme != "https" {
            return Err(Error::invalid_config(format!(
                "server '{}' must use http or https",
                self.server
            )));
        }
        Ok(())
    }

    /// Auth method name, for log fields
    pub fn auth_method(&self) -> &'static str {
        self.auth.method()
    }
}

fn validate_mount_path(mount_path: &str) -> std::result::Result<(), ValidationError> {
    if mount_path.trim_matches('/').is_empty() {
        return Err(ValidationError::new("mount_path_empty")
            .with_message("mount path cannot be empty".into()));
    }
    Ok(())
}

/// Authentication method, exactly one of which is configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAuthConfig", into = "RawAuthConfig")]
pub enum Auth {
    /// Static token read from a credential source
    Token(TokenAuth),
    /// Kubernetes service-account login
    Kubernetes(KubernetesAuth),
}

impl Auth {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Token(_) => "Token",
            Self::Kubernetes(_) => "Kubernetes",
        }
    }
}

impl Validate for Auth {
    fn validate(&self) -> std::result::Result<(), validator::ValidationErrors> {
        match self {
            Self::Token(_) => Ok(()),
            Self::Kubernetes(kubernetes) => kubernetes.validate(),
        }
    }
}

/// Token auth: the resolved credential is the session token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenAuth {
    pub source: CredentialSource,
}

/// Kubernetes auth: a service-account JWT is exchanged for a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesAuth {
    /// Vault role bound to the service account
    #[validate(length(min = 1, message = "kubernetes role cannot be empty"))]
    pub role: String,

    /// Mount path of the Kubernetes auth method
    #[serde(default = "default_kubernetes_mount")]
    #[validate(custom(function = "validate_mount_path"))]
    pub mount_path: String,

    /// Overrides the mounted service-account token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_token: Option<CredentialSource>,
}

fn default_kubernetes_mount() -> String {
    DEFAULT_KUBERNETES_MOUNT_PATH.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum AuthMethod {
    Token,
    Kubernetes,
}

/// Wire layout of the auth block: a method tag plus optional sub-fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAuthConfig {
    method: AuthMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<CredentialSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kubernetes: Option<KubernetesAuth>,
}

impl TryFrom<RawAuthConfig> for Auth {
    type Error = String;

    fn try_from(raw: RawAuthConfig) -> std::result::Result<Self, Self::Error> {
        match (raw.method, raw.token, raw.kubernetes) {
            (AuthMethod::Token, Some(source), None) => Ok(Self::Token(TokenAuth { source })),
            (AuthMethod::Kubernetes, None, Some(kubernetes)) => Ok(Self::Kubernetes(kubernetes)),
            (AuthMethod::Token, None, _) => {
                Err("auth method Token requires the 'token' block".to_string())
            }
            (AuthMethod::Kubernetes, _, None) => {
                Err("auth method Kubernetes requires the 'kubernetes' block".to_string())
            }
            (method, _, _) => Err(format!(
                "auth method {:?} must not be combined with another method's block",
                method
            )),
        }
    }
}

impl From<Auth> for RawAuthConfig {
    fn from(auth: Auth) -> Self {
        match auth {
            Auth::Token(token) => {
                Self { method: AuthMethod::Token, token: Some(token.source), kubernetes: None }
            }
            Auth::Kubernetes(kubernetes) => {
                Self { method: AuthMethod::Kubernetes, token: None, kubernetes: Some(kubernetes) }
            }
        }
    }
}

/// Where a piece of credential material comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCredentialSource", into = "RawCredentialSource")]
pub enum CredentialSource {
    /// No credential expected
    None,
    /// Key of a referenced secret
    Secret(SecretKeySelector),
    /// Environment variable of this process
    Environment { name: String },
    /// Local file
    Filesystem { path: PathBuf },
}

impl CredentialSource {
    /// Source kind, for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Secret(_) => "Secret",
            Self::Environment { .. } => "Environment",
            Self::Filesystem { .. } => "Filesystem",
        }
    }
}

/// Selects one key of a namespaced secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKeySelector {
    pub name: String,
    pub namespace: String,
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum SourceKind {
    None,
    Secret,
    Environment,
    Filesystem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct EnvSelector {
    name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct FsSelector {
    path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCredentialSource {
    source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret_ref: Option<SecretKeySelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    env: Option<EnvSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fs: Option<FsSelector>,
}

impl TryFrom<RawCredentialSource> for CredentialSource {
    type Error = String;

    fn try_from(raw: RawCredentialSource) -> std::result::Result<Self, Self::Error> {
        match raw.source {
            SourceKind::None => Ok(Self::None),
            SourceKind::Secret => {
                let selector =
                    raw.secret_ref.ok_or("source Secret requires the 'secretRef' selector")?;
                if selector.name.is_empty() || selector.namespace.is_empty() || selector.key.is_empty()
                {
                    return Err("secretRef requires non-empty name, namespace and key".to_string());
                }
                Ok(Self::Secret(selector))
            }
            SourceKind::Environment => {
                let env = raw.env.ok_or("source Environment requires the 'env' selector")?;
                if env.name.is_empty() {
                    return Err("env selector requires a variable name".to_string());
                }
                Ok(Self::Environment { name: env.name })
            }
            SourceKind::Filesystem => {
                let fs = raw.fs.ok_or("source Filesystem requires the 'fs' selector")?;
                if fs.path.as_os_str().is_empty() {
                    return Err("fs selector requires a path".to_string());
                }
                Ok(Self::Filesystem { path: fs.path })
            }
        }
    }
}

impl From<CredentialSource> for RawCredentialSource {
    fn from(source: CredentialSource) -> Self {
        let mut raw =
            Self { source: SourceKind::None, secret_ref: None, env: None, fs: None };
        match source {
            CredentialSource::None => {}
            CredentialSource::Secret(selector) => {
                raw.source = SourceKind::Secret;
                raw.secret_ref = Some(selector);
            }
            CredentialSource::Environment { name } => {
                raw.source = SourceKind::Environment;
                raw.env = Some(EnvSelector { name });
            }
            CredentialSource::Filesystem { path } => {
                raw.source = SourceKind::Filesystem;
                raw.fs = Some(FsSelector { path });
            }
        }
        raw
    }
}
