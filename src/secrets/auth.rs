//! Session token acquisition.
//!
//! One authentication attempt per call. The Token method uses the resolved
//! credential directly; the Kubernetes method exchanges a service-account JWT
//! for a session token through the Kubernetes auth mount. A login path that
//! does not exist is a configuration fault; other 4xx answers are rejections.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::client::{error_detail, VaultConnection};
use super::credentials::CredentialResolver;
use super::types::{SecretBytes, SessionToken};
use crate::config::{Auth, CredentialSource, KubernetesAuth, DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH};
use crate::errors::{Error, Result};

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    auth: Option<LoginAuth>,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: String,
}

impl std::fmt::Debug for LoginAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginAuth").field("client_token", &"[REDACTED]").finish()
    }
}

/// Service-account JWT as text, without surrounding whitespace.
fn jwt_text(bytes: &SecretBytes) -> Result<&str> {
    let text = std::str::from_utf8(bytes.expose_secret())
        .map_err(|_| Error::auth_failed("service-account token is not valid UTF-8"))?
        .trim();
    if text.is_empty() {
        return Err(Error::auth_failed("service-account token is empty"));
    }
    Ok(text)
}

/// Obtains session tokens for a configured auth method.
#[derive(Clone)]
pub struct Authenticator {
    resolver: Arc<dyn CredentialResolver>,
    service_account_token_path: PathBuf,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("service_account_token_path", &self.service_account_token_path)
            .finish()
    }
}

impl Authenticator {
    pub fn new(resolver: Arc<dyn CredentialResolver>) -> Self {
        Self {
            resolver,
            service_account_token_path: PathBuf::from(DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH),
        }
    }

    /// Overrides where the mounted service-account token is read from.
    pub fn with_service_account_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.service_account_token_path = path.into();
        self
    }

    /// Authenticate against the server behind `connection`.
    ///
    /// Fails with `AuthFailed` when a credential cannot be resolved or the login
    /// is rejected, `InvalidConfig` when no auth method is mounted at the
    /// configured path, and `BackendUnreachable` on transport failure or 5xx.
    pub async fn authenticate(&self, auth: &Auth, connection: &VaultConnection) -> Result<SessionToken> {
        match auth {
            Auth::Token(token) => {
                let bytes = self.resolve_credential(&token.source, "token").await?;
                debug!(source = token.source.kind(), "Using static token");
                SessionToken::from_credential(&bytes)
            }
            Auth::Kubernetes(kubernetes) => self.kubernetes_login(kubernetes, connection).await,
        }
    }

    async fn resolve_credential(&self, source: &CredentialSource, what: &str) -> Result<SecretBytes> {
        self.resolver.resolve(source).await.map_err(|e| {
            warn!(source = source.kind(), error = %e, "Failed to resolve {}", what);
            Error::auth_failed(format!("cannot resolve {} from {} source: {}", what, source.kind(), e))
        })
    }

    async fn kubernetes_login(
        &self,
        kubernetes: &KubernetesAuth,
        connection: &VaultConnection,
    ) -> Result<SessionToken> {
        let source = kubernetes.service_account_token.clone().unwrap_or_else(|| {
            CredentialSource::Filesystem { path: self.service_account_token_path.clone() }
        });
        let jwt = self.resolve_credential(&source, "service-account token").await?;
        let jwt = jwt_text(&jwt)?;

        let segments = std::iter::once("auth")
            .chain(kubernetes.mount_path.split('/').filter(|segment| !segment.is_empty()))
            .chain(std::iter::once("login"));
        let url = connection.url(segments)?;
        let body = json!({ "role": kubernetes.role, "jwt": jwt });

        let response = connection.send(Method::POST, url, None, Some(&body)).await?;
        let status = response.status();
        match status {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                let detail = error_detail(response).await;
                warn!(mount = %kubernetes.mount_path, "No Kubernetes auth method at login path");
                return Err(Error::invalid_config(format!(
                    "no kubernetes auth method mounted at '{}'{}",
                    kubernetes.mount_path, detail
                )));
            }
            status if status.is_client_error() => {
                let detail = error_detail(response).await;
                warn!(role = %kubernetes.role, mount = %kubernetes.mount_path, status = %status, "Kubernetes login rejected");
                return Err(Error::auth_failed(format!(
                    "kubernetes login for role '{}' rejected with {}{}",
                    kubernetes.role, status, detail
                )));
            }
            _ => {
                let detail = error_detail(response).await;
                return Err(Error::backend_unreachable(format!(
                    "kubernetes login failed with {}{}",
                    status, detail
                )));
            }
        }

        let login: LoginResponse = response.json().await?;
        let token = login
            .auth
            .map(|auth| SessionToken::new(auth.client_token))
            .filter(|token| !token.expose_secret().is_empty())
            .ok_or_else(|| Error::auth_failed("kubernetes login response carried no client token"))?;

        info!(role = %kubernetes.role, mount = %kubernetes.mount_path, "Authenticated with Kubernetes auth method");
        Ok(token)
    }
}
