//! Backend client construction.
//!
//! [`ClientFactory::connect`] turns a [`BackendConfig`] into a
//! [`VaultConnection`]: an HTTP client that trusts the configured CA bundle (or
//! the ambient native roots when none is configured) and carries the server
//! URL and namespace. [`ClientFactory::build`] binds a connection and a session
//! token to one KV mount and one engine version.
//!
//! Nothing here is pooled or cached; every call builds a fresh client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderValue;
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::backends::{KvBackend, KvV1Backend, KvV2Backend};
use super::credentials::CredentialResolver;
use super::types::{ScopedSecretName, SessionToken};
use crate::config::{BackendConfig, KvVersion};
use crate::errors::{Error, Result};

const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";
const VAULT_NAMESPACE_HEADER: &str = "X-Vault-Namespace";
const API_PREFIX: &str = "v1";

/// HTTP connection to one Vault server, not yet authenticated.
#[derive(Clone)]
pub struct VaultConnection {
    http: reqwest::Client,
    server: Url,
    namespace: Option<HeaderValue>,
}

impl std::fmt::Debug for VaultConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConnection")
            .field("server", &self.server.as_str())
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl VaultConnection {
    pub fn server(&self) -> &Url {
        &self.server
    }

    /// Builds `<server>/v1/<segments...>`, percent-encoding every segment.
    pub(crate) fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = self.server.clone();
        url.path_segments_mut()
            .map_err(|_| {
                Error::invalid_config(format!("server '{}' cannot be used as a base URL", self.server))
            })?
            .pop_if_empty()
            .push(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    /// Sends a request, attaching the namespace and (when given) the session
    /// token. The token header is marked sensitive.
    pub(crate) async fn send(
        &self,
        method: Method,
        url: Url,
        token: Option<&SessionToken>,
        body: Option<&serde_json::Value>,
    ) -> Result<Response> {
        debug!(method = %method, path = url.path(), "Sending Vault request");

        let mut builder = self.http.request(method, url);
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(token.expose_secret())
                .map_err(|_| Error::auth_failed("session token contains invalid header characters"))?;
            value.set_sensitive(true);
            builder = builder.header(VAULT_TOKEN_HEADER, value);
        }
        if let Some(namespace) = &self.namespace {
            builder = builder.header(VAULT_NAMESPACE_HEADER, namespace.clone());
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }
}

/// An authenticated connection bound to one KV mount.
#[derive(Debug, Clone)]
pub struct MountClient {
    connection: VaultConnection,
    token: SessionToken,
    mount: Vec<String>,
}

impl MountClient {
    pub fn new(connection: VaultConnection, token: SessionToken, mount_path: &str) -> Self {
        let mount = mount_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        Self { connection, token, mount }
    }

    /// Mount path as configured, without surrounding slashes
    pub fn mount_path(&self) -> String {
        self.mount.join("/")
    }

    /// URL of `name` under the mount, optionally below an engine sub-path
    /// such as `data` or `metadata`.
    pub fn secret_url(&self, sub_path: Option<&str>, name: &ScopedSecretName) -> Result<Url> {
        let segments = self
            .mount
            .iter()
            .map(String::as_str)
            .chain(sub_path)
            .chain(name.segments());
        self.connection.url(segments)
    }

    pub async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<Response> {
        self.connection.send(method, url, Some(&self.token), body).await
    }
}

#[derive(Debug, Deserialize)]
struct VaultErrors {
    #[serde(default)]
    errors: Vec<String>,
}

/// Maps an unsuccessful response onto the error taxonomy.
///
/// 404 is `NotFound`, 403 `PermissionDenied`, 401 `AuthFailed`, 400
/// `InvalidArgument`; server errors, throttling and anything unexpected are
/// `BackendUnreachable`.
pub(crate) async fn status_error(response: Response, action: &str) -> Error {
    let status = response.status();
    let detail = error_detail(response).await;
    let message = format!("{} failed with {}{}", action, status, detail);

    match status {
        StatusCode::NOT_FOUND => Error::not_found(message),
        StatusCode::FORBIDDEN => Error::permission_denied(message),
        StatusCode::UNAUTHORIZED => Error::auth_failed(message),
        StatusCode::BAD_REQUEST => Error::invalid_argument(message),
        _ => Error::backend_unreachable(message),
    }
}

/// Vault's `errors` array from a response body, formatted for messages.
pub(crate) async fn error_detail(response: Response) -> String {
    match response.json::<VaultErrors>().await {
        Ok(body) if !body.errors.is_empty() => format!(": {}", body.errors.join("; ")),
        _ => String::new(),
    }
}

/// Builds connections and mount-bound KV backends.
#[derive(Clone)]
pub struct ClientFactory {
    resolver: Arc<dyn CredentialResolver>,
    timeout: Duration,
}

impl std::fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientFactory").field("timeout", &self.timeout).finish()
    }
}

impl ClientFactory {
    pub fn new(resolver: Arc<dyn CredentialResolver>, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }

    /// Builds an HTTP connection for `config`.
    ///
    /// When a CA bundle is configured it is resolved and becomes the only trust
    /// anchor; resolution and parse failures are `TlsConfig` errors.
    pub async fn connect(&self, config: &BackendConfig) -> Result<VaultConnection> {
        let server = Url::parse(&config.server).map_err(|e| {
            Error::invalid_config(format!("invalid server URL '{}': {}", config.server, e))
        })?;

        let namespace = config
            .namespace
            .as_deref()
            .map(HeaderValue::from_str)
            .transpose()
            .map_err(|_| Error::invalid_config("namespace contains invalid header characters"))?;

        let mut builder = reqwest::Client::builder().timeout(self.timeout).connect_timeout(self.timeout);

        if let Some(source) = &config.ca_bundle {
            let bundle = self.resolver.resolve(source).await.map_err(|e| {
                Error::tls_config(format!("cannot resolve CA bundle from {} source: {}", source.kind(), e))
            })?;
            let certificates = reqwest::Certificate::from_pem_bundle(bundle.expose_secret())
                .map_err(|e| Error::tls_config(format!("invalid CA bundle: {}", e)))?;
            if certificates.is_empty() {
                return Err(Error::tls_config("CA bundle contains no PEM certificates"));
            }

            debug!(certificates = certificates.len(), "Using configured CA bundle");
            builder = builder.tls_built_in_root_certs(false);
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }

        let http = builder
            .build()
            .map_err(|e| Error::tls_config(format!("failed to build HTTP client: {}", e)))?;

        Ok(VaultConnection { http, server, namespace })
    }

    /// Binds an authenticated connection to one mount and engine version.
    ///
    /// The version is taken from configuration as-is; the engine is never
    /// probed.
    pub fn build(
        &self,
        connection: VaultConnection,
        token: SessionToken,
        mount_path: &str,
        version: KvVersion,
    ) -> Box<dyn KvBackend> {
        let client = MountClient::new(connection, token, mount_path);
        match version {
            KvVersion::V1 => Box::new(KvV1Backend::new(client)),
            KvVersion::V2 => Box::new(KvV2Backend::new(client)),
        }
    }
}
