//! Shared fixtures for integration tests
//!
//! [`FakeVault`] is a wiremock server with a stateful responder that speaks
//! enough of the Vault HTTP API for one KV mount (v1 or v2) plus the
//! Kubernetes auth login endpoint.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ess_vault::config::{Auth, BackendConfig, CredentialSource, KvVersion, TokenAuth};
use ess_vault::secrets::{DefaultCredentialResolver, VaultSecretStore};
use serde_json::{json, Map, Value};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Token accepted by every [`FakeVault`].
pub const ROOT_TOKEN: &str = "s.it-root-token";

/// Environment variable holding [`ROOT_TOKEN`] for token-auth configs.
pub const TOKEN_ENV: &str = "ESS_VAULT_IT_TOKEN";

#[derive(Debug, Default)]
struct V2Secret {
    versions: Vec<Map<String, Value>>,
    custom_metadata: BTreeMap<String, String>,
}

#[derive(Debug)]
struct KubernetesRole {
    mount: String,
    role: String,
    jwt: String,
    client_token: String,
}

#[derive(Debug, Default)]
struct VaultState {
    tokens: HashSet<String>,
    v1: BTreeMap<String, Map<String, Value>>,
    v2: BTreeMap<String, V2Secret>,
    kubernetes: Option<KubernetesRole>,
    outage: Option<u16>,
    login_status: Option<u16>,
    metadata_failure: Option<u16>,
    data_writes: usize,
    metadata_writes: usize,
}

struct VaultResponder {
    version: KvVersion,
    mount_prefix: String,
    state: Arc<Mutex<VaultState>>,
}

fn errors(status: u16, messages: &[&str]) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({ "errors": messages }))
}

fn body_object(request: &Request) -> Option<Map<String, Value>> {
    match serde_json::from_slice::<Value>(&request.body).ok()? {
        Value::Object(object) => Some(object),
        _ => None,
    }
}

impl VaultResponder {
    fn login(&self, state: &mut VaultState, mount: &str, request: &Request) -> ResponseTemplate {
        let Some(role) = state.kubernetes.as_ref().filter(|role| role.mount == mount) else {
            return errors(404, &["no handler for route"]);
        };
        if let Some(status) = state.login_status {
            return errors(status, &["unsupported operation"]);
        }
        let body = body_object(request).unwrap_or_default();
        let requested_role = body.get("role").and_then(Value::as_str);
        let jwt = body.get("jwt").and_then(Value::as_str);

        if requested_role != Some(role.role.as_str()) {
            return errors(400, &["invalid role name"]);
        }
        if jwt != Some(role.jwt.as_str()) {
            return errors(403, &["permission denied"]);
        }

        let client_token = role.client_token.clone();
        state.tokens.insert(client_token.clone());
        ResponseTemplate::new(200).set_body_json(json!({
            "auth": { "client_token": client_token, "lease_duration": 3600, "renewable": true }
        }))
    }

    fn kv1(&self, state: &mut VaultState, method: &str, name: &str, request: &Request) -> ResponseTemplate {
        match method {
            "GET" => match state.v1.get(name) {
                Some(data) => ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": data, "lease_duration": 2764800, "renewable": false })),
                None => errors(404, &[]),
            },
            "POST" | "PUT" => match body_object(request) {
                Some(data) => {
                    state.data_writes += 1;
                    state.v1.insert(name.to_string(), data);
                    ResponseTemplate::new(204)
                }
                None => errors(400, &["failed to parse JSON input"]),
            },
            "DELETE" => {
                state.v1.remove(name);
                ResponseTemplate::new(204)
            }
            _ => errors(405, &["unsupported operation"]),
        }
    }

    fn kv2(&self, state: &mut VaultState, method: &str, rest: &str, request: &Request) -> ResponseTemplate {
        if let Some(name) = rest.strip_prefix("data/") {
            return match method {
                "GET" => match state.v2.get(name).and_then(|secret| secret.versions.last().map(|d| (secret, d))) {
                    Some((secret, data)) => {
                        let custom_metadata = if secret.custom_metadata.is_empty() {
                            Value::Null
                        } else {
                            json!(secret.custom_metadata)
                        };
                        ResponseTemplate::new(200).set_body_json(json!({
                            "data": {
                                "data": data,
                                "metadata": {
                                    "version": secret.versions.len(),
                                    "destroyed": false,
                                    "deletion_time": "",
                                    "custom_metadata": custom_metadata,
                                }
                            }
                        }))
                    }
                    None => errors(404, &[]),
                },
                "POST" | "PUT" => {
                    let Some(data) = body_object(request)
                        .and_then(|mut body| body.remove("data"))
                        .and_then(|data| data.as_object().cloned())
                    else {
                        return errors(400, &["no data provided"]);
                    };
                    state.data_writes += 1;
                    let secret = state.v2.entry(name.to_string()).or_default();
                    secret.versions.push(data);
                    let version = secret.versions.len();
                    ResponseTemplate::new(200).set_body_json(json!({ "data": { "version": version } }))
                }
                _ => errors(405, &["unsupported operation"]),
            };
        }

        if let Some(name) = rest.strip_prefix("metadata/") {
            return match method {
                "POST" | "PUT" => {
                    if let Some(status) = state.metadata_failure {
                        return errors(status, &["metadata backend unavailable"]);
                    }
                    let labels = body_object(request)
                        .and_then(|mut body| body.remove("custom_metadata"))
                        .and_then(|labels| serde_json::from_value::<BTreeMap<String, String>>(labels).ok())
                        .unwrap_or_default();
                    state.metadata_writes += 1;
                    state.v2.entry(name.to_string()).or_default().custom_metadata = labels;
                    ResponseTemplate::new(204)
                }
                "DELETE" => {
                    state.v2.remove(name);
                    ResponseTemplate::new(204)
                }
                _ => errors(405, &["unsupported operation"]),
            };
        }

        errors(404, &["no handler for route"])
    }
}

impl Respond for VaultResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(mut state) = self.state.lock() else {
            return errors(500, &["state poisoned"]);
        };
        let method = request.method.as_str().to_string();
        let path = request.url.path().to_string();

        if let Some(status) = state.outage {
            return errors(status, &["Vault is sealed"]);
        }

        if let Some(mount) = path.strip_prefix("/v1/auth/").and_then(|rest| rest.strip_suffix("/login")) {
            return self.login(&mut state, mount, request);
        }

        let token = request.headers.get("x-vault-token").and_then(|value| value.to_str().ok());
        if !token.is_some_and(|token| state.tokens.contains(token)) {
            return errors(403, &["permission denied"]);
        }

        let Some(rest) = path.strip_prefix(&self.mount_prefix) else {
            return errors(404, &["no handler for route"]);
        };

        match self.version {
            KvVersion::V1 => self.kv1(&mut state, &method, rest, request),
            KvVersion::V2 => self.kv2(&mut state, &method, rest, request),
        }
    }
}

/// In-process Vault with one KV mount.
pub struct FakeVault {
    pub server: MockServer,
    pub mount: String,
    pub version: KvVersion,
    state: Arc<Mutex<VaultState>>,
}

impl FakeVault {
    pub async fn start(version: KvVersion, mount: &str) -> Self {
        let server = MockServer::start().await;
        let state = Arc::new(Mutex::new(VaultState::default()));
        state.lock().unwrap().tokens.insert(ROOT_TOKEN.to_string());

        Mock::given(any())
            .respond_with(VaultResponder {
                version,
                mount_prefix: format!("/v1/{}/", mount.trim_matches('/')),
                state: state.clone(),
            })
            .mount(&server)
            .await;

        Self { server, mount: mount.to_string(), version, state }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Token-auth config pointing at this server.
    pub fn config(&self) -> BackendConfig {
        token_config(&self.uri(), &self.mount, self.version)
    }

    /// Accepts Kubernetes logins for `role` with `jwt` on the auth mount.
    pub fn enable_kubernetes(&self, mount: &str, role: &str, jwt: &str, client_token: &str) {
        self.state.lock().unwrap().kubernetes = Some(KubernetesRole {
            mount: mount.to_string(),
            role: role.to_string(),
            jwt: jwt.to_string(),
            client_token: client_token.to_string(),
        });
    }

    /// Every request fails with `status` while set.
    pub fn set_outage(&self, status: Option<u16>) {
        self.state.lock().unwrap().outage = status;
    }

    /// Logins on the Kubernetes mount fail with `status` while set.
    pub fn set_login_status(&self, status: Option<u16>) {
        self.state.lock().unwrap().login_status = status;
    }

    /// Metadata writes fail with `status`.
    pub fn fail_metadata_writes(&self, status: u16) {
        self.state.lock().unwrap().metadata_failure = Some(status);
    }

    /// Stores raw JSON under a KV v1 path, bypassing the adapter.
    pub fn seed_v1(&self, name: &str, data: Value) {
        if let Value::Object(data) = data {
            self.state.lock().unwrap().v1.insert(name.to_string(), data);
        }
    }

    /// Stores raw JSON as a new KV v2 version, bypassing the adapter.
    pub fn seed_v2(&self, name: &str, data: Value) {
        if let Value::Object(data) = data {
            self.state.lock().unwrap().v2.entry(name.to_string()).or_default().versions.push(data);
        }
    }

    pub fn data_writes(&self) -> usize {
        self.state.lock().unwrap().data_writes
    }

    pub fn metadata_writes(&self) -> usize {
        self.state.lock().unwrap().metadata_writes
    }

    pub fn v2_versions(&self, name: &str) -> usize {
        self.state.lock().unwrap().v2.get(name).map_or(0, |secret| secret.versions.len())
    }

    pub fn contains(&self, name: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.v1.contains_key(name) || state.v2.contains_key(name)
    }

    pub async fn request_count(&self) -> usize {
        self.server.received_requests().await.map_or(0, |requests| requests.len())
    }

    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }
}

/// Token-auth config with the token read from [`TOKEN_ENV`].
pub fn token_config(server: &str, mount: &str, version: KvVersion) -> BackendConfig {
    std::env::set_var(TOKEN_ENV, ROOT_TOKEN);
    BackendConfig {
        server: server.to_string(),
        mount_path: mount.to_string(),
        namespace: None,
        version,
        ca_bundle: None,
        auth: Auth::Token(TokenAuth { source: CredentialSource::Environment { name: TOKEN_ENV.to_string() } }),
    }
}

/// Store with a plain resolver and a short timeout.
pub fn store() -> VaultSecretStore {
    VaultSecretStore::new(Arc::new(DefaultCredentialResolver::new()), Duration::from_secs(5))
}
