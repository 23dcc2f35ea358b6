//! Vault KV version 1 backend
//!
//! Secrets live directly at `<mount>/<name>`. The response `data` object is the
//! field map; there is no metadata, so records read back without labels.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use super::{data_from_json, data_to_json, KvBackend};
use crate::config::KvVersion;
use crate::errors::Result;
use crate::secrets::client::{status_error, MountClient};
use crate::secrets::types::{ScopedSecretName, SecretRecord};

#[derive(Debug, Deserialize)]
struct ReadResponse {
    #[serde(default)]
    data: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Backend for a KV v1 mount
#[derive(Debug)]
pub struct KvV1Backend {
    client: MountClient,
}

impl KvV1Backend {
    pub fn new(client: MountClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KvBackend for KvV1Backend {
    fn version(&self) -> KvVersion {
        KvVersion::V1
    }

    fn supports_labels(&self) -> bool {
        false
    }

    async fn read(&self, name: &ScopedSecretName) -> Result<SecretRecord> {
        let url = self.client.secret_url(None, name)?;
        let response = self.client.send(Method::GET, url, None).await?;
        if !response.status().is_success() {
            return Err(status_error(response, &format!("read of '{}'", name)).await);
        }

        let body: ReadResponse = response.json().await?;
        let data = data_from_json(body.data.unwrap_or_default());
        debug!(secret = %name, fields = data.len(), "Read KV v1 secret");
        Ok(SecretRecord::from_data(data))
    }

    async fn write(
        &self,
        name: &ScopedSecretName,
        desired: &SecretRecord,
        _previous: Option<&SecretRecord>,
    ) -> Result<()> {
        let body = data_to_json(desired)?;
        let url = self.client.secret_url(None, name)?;
        let response = self.client.send(Method::POST, url, Some(&body)).await?;
        if !response.status().is_success() {
            return Err(status_error(response, &format!("write of '{}'", name)).await);
        }

        info!(secret = %name, mount = %self.client.mount_path(), fields = desired.data.len(), "Wrote KV v1 secret");
        Ok(())
    }

    async fn delete(&self, name: &ScopedSecretName) -> Result<()> {
        let url = self.client.secret_url(None, name)?;
        let response = self.client.send(Method::DELETE, url, None).await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(secret = %name, "KV v1 secret already absent");
                Ok(())
            }
            status if status.is_success() => {
                info!(secret = %name, mount = %self.client.mount_path(), "Deleted KV v1 secret");
                Ok(())
            }
            _ => Err(status_error(response, &format!("delete of '{}'", name)).await),
        }
    }
}
