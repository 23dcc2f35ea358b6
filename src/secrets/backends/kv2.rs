//! Vault KV version 2 backend
//!
//! Data is read and written through `<mount>/data/<name>`; labels are the
//! secret's `custom_metadata`, written through `<mount>/metadata/<name>`. Only
//! the part that differs from the previous record is written, so a label-only
//! change does not create a new version.
//! Deletion removes the metadata, which destroys every version.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};

use super::{data_from_json, data_to_json, KvBackend};
use crate::config::KvVersion;
use crate::errors::Result;
use crate::secrets::client::{status_error, MountClient};
use crate::secrets::types::{ScopedSecretName, SecretRecord};

const DATA_PATH: &str = "data";
const METADATA_PATH: &str = "metadata";

#[derive(Debug, Deserialize)]
struct ReadResponse {
    data: ReadData,
}

#[derive(Debug, Deserialize)]
struct ReadData {
    #[serde(default)]
    data: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    metadata: Option<VersionMetadata>,
}

#[derive(Debug, Deserialize)]
struct VersionMetadata {
    #[serde(default)]
    custom_metadata: Option<BTreeMap<String, String>>,
}

/// Backend for a KV v2 mount
#[derive(Debug)]
pub struct KvV2Backend {
    client: MountClient,
}

impl KvV2Backend {
    pub fn new(client: MountClient) -> Self {
        Self { client }
    }

    async fn write_labels(&self, name: &ScopedSecretName, labels: &BTreeMap<String, String>) -> Result<()> {
        let url = self.client.secret_url(Some(METADATA_PATH), name)?;
        let body = json!({ "custom_metadata": labels });
        let response = self.client.send(Method::POST, url, Some(&body)).await?;
        if !response.status().is_success() {
            return Err(status_error(response, &format!("metadata write of '{}'", name)).await);
        }
        Ok(())
    }
}

#[async_trait]
impl KvBackend for KvV2Backend {
    fn version(&self) -> KvVersion {
        KvVersion::V2
    }

    fn supports_labels(&self) -> bool {
        true
    }

    async fn read(&self, name: &ScopedSecretName) -> Result<SecretRecord> {
        let url = self.client.secret_url(Some(DATA_PATH), name)?;
        let response = self.client.send(Method::GET, url, None).await?;
        if !response.status().is_success() {
            return Err(status_error(response, &format!("read of '{}'", name)).await);
        }

        let body: ReadResponse = response.json().await?;
        let data = data_from_json(body.data.data.unwrap_or_default());
        let labels = body.data.metadata.and_then(|m| m.custom_metadata).unwrap_or_default();

        debug!(secret = %name, fields = data.len(), labels = labels.len(), "Read KV v2 secret");
        Ok(SecretRecord { data, labels })
    }

    async fn write(
        &self,
        name: &ScopedSecretName,
        desired: &SecretRecord,
        previous: Option<&SecretRecord>,
    ) -> Result<()> {
        let data_changed = previous.map_or(true, |record| record.data != desired.data);
        let labels_changed = match previous {
            Some(record) => record.labels != desired.labels,
            None => !desired.labels.is_empty(),
        };

        if data_changed {
            let body = json!({ "data": data_to_json(desired)? });
            let url = self.client.secret_url(Some(DATA_PATH), name)?;
            let response = self.client.send(Method::POST, url, Some(&body)).await?;
            if !response.status().is_success() {
                return Err(status_error(response, &format!("write of '{}'", name)).await);
            }
        }

        if labels_changed {
            if let Err(e) = self.write_labels(name, &desired.labels).await {
                if data_changed {
                    // The new version is already stored with stale labels.
                    error!(secret = %name, error = %e, "Secret data written but label update failed");
                }
                return Err(e);
            }
        }

        info!(
            secret = %name,
            mount = %self.client.mount_path(),
            fields = desired.data.len(),
            labels = desired.labels.len(),
            data_changed,
            labels_changed,
            "Wrote KV v2 secret"
        );
        Ok(())
    }

    async fn delete(&self, name: &ScopedSecretName) -> Result<()> {
        let url = self.client.secret_url(Some(METADATA_PATH), name)?;
        let response = self.client.send(Method::DELETE, url, None).await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(secret = %name, "KV v2 secret already absent");
                Ok(())
            }
            status if status.is_success() => {
                info!(secret = %name, mount = %self.client.mount_path(), "Deleted KV v2 secret and all versions");
                Ok(())
            }
            _ => Err(status_error(response, &format!("delete of '{}'", name)).await),
        }
    }
}
