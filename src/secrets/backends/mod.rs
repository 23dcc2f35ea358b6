//! KV engine backends
//!
//! The two Vault KV wire versions behind one [`KvBackend`] trait. The version is
//! chosen once, when the backend is built, and never re-inspected per call.

mod kv1;
mod kv2;

use std::borrow::Cow;

use async_trait::async_trait;
use tracing::debug;

pub use kv1::KvV1Backend;
pub use kv2::KvV2Backend;

use super::detect::detect;
use super::types::{ScopedSecretName, SecretRecord};
use crate::config::KvVersion;
use crate::errors::Result;

/// Version-agnostic operations on one KV mount.
///
/// Implementations must be Send + Sync for use in async contexts.
#[async_trait]
pub trait KvBackend: Send + Sync + std::fmt::Debug {
    /// Engine version this backend speaks
    fn version(&self) -> KvVersion;

    /// Whether the engine stores labels alongside the data
    fn supports_labels(&self) -> bool;

    /// Read the current record for `name`.
    ///
    /// A secret that exists with no fields reads as an empty record, not
    /// `NotFound`.
    async fn read(&self, name: &ScopedSecretName) -> Result<SecretRecord>;

    /// Replace the record for `name` with `desired`.
    ///
    /// `previous` is the state observed by the pre-read, if any. Parts of
    /// `desired` equal to it need not be written again.
    async fn write(
        &self,
        name: &ScopedSecretName,
        desired: &SecretRecord,
        previous: Option<&SecretRecord>,
    ) -> Result<()>;

    /// Permanently remove `name`. Removing an absent secret succeeds.
    async fn delete(&self, name: &ScopedSecretName) -> Result<()>;

    /// Write `desired` unless it matches what is already stored.
    ///
    /// Returns whether a write was issued. A `NotFound` from the pre-read means
    /// there is no existing state; every other read failure propagates. Labels
    /// are dropped from `desired` on engines that cannot store them.
    async fn upsert(&self, name: &ScopedSecretName, desired: &SecretRecord) -> Result<bool> {
        desired.string_data()?;

        let desired = if self.supports_labels() || desired.labels.is_empty() {
            Cow::Borrowed(desired)
        } else {
            debug!(secret = %name, "Engine has no custom metadata, ignoring labels");
            Cow::Owned(SecretRecord::from_data(desired.data.clone()))
        };

        let existing = match self.read(name).await {
            Ok(record) => Some(record),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        if !detect(existing.as_ref(), &desired) {
            debug!(secret = %name, "Secret already up to date");
            return Ok(false);
        }

        self.write(name, &desired, existing.as_ref()).await?;
        Ok(true)
    }
}

/// Converts a JSON field map from the engine into record data.
///
/// Strings are taken verbatim; other JSON values are kept as their JSON text.
pub(crate) fn data_from_json(
    fields: serde_json::Map<String, serde_json::Value>,
) -> std::collections::BTreeMap<String, Vec<u8>> {
    fields
        .into_iter()
        .map(|(key, value)| {
            let bytes = match value {
                serde_json::Value::String(text) => text.into_bytes(),
                other => other.to_string().into_bytes(),
            };
            (key, bytes)
        })
        .collect()
}

/// Converts record data into the JSON object the engine stores.
pub(crate) fn data_to_json(record: &SecretRecord) -> Result<serde_json::Value> {
    let fields = record
        .string_data()?
        .into_iter()
        .map(|(key, value)| (key.to_string(), serde_json::Value::String(value.to_string())))
        .collect::<serde_json::Map<_, _>>();
    Ok(serde_json::Value::Object(fields))
}
