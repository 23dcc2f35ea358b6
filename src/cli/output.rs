//! Output formatting for CLI commands
//!
//! Records print as JSON objects with `data` and `labels` maps. Values that are
//! not UTF-8 are printed lossily; the CLI is a diagnostic tool, not a transport.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::secrets::SecretRecord;

/// JSON view of a [`SecretRecord`], also accepted by `apply --from-file`.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RecordDocument {
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl From<&SecretRecord> for RecordDocument {
    fn from(record: &SecretRecord) -> Self {
        let data = record
            .data
            .iter()
            .map(|(key, value)| (key.clone(), String::from_utf8_lossy(value).into_owned()))
            .collect();
        Self { data, labels: record.labels.clone() }
    }
}

impl From<RecordDocument> for SecretRecord {
    fn from(document: RecordDocument) -> Self {
        let data = document.data.into_iter().map(|(key, value)| (key, value.into_bytes())).collect();
        SecretRecord { data, labels: document.labels }
    }
}

/// Reads a record document from a JSON (or YAML) file.
pub fn read_record_file(path: &Path) -> Result<RecordDocument> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read record file: {}", path.display()))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse record file: {}", path.display()))
}

/// Print data as JSON
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}
