//! # Command Line Interface
//!
//! Runs the secret-store operations against a named backend config from the
//! shell. Settings come from `ESS_VAULT_*` environment variables; flags
//! override them.

pub mod output;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::{ConfigReference, ConfigResolver, DirectoryConfigStore, LogFormat, Settings};
use crate::observability::init_logging;
use crate::secrets::SecretRecord;
use crate::service::SecretStoreService;
use output::{print_json, read_record_file, RecordDocument};

#[derive(Parser)]
#[command(name = "ess-vault")]
#[command(about = "Vault KV secret store adapter")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory of backend config documents
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Root of referenced secrets (<root>/<namespace>/<name>/<key>)
    #[arg(long, global = true)]
    pub secrets_dir: Option<PathBuf>,

    /// Service-account token used by Kubernetes auth
    #[arg(long, global = true)]
    pub service_account_token_path: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Log format (text or json)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the secret stored under NAME
    Get {
        /// Backend config name
        config: String,
        /// Scoped secret name
        name: String,
    },

    /// Make NAME hold exactly the given fields and labels
    Apply {
        /// Backend config name
        config: String,
        /// Scoped secret name
        name: String,
        /// Field as KEY=VALUE (repeatable)
        #[arg(long = "data", value_parser = parse_key_value)]
        data: Vec<(String, String)>,
        /// Label as KEY=VALUE (repeatable)
        #[arg(long = "label", value_parser = parse_key_value)]
        labels: Vec<(String, String)>,
        /// JSON or YAML file with `data` and `labels` maps
        #[arg(long, conflicts_with_all = ["data", "labels"])]
        from_file: Option<PathBuf>,
    },

    /// Permanently delete NAME
    Delete {
        /// Backend config name
        config: String,
        /// Scoped secret name
        name: String,
    },

    /// Parse and validate a backend config without contacting Vault
    CheckConfig {
        /// Backend config name
        config: String,
    },
}

impl Cli {
    /// Environment settings with flag overrides applied.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = Settings::from_env()?;
        if let Some(dir) = &self.config_dir {
            settings.config_dir = dir.clone();
        }
        if let Some(dir) = &self.secrets_dir {
            settings.secrets_dir = Some(dir.clone());
        }
        if let Some(path) = &self.service_account_token_path {
            settings.service_account_token_path = path.clone();
        }
        if let Some(timeout) = self.timeout {
            settings.request_timeout_seconds = timeout;
        }
        if let Some(format) = self.log_format {
            settings.log_format = format;
        }
        settings.check()?;
        Ok(settings)
    }
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;

    init_logging(settings.log_format, cli.verbose);

    let service = SecretStoreService::from_settings(&settings);

    match cli.command {
        Commands::Get { config, name } => {
            let record = service
                .get_secret(&ConfigReference::new(config), &name)
                .await
                .context("GetSecret failed")?;
            print_json(&RecordDocument::from(&record))?;
        }
        Commands::Apply { config, name, data, labels, from_file } => {
            let desired = match from_file {
                Some(path) => SecretRecord::from(read_record_file(&path)?),
                None => SecretRecord {
                    data: data.into_iter().map(|(key, value)| (key, value.into_bytes())).collect(),
                    labels: labels.into_iter().collect(),
                },
            };
            let changed = service
                .apply_secret(&ConfigReference::new(config), &name, &desired)
                .await
                .context("ApplySecret failed")?;
            print_json(&serde_json::json!({ "changed": changed }))?;
        }
        Commands::Delete { config, name } => {
            service
                .delete_keys(&ConfigReference::new(config), &name)
                .await
                .context("DeleteKeys failed")?;
            println!("Deleted '{}'", name);
        }
        Commands::CheckConfig { config } => {
            let store = DirectoryConfigStore::new(&settings.config_dir);
            let backend = store.resolve_config(&ConfigReference::new(config.as_str())).await?;
            println!(
                "✅ Config '{}' is valid: {} mount '{}' (kv {}), auth {}",
                config,
                backend.server,
                backend.mount_path,
                backend.version,
                backend.auth_method()
            );
        }
    }

    Ok(())
}

/// Parses `KEY=VALUE`; the value may itself contain `=`.
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}
