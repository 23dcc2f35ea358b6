//! # Observability
//!
//! Structured logging through `tracing`. The binary installs one global
//! subscriber; the library only emits events and spans.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::LogFormat;

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::new(format!("{level},hyper=warn,reqwest=warn,rustls=warn"))
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `verbose`. Installing twice is not an error; the first
/// subscriber stays in place.
pub fn init_logging(format: LogFormat, verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose));
    let builder = FmtSubscriber::builder().with_env_filter(filter).with_target(false);

    let installed = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => {
            tracing::subscriber::set_global_default(builder.json().flatten_event(true).finish())
        }
    };

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed, keeping it");
    }
}
