use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::EditorConfig;

/// Installs the global subscriber. Returns whether logging is active.
///
/// Logs only ever go to the configured file since the editor owns the
/// terminal. `RUST_LOG` overrides the default `info` filter.
pub fn init(config: &EditorConfig) -> std::io::Result<bool> {
    let Some(path) = config.log_path.as_ref() else {
        return Ok(false);
    };
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .compact()
        .with_filter(env_filter);

    if tracing_subscriber::registry().with(file_layer).try_init().is_err() {
        return Ok(false);
    }
    tracing::info!(path = %path.display(), "logging initialized");
    Ok(true)
}
