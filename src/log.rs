use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::info;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `level`.
/// With `file` set, lines are appended there without colours instead of
/// going to stderr. A second call keeps the first subscriber.
pub fn init(level: &str, file: Option<&Path>) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let installed = match file {
        Some(path) => {
            let f = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(f))
                .try_init()
                .is_ok()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok(),
    };
    if !installed {
        tracing::debug!("subscriber already installed");
    }
    Ok(())
}

/// Numeric metric as `step=.. metric=.. value=..` under target `scalar`, for grepping.
pub fn scalar(step: u64, name: &str, value: f32) {
    info!(target: "scalar", step, metric = name, value);
}
