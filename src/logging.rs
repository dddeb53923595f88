//! Tracing subscriber setup for the binaries

use std::fs::{self, File};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber.
///
/// The filter comes from `RUST_LOG` (default `info`). With `log_file` set,
/// output goes to that file, truncated at startup, instead of stderr.
/// Returns an error if the file cannot be created or a subscriber is
/// already installed.
pub fn init(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow::anyhow!("{}", e))?;
        }
        None => {
            builder.try_init().map_err(|e| anyhow::anyhow!("{}", e))?;
        }
    }
    Ok(())
}
