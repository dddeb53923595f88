//! Kernel propagation entry point.
//!
//! Takes no arguments: reads the config named by `DRUGPROP_CONFIG` (default
//! `drugprop.yaml`, defaults when absent), runs random walk with restart
//! propagation of the drug-target table and writes the kernel artifact.

use anyhow::Context;
use drugprop::{Pipeline, PipelineConfig, CONFIG_ENV, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = PipelineConfig::load_or_default(&config_path)
        .with_context(|| format!("loading config {:?}", config_path))?;

    drugprop::logging::init(config.log_file.as_deref())?;
    info!("drugprop v{}", drugprop::version());

    let pipeline = Pipeline::new(config).context("setting up pipeline")?;
    let propagated = pipeline.run_kernel().context("kernel propagation")?;
    info!(
        "Propagation finished: {} drugs x {} genes",
        propagated.nrows(),
        propagated.ncols()
    );
    Ok(())
}
