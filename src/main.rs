use std::path::PathBuf;
use std::sync::Arc;

use sprinkler_runtime::config::{ConfigSource, SprinklerConfig, DEFAULT_CONFIG_PATH};
use sprinkler_runtime::util::io::pins::DummyPins;
use sprinkler_runtime::util::log;
use sprinkler_runtime::{log_info, log_warn, Sprinkler};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let (config, source) = SprinklerConfig::load(&config_path)?;
    log::init(&config.log)?;

    log_info!(config = %config_path.display(), "Logging has been configured");
    if source == ConfigSource::Defaults {
        log_info!(config = %config_path.display(), "Config file not found, using defaults");
    }

    // No GPIO driver is compiled in; pins are emulated in memory
    log_warn!("Running with emulated pins, the valve will not physically move");
    let pins = Arc::new(DummyPins::new());

    let mut sprinkler = Sprinkler::new(config, pins)?;
    sprinkler.start();

    tokio::signal::ctrl_c().await?;
    log_info!("Received Ctrl-C");

    sprinkler.shutdown().await?;
    Ok(())
}
