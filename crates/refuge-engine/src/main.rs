//! Scenario runner binary for the Refuge survivor registry.
//!
//! Wires configuration, logging, the configured survivor store and the
//! service facade together, runs a scenario file against them, and logs
//! the resulting population report.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `refuge-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the configured survivor store
//! 4. Create the survivor service
//! 5. Load the scenario file, if one is configured
//! 6. Run the scenario
//! 7. Log the final report

mod error;
mod registry;
mod scenario;

use std::path::Path;

use refuge_core::SurvivorService;
use refuge_core::config::{LoggingConfig, RefugeConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::registry::Registry;
use crate::scenario::Scenario;

/// Application entry point for the scenario runner.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("refuge-engine starting");
    info!(
        from_file,
        backend = ?config.store.backend,
        operation_timeout_ms = config.store.operation_timeout_ms,
        lock_timeout_ms = config.trade.lock_timeout_ms,
        "Configuration loaded"
    );

    // 3. Build the survivor store.
    let registry = Registry::from_config(&config.store).await?;
    info!(backend = registry.name(), "Survivor store ready");

    // 4. Create the service.
    let service = SurvivorService::new(registry, &config);

    // 5-6. Load and run the scenario.
    if let Some(path) = &config.scenario_path {
        let scenario = Scenario::from_file(path)?;
        info!(
            path = %path.display(),
            survivors = scenario.survivors.len(),
            batches = scenario.batches.len(),
            "Scenario loaded"
        );
        let summary = scenario::run(&service, &scenario).await?;
        info!(
            registered = summary.registered,
            applied = summary.applied,
            rejected = summary.rejected,
            "Scenario finished"
        );
    } else {
        info!("No scenario configured, reporting on existing records");
    }

    // 7. Log the final report.
    let report = service.report().await.map_err(EngineError::from)?;
    info!(
        survivor_count = report.survivor_count,
        infected_count = report.infected_count,
        percentage_infected = %report.percentage_infected,
        percentage_non_infected = %report.percentage_non_infected,
        point_loss = report.point_loss,
        "Survivor report"
    );
    for (item, average) in &report.average_amount_per_item {
        info!(item = %item, average = %average, "Average amount per survivor");
    }

    Ok(())
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `logging.level`.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load configuration from `refuge-config.yaml`, falling back to defaults
/// when the file is absent. The flag reports whether the file was read.
fn load_config() -> Result<(RefugeConfig, bool), EngineError> {
    let config_path = Path::new("refuge-config.yaml");
    if config_path.exists() {
        Ok((RefugeConfig::from_file(config_path)?, true))
    } else {
        let mut config = RefugeConfig::default();
        config.apply_env_overrides();
        Ok((config, false))
    }
}
