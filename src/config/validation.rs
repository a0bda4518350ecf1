use crate::config::types::{ApiConfig, Config, FilterConfig, HarvestConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 20;
pub const MIN_BATCH_SIZE: usize = 50;
pub const MAX_BATCH_SIZE: usize = 150;
pub const MIN_CHECKPOINT_INTERVAL: usize = 5;

/// Clamps tunables into their supported ranges
///
/// Out-of-range pool and batch settings are adjusted rather than rejected,
/// so a config written for a larger machine still runs.
pub fn clamp(config: &mut Config) {
    clamp_harvest_config(&mut config.harvest);
}

fn clamp_harvest_config(harvest: &mut HarvestConfig) {
    let workers = harvest.workers.clamp(MIN_WORKERS, MAX_WORKERS);
    if workers != harvest.workers {
        tracing::warn!("workers {} out of range, using {}", harvest.workers, workers);
        harvest.workers = workers;
    }

    let batch_size = harvest.batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE);
    if batch_size != harvest.batch_size {
        tracing::warn!(
            "batch-size {} out of range, using {}",
            harvest.batch_size,
            batch_size
        );
        harvest.batch_size = batch_size;
    }

    harvest.checkpoint_interval = harvest.checkpoint_interval.max(MIN_CHECKPOINT_INTERVAL);
}

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_filter_config(&config.filter)?;
    validate_api_config(&config.api)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.max_items < 1 {
        return Err(ConfigError::Validation(format!(
            "max_items must be >= 1, got {}",
            config.max_items
        )));
    }

    Ok(())
}

fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    if config.kind.trim().is_empty() {
        return Err(ConfigError::Validation(
            "filter kind cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("catalog_url", &config.catalog_url),
        ("store_url", &config.store_url),
    ] {
        let url = Url::parse(value)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "{} must use http or https, got '{}'",
                name, value
            )));
        }
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("details_path", &config.details_path),
        ("reviews_path", &config.reviews_path),
        ("checkpoint_path", &config.checkpoint_path),
        ("id_field", &config.id_field),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if config.details_path == config.reviews_path {
        return Err(ConfigError::Validation(
            "details_path and reviews_path must differ".to_string(),
        ));
    }

    Ok(())
}
