use sink_config::load_config;
use sink_config::shared::SinkConfig;

use crate::error::{ServiceError, ServiceResult};

/// Loads and validates the sink configuration.
pub fn load_sink_config() -> ServiceResult<SinkConfig> {
    let config = load_config::<SinkConfig>().map_err(ServiceError::config)?;
    config.validate().map_err(ServiceError::config)?;

    Ok(config)
}
