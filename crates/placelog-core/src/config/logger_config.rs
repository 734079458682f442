use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::host::HostEnvironment;

/// Operating modes of the logging pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Seconds between batch flushes (default: 60)
    pub logging_delay_secs: f64,

    /// Seconds between position samples (default: 10)
    pub position_logging_period_secs: f64,

    /// Run the production pipeline outside production, printing writes locally
    pub pretend_its_deployed: bool,

    /// Name of the inbound client-to-server event channel
    pub log_event_name: String,

    /// World (place) identifier written at the head of every batch
    pub world_id: String,

    /// Blob collection receiving batches
    pub blob_collection: String,

    /// Ordered index collection mapping batch keys to timestamps
    pub index_collection: String,

    /// Warn each time the queue grows by this many records (0 = never)
    pub queue_warn_len: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            logging_delay_secs: 60.0,
            position_logging_period_secs: 10.0,
            pretend_its_deployed: false,
            log_event_name: "LogEvent".to_string(),
            world_id: "0".to_string(),
            blob_collection: "Logging".to_string(),
            index_collection: "LoggingIndex".to_string(),
            queue_warn_len: 10_000,
        }
    }
}

impl LoggerConfig {
    pub fn logging_delay(&self) -> Result<Duration, ConfigError> {
        period("logging_delay_secs", self.logging_delay_secs)
    }

    pub fn position_logging_period(&self) -> Result<Duration, ConfigError> {
        period("position_logging_period_secs", self.position_logging_period_secs)
    }

    /// Whether log calls should reach the queue at all
    pub fn is_live(&self, env: HostEnvironment) -> bool {
        env.production || self.pretend_its_deployed
    }

    /// Whether batches should be printed instead of sent to the remote store
    pub fn prints_instead_of_writing(&self, env: HostEnvironment) -> bool {
        !env.production && self.pretend_its_deployed
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging_delay()?;
        self.position_logging_period()?;
        if self.blob_collection.is_empty() || self.index_collection.is_empty() {
            return Err(ConfigError::Invalid(
                "collection names must not be empty".to_string(),
            ));
        }
        if self.blob_collection == self.index_collection {
            return Err(ConfigError::Invalid(
                "blob and index collections must differ".to_string(),
            ));
        }
        if self.log_event_name.is_empty() {
            return Err(ConfigError::Invalid(
                "log_event_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// A timer period in seconds, which must come out as a non-zero `Duration`
fn period(name: &str, secs: f64) -> Result<Duration, ConfigError> {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(ConfigError::Invalid(format!(
            "{} must be a positive number of seconds, got {}",
            name, secs
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LoggerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging_delay().unwrap(), Duration::from_secs(60));
        assert_eq!(
            config.position_logging_period().unwrap(),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_zero_delay_rejected() {
        let config = LoggerConfig {
            logging_delay_secs: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_periods_must_fit_a_duration() {
        let huge = LoggerConfig {
            logging_delay_secs: 1e20,
            ..Default::default()
        };
        assert!(matches!(huge.validate(), Err(ConfigError::Invalid(_))));
        assert!(huge.logging_delay().is_err());

        let nan = LoggerConfig {
            position_logging_period_secs: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(nan.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_periods_rounding_to_zero_rejected() {
        let tiny_delay = LoggerConfig {
            logging_delay_secs: 1e-10,
            ..Default::default()
        };
        assert!(matches!(tiny_delay.validate(), Err(ConfigError::Invalid(_))));

        let tiny_period = LoggerConfig {
            position_logging_period_secs: 1e-10,
            ..Default::default()
        };
        assert!(matches!(tiny_period.validate(), Err(ConfigError::Invalid(_))));
        assert!(tiny_period.position_logging_period().is_err());

        let half_millisecond = LoggerConfig {
            logging_delay_secs: 0.0005,
            ..Default::default()
        };
        assert_eq!(
            half_millisecond.logging_delay().unwrap(),
            Duration::from_micros(500)
        );
    }

    #[test]
    fn test_same_collections_rejected() {
        let config = LoggerConfig {
            index_collection: "Logging".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_liveness_modes() {
        let studio = HostEnvironment { production: false };
        let live = HostEnvironment { production: true };

        let config = LoggerConfig::default();
        assert!(!config.is_live(studio));
        assert!(config.is_live(live));
        assert!(!config.prints_instead_of_writing(live));

        let pretend = LoggerConfig {
            pretend_its_deployed: true,
            ..Default::default()
        };
        assert!(pretend.is_live(studio));
        assert!(pretend.prints_instead_of_writing(studio));
        assert!(!pretend.prints_instead_of_writing(live));
    }
}
