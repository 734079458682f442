pub mod flaky_store;
pub mod simulation;

use std::fs;
use std::io;
use std::path::Path;

pub use flaky_store::FlakyStore;
pub use simulation::{Simulation, SimulationError, SimulationReport};

/// Written by `placelog init-config`
pub const EXAMPLE_CONFIG: &str = r#"# placelog configuration

[logger]
# Seconds between batch writes
logging_delay_secs = 60
# Seconds between position samples
position_logging_period_secs = 10
# Run the whole pipeline outside production, printing writes instead of sending them
pretend_its_deployed = false
# Name of the client-to-server event channel
log_event_name = "LogEvent"
world_id = "0"
blob_collection = "Logging"
index_collection = "LoggingIndex"
# Warn every time the queue grows by this many records
queue_warn_len = 10000

[simulation]
sessions = 4
duration_secs = 30
tick_ms = 500
# Probability that a single store write fails
fail_rate = 0.0
"#;

/// Write [`EXAMPLE_CONFIG`] to `path`. Never overwrites an existing file.
pub fn create_example_config(path: &Path) -> io::Result<()> {
    if path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!(
                "Config file already exists at {}. Please edit it manually or delete it to create a new one.",
                path.display()
            ),
        ));
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, EXAMPLE_CONFIG)?;
    tracing::info!("Created example config at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use placelog_core::PlacelogConfig;

    #[test]
    fn test_example_config_matches_defaults() {
        let config = PlacelogConfig::from_toml(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config, PlacelogConfig::default());
    }

    #[test]
    fn test_example_config_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        create_example_config(&path).unwrap();
        fs::write(&path, "# edited").unwrap();

        let err = create_example_config(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(&path).unwrap(), "# edited");
    }
}
