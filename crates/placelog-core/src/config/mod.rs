pub mod logger_config;
pub mod placelog_config;
pub mod simulation_config;

pub use logger_config::LoggerConfig;
pub use placelog_config::{ConfigError, PlacelogConfig};
pub use simulation_config::SimulationConfig;
