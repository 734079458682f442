//! Building blocks of the placelog pipeline: the shared [`LogQueue`], its
//! configuration, and the traits standing in for host services.

pub mod attributes;
pub mod clock;
pub mod config;
pub mod host;
pub mod queue;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, LoggerConfig, PlacelogConfig, SimulationConfig};
pub use host::{HostEnvironment, Position, SessionId, SessionInfo};
pub use queue::LogQueue;
pub use store::{BlobStore, IndexEntry, OrderedIndex, StoreError};
