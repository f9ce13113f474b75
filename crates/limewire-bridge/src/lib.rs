//! The Limewire ground-side telemetry and command bridge.

pub mod config;
pub mod error;
pub mod queue;
pub mod supervisor;

pub use config::{Cli, StoreEnv, SupervisorConfig};
pub use error::BridgeError;
pub use queue::{QueueEntry, TelemetryQueue};
pub use supervisor::{ConnectionState, Supervisor};
