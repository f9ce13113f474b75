//! Flight-computer protocol simulator standing in for real hardware.
pub mod config;
pub mod error;
pub mod simulator;

pub use config::{Cli, SimulatorConfig};
pub use error::SimulatorError;
pub use simulator::Simulator;
