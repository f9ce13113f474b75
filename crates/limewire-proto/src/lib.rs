//! Identifier model and wire message codec for the limewire ground bridge.

mod board;
mod device_command;
mod error;
mod message;
mod valve;

pub use board::Board;
pub use device_command::DeviceCommand;
pub use error::CodecError;
pub use message::{
    ControlSignal, WireMessage, HANDOFF_CONFIRMATION_MAGIC, MSG_ID_DEVICE_COMMAND,
    MSG_ID_DEVICE_COMMAND_ACK, MSG_ID_HANDOFF, MSG_ID_HEARTBEAT, MSG_ID_TELEMETRY,
    MSG_ID_VALVE_COMMAND, MSG_ID_VALVE_STATE,
};
pub use valve::Valve;
