use thiserror::Error;

/// Malformed-message errors for the wire codec (spec §4.1, §7 `ErrKind::Codec`).
///
/// None of these are ever produced by a panic: every decode path on
/// attacker-controlled input returns one of these instead.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown message identifier 0x{0:02X}")]
    UnknownMsgId(u8),
    #[error("message truncated: needed at least {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },
    #[error("invalid board identifier {0}")]
    InvalidBoard(u8),
    #[error("invalid valve identifier {0}")]
    InvalidValve(u8),
    #[error("invalid device command identifier {0}")]
    InvalidCommand(u8),
    #[error("telemetry value count mismatch: expected {expected}, got {got}")]
    TelemetryCountMismatch { expected: usize, got: usize },
    #[error("invalid handoff confirmation magic 0x{0:08X}")]
    InvalidHandoffMagic(u32),
    #[error("invalid control signal {0}")]
    InvalidControlSignal(u8),
    #[error("device command ack response is not valid ASCII")]
    InvalidResponseText,
    #[error("not a valid valve channel name")]
    InvalidChannelName,
}
