use crate::board::Board;
use crate::device_command::DeviceCommand;
use crate::error::CodecError;
use crate::valve::Valve;

pub const MSG_ID_TELEMETRY: u8 = 0x00;
pub const MSG_ID_VALVE_COMMAND: u8 = 0x01;
pub const MSG_ID_VALVE_STATE: u8 = 0x02;
pub const MSG_ID_HEARTBEAT: u8 = 0x03;
pub const MSG_ID_DEVICE_COMMAND: u8 = 0x04;
pub const MSG_ID_DEVICE_COMMAND_ACK: u8 = 0x05;
pub const MSG_ID_HANDOFF: u8 = 0x06;

pub const HANDOFF_CONFIRMATION_MAGIC: u32 = 0x4D41_5341;

/// Confirmation signal carried by a Handoff message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Abort = 0,
    Handoff = 1,
}

impl ControlSignal {
    const fn from_byte(b: u8) -> Result<ControlSignal, CodecError> {
        match b {
            0 => Ok(ControlSignal::Abort),
            1 => Ok(ControlSignal::Handoff),
            other => Err(CodecError::InvalidControlSignal(other)),
        }
    }
}

/// A decoded wire message: one of the seven MSG_ID variants (spec §3).
///
/// `encode` produces the byte payload including the leading MSG_ID byte;
/// `decode` parses a slice whose first byte is MSG_ID. Neither panics on
/// attacker-controlled input.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Telemetry {
        board: Board,
        timestamp_ns: u64,
        values: Vec<f32>,
    },
    ValveCommand {
        valve: Valve,
        state: bool,
    },
    ValveState {
        valve: Valve,
        state: bool,
        timestamp_ns: u64,
    },
    Heartbeat,
    DeviceCommand {
        board: Board,
        command: DeviceCommand,
    },
    DeviceCommandAck {
        board: Board,
        command: DeviceCommand,
        response: String,
    },
    Handoff {
        signal: ControlSignal,
    },
}

impl WireMessage {
    pub fn msg_id(&self) -> u8 {
        match self {
            WireMessage::Telemetry { .. } => MSG_ID_TELEMETRY,
            WireMessage::ValveCommand { .. } => MSG_ID_VALVE_COMMAND,
            WireMessage::ValveState { .. } => MSG_ID_VALVE_STATE,
            WireMessage::Heartbeat => MSG_ID_HEARTBEAT,
            WireMessage::DeviceCommand { .. } => MSG_ID_DEVICE_COMMAND,
            WireMessage::DeviceCommandAck { .. } => MSG_ID_DEVICE_COMMAND_ACK,
            WireMessage::Handoff { .. } => MSG_ID_HANDOFF,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.msg_id()];
        match self {
            WireMessage::Telemetry {
                board,
                timestamp_ns,
                values,
            } => {
                out.push(board.id());
                out.extend_from_slice(&timestamp_ns.to_be_bytes());
                for v in values {
                    out.extend_from_slice(&v.to_be_bytes());
                }
            }
            WireMessage::ValveCommand { valve, state } => {
                out.push(valve.identifier());
                out.push(u8::from(*state));
            }
            WireMessage::ValveState {
                valve,
                state,
                timestamp_ns,
            } => {
                out.push(valve.identifier());
                out.push(u8::from(*state));
                out.extend_from_slice(&timestamp_ns.to_be_bytes());
            }
            WireMessage::Heartbeat => {}
            WireMessage::DeviceCommand { board, command } => {
                out.push(board.id());
                out.push(command.id());
            }
            WireMessage::DeviceCommandAck {
                board,
                command,
                response,
            } => {
                out.push(board.id());
                out.push(command.id());
                out.extend_from_slice(response.as_bytes());
            }
            WireMessage::Handoff { signal } => {
                out.push(*signal as u8);
                out.extend_from_slice(&HANDOFF_CONFIRMATION_MAGIC.to_be_bytes());
            }
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<WireMessage, CodecError> {
        let &msg_id = bytes.first().ok_or(CodecError::Truncated {
            needed: 1,
            got: bytes.len(),
        })?;
        let rest = &bytes[1..];
        match msg_id {
            MSG_ID_TELEMETRY => decode_telemetry(rest),
            MSG_ID_VALVE_COMMAND => decode_valve_command(rest),
            MSG_ID_VALVE_STATE => decode_valve_state(rest),
            MSG_ID_HEARTBEAT => Ok(WireMessage::Heartbeat),
            MSG_ID_DEVICE_COMMAND => decode_device_command(rest),
            MSG_ID_DEVICE_COMMAND_ACK => decode_device_command_ack(rest),
            MSG_ID_HANDOFF => decode_handoff(rest),
            other => Err(CodecError::UnknownMsgId(other)),
        }
    }
}

fn need(bytes: &[u8], n: usize) -> Result<(), CodecError> {
    if bytes.len() < n {
        return Err(CodecError::Truncated {
            needed: n,
            got: bytes.len(),
        });
    }
    Ok(())
}

fn decode_telemetry(rest: &[u8]) -> Result<WireMessage, CodecError> {
    need(rest, 1 + 8)?;
    let board = Board::from_id(rest[0])?;
    let timestamp_ns = u64::from_be_bytes(rest[1..9].try_into().unwrap());
    let value_bytes = &rest[9..];
    if value_bytes.len() % 4 != 0 {
        return Err(CodecError::TelemetryCountMismatch {
            expected: board.num_values(),
            got: value_bytes.len() / 4,
        });
    }
    let got = value_bytes.len() / 4;
    if got != board.num_values() {
        return Err(CodecError::TelemetryCountMismatch {
            expected: board.num_values(),
            got,
        });
    }
    let values = value_bytes
        .chunks_exact(4)
        .map(|c| f32::from_be_bytes(c.try_into().unwrap()))
        .collect();
    Ok(WireMessage::Telemetry {
        board,
        timestamp_ns,
        values,
    })
}

fn decode_valve_command(rest: &[u8]) -> Result<WireMessage, CodecError> {
    need(rest, 2)?;
    let valve = Valve::from_identifier(rest[0])?;
    let state = rest[1] != 0;
    Ok(WireMessage::ValveCommand { valve, state })
}

fn decode_valve_state(rest: &[u8]) -> Result<WireMessage, CodecError> {
    need(rest, 2 + 8)?;
    let valve = Valve::from_identifier(rest[0])?;
    let state = rest[1] != 0;
    let timestamp_ns = u64::from_be_bytes(rest[2..10].try_into().unwrap());
    Ok(WireMessage::ValveState {
        valve,
        state,
        timestamp_ns,
    })
}

fn decode_device_command(rest: &[u8]) -> Result<WireMessage, CodecError> {
    need(rest, 2)?;
    let board = Board::from_id(rest[0])?;
    let command = DeviceCommand::from_id(rest[1])?;
    Ok(WireMessage::DeviceCommand { board, command })
}

fn decode_device_command_ack(rest: &[u8]) -> Result<WireMessage, CodecError> {
    need(rest, 2)?;
    let board = Board::from_id(rest[0])?;
    let command = DeviceCommand::from_id(rest[1])?;
    let response_bytes = &rest[2..];
    if response_bytes.len() > 200 {
        return Err(CodecError::InvalidResponseText);
    }
    let response = String::from_utf8(response_bytes.to_vec())
        .map_err(|_| CodecError::InvalidResponseText)?;
    Ok(WireMessage::DeviceCommandAck {
        board,
        command,
        response,
    })
}

fn decode_handoff(rest: &[u8]) -> Result<WireMessage, CodecError> {
    need(rest, 1 + 4)?;
    let signal = ControlSignal::from_byte(rest[0])?;
    let magic = u32::from_be_bytes(rest[1..5].try_into().unwrap());
    if magic != HANDOFF_CONFIRMATION_MAGIC {
        return Err(CodecError::InvalidHandoffMagic(magic));
    }
    Ok(WireMessage::Handoff { signal })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_round_trips() {
        let msg = WireMessage::Telemetry {
            board: Board::Fr,
            timestamp_ns: 123_456_789,
            values: vec![1.0; Board::Fr.num_values()],
        };
        let bytes = msg.encode();
        assert_eq!(WireMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn telemetry_rejects_wrong_count() {
        let msg = WireMessage::Telemetry {
            board: Board::Fc,
            timestamp_ns: 0,
            values: vec![0.0; 3],
        };
        let bytes = msg.encode();
        assert!(matches!(
            WireMessage::decode(&bytes),
            Err(CodecError::TelemetryCountMismatch { expected: 47, got: 3 })
        ));
    }

    #[test]
    fn valve_command_round_trips() {
        let valve = Valve::new(Board::Bb1, 2).unwrap();
        let msg = WireMessage::ValveCommand { valve, state: true };
        let bytes = msg.encode();
        assert_eq!(WireMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn valve_state_round_trips() {
        let valve = Valve::new(Board::Fc, 1).unwrap();
        let msg = WireMessage::ValveState {
            valve,
            state: false,
            timestamp_ns: 42,
        };
        let bytes = msg.encode();
        assert_eq!(WireMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn heartbeat_round_trips() {
        let msg = WireMessage::Heartbeat;
        assert_eq!(WireMessage::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn device_command_ack_round_trips_with_response() {
        let msg = WireMessage::DeviceCommandAck {
            board: Board::Fr,
            command: DeviceCommand::FirmwareBuildInfo,
            response: "v1.2.3".to_string(),
        };
        let bytes = msg.encode();
        assert_eq!(WireMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn handoff_round_trips() {
        let msg = WireMessage::Handoff {
            signal: ControlSignal::Handoff,
        };
        let bytes = msg.encode();
        assert_eq!(WireMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn handoff_rejects_bad_magic() {
        let mut bytes = WireMessage::Handoff {
            signal: ControlSignal::Abort,
        }
        .encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            WireMessage::decode(&bytes),
            Err(CodecError::InvalidHandoffMagic(_))
        ));
    }

    #[test]
    fn unknown_msg_id_is_rejected_not_panicked() {
        assert!(matches!(
            WireMessage::decode(&[0xEE, 1, 2, 3]),
            Err(CodecError::UnknownMsgId(0xEE))
        ));
    }

    #[test]
    fn truncated_buffers_never_panic() {
        for msg_id in 0x00u8..=0x06 {
            for len in 0..6 {
                let buf = vec![msg_id; len];
                let _ = WireMessage::decode(&buf);
            }
        }
        let _ = WireMessage::decode(&[]);
    }

    #[test]
    fn fuzz_like_random_bytes_never_panic() {
        let mut seed: u32 = 0x1234_5678;
        for _ in 0..2000 {
            let mut buf = Vec::with_capacity(16);
            for _ in 0..16 {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
                buf.push((seed >> 16) as u8);
            }
            let _ = WireMessage::decode(&buf);
        }
    }
}
