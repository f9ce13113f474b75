use std::{
    collections::HashMap,
    time::{SystemTime, UNIX_EPOCH},
};

use limewire_proto::WireMessage;

use crate::{channel_map::ChannelMap, error::FrameBuildError};

/// One value destined for a single named store channel.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameValue {
    Timestamp(u64),
    Uint8(u8),
    Float32(f32),
}

/// A store frame: channel name -> value, ready to be handed to a
/// [`crate::StoreClient`].
pub type Frame = HashMap<String, FrameValue>;

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_nanos() as u64
}

/// Builds a store frame from a decoded wire message (spec §4.5). Pure aside
/// from reading the wall clock for the write-time stamp.
///
/// Returns `Ok(None)` for message variants that produce no frame (Heartbeat,
/// DeviceCommand*, Handoff, ValveCommand) — those are handled elsewhere in
/// the pipeline (command relay, acks).
pub fn build_frame(map: &ChannelMap, message: &WireMessage) -> Result<Option<Frame>, FrameBuildError> {
    match message {
        WireMessage::Telemetry { board, timestamp_ns, values } => {
            let index_channel = board.index_channel();
            let meta = map
                .get(&index_channel)
                .ok_or_else(|| FrameBuildError::UnknownBoard(index_channel.clone()))?;

            if meta.data_channels.len() != values.len() {
                return Err(FrameBuildError::SchemaMismatch {
                    expected: meta.data_channels.len(),
                    got: values.len(),
                });
            }

            let mut frame = Frame::with_capacity(meta.data_channels.len() + 2);
            for (name, value) in meta.data_channels.iter().zip(values.iter()) {
                frame.insert(name.clone(), FrameValue::Float32(*value));
            }
            frame.insert(index_channel, FrameValue::Timestamp(*timestamp_ns));
            frame.insert(meta.write_time_channel.clone(), FrameValue::Timestamp(now_ns()));
            Ok(Some(frame))
        }
        WireMessage::ValveState { valve, state, timestamp_ns } => {
            let mut frame = Frame::with_capacity(3);
            frame.insert(valve.state_channel_index(), FrameValue::Timestamp(*timestamp_ns));
            frame.insert(valve.state_channel(), FrameValue::Uint8(u8::from(*state)));
            frame.insert(
                write_time_of_index(&valve.state_channel_index()),
                FrameValue::Timestamp(now_ns()),
            );
            Ok(Some(frame))
        }
        WireMessage::ValveCommand { .. }
        | WireMessage::Heartbeat
        | WireMessage::DeviceCommand { .. }
        | WireMessage::DeviceCommandAck { .. }
        | WireMessage::Handoff { .. } => Ok(None),
    }
}

fn write_time_of_index(index_name: &str) -> String {
    index_name.replacen("timestamp", "limewire_write_time", 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use limewire_proto::{Board, Valve};

    fn sample_map() -> ChannelMap {
        ChannelMap::from_json_str(
            r#"{"fc_timestamp": ["fc_pt1", "fc_pt2", "fc_limewire_write_time"]}"#,
        )
        .unwrap()
    }

    #[test]
    fn builds_telemetry_frame() {
        let map = sample_map();
        let msg = WireMessage::Telemetry {
            board: Board::Fc,
            timestamp_ns: 42,
            values: vec![1.0, 2.0],
        };
        let frame = build_frame(&map, &msg).unwrap().unwrap();
        assert_eq!(frame.get("fc_pt1"), Some(&FrameValue::Float32(1.0)));
        assert_eq!(frame.get("fc_pt2"), Some(&FrameValue::Float32(2.0)));
        assert_eq!(frame.get("fc_timestamp"), Some(&FrameValue::Timestamp(42)));
        assert!(matches!(frame.get("fc_limewire_write_time"), Some(FrameValue::Timestamp(_))));
    }

    #[test]
    fn rejects_unknown_board_index_channel() {
        let map = ChannelMap::from_json_str("{}").unwrap();
        let msg = WireMessage::Telemetry { board: Board::Fc, timestamp_ns: 0, values: vec![] };
        assert!(matches!(build_frame(&map, &msg), Err(FrameBuildError::UnknownBoard(_))));
    }

    #[test]
    fn rejects_value_count_mismatch() {
        let map = sample_map();
        let msg = WireMessage::Telemetry { board: Board::Fc, timestamp_ns: 0, values: vec![1.0] };
        assert!(matches!(
            build_frame(&map, &msg),
            Err(FrameBuildError::SchemaMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn builds_valve_state_frame() {
        let map = sample_map();
        let valve = Valve::new(Board::Fc, 1).unwrap();
        let msg = WireMessage::ValveState { valve, state: true, timestamp_ns: 7 };
        let frame = build_frame(&map, &msg).unwrap().unwrap();
        assert_eq!(frame.get("fc_state_1"), Some(&FrameValue::Uint8(1)));
        assert_eq!(frame.get("fc_state_1_timestamp"), Some(&FrameValue::Timestamp(7)));
        assert!(matches!(
            frame.get("fc_state_1_limewire_write_time"),
            Some(FrameValue::Timestamp(_))
        ));
    }

    #[test]
    fn non_frame_variants_produce_nothing() {
        let map = sample_map();
        assert_eq!(build_frame(&map, &WireMessage::Heartbeat).unwrap(), None);
    }
}
