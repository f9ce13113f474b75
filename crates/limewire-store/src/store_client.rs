use std::collections::{HashMap, VecDeque};

use crate::{error::StoreError, frame_builder::Frame};

/// One newest-wins update delivered by a command-channel subscription
/// (spec §4.6 `subscribe`). `queued_ns` is the wall-clock time the update
/// became available, used by the command relay to compute
/// `limewire_valve_command_latency` (spec §4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandUpdate {
    pub channel: String,
    pub value: u8,
    pub queued_ns: u64,
}

/// The external collaborator named in spec §1: "we assume an SDK with
/// channel create/retrieve, an appending writer, and an async subscription
/// streamer". No real time-series store client crate is available in this
/// workspace's dependency set, so this trait is the seam a real client
/// would be plugged into; [`MockStore`] is the in-memory stand-in used by
/// tests and dev-mode runs.
pub trait StoreClient {
    /// Opens (or reopens) a writer. Called once at session start and again
    /// whenever [`write`](Self::write) returns a validation error.
    fn open_writer(&mut self) -> Result<(), StoreError>;

    /// Appends one frame. Returns `Err(StoreError::Validation(..))` when the
    /// store rejects the frame's content (e.g. a zero or out-of-order
    /// timestamp) — the caller is expected to close and reopen the writer
    /// on this error and emit a clock-resync signal (spec §4.7, §4.12).
    fn write(&mut self, frame: &Frame) -> Result<(), StoreError>;

    /// Subscribes to the given channel names for command delivery (spec
    /// §4.6 `subscribe`). Replaces any previous command subscription.
    fn subscribe_command_channels(&mut self, channel_names: Vec<String>);

    /// Drains newest-wins updates delivered since the last poll, one per
    /// channel that changed (spec §4.7: "take only the last value per
    /// channel"). Non-blocking, matching this workspace's poll-driven I/O
    /// style.
    fn poll_command_updates(&mut self) -> Vec<CommandUpdate>;

    /// Subscribes to a single distinguished handoff control channel, if the
    /// deployment wires one up (spec §4.7, optional handoff relay).
    fn subscribe_handoff_channel(&mut self, channel_name: Option<String>);

    /// Drains the next handoff control-signal byte, if one has arrived.
    fn poll_handoff(&mut self) -> Option<u8>;
}

/// In-memory [`StoreClient`] used by tests and by `fc-simulator`/dev-mode
/// runs that have no real store backend available.
#[derive(Debug, Default)]
pub struct MockStore {
    writer_open: bool,
    written: Vec<HashMap<String, crate::frame_builder::FrameValue>>,
    command_channel_names: Vec<String>,
    command_queue: VecDeque<CommandUpdate>,
    handoff_channel_name: Option<String>,
    handoff_queue: VecDeque<u8>,
}

impl MockStore {
    pub fn new(command_channel_names: Vec<String>) -> Self {
        Self {
            writer_open: false,
            written: Vec::new(),
            command_channel_names,
            command_queue: VecDeque::new(),
            handoff_channel_name: None,
            handoff_queue: VecDeque::new(),
        }
    }

    pub fn written_frames(&self) -> &[Frame] {
        &self.written
    }

    pub fn is_writer_open(&self) -> bool {
        self.writer_open
    }

    /// Test/dev-mode seam: injects a command update as if it had just
    /// arrived over the real subscription stream.
    pub fn push_command_update(&mut self, channel: impl Into<String>, value: u8, queued_ns: u64) {
        let channel = channel.into();
        if self.command_channel_names.iter().any(|c| c == &channel) {
            self.command_queue.push_back(CommandUpdate { channel, value, queued_ns });
        }
    }

    /// Test/dev-mode seam: injects a handoff control signal byte.
    pub fn push_handoff(&mut self, signal: u8) {
        if self.handoff_channel_name.is_some() {
            self.handoff_queue.push_back(signal);
        }
    }
}

impl StoreClient for MockStore {
    fn open_writer(&mut self) -> Result<(), StoreError> {
        self.writer_open = true;
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), StoreError> {
        if !self.writer_open {
            return Err(StoreError::WriterClosed);
        }
        // Zero timestamps exercise the store's validation path, mirroring
        // the FC simulator's deliberately-invalid every-100th message
        // (spec §4.9).
        let has_zero_timestamp = frame.values().any(|v| {
            matches!(v, crate::frame_builder::FrameValue::Timestamp(0))
        });
        if has_zero_timestamp {
            self.writer_open = false;
            return Err(StoreError::Validation("zero timestamp rejected".to_string()));
        }
        self.written.push(frame.clone());
        Ok(())
    }

    fn subscribe_command_channels(&mut self, channel_names: Vec<String>) {
        self.command_channel_names = channel_names;
        self.command_queue.clear();
    }

    fn poll_command_updates(&mut self) -> Vec<CommandUpdate> {
        self.command_queue.drain(..).collect()
    }

    fn subscribe_handoff_channel(&mut self, channel_name: Option<String>) {
        self.handoff_channel_name = channel_name;
        self.handoff_queue.clear();
    }

    fn poll_handoff(&mut self) -> Option<u8> {
        self.handoff_queue.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_builder::FrameValue;

    #[test]
    fn write_fails_before_open() {
        let mut store = MockStore::new(vec![]);
        let mut frame = Frame::new();
        frame.insert("fc_pt1".to_string(), FrameValue::Float32(1.0));
        assert!(matches!(store.write(&frame), Err(StoreError::WriterClosed)));
    }

    #[test]
    fn write_succeeds_after_open() {
        let mut store = MockStore::new(vec![]);
        store.open_writer().unwrap();
        let mut frame = Frame::new();
        frame.insert("fc_pt1".to_string(), FrameValue::Float32(1.0));
        store.write(&frame).unwrap();
        assert_eq!(store.written_frames().len(), 1);
    }

    #[test]
    fn zero_timestamp_closes_writer_with_validation_error() {
        let mut store = MockStore::new(vec![]);
        store.open_writer().unwrap();
        let mut frame = Frame::new();
        frame.insert("fc_timestamp".to_string(), FrameValue::Timestamp(0));
        assert!(matches!(store.write(&frame), Err(StoreError::Validation(_))));
        assert!(!store.is_writer_open());
    }

    #[test]
    fn command_updates_only_accepted_for_subscribed_channels() {
        let mut store = MockStore::new(vec![]);
        store.push_command_update("fc_vlv_1", 1, 100);
        assert!(store.poll_command_updates().is_empty());

        store.subscribe_command_channels(vec!["fc_vlv_1".to_string()]);
        store.push_command_update("fc_vlv_1", 1, 100);
        store.push_command_update("bb1_vlv_2", 1, 100);
        let updates = store.poll_command_updates();
        assert_eq!(updates, vec![CommandUpdate { channel: "fc_vlv_1".to_string(), value: 1, queued_ns: 100 }]);
        assert!(store.poll_command_updates().is_empty());
    }

    #[test]
    fn resubscribing_command_channels_drops_stale_queue() {
        let mut store = MockStore::new(vec![]);
        store.subscribe_command_channels(vec!["fc_vlv_1".to_string()]);
        store.push_command_update("fc_vlv_1", 1, 100);
        store.subscribe_command_channels(vec!["fc_vlv_1".to_string()]);
        assert!(store.poll_command_updates().is_empty());
    }

    #[test]
    fn handoff_updates_require_subscription() {
        let mut store = MockStore::new(vec![]);
        store.push_handoff(1);
        assert_eq!(store.poll_handoff(), None);

        store.subscribe_handoff_channel(Some("handoff_ctl".to_string()));
        store.push_handoff(1);
        assert_eq!(store.poll_handoff(), Some(1));
        assert_eq!(store.poll_handoff(), None);
    }
}
