use std::{collections::HashMap, path::Path};

use limewire_proto::Valve;

use crate::error::ChannelMapError;

/// Channel classification, computed once at map-load time rather than
/// re-derived per message (spec §9 design note).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Timestamp,
    Uint8,
    Float32,
}

/// Classifies a channel purely from its name (spec §4.4):
/// - ends in `_timestamp` or contains `limewire_write_time` -> `Timestamp`
/// - matches `<board>_vlv_<n>` or `<board>_state_<n>` -> `Uint8`
/// - otherwise -> `Float32`
pub fn classify(name: &str) -> ChannelKind {
    if name.ends_with("_timestamp") || name.contains("limewire_write_time") {
        ChannelKind::Timestamp
    } else if Valve::from_channel_name(name).is_ok() {
        ChannelKind::Uint8
    } else {
        ChannelKind::Float32
    }
}

fn write_time_of(index_name: &str) -> String {
    index_name.replacen("timestamp", "limewire_write_time", 1)
}

/// The ordered data-channel list for one index channel, with the reserved
/// write-time entry lifted out of the positional list (spec §9 design note).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexChannelMeta {
    pub data_channels: Vec<String>,
    pub write_time_channel: String,
}

/// Mapping from index-channel name to its ordered data-channel list, loaded
/// once at startup from a JSON document (spec §4.4).
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    entries: HashMap<String, IndexChannelMeta>,
}

impl ChannelMap {
    pub fn load(path: &Path) -> Result<ChannelMap, ChannelMapError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ChannelMapError::Io { path: path.display().to_string(), source })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<ChannelMap, ChannelMapError> {
        let parsed: HashMap<String, Vec<String>> = serde_json::from_str(raw)?;
        let entries = parsed
            .into_iter()
            .map(|(index_name, channel_names)| {
                let write_time_channel = write_time_of(&index_name);
                let data_channels = channel_names
                    .into_iter()
                    .filter(|c| c != &write_time_channel)
                    .collect();
                (index_name, IndexChannelMeta { data_channels, write_time_channel })
            })
            .collect();
        Ok(ChannelMap { entries })
    }

    /// Restricts the map to the `fc_timestamp` entry only, per the
    /// `LIMEWIRE_DEV_SYNNAX` development-mode knob (spec §4.4, §6). Purely a
    /// configuration restriction; it does not change the semantics of any
    /// other operation.
    pub fn restrict_to_dev_mode(self) -> Result<ChannelMap, ChannelMapError> {
        let fc = self
            .entries
            .get("fc_timestamp")
            .cloned()
            .ok_or(ChannelMapError::MissingDevModeEntry)?;
        let mut entries = HashMap::with_capacity(1);
        entries.insert("fc_timestamp".to_string(), fc);
        Ok(ChannelMap { entries })
    }

    pub fn get(&self, index_channel: &str) -> Option<&IndexChannelMeta> {
        self.entries.get(index_channel)
    }

    pub fn index_channels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn write_time_of(&self, index_channel: &str) -> Option<&str> {
        self.entries.get(index_channel).map(|m| m.write_time_channel.as_str())
    }

    pub fn is_valve_command(&self, name: &str) -> bool {
        classify(name) == ChannelKind::Uint8 && name.contains("_vlv_")
    }

    pub fn is_valve_state(&self, name: &str) -> bool {
        classify(name) == ChannelKind::Uint8 && name.contains("_state_")
    }
}
