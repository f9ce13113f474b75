//! Channel map, frame builder, and store adapter for the limewire ground bridge.

mod channel_map;
mod error;
mod frame_builder;
mod store_client;

pub use channel_map::{classify, ChannelKind, ChannelMap, IndexChannelMeta};
pub use error::{ChannelMapError, FrameBuildError, StoreError};
pub use frame_builder::{build_frame, Frame, FrameValue};
pub use store_client::{CommandUpdate, MockStore, StoreClient};
