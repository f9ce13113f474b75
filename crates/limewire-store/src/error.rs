use thiserror::Error;

/// Errors raised while loading or querying the channel map (spec §4.4).
#[derive(Error, Debug)]
pub enum ChannelMapError {
    #[error("failed to read channel map file {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("failed to parse channel map JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("development mode requested but channel map has no `fc_timestamp` entry")]
    MissingDevModeEntry,
}

/// Errors raised while building a store frame from a decoded message (spec §4.5).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameBuildError {
    #[error("no channel map entry for index channel {0}")]
    UnknownBoard(String),
    #[error("telemetry value count mismatch: expected {expected} channels, got {got} values")]
    SchemaMismatch { expected: usize, got: usize },
}

/// Errors raised by the store adapter (spec §4.6/§4.12, `ErrKind::StoreValidation`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store rejected frame: {0}")]
    Validation(String),
    #[error("store writer is not open")]
    WriterClosed,
}
