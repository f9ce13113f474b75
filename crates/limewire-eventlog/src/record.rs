use chrono::{DateTime, NaiveDateTime, Utc};
use limewire_proto::Board;
use thiserror::Error;

const CODE_LEN: usize = 4;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventLogError {
    #[error("event log line is not valid UTF-8")]
    NotUtf8,
    #[error("status code {0} does not map to a known board")]
    UnknownBoardForCode(u16),
}

/// A decoded firmware event-log line (spec §4.10). Both the leading ISO
/// timestamp and the leading four-digit status code are independently
/// optional; `board` is derived from `status_code / 1000` only when a code
/// is present.
#[derive(Debug, Clone, PartialEq)]
pub struct FirmwareLogRecord {
    pub timestamp: Option<DateTime<Utc>>,
    pub board: Option<Board>,
    pub status_code: Option<u16>,
    pub message: String,
}

/// Parses one ASCII event-log line: `YYYY-MM-DDTHH:MM:SS.ffffffZ NNNN
/// message-text`, where the leading timestamp and the leading four-digit
/// code are each optional.
pub fn parse_line(bytes: &[u8]) -> Result<FirmwareLogRecord, EventLogError> {
    let text = std::str::from_utf8(bytes).map_err(|_| EventLogError::NotUtf8)?;
    let mut rest = text.trim();

    let mut timestamp = None;
    let candidate_end = rest.find(' ').unwrap_or(rest.len());
    let candidate = &rest[..candidate_end];
    if let Ok(naive) = NaiveDateTime::parse_from_str(candidate, TIMESTAMP_FORMAT) {
        timestamp = Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
        rest = &rest[candidate_end..];
        rest = rest.strip_prefix(' ').unwrap_or(rest);
    }

    let mut status_code = None;
    if rest.len() >= CODE_LEN && rest.as_bytes()[..CODE_LEN].iter().all(u8::is_ascii_digit) {
        let code: u16 = rest[..CODE_LEN].parse().expect("already validated as ascii digits");
        status_code = Some(code);
        rest = &rest[CODE_LEN..];
        rest = rest.strip_prefix(' ').unwrap_or(rest);
    }

    let board = match status_code {
        Some(code) => {
            let board_id = (code / 1000) as u8;
            Some(Board::from_id(board_id).map_err(|_| EventLogError::UnknownBoardForCode(code))?)
        }
        None => None,
    };

    Ok(FirmwareLogRecord { timestamp, board, status_code, message: rest.to_string() })
}
