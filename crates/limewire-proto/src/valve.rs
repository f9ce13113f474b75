use crate::board::Board;
use crate::error::CodecError;

/// A controllable valve on a board: `(Board, ordinal)` with
/// `1 <= ordinal <= board.num_valves()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Valve {
    pub board: Board,
    pub ordinal: u8,
}

impl Valve {
    pub fn new(board: Board, ordinal: u8) -> Result<Valve, CodecError> {
        if ordinal == 0 || ordinal > board.num_valves() {
            return Err(CodecError::InvalidValve(10 * board.id() + ordinal));
        }
        Ok(Valve { board, ordinal })
    }

    /// Wire identifier: `10 * board.id() + ordinal`.
    pub const fn identifier(self) -> u8 {
        10 * self.board.id() + self.ordinal
    }

    pub fn from_identifier(id: u8) -> Result<Valve, CodecError> {
        let board = Board::from_id(id / 10).map_err(|_| CodecError::InvalidValve(id))?;
        let ordinal = id % 10;
        Valve::new(board, ordinal)
    }

    pub fn cmd_channel(self) -> String {
        format!("{}_vlv_{}", self.board.lower_name(), self.ordinal)
    }

    pub fn cmd_channel_index(self) -> String {
        format!("{}_vlv_{}_timestamp", self.board.lower_name(), self.ordinal)
    }

    pub fn state_channel(self) -> String {
        format!("{}_state_{}", self.board.lower_name(), self.ordinal)
    }

    pub fn state_channel_index(self) -> String {
        format!("{}_state_{}_timestamp", self.board.lower_name(), self.ordinal)
    }

    /// Parses a store channel name such as `fc_vlv_1` or `bb2_state_4` back
    /// into a `Valve`. Used by the command relay, which receives channel
    /// names from store subscriptions and must turn them back into wire
    /// valve identifiers.
    pub fn from_channel_name(name: &str) -> Result<Valve, CodecError> {
        let mut parts = name.split('_');
        let board_part = parts.next().ok_or(CodecError::InvalidChannelName)?;
        let kind_part = parts.next().ok_or(CodecError::InvalidChannelName)?;
        let ordinal_part = parts.next().ok_or(CodecError::InvalidChannelName)?;
        if parts.next().is_some() || !matches!(kind_part, "vlv" | "state") {
            return Err(CodecError::InvalidChannelName);
        }
        let board = Board::ALL
            .into_iter()
            .find(|b| b.lower_name() == board_part)
            .ok_or(CodecError::InvalidChannelName)?;
        let ordinal: u8 = ordinal_part
            .parse()
            .map_err(|_| CodecError::InvalidChannelName)?;
        Valve::new(board, ordinal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_round_trips_for_every_valid_valve() {
        for b in Board::ALL {
            for n in 1..=b.num_valves() {
                let v = Valve::new(b, n).unwrap();
                assert_eq!(Valve::from_identifier(v.identifier()).unwrap(), v);
            }
        }
    }

    #[test]
    fn rejects_ordinal_beyond_board_valve_count() {
        assert!(Valve::new(Board::Fr, 1).is_err());
        assert!(Valve::new(Board::Fc, 4).is_err());
        assert!(Valve::from_identifier(Board::Fc.id() * 10 + 9).is_err());
    }

    #[test]
    fn channel_name_derivation() {
        let v = Valve::new(Board::Fc, 1).unwrap();
        assert_eq!(v.cmd_channel(), "fc_vlv_1");
        assert_eq!(v.cmd_channel_index(), "fc_vlv_1_timestamp");
        assert_eq!(v.state_channel(), "fc_state_1");
        assert_eq!(v.state_channel_index(), "fc_state_1_timestamp");
    }

    #[test]
    fn channel_name_parses_back_to_valve() {
        let v = Valve::new(Board::Bb2, 5).unwrap();
        assert_eq!(Valve::from_channel_name(&v.cmd_channel()).unwrap(), v);
        assert_eq!(Valve::from_channel_name(&v.state_channel()).unwrap(), v);
        assert!(Valve::from_channel_name("bb2_vlv_99").is_err());
        assert!(Valve::from_channel_name("not_a_channel").is_err());
    }
}
