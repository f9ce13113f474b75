use crate::error::CodecError;

/// The five boards on the FC network (spec §3). The numeric identifier is
/// what appears on the wire; everything else is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Board {
    Fc = 0,
    Bb1 = 1,
    Bb2 = 2,
    Bb3 = 3,
    Fr = 4,
}

impl Board {
    pub const ALL: [Board; 5] = [Board::Fc, Board::Bb1, Board::Bb2, Board::Bb3, Board::Fr];

    pub const fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Result<Board, CodecError> {
        match id {
            0 => Ok(Board::Fc),
            1 => Ok(Board::Bb1),
            2 => Ok(Board::Bb2),
            3 => Ok(Board::Bb3),
            4 => Ok(Board::Fr),
            other => Err(CodecError::InvalidBoard(other)),
        }
    }

    /// Human-readable display name, e.g. for log lines.
    pub const fn pretty_name(self) -> &'static str {
        match self {
            Board::Fc => "Flight Computer",
            Board::Bb1 => "Bay Board 1",
            Board::Bb2 => "Bay Board 2",
            Board::Bb3 => "Bay Board 3",
            Board::Fr => "Flight Recorder",
        }
    }

    /// Lowercase short name used to derive store channel names.
    pub const fn lower_name(self) -> &'static str {
        match self {
            Board::Fc => "fc",
            Board::Bb1 => "bb1",
            Board::Bb2 => "bb2",
            Board::Bb3 => "bb3",
            Board::Fr => "fr",
        }
    }

    pub const fn num_values(self) -> usize {
        match self {
            Board::Fc => 47,
            Board::Bb1 | Board::Bb2 | Board::Bb3 => 52,
            Board::Fr => 14,
        }
    }

    pub const fn num_valves(self) -> u8 {
        match self {
            Board::Fc => 3,
            Board::Bb1 | Board::Bb2 | Board::Bb3 => 7,
            Board::Fr => 0,
        }
    }

    pub fn index_channel(self) -> String {
        format!("{}_timestamp", self.lower_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_id() {
        for b in Board::ALL {
            assert_eq!(Board::from_id(b.id()).unwrap(), b);
        }
    }

    #[test]
    fn rejects_unknown_id() {
        assert!(matches!(Board::from_id(5), Err(CodecError::InvalidBoard(5))));
    }

    #[test]
    fn index_channel_naming() {
        assert_eq!(Board::Fc.index_channel(), "fc_timestamp");
        assert_eq!(Board::Bb2.index_channel(), "bb2_timestamp");
    }

    #[test]
    fn value_and_valve_counts_match_spec() {
        assert_eq!(Board::Fc.num_values(), 47);
        assert_eq!(Board::Bb1.num_values(), 52);
        assert_eq!(Board::Bb2.num_values(), 52);
        assert_eq!(Board::Bb3.num_values(), 52);
        assert_eq!(Board::Fr.num_values(), 14);
        assert_eq!(Board::Fc.num_valves(), 3);
        assert_eq!(Board::Bb1.num_valves(), 7);
        assert_eq!(Board::Fr.num_valves(), 0);
    }
}
