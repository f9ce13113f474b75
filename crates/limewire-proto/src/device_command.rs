use crate::error::CodecError;

/// Operator-issued board commands (spec §3), carried as one byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceCommand {
    ResetBoard = 0x00,
    ClearFlash = 0x01,
    FlashSpace = 0x02,
    FirmwareBuildInfo = 0x03,
}

impl DeviceCommand {
    pub const fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Result<DeviceCommand, CodecError> {
        match id {
            0x00 => Ok(DeviceCommand::ResetBoard),
            0x01 => Ok(DeviceCommand::ClearFlash),
            0x02 => Ok(DeviceCommand::FlashSpace),
            0x03 => Ok(DeviceCommand::FirmwareBuildInfo),
            other => Err(CodecError::InvalidCommand(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_known_command() {
        for cmd in [
            DeviceCommand::ResetBoard,
            DeviceCommand::ClearFlash,
            DeviceCommand::FlashSpace,
            DeviceCommand::FirmwareBuildInfo,
        ] {
            assert_eq!(DeviceCommand::from_id(cmd.id()).unwrap(), cmd);
        }
    }

    #[test]
    fn rejects_unknown_command_id() {
        assert!(matches!(
            DeviceCommand::from_id(0xFF),
            Err(CodecError::InvalidCommand(0xFF))
        ));
    }
}
