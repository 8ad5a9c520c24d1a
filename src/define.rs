/// Size of one addressable bank.
pub const BANK_SIZE: usize = 0x1_0000;

/// Erase granularity inside a bank.
pub const SECTOR_SIZE: usize = 0x1000;

/// Value of an erased cell.
pub const ERASED: u8 = 0xFF;

/// Fixed bus addresses the chip decodes.
pub(crate) enum ADDRESS {
    /// First unlock write and every command write.
    COMMAND = 0x0E00_5555,
    /// Second unlock write.
    UNLOCK = 0x0E00_2AAA,
    /// Base of the chip window. Bank select payloads go here.
    BASE = 0x0E00_0000,
}

pub(crate) enum UNLOCK_CODE {
    FIRST = 0xAA,
    SECOND = 0x55,
}

/// Command bytes written to `ADDRESS::COMMAND` once unlocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    ReadChipId = 0x90,
    FinishChipId = 0xF0,
    Erase = 0x80,
    EraseChip = 0x10,
    WriteByte = 0xA0,
    SelectBank = 0xB0,
}

impl Command {
    pub(crate) fn decode(value: u8) -> Option<Self> {
        match value {
            0x90 => Some(Command::ReadChipId),
            0xF0 => Some(Command::FinishChipId),
            0x80 => Some(Command::Erase),
            0x10 => Some(Command::EraseChip),
            0xA0 => Some(Command::WriteByte),
            0xB0 => Some(Command::SelectBank),
            _ => None,
        }
    }
}

/// Sector erase is the only command not sent to `ADDRESS::COMMAND`.
/// It goes to the sector base inside the chip window.
pub(crate) const ERASE_SECTOR: u8 = 0x30;

/// Address bits that select the sector for `ERASE_SECTOR`.
pub(crate) const SECTOR_MASK: u32 = 0xF000;

/// Position of the decoder in the command grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Waiting for the first unlock write.
    #[default]
    Idle,
    /// First unlock write seen.
    Unlock1,
    /// Fully unlocked; the next write is a command.
    CommandReady,
    /// A command is waiting for its single payload write.
    Extended,
}
