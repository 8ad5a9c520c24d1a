#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod backup;
pub mod config;
pub mod define;
pub mod error;
pub mod flash;

pub use backup::{BackupStore, MemoryBackup};
#[cfg(feature = "std")]
pub use backup::FileBackup;
pub use config::{FlashConfig, UnlockMode};
pub use define::Phase;
pub use error::{BackupError, Result};
pub use flash::Flash;

/// Identifier bytes reported while identification mode is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipId {
    pub manufacturer: u8,
    pub device: u8,
}

impl ChipId {
    pub const fn new(manufacturer: u8, device: u8) -> Self {
        ChipId {
            manufacturer,
            device,
        }
    }

    /// Byte seen at `offset` 0 or 1 of the chip window.
    pub fn byte(&self, offset: u32) -> Option<u8> {
        match offset {
            0 => Some(self.manufacturer),
            1 => Some(self.device),
            _ => None,
        }
    }
}

/// Chip size. Fixed for the lifetime of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// 64 KiB, one bank (SST).
    Small,
    /// 128 KiB, two banks (Macronix).
    Large,
}

impl Capacity {
    pub const fn banks(self) -> usize {
        match self {
            Capacity::Small => 1,
            Capacity::Large => 2,
        }
    }

    /// Total size in bytes.
    pub const fn size(self) -> usize {
        self.banks() * define::BANK_SIZE
    }

    pub const fn chip_id(self) -> ChipId {
        match self {
            Capacity::Small => ChipId::new(0xBF, 0xD4),
            Capacity::Large => ChipId::new(0xC2, 0x09),
        }
    }

    /// Capacity whose backing image is exactly `len` bytes long.
    pub fn from_image_len(len: usize) -> Option<Self> {
        match len {
            l if l == Capacity::Small.size() => Some(Capacity::Small),
            l if l == Capacity::Large.size() => Some(Capacity::Large),
            _ => None,
        }
    }
}

/// Byte-wide access from the host bus.
///
/// Addresses are the full bus addresses; the device masks what it does not
/// decode. Neither operation can fail.
pub trait BusDevice {
    fn read(&self, address: u32) -> u8;
    fn write(&mut self, address: u32, value: u8);
}
