use alloc::vec;
use alloc::vec::Vec;

use log::{debug, info, trace, warn};

use crate::backup::{BackupStore, check_len};
use crate::config::{FlashConfig, UnlockMode};
use crate::define::{
    ADDRESS, BANK_SIZE, Command, ERASE_SECTOR, ERASED, Phase, SECTOR_MASK, SECTOR_SIZE,
    UNLOCK_CODE,
};
use crate::error::{BackupError, Result};
use crate::{BusDevice, Capacity};

/// FLASH backup chip as seen from the cartridge bus.
///
/// Every write goes through the command decoder. Reads return the selected
/// bank, except for the two identifier bytes while chip ID mode is on.
pub struct Flash {
    config: FlashConfig,
    /// Bank 0 followed by bank 1, sized to the capacity.
    memory: Vec<u8>,
    current_bank: usize,
    phase: Phase,
    erase_armed: bool,
    write_armed: bool,
    bank_select_armed: bool,
    chip_id_mode: bool,
}

impl core::fmt::Debug for Flash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Flash")
            .field("capacity", &self.config.capacity)
            .field("current_bank", &self.current_bank)
            .field("phase", &self.phase)
            .field("erase_armed", &self.erase_armed)
            .field("write_armed", &self.write_armed)
            .field("bank_select_armed", &self.bank_select_armed)
            .field("chip_id_mode", &self.chip_id_mode)
            .finish()
    }
}

impl Flash {
    pub fn new(config: FlashConfig) -> Self {
        let mut flash = Flash {
            memory: vec![ERASED; config.capacity.size()],
            config,
            current_bank: 0,
            phase: Phase::Idle,
            erase_armed: false,
            write_armed: false,
            bank_select_armed: false,
            chip_id_mode: false,
        };
        flash.reset();
        flash
    }

    pub fn with_capacity(capacity: Capacity, save_path: &str) -> Self {
        Self::new(FlashConfig::new(capacity, save_path))
    }

    /// Back to power-on state with every cell erased.
    pub fn reset(&mut self) {
        self.current_bank = 0;
        self.phase = Phase::Idle;
        self.erase_armed = false;
        self.write_armed = false;
        self.bank_select_armed = false;
        self.chip_id_mode = false;
        self.memory.fill(ERASED);
        info!(
            "Flash reset: {:?}, {} bytes erased",
            self.config.capacity,
            self.memory.len()
        );
    }

    /// Resets, then applies the image held by `store` if there is a usable one.
    ///
    /// The device stays erased when the store has nothing or fails.
    pub fn reset_from<S: BackupStore + ?Sized>(&mut self, store: &mut S) {
        self.reset();
        match self.load_from(store) {
            Ok(()) => {}
            Err(BackupError::Missing) => {
                info!("No backup for {}, starting erased", self.config.save_path)
            }
            Err(e) => warn!("Ignoring backup for {}: {}", self.config.save_path, e),
        }
    }

    /// Contents are only replaced when the store succeeds.
    pub fn load_from<S: BackupStore + ?Sized>(&mut self, store: &mut S) -> Result<()> {
        let mut image = vec![ERASED; self.memory.len()];
        store.load(&mut image)?;
        self.memory = image;
        info!("Loaded {} byte backup", self.memory.len());
        Ok(())
    }

    pub fn save_to<S: BackupStore + ?Sized>(&self, store: &mut S) -> Result<()> {
        store.save(&self.memory)?;
        info!("Saved {} byte backup", self.memory.len());
        Ok(())
    }

    /// Replaces the whole contents. The image must match the capacity exactly.
    pub fn load_image(&mut self, image: &[u8]) -> Result<()> {
        check_len(self.memory.len(), image.len())?;
        self.memory.copy_from_slice(image);
        Ok(())
    }

    pub fn capacity(&self) -> Capacity {
        self.config.capacity
    }

    pub fn unlock_mode(&self) -> UnlockMode {
        self.config.unlock_mode
    }

    pub fn save_path(&self) -> &str {
        &self.config.save_path
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_bank(&self) -> usize {
        self.current_bank
    }

    pub fn is_identification_mode(&self) -> bool {
        self.chip_id_mode
    }

    pub fn is_erase_armed(&self) -> bool {
        self.erase_armed
    }

    pub fn is_write_armed(&self) -> bool {
        self.write_armed
    }

    pub fn is_bank_select_armed(&self) -> bool {
        self.bank_select_armed
    }

    /// Raw contents, bank 0 then bank 1.
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    pub fn bank(&self, index: usize) -> Option<&[u8]> {
        self.memory.chunks_exact(BANK_SIZE).nth(index)
    }

    fn bank_base(&self) -> usize {
        self.current_bank * BANK_SIZE
    }

    fn unlock_first(&self, address: u32, value: u8) -> Phase {
        if address == ADDRESS::COMMAND as u32 && value == UNLOCK_CODE::FIRST as u8 {
            Phase::Unlock1
        } else {
            trace!("Ignored write {:02X} @ {:08X} while idle", value, address);
            Phase::Idle
        }
    }

    fn unlock_second(&self, address: u32, value: u8) -> Phase {
        if address == ADDRESS::UNLOCK as u32 && value == UNLOCK_CODE::SECOND as u8 {
            return Phase::CommandReady;
        }
        trace!("Bad second unlock write {:02X} @ {:08X}", value, address);
        match self.config.unlock_mode {
            UnlockMode::Lenient => Phase::Unlock1,
            UnlockMode::Strict => Phase::Idle,
        }
    }

    fn handle_command(&mut self, address: u32, value: u8) -> Phase {
        if address != ADDRESS::COMMAND as u32 {
            if self.erase_armed
                && value == ERASE_SECTOR
                && (address & !SECTOR_MASK) == ADDRESS::BASE as u32
            {
                self.erase_sector(address);
            } else {
                trace!("Ignored command {:02X} @ {:08X}", value, address);
            }
            return Phase::Idle;
        }

        let Some(command) = Command::decode(value) else {
            trace!("Unknown command {:02X}", value);
            return Phase::Idle;
        };

        match command {
            Command::ReadChipId => {
                debug!("Chip ID mode on");
                self.chip_id_mode = true;
                Phase::Idle
            }
            Command::FinishChipId => {
                debug!("Chip ID mode off");
                self.chip_id_mode = false;
                Phase::Idle
            }
            Command::Erase => {
                debug!("Erase armed");
                self.erase_armed = true;
                Phase::Idle
            }
            Command::EraseChip => {
                if self.erase_armed {
                    debug!("Chip erase");
                    self.memory.fill(ERASED);
                    self.erase_armed = false;
                } else {
                    trace!("Chip erase without erase command");
                }
                Phase::Idle
            }
            Command::WriteByte => {
                self.write_armed = true;
                self.bank_select_armed = false;
                Phase::Extended
            }
            Command::SelectBank => {
                if self.config.capacity == Capacity::Large {
                    self.bank_select_armed = true;
                    self.write_armed = false;
                    Phase::Extended
                } else {
                    trace!("Bank select ignored on {:?}", self.config.capacity);
                    Phase::Idle
                }
            }
        }
    }

    fn erase_sector(&mut self, address: u32) {
        let start = self.bank_base() + (address & SECTOR_MASK) as usize;
        debug!(
            "Sector erase: bank {} offset {:04X}",
            self.current_bank,
            address & SECTOR_MASK
        );
        self.memory[start..start + SECTOR_SIZE].fill(ERASED);
        self.erase_armed = false;
    }

    fn handle_extended(&mut self, address: u32, value: u8) -> Phase {
        if self.write_armed {
            let offset = (address & 0xFFFF) as usize;
            trace!(
                "Program {:02X} @ bank {} offset {:04X}",
                value,
                self.current_bank,
                offset
            );
            let base = self.bank_base();
            self.memory[base + offset] = value;
            self.write_armed = false;
        } else if self.bank_select_armed && address == ADDRESS::BASE as u32 {
            self.current_bank = (value & 1) as usize;
            self.bank_select_armed = false;
            debug!("Bank {} selected", self.current_bank);
        } else {
            trace!("Dropped payload {:02X} @ {:08X}", value, address);
        }
        Phase::Idle
    }
}

impl BusDevice for Flash {
    fn read(&self, address: u32) -> u8 {
        let offset = address & 0xFFFF;
        if self.chip_id_mode {
            if let Some(id) = self.config.capacity.chip_id().byte(offset) {
                return id;
            }
        }
        self.memory[self.bank_base() + offset as usize]
    }

    fn write(&mut self, address: u32, value: u8) {
        self.phase = match self.phase {
            Phase::Idle => self.unlock_first(address, value),
            Phase::Unlock1 => self.unlock_second(address, value),
            Phase::CommandReady => self.handle_command(address, value),
            Phase::Extended => self.handle_extended(address, value),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unlock(flash: &mut Flash) {
        flash.write(0x0E00_5555, 0xAA);
        flash.write(0x0E00_2AAA, 0x55);
    }

    fn command(flash: &mut Flash, value: u8) {
        unlock(flash);
        flash.write(0x0E00_5555, value);
    }

    #[test]
    fn unlock_walks_through_phases() {
        let mut flash = Flash::with_capacity(Capacity::Small, "test.sav");
        assert_eq!(flash.phase(), Phase::Idle);
        flash.write(0x0E00_5555, 0xAA);
        assert_eq!(flash.phase(), Phase::Unlock1);
        flash.write(0x0E00_2AAA, 0x55);
        assert_eq!(flash.phase(), Phase::CommandReady);
        flash.write(0x0E00_5555, 0xA0);
        assert_eq!(flash.phase(), Phase::Extended);
        flash.write(0x0E00_0010, 0x42);
        assert_eq!(flash.phase(), Phase::Idle);
    }

    #[test]
    fn bad_first_unlock_stays_idle() {
        let mut flash = Flash::with_capacity(Capacity::Small, "test.sav");
        flash.write(0x0E00_5555, 0xAB);
        assert_eq!(flash.phase(), Phase::Idle);
        flash.write(0x0E00_2AAA, 0xAA);
        assert_eq!(flash.phase(), Phase::Idle);
    }

    #[test]
    fn bad_second_unlock_is_lenient_by_default() {
        let mut flash = Flash::with_capacity(Capacity::Small, "test.sav");
        flash.write(0x0E00_5555, 0xAA);
        flash.write(0x0E00_2AAA, 0x56);
        assert_eq!(flash.phase(), Phase::Unlock1);
        flash.write(0x0E00_5555, 0xAA);
        assert_eq!(flash.phase(), Phase::Unlock1);
        flash.write(0x0E00_2AAA, 0x55);
        assert_eq!(flash.phase(), Phase::CommandReady);
    }

    #[test]
    fn bad_second_unlock_resets_in_strict_mode() {
        let config =
            FlashConfig::new(Capacity::Small, "test.sav").with_unlock_mode(UnlockMode::Strict);
        let mut flash = Flash::new(config);
        flash.write(0x0E00_5555, 0xAA);
        flash.write(0x0E00_2AAA, 0x56);
        assert_eq!(flash.phase(), Phase::Idle);
    }

    #[test]
    fn unknown_command_returns_to_idle() {
        let mut flash = Flash::with_capacity(Capacity::Large, "test.sav");
        command(&mut flash, 0x77);
        assert_eq!(flash.phase(), Phase::Idle);

        unlock(&mut flash);
        flash.write(0x0E00_1234, 0x90);
        assert_eq!(flash.phase(), Phase::Idle);
        assert!(!flash.is_identification_mode());
    }

    #[test]
    fn write_and_bank_select_are_never_armed_together() {
        let mut flash = Flash::with_capacity(Capacity::Large, "test.sav");
        command(&mut flash, 0xB0);
        // payload misses the bank register, select stays latched
        flash.write(0x0E00_0001, 1);
        assert!(flash.is_bank_select_armed());
        assert_eq!(flash.current_bank(), 0);

        command(&mut flash, 0xA0);
        assert!(flash.is_write_armed());
        assert!(!flash.is_bank_select_armed());
        flash.write(0x0E00_0000, 0x12);
        assert_eq!(flash.current_bank(), 0);
        assert_eq!(flash.bank(0).unwrap()[0], 0x12);
    }

    #[test]
    fn erase_armed_survives_other_commands() {
        let mut flash = Flash::with_capacity(Capacity::Small, "test.sav");
        command(&mut flash, 0x80);
        command(&mut flash, 0xA0);
        assert!(flash.is_erase_armed());
        assert!(flash.is_write_armed());
        flash.write(0x0E00_0000, 0x00);
        assert!(flash.is_erase_armed());
    }

    #[test]
    fn reset_clears_decoder_state() {
        let mut flash = Flash::with_capacity(Capacity::Large, "test.sav");
        command(&mut flash, 0x90);
        command(&mut flash, 0x80);
        command(&mut flash, 0xB0);
        flash.write(0x0E00_0000, 1);
        unlock(&mut flash);
        flash.reset();
        assert_eq!(flash.phase(), Phase::Idle);
        assert_eq!(flash.current_bank(), 0);
        assert!(!flash.is_identification_mode());
        assert!(!flash.is_erase_armed());
        assert!(!flash.is_write_armed());
        assert!(!flash.is_bank_select_armed());
    }

    #[test]
    fn buffer_sized_to_capacity() {
        assert_eq!(
            Flash::with_capacity(Capacity::Small, "a").memory().len(),
            0x1_0000
        );
        assert_eq!(
            Flash::with_capacity(Capacity::Large, "b").memory().len(),
            0x2_0000
        );
    }
}
