//! Construction parameters for [`Flash`](crate::flash::Flash).

use alloc::string::String;

use crate::Capacity;

/// How the decoder treats a wrong second unlock write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnlockMode {
    /// Stay in the first unlock step and keep waiting for `0x55`.
    #[default]
    Lenient,
    /// Drop back to idle, as a wrong first unlock write does.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashConfig {
    pub capacity: Capacity,
    /// Handed to the persistence side as is. The device never reads it.
    pub save_path: String,
    pub unlock_mode: UnlockMode,
}

impl FlashConfig {
    pub fn new(capacity: Capacity, save_path: impl Into<String>) -> Self {
        FlashConfig {
            capacity,
            save_path: save_path.into(),
            unlock_mode: UnlockMode::default(),
        }
    }

    pub fn with_unlock_mode(mut self, unlock_mode: UnlockMode) -> Self {
        self.unlock_mode = unlock_mode;
        self
    }
}
