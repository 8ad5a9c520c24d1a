//! Persistence of the chip contents.
//!
//! The image is the raw chip contents with no header and no checksum:
//! bank 0 followed by bank 1 for the 128 KiB part.

use alloc::vec::Vec;

use crate::error::{BackupError, Result};

pub trait BackupStore {
    /// Fills `buf` with the stored image. `buf` is sized to the chip.
    fn load(&mut self, buf: &mut [u8]) -> Result<()>;
    fn save(&mut self, data: &[u8]) -> Result<()>;
}

pub(crate) fn check_len(expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(BackupError::SizeMismatch { expected, found });
    }
    Ok(())
}

/// Keeps the image in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackup {
    image: Option<Vec<u8>>,
}

impl MemoryBackup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(image: Vec<u8>) -> Self {
        MemoryBackup { image: Some(image) }
    }

    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }
}

impl BackupStore for MemoryBackup {
    fn load(&mut self, buf: &mut [u8]) -> Result<()> {
        let image = self.image.as_ref().ok_or(BackupError::Missing)?;
        check_len(buf.len(), image.len())?;
        buf.copy_from_slice(image);
        Ok(())
    }

    fn save(&mut self, data: &[u8]) -> Result<()> {
        self.image = Some(data.to_vec());
        Ok(())
    }
}

#[cfg(feature = "std")]
pub use file::FileBackup;

#[cfg(feature = "std")]
mod file {
    use std::fs;
    use std::io::ErrorKind;
    use std::path::{Path, PathBuf};

    use log::debug;

    use super::{BackupStore, check_len};
    use crate::Capacity;
    use crate::error::{BackupError, Result};

    /// Image stored as a plain file.
    #[derive(Debug, Clone)]
    pub struct FileBackup {
        path: PathBuf,
    }

    impl FileBackup {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            FileBackup { path: path.into() }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        /// Capacity matching the size of the file on disk.
        ///
        /// `Ok(None)` when the file exists but has no valid chip size.
        pub fn detect_capacity(&self) -> Result<Option<Capacity>> {
            let len = match fs::metadata(&self.path) {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == ErrorKind::NotFound => return Err(BackupError::Missing),
                Err(e) => return Err(e.into()),
            };
            Ok(usize::try_from(len).ok().and_then(Capacity::from_image_len))
        }
    }

    impl BackupStore for FileBackup {
        fn load(&mut self, buf: &mut [u8]) -> Result<()> {
            let image = match fs::read(&self.path) {
                Ok(image) => image,
                Err(e) if e.kind() == ErrorKind::NotFound => return Err(BackupError::Missing),
                Err(e) => return Err(e.into()),
            };
            check_len(buf.len(), image.len())?;
            buf.copy_from_slice(&image);
            debug!("Read {} bytes from {}", image.len(), self.path.display());
            Ok(())
        }

        fn save(&mut self, data: &[u8]) -> Result<()> {
            fs::write(&self.path, data)?;
            debug!("Wrote {} bytes to {}", data.len(), self.path.display());
            Ok(())
        }
    }
}
