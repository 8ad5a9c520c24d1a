use thiserror::Error;

/// Failures of the persistence side. The chip itself never fails.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("No backup image present")]
    Missing,
    #[error("Backup image size mismatch: expected {expected} bytes, found {found}")]
    SizeMismatch { expected: usize, found: usize },
    #[cfg(feature = "std")]
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, BackupError>;
