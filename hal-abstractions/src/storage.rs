//! Settings storage
//!
//! The node reads its `settings.toml` once at boot. Where the bytes live is
//! board specific: a FAT volume, a flash sector, or (on the Feather) a blob
//! embedded at build time.

#[cfg(feature = "defmt")]
use defmt::Format;

/// Settings storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum StoreError {
    /// No settings file present
    NotFound,
    /// File is larger than the caller's buffer
    TooLarge,
    /// Underlying medium failed
    Io,
}

impl core::fmt::Display for StoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "settings file not found"),
            Self::TooLarge => write!(f, "settings file too large"),
            Self::Io => write!(f, "settings storage I/O error"),
        }
    }
}

impl core::error::Error for StoreError {}

/// Source of the raw settings file
pub trait SettingsStore {
    /// Copy the whole settings file into `buf`, returning its length
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StoreError>;
}

/// Settings compiled into the firmware image
///
/// `None` models a device flashed without a settings file.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedSettings(pub Option<&'static [u8]>);

impl SettingsStore for EmbeddedSettings {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StoreError> {
        let bytes = self.0.ok_or(StoreError::NotFound)?;
        let dst = buf.get_mut(..bytes.len()).ok_or(StoreError::TooLarge)?;
        dst.copy_from_slice(bytes);
        Ok(bytes.len())
    }
}
