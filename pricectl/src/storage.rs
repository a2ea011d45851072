//! Durable key slots for client-side state.
//!
//! The pipeline keeps two independently keyed entries: the export audit log and the session
//! credentials. Each lives in its own [`StorageSlot`]. Readers must tolerate a missing or
//! malformed entry, so slots only move raw strings and leave parsing to their owners.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::Result;

/// One durable storage entry holding a serialized value.
pub trait StorageSlot: Send + Sync {
    /// Read the raw stored value, `None` if nothing has been written.
    fn read(&self) -> Result<Option<String>>;

    /// Replace the stored value.
    fn write(&self, value: &str) -> Result<()>;

    /// Remove the stored value. Removing an absent value is not an error.
    fn remove(&self) -> Result<()>;
}

/// Slot backed by a file on disk.
///
/// Writes go to a sibling temporary file first and are renamed into place, so a crash
/// mid-write leaves either the old or the new content.
#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StorageSlot for FileSlot {
    fn read(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, value: &str) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory slot, used by tests and by sessions that should not touch disk.
#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    value: Arc<Mutex<Option<String>>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A slot pre-populated with `value`.
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Arc::new(Mutex::new(Some(value.into()))),
        }
    }

    /// Current raw content, for assertions.
    pub fn peek(&self) -> Option<String> {
        self.value.lock().clone()
    }
}

impl StorageSlot for MemorySlot {
    fn read(&self) -> Result<Option<String>> {
        Ok(self.value.lock().clone())
    }

    fn write(&self, value: &str) -> Result<()> {
        *self.value.lock() = Some(value.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.value.lock() = None;
        Ok(())
    }
}
