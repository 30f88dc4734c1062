//! Location locking
//!
//! At most one engine per location may be open in this process. Locations
//! are claimed in a process-wide registry and released when the guard drops.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{const_mutex, Mutex};

use crate::error::{LevelError, Result};

static LOCKED_LOCATIONS: Mutex<BTreeSet<PathBuf>> = const_mutex(BTreeSet::new());

/// Exclusive claim on a storage location, released on drop
#[derive(Debug)]
pub struct LocationLock {
    key: PathBuf,
}

impl LocationLock {
    /// Claim `location`, failing with `LocationLocked` if already claimed
    pub fn acquire(location: &Path) -> Result<Self> {
        let key = Self::normalize(location);
        let mut locked = LOCKED_LOCATIONS.lock();
        if !locked.insert(key.clone()) {
            return Err(LevelError::LocationLocked(key));
        }
        Ok(Self { key })
    }

    /// Whether `location` is currently claimed
    pub fn is_locked(location: &Path) -> bool {
        LOCKED_LOCATIONS.lock().contains(&Self::normalize(location))
    }

    fn normalize(location: &Path) -> PathBuf {
        match fs::canonicalize(location) {
            Ok(path) => path,
            Err(_) if location.is_absolute() => location.to_path_buf(),
            Err(_) => match env::current_dir() {
                Ok(cwd) => cwd.join(location),
                Err(_) => location.to_path_buf(),
            },
        }
    }
}

impl Drop for LocationLock {
    fn drop(&mut self) {
        LOCKED_LOCATIONS.lock().remove(&self.key);
    }
}
