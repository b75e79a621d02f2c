use std::fs;
use std::io;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const OBSERVER_SAVE_FILE: &str = "observers.dat";
const OBSERVER_SAVE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavedObserver {
    pub position: Vec3,
    pub velocity: Vec3,
    pub physics_mode: u8,
}

#[derive(Serialize, Deserialize)]
struct ObserverSaveDisk {
    format_version: u32,
    observers: Vec<SavedObserver>,
}

pub fn save_observers(path: &Path, observers: &[SavedObserver]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let disk = ObserverSaveDisk {
        format_version: OBSERVER_SAVE_VERSION,
        observers: observers.to_vec(),
    };
    let encoded = bincode::serialize(&disk).map_err(|err| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("failed to encode observer save: {err}"),
        )
    })?;
    fs::write(path, encoded)?;
    debug!("Saved {} observer(s) to {}", observers.len(), path.display());
    Ok(())
}

/// Reads observers saved by `save_observers`. A missing file yields `None`.
pub fn load_observers(path: &Path) -> io::Result<Option<Vec<SavedObserver>>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    let disk: ObserverSaveDisk = bincode::deserialize(&bytes).map_err(|err| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("failed to decode observer save: {err}"),
        )
    })?;
    if disk.format_version != OBSERVER_SAVE_VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "unsupported observer save version {}; expected {OBSERVER_SAVE_VERSION}",
                disk.format_version
            ),
        ));
    }
    Ok(Some(disk.observers))
}
