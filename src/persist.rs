//! Atomic JSON persistence for the durable trackers.
//!
//! Every mutation must leave a well-formed file behind, so writes go to a
//! sibling temp file, fsync, then rename onto the target. A missing or
//! corrupt file on load is treated as "no prior state" with a logged
//! warning — trackers never refuse to start over a bad file.

use crate::error::OrchestratorError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One JSON-encoded file with atomic replace semantics.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored value, or `T::default()` when the file is missing or
    /// unreadable.
    pub fn load<T>(&self) -> T
    where
        T: DeserializeOwned + Default,
    {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no prior state file, starting empty");
                return T::default();
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "could not read state file, starting empty"
                );
                return T::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "corrupt state file, starting empty"
                );
                T::default()
            }
        }
    }

    /// Serialize `value` and atomically replace the backing file:
    /// write `<path>.tmp`, fsync, rename onto `<path>`.
    pub fn save<T>(&self, value: &T) -> Result<(), OrchestratorError>
    where
        T: Serialize,
    {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| OrchestratorError::Persistence {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }

        let json = serde_json::to_vec_pretty(value).map_err(|err| {
            OrchestratorError::Persistence { path: self.path.clone(), source: err.into() }
        })?;

        let tmp = self.path.with_extension("tmp");
        let write_result = (|| {
            let mut file = File::create(&tmp)?;
            file.write_all(&json)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();

        if let Err(source) = write_result {
            // Best-effort cleanup of the orphaned temp file.
            let _ = fs::remove_file(&tmp);
            return Err(OrchestratorError::Persistence { path: self.path.clone(), source });
        }

        Ok(())
    }
}
