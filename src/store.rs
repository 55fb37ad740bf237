#![forbid(unsafe_code)]

//! Named JSON blobs under the data root.
//!
//! Every save goes through a temporary file in the destination directory that
//! is renamed over the old blob, so an interrupted write leaves the previous
//! version intact.

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::StoreError;

/// Load/save surface for named blobs. A missing blob loads as `None`.
pub trait BlobStore {
    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StoreError>;
    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError>;
}

impl<S: BlobStore + ?Sized> BlobStore for &S {
    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StoreError> {
        (**self).load(name)
    }

    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        (**self).save(name, value)
    }
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<root>/<name>.json`. Names are relative, `/`-separated, and may not
    /// climb out of the root.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        let invalid = || StoreError::InvalidName(name.to_owned());
        if name.is_empty() || name.split('/').any(|segment| segment.trim().is_empty()) {
            return Err(invalid());
        }
        let relative = Path::new(name);
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(invalid());
        }
        Ok(self.root.join(format!("{name}.json")))
    }
}

impl BlobStore for JsonFileStore {
    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StoreError> {
        let path = self.path_for(name)?;
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| StoreError::Parse { path, source })
    }

    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        let payload = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serialize {
            name: name.to_owned(),
            source,
        })?;
        let dir = path.parent().unwrap_or(self.root.as_path());

        let written = match write_atomic(dir, &path, &payload) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(dir = %dir.display(), "creating missing data directory");
                fs::create_dir_all(dir).map_err(|source| StoreError::Write {
                    path: dir.to_path_buf(),
                    source,
                })?;
                write_atomic(dir, &path, &payload)
            }
            other => other,
        };
        written.map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), bytes = payload.len(), "blob saved");
        Ok(())
    }
}

fn write_atomic(dir: &Path, path: &Path, payload: &[u8]) -> io::Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(payload)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
