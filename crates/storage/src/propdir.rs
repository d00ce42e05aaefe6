// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lazy, mtime-checked JSON-backed "property directory" (spec §4.1).
//!
//! A property directory is a plain directory containing a `props` JSON
//! file plus whatever other artifacts the entity needs (a log file, for
//! Host/Run). `create` fails if the directory already exists — letting the
//! concurrent creator lose the create-if-missing race, per spec §4.1.
//! `update` is read-modify-write via temp-file-plus-rename.
//!
//! Unlike the source's never-reload-until-process-restart lazy load, this
//! checks `props`'s mtime on every read and reloads if it's newer than the
//! cached copy (spec §9: "An implementation may load eagerly if it
//! guarantees re-read on external mutation").

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bya_core::ModelError;
use parking_lot::Mutex;
use serde_json::Value;

const PROPS_FILE: &str = "props";

pub struct PropDir {
    path: PathBuf,
    cache: Mutex<Option<(SystemTime, Value)>>,
}

impl PropDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), cache: Mutex::new(None) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn props_path(&self) -> PathBuf {
        self.path.join(PROPS_FILE)
    }

    /// Create the directory and write its initial `props` file. Errors if
    /// the directory already exists (spec §4.1's create-if-missing race).
    pub fn create(path: impl Into<PathBuf>, data: &Value) -> Result<Self, ModelError> {
        let path = path.into();
        fs::create_dir(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                ModelError::conflict(format!("{} already exists", path.display()))
            } else {
                ModelError::from(e)
            }
        })?;
        write_atomic(&path.join(PROPS_FILE), data)?;
        Ok(Self { path, cache: Mutex::new(None) })
    }

    /// Read-through load, reloading if `props`'s mtime has advanced past
    /// the cached copy.
    pub fn load(&self) -> Result<Value, ModelError> {
        let meta = fs::metadata(self.props_path())?;
        let mtime = meta.modified()?;
        let mut cache = self.cache.lock();
        if let Some((cached_mtime, value)) = cache.as_ref() {
            if *cached_mtime >= mtime {
                return Ok(value.clone());
            }
        }
        let raw = fs::read_to_string(self.props_path())?;
        let value: Value = serde_json::from_str(&raw)?;
        *cache = Some((mtime, value.clone()));
        Ok(value)
    }

    /// Read-modify-write: load, merge `overrides` on top, let `validate`
    /// check the merged map, then atomically replace `props` (spec §4.1).
    pub fn update(
        &self,
        overrides: Value,
        validate: impl FnOnce(&Value) -> Result<(), ModelError>,
    ) -> Result<Value, ModelError> {
        let mut merged = self.load()?;
        bya_core::props::merge_json(&mut merged, overrides);
        validate(&merged)?;
        write_atomic(&self.props_path(), &merged)?;
        *self.cache.lock() = None;
        Ok(merged)
    }

    /// Open (creating if needed) a sibling file for appending, e.g. `console.log`.
    pub fn open_log_append(&self, name: &str) -> Result<fs::File, ModelError> {
        Ok(fs::OpenOptions::new().create(true).append(true).open(self.path.join(name))?)
    }

    pub fn read_to_string(&self, name: &str) -> Result<String, ModelError> {
        Ok(fs::read_to_string(self.path.join(name))?)
    }

    pub fn append_line(&self, name: &str, line: &str) -> Result<(), ModelError> {
        let mut f = self.open_log_append(name)?;
        f.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Write `data` to `path` by writing a temp file in the same directory
/// then renaming over it — the "write-to-temp + rename" atomicity the
/// spec calls for throughout §4.1/§4.2/§4.3.
pub fn write_atomic(path: &Path, data: &Value) -> Result<(), ModelError> {
    let dir = path.parent().ok_or_else(|| ModelError::internal("path has no parent"))?;
    let tmp = dir.join(format!(".{}.tmp-{}", file_name(path), std::process::id()));
    {
        let mut f = fs::File::create(&tmp)?;
        serde_json::to_writer(&mut f, data)?;
        f.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn create_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("thing");
        let pd = PropDir::create(&path, &json!({"a": 1})).unwrap();
        assert_eq!(pd.load().unwrap(), json!({"a": 1}));
    }

    #[test]
    fn create_fails_if_dir_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("thing");
        PropDir::create(&path, &json!({"a": 1})).unwrap();
        let err = PropDir::create(&path, &json!({"a": 2})).unwrap_err();
        assert_eq!(err.status_code, 409);
    }

    #[test]
    fn update_merges_and_validates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("thing");
        let pd = PropDir::create(&path, &json!({"a": 1, "b": 2})).unwrap();
        pd.update(json!({"b": 3}), |_| Ok(())).unwrap();
        assert_eq!(pd.load().unwrap(), json!({"a": 1, "b": 3}));

        let err = pd.update(json!({"b": "bogus"}), |v| {
            if v["b"] == json!("bogus") {
                Err(ModelError::validation("nope"))
            } else {
                Ok(())
            }
        });
        assert!(err.is_err());
        // rejected update must not have been persisted
        assert_eq!(pd.load().unwrap()["b"], json!(3));
    }

    #[test]
    fn append_line_is_append_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("thing");
        let pd = PropDir::create(&path, &json!({})).unwrap();
        pd.append_line("console.log", "one\n").unwrap();
        pd.append_line("console.log", "two\n").unwrap();
        assert_eq!(pd.read_to_string("console.log").unwrap(), "one\ntwo\n");
    }
}
