// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host persistence (spec §3, §4.5).

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bya_core::{HostProps, ModelError, Settings};
use serde_json::{json, Value};

use crate::propdir::PropDir;

/// 180-second liveness window (spec §3).
pub const ONLINE_WINDOW_SECS: u64 = 180;

pub struct Host {
    propdir: PropDir,
}

impl Host {
    fn path_for(settings: &Settings, name: &str) -> PathBuf {
        settings.hosts_dir().join(name)
    }

    pub fn create(settings: &Settings, name: &str, mut data: Value) -> Result<Self, ModelError> {
        data["enlisted"] = json!(settings.auto_enlist_hosts);
        let props: HostProps = serde_json::from_value(data.clone())?;
        props.validate()?;
        let propdir = PropDir::create(Self::path_for(settings, name), &data)?;
        Ok(Self { propdir })
    }

    pub fn get(settings: &Settings, name: &str) -> Result<Self, ModelError> {
        let path = Self::path_for(settings, name);
        if !path.exists() {
            return Err(ModelError::not_found(format!("Host({name}) does not exist")));
        }
        Ok(Self { propdir: PropDir::new(path) })
    }

    pub fn exists(settings: &Settings, name: &str) -> bool {
        Self::path_for(settings, name).exists()
    }

    pub fn list(settings: &Settings) -> Result<Vec<String>, ModelError> {
        let dir = settings.hosts_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn name(&self) -> String {
        self.propdir
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn props(&self) -> Result<HostProps, ModelError> {
        Ok(serde_json::from_value(self.propdir.load()?)?)
    }

    /// Update host properties. Callers enforce the "`enlisted` is
    /// API-protected" rule (spec §4.5/§7 Forbidden) before calling this.
    pub fn update(&self, overrides: Value) -> Result<HostProps, ModelError> {
        let merged = self.propdir.update(overrides, |v| {
            serde_json::from_value::<HostProps>(v.clone())?.validate()
        })?;
        Ok(serde_json::from_value(merged)?)
    }

    pub fn delete(&self) -> Result<(), ModelError> {
        Ok(std::fs::remove_dir_all(self.propdir.path())?)
    }

    /// Append a liveness heartbeat (spec §4.5 step 2).
    pub fn ping(&self) -> Result<(), ModelError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        self.propdir.append_line("pings.log", &format!("{now}\n"))
    }

    /// A Host is online iff `pings.log`'s mtime is within the liveness
    /// window of "now" (spec §3).
    pub fn online(&self) -> bool {
        let Ok(meta) = std::fs::metadata(self.pings_log_path()) else { return false };
        let Ok(mtime) = meta.modified() else { return false };
        let Ok(age) = SystemTime::now().duration_since(mtime) else { return false };
        age.as_secs() < ONLINE_WINDOW_SECS
    }

    fn pings_log_path(&self) -> PathBuf {
        self.propdir.path().join("pings.log")
    }

    pub fn path(&self) -> &Path {
        self.propdir.path()
    }
}
