// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run persistence (spec §3, §4.3).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bya_core::{ModelError, RunStatus};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::propdir::PropDir;

/// On-disk shape of a Run's `props` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub container: String,
    pub host_tag: String,
    #[serde(default)]
    pub params: HashMap<String, Value>,
    pub api_key: String,
    #[serde(default = "default_status")]
    pub status: RunStatus,
}

fn default_status() -> RunStatus {
    RunStatus::Queued
}

pub struct Run {
    propdir: PropDir,
}

impl Run {
    pub fn runs_dir(build_dir: &Path) -> PathBuf {
        build_dir.join("runs")
    }

    /// Create a Run directory under `<build>/runs/<name>` (spec §4.2).
    /// Does not push onto the queue — the caller (bya-storage's build
    /// module) does that once all runs for a build have been created.
    pub fn create(
        build_dir: &Path,
        name: &str,
        container: &str,
        host_tag: &str,
        params: HashMap<String, Value>,
        api_key: &str,
    ) -> Result<Self, ModelError> {
        let runs_dir = Self::runs_dir(build_dir);
        if !runs_dir.exists() {
            std::fs::create_dir(&runs_dir)?;
        }
        let data = json!({
            "container": container,
            "host_tag": host_tag,
            "params": params,
            "api_key": api_key,
            "status": RunStatus::Queued,
        });
        let propdir = PropDir::create(runs_dir.join(name), &data)?;
        Ok(Self { propdir })
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { propdir: PropDir::new(path) }
    }

    pub fn name(&self) -> String {
        self.propdir
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        self.propdir.path()
    }

    pub fn record(&self) -> Result<RunRecord, ModelError> {
        match serde_json::from_value(self.propdir.load()?) {
            Ok(r) => Ok(r),
            Err(e) => Err(ModelError::internal(e.to_string())),
        }
    }

    /// Status read that never fails: any I/O or parse error becomes
    /// `RunStatus::Unknown`, logged and swallowed (spec §7: "the
    /// status-read path NEVER raises").
    pub fn status(&self) -> RunStatus {
        match self.record() {
            Ok(r) => r.status,
            Err(e) => {
                tracing::error!(error = %e, run = %self.name(), "unable to read run status");
                RunStatus::Unknown
            }
        }
    }

    /// Update the run's status, enforcing the `QUEUED -> RUNNING ->
    /// {PASSED, FAILED}` transition table (spec §4.3).
    pub fn set_status(&self, new_status: RunStatus) -> Result<(), ModelError> {
        let current = self.record()?.status;
        RunStatus::validate_transition(current, new_status)?;
        self.propdir.update(json!({"status": new_status}), |v| {
            serde_json::from_value::<RunRecord>(v.clone())?;
            Ok(())
        })?;
        Ok(())
    }

    pub fn append_log(&self, msg: &str) -> Result<(), ModelError> {
        self.propdir.append_line("console.log", msg)
    }

    pub fn read_log(&self) -> Result<String, ModelError> {
        self.propdir.read_to_string("console.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_defaults_to_queued() {
        let dir = tempdir().unwrap();
        let run = Run::create(dir.path(), "r1", "img", "tag", HashMap::new(), "key123").unwrap();
        assert_eq!(run.status(), RunStatus::Queued);
    }

    #[test]
    fn status_transitions_enforced() {
        let dir = tempdir().unwrap();
        let run = Run::create(dir.path(), "r1", "img", "tag", HashMap::new(), "key123").unwrap();
        run.set_status(RunStatus::Running).unwrap();
        run.set_status(RunStatus::Passed).unwrap();
        assert_eq!(run.status(), RunStatus::Passed);
        assert!(run.set_status(RunStatus::Running).is_err());
    }

    #[test]
    fn unreadable_status_falls_back_to_unknown() {
        let dir = tempdir().unwrap();
        let run = Run::create(dir.path(), "r1", "img", "tag", HashMap::new(), "key123").unwrap();
        std::fs::remove_file(run.path().join("props")).unwrap();
        assert_eq!(run.status(), RunStatus::Unknown);
    }

    #[test]
    fn append_log_accumulates() {
        let dir = tempdir().unwrap();
        let run = Run::create(dir.path(), "r1", "img", "tag", HashMap::new(), "key123").unwrap();
        run.append_log("line1\n").unwrap();
        run.append_log("line2\n").unwrap();
        assert_eq!(run.read_log().unwrap(), "line1\nline2\n");
    }
}
