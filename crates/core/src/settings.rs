// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process configuration, replacing `bya/settings.py`'s module-level
//! constants (and its exec-a-python-file override mechanism) with env
//! vars read once at startup — see SPEC_FULL.md §B.

use std::path::{Path, PathBuf};

/// Resolved configuration plus the on-disk layout derived from `data_dir`
/// (spec §6's on-disk layout table).
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub debug: bool,
    pub auto_enlist_hosts: bool,
    pub trigger_interval_secs: u64,
    pub server_name: String,
    pub email_notify_from: String,
}

impl Settings {
    /// Load from environment variables, falling back to the source's
    /// defaults (`bya/settings.py`).
    pub fn from_env() -> Self {
        let data_dir = std::env::var("BYA_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        let debug = std::env::var("DEBUG")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .map(|v| v != 0)
            .unwrap_or(false);
        let auto_enlist_hosts = std::env::var("BYA_AUTO_ENLIST_HOSTS")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .map(|v| v != 0)
            .unwrap_or(false);
        let trigger_interval_secs = std::env::var("BYA_TRIGGER_INTERVAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(120);
        let server_name =
            std::env::var("BYA_SERVER_NAME").unwrap_or_else(|_| "localhost".to_string());
        let email_notify_from = format!("bya@{server_name}");

        Self { data_dir, debug, auto_enlist_hosts, trigger_interval_secs, server_name, email_notify_from }
    }

    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Self::defaults() }
    }

    fn defaults() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            debug: false,
            auto_enlist_hosts: false,
            trigger_interval_secs: 120,
            server_name: "localhost".to_string(),
            email_notify_from: "bya@localhost".to_string(),
        }
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.data_dir.join("job-defs")
    }

    pub fn builds_dir(&self) -> PathBuf {
        self.data_dir.join("builds")
    }

    pub fn queue_dir(&self) -> PathBuf {
        self.data_dir.join("run-queue")
    }

    pub fn running_dir(&self) -> PathBuf {
        self.data_dir.join("active-runs")
    }

    pub fn hosts_dir(&self) -> PathBuf {
        self.data_dir.join("hosts")
    }

    pub fn triggers_dir(&self) -> PathBuf {
        self.data_dir.join("triggers")
    }

    pub fn secrets_file(&self) -> PathBuf {
        self.data_dir.join("secrets.yml")
    }

    /// Build directory for a flattened job name.
    pub fn job_builds_dir(&self, flat_job_name: &str) -> PathBuf {
        self.builds_dir().join(flat_job_name)
    }

    /// Create the data-root directory tree if it doesn't exist yet.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            self.jobs_dir(),
            self.builds_dir(),
            self.queue_dir(),
            self.running_dir(),
            self.hosts_dir(),
            self.triggers_dir(),
        ] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

/// Path of the canonical runner script, used as `worker_version` (spec §4.5/§9).
pub fn runner_script_path(data_dir: &Path) -> PathBuf {
    data_dir.join("bya_runner.py")
}
