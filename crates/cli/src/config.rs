// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-side install state: the server URL, version string, and host
//! identity saved by `register` (replaces `bya_worker.py`'s
//! `settings.conf`/`hostprops.cache` pair with one JSON file).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub server_url: String,
    pub version: String,
    pub host_name: String,
    pub host_api_key: String,
    #[serde(default = "default_concurrent_runs")]
    pub concurrent_runs: u32,
    /// Last `worker_version` (canonical worker script mtime) seen from the
    /// server, used to detect when a self-upgrade is due. `None` until the
    /// first successful check-in.
    #[serde(default)]
    pub worker_script_version: Option<u64>,
}

fn default_concurrent_runs() -> u32 {
    1
}

fn default_path() -> PathBuf {
    std::env::var("BYA_WORKER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/bya/worker.json"))
}

impl WorkerConfig {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&default_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("not registered (reading {}): {e}", path.display()))?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&default_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn path() -> PathBuf {
        default_path()
    }
}
