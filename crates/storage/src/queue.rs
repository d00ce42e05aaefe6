// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tagged dispatch queue (spec §4.4): symlinks named `<host_tag>#<ts>`
//! in `QUEUE_DIR`, moved atomically into `RUNNING_DIR` on dispatch.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bya_core::{ModelError, RunStatus, Settings};

use crate::build;
use crate::run::Run;

pub struct RunQueue<'a> {
    settings: &'a Settings,
}

impl<'a> RunQueue<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Push a run onto the queue under `host_tag`, logging the advisory
    /// queue position (spec §4.4).
    pub fn push(&self, run: &Run, host_tag: &str) -> Result<(), ModelError> {
        let queue_dir = self.settings.queue_dir();
        std::fs::create_dir_all(&queue_dir)?;
        let qlen = std::fs::read_dir(&queue_dir)?.count();
        let name = format!("{host_tag}#{}", unix_timestamp_fractional());
        symlink(run.path(), queue_dir.join(&name))?;
        run.append_log(&format!("# Queued as: {name}. {qlen} Runs waiting in front\n"))?;
        Ok(())
    }

    /// Pop the oldest queued run matching one of `host_tags` (or `*`),
    /// atomically moving it into the running set. Returns `None` if
    /// nothing matches, or if another caller won the dispatch race on the
    /// chosen entry (spec §4.4 step 4).
    pub fn take(&self, host_name: &str, host_tags: &[&str]) -> Result<Option<Run>, ModelError> {
        let queue_dir = self.settings.queue_dir();
        if !queue_dir.exists() {
            return Ok(None);
        }
        let mut candidates: Vec<(String, f64)> = Vec::new();
        for entry in std::fs::read_dir(&queue_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some((tag, ts)) = name.split_once('#') else { continue };
            let Ok(ts) = ts.parse::<f64>() else { continue };
            if tag == "*" || host_tags.contains(&tag) {
                candidates.push((name, ts));
            }
        }
        // Oldest timestamp first; tie-break lexicographically (spec §4.4 step 3).
        candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));

        let Some((name, _)) = candidates.into_iter().next() else { return Ok(None) };

        let running_dir = self.settings.running_dir();
        std::fs::create_dir_all(&running_dir)?;
        let queued_path = queue_dir.join(&name);
        let target = std::fs::read_link(&queued_path)?;

        match std::fs::rename(&queued_path, running_dir.join(&name)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Another worker's `take` won this entry's dispatch race.
                tracing::debug!(entry = %name, "queue entry vanished before dispatch; another caller won");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let run = Run::open(target);
        run.append_log(&format!("# Dequeued to: {host_name}\n"))?;
        let _ = build::append_summary(&build_dir_of_run(run.path()), &format!("{} dequeued to {host_name}", run.name()));
        Ok(Some(run))
    }

    /// Mark a run's dispatch as complete, removing its `RUNNING_DIR`
    /// symlink (spec §4.4).
    pub fn complete(&self, run: &Run, status: RunStatus) -> Result<(), ModelError> {
        let running_dir = self.settings.running_dir();
        if running_dir.exists() {
            for entry in std::fs::read_dir(&running_dir)? {
                let entry = entry?;
                if let Ok(target) = std::fs::read_link(entry.path()) {
                    if target == run.path() {
                        std::fs::remove_file(entry.path())?;
                        break;
                    }
                }
            }
        }
        let _ = build::append_summary(
            &build_dir_of_run(run.path()),
            &format!("{} status={status}", run.name()),
        );
        Ok(())
    }

    pub fn list_queued(&self) -> Result<Vec<Run>, ModelError> {
        list_symlinked_runs(&self.settings.queue_dir())
    }

    pub fn list_running(&self) -> Result<Vec<Run>, ModelError> {
        list_symlinked_runs(&self.settings.running_dir())
    }
}

fn list_symlinked_runs(dir: &Path) -> Result<Vec<Run>, ModelError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut runs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if let Ok(target) = std::fs::read_link(entry.path()) {
            runs.push(Run::open(target));
        }
    }
    Ok(runs)
}

fn build_dir_of_run(run_path: &Path) -> PathBuf {
    // run_path = <build>/runs/<name>
    run_path.parent().and_then(Path::parent).map(Path::to_path_buf).unwrap_or_default()
}

fn unix_timestamp_fractional() -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

#[cfg(unix)]
fn symlink(original: &Path, link: PathBuf) -> std::io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}
