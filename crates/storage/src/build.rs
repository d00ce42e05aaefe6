// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build numbering, run fan-out, and status aggregation (spec §4.2, §4.3).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bya_core::{generate_api_key, JobDefinition, ModelError, RunStatus, Settings};
use chrono::Utc;
use serde_json::Value;

use crate::queue::RunQueue;
use crate::run::Run;

const MAX_CREATE_ATTEMPTS: u64 = 10;

/// Aggregated status of a Build (spec §4.3). `Queued` covers both "no runs
/// yet" and "all runs still QUEUED".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Queued,
    Running,
    RunningWithFailures,
    Completed,
    CompletedWithFailures,
}

impl BuildStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildStatus::Completed | BuildStatus::CompletedWithFailures)
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "QUEUED" => Some(Self::Queued),
            "RUNNING" => Some(Self::Running),
            "Running with Failure(s)" => Some(Self::RunningWithFailures),
            "Completed" => Some(Self::Completed),
            "Completed with Failure(s)" => Some(Self::CompletedWithFailures),
            _ => None,
        }
    }
}

bya_core::simple_display! {
    BuildStatus {
        Queued => "QUEUED",
        Running => "RUNNING",
        RunningWithFailures => "Running with Failure(s)",
        Completed => "Completed",
        CompletedWithFailures => "Completed with Failure(s)",
    }
}

/// Append a line to a build directory's `summary.log` (spec §4.3's
/// append-only audit trail). Takes a bare directory so callers that only
/// know a Run's path (e.g. the dispatch queue) don't need a `Build` handle.
pub fn append_summary(build_dir: &Path, msg: &str) -> Result<(), ModelError> {
    let mut f = std::fs::OpenOptions::new().create(true).append(true).open(build_dir.join("summary.log"))?;
    use std::io::Write;
    writeln!(f, "{} UTC: {msg}", Utc::now().format("%Y-%m-%d %H:%M:%S"))?;
    Ok(())
}

pub struct Build {
    dir: PathBuf,
    number: u64,
}

impl Build {
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn status_path(&self) -> PathBuf {
        self.dir.join("status")
    }

    fn summary_path(&self) -> PathBuf {
        self.dir.join("summary.log")
    }

    fn trigger_data_path(&self) -> PathBuf {
        self.dir.join("trigger_data")
    }

    pub fn open(dir: impl Into<PathBuf>, number: u64) -> Self {
        Self { dir: dir.into(), number }
    }

    pub fn job_builds_dir(settings: &Settings, flat_job_name: &str) -> PathBuf {
        settings.job_builds_dir(flat_job_name)
    }

    /// Reconstruct a `Build` handle plus its flattened job name from a
    /// Run's path (`<builds_dir>/<flat_name>/<number>/runs/<run>`). Used by
    /// the check-in and status-update handlers, which only have a Run in
    /// hand after a dispatch.
    pub fn locate(run_path: &Path) -> Result<(Build, String), ModelError> {
        let build_dir = run_path
            .parent()
            .and_then(Path::parent)
            .ok_or_else(|| ModelError::internal("run path has no enclosing build"))?;
        let number: u64 = build_dir
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| ModelError::internal("build directory name is not a number"))?;
        let flat_name = build_dir
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .ok_or_else(|| ModelError::internal("build path has no flattened job name"))?
            .to_string();
        Ok((Build::open(build_dir, number), flat_name))
    }

    /// Find the highest-numbered build for a job, if any (spec §3: dense,
    /// 1-based numbering).
    pub fn last(settings: &Settings, flat_job_name: &str) -> Result<Option<Build>, ModelError> {
        let path = Self::job_builds_dir(settings, flat_job_name);
        if !path.exists() {
            return Ok(None);
        }
        let mut numbers = Vec::new();
        for entry in std::fs::read_dir(&path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Ok(n) = entry.file_name().to_string_lossy().parse::<u64>() {
                    numbers.push(n);
                }
            }
        }
        Ok(numbers.into_iter().max().map(|n| Build::open(path.join(n.to_string()), n)))
    }

    pub fn list(settings: &Settings, flat_job_name: &str) -> Result<Vec<Build>, ModelError> {
        let path = Self::job_builds_dir(settings, flat_job_name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut builds = Vec::new();
        for entry in std::fs::read_dir(&path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Ok(n) = entry.file_name().to_string_lossy().parse::<u64>() {
                    builds.push(Build::open(entry.path(), n));
                }
            }
        }
        builds.sort_by(|a, b| b.number.cmp(&a.number)); // reverse-chronological
        Ok(builds)
    }

    /// Create a new Build with the next dense build number, fan out its
    /// Runs, and push each onto the dispatch queue (spec §4.2).
    pub fn create(
        settings: &Settings,
        job: &JobDefinition,
        flat_job_name: &str,
        runs: Vec<bya_core::model::RunSpec>,
        trigger_data: Value,
    ) -> Result<Build, ModelError> {
        let runs = job.validate_runs(runs)?;
        let builds_dir = Self::job_builds_dir(settings, flat_job_name);
        std::fs::create_dir_all(&builds_dir)?;

        let start = Self::last(settings, flat_job_name)?.map(|b| b.number).unwrap_or(0);
        for candidate in (start + 1)..(start + 1 + MAX_CREATE_ATTEMPTS) {
            let path = builds_dir.join(candidate.to_string());
            match std::fs::create_dir(&path) {
                Ok(()) => {
                    let build = Build::open(path, candidate);
                    build.append_summary("Build queued")?;
                    build.write_trigger_data(&trigger_data)?;
                    let queue = RunQueue::new(settings);
                    for spec in &runs {
                        let host_tag = job.host_tag_for(&spec.container)?;
                        let params: HashMap<String, Value> = spec.params.clone();
                        let api_key = generate_api_key();
                        let run = Run::create(
                            build.dir(),
                            &spec.name,
                            &spec.container,
                            &host_tag,
                            params,
                            &api_key,
                        )?;
                        queue.push(&run, &host_tag)?;
                    }
                    return Ok(build);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ModelError::internal(format!(
            "Unable to find next build number for {flat_job_name} after {MAX_CREATE_ATTEMPTS} attempts"
        )))
    }

    pub fn append_summary(&self, msg: &str) -> Result<(), ModelError> {
        append_summary(&self.dir, msg)
    }

    pub fn read_summary(&self) -> Result<String, ModelError> {
        Ok(std::fs::read_to_string(self.summary_path()).unwrap_or_default())
    }

    fn write_trigger_data(&self, data: &Value) -> Result<(), ModelError> {
        crate::propdir::write_atomic(&self.trigger_data_path(), data)
    }

    pub fn trigger_data(&self) -> Result<Value, ModelError> {
        let raw = std::fs::read_to_string(self.trigger_data_path()).unwrap_or_else(|_| "{}".into());
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn list_runs(&self) -> Result<Vec<Run>, ModelError> {
        let runs_dir = self.dir.join("runs");
        if !runs_dir.exists() {
            return Ok(Vec::new());
        }
        let mut runs = Vec::new();
        for entry in std::fs::read_dir(&runs_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                runs.push(Run::open(entry.path()));
            }
        }
        Ok(runs)
    }

    /// Aggregate Run statuses into a Build status (spec §4.3's
    /// read-on-demand, memoized-to-`status`-file rule). Returns the status
    /// plus whether this call is the one that just wrote the terminal
    /// status file (i.e. whether notifications should fire) — the engine
    /// crate decides what to do with that, keeping storage I/O-only.
    pub fn status(&self) -> Result<(BuildStatus, bool), ModelError> {
        if let Ok(existing) = std::fs::read_to_string(self.status_path()) {
            let status = BuildStatus::parse(existing.trim())
                .ok_or_else(|| ModelError::internal("unreadable build status file"))?;
            return Ok((status, false));
        }

        let runs = self.list_runs()?;
        let statuses: Vec<RunStatus> = runs.iter().map(|r| r.status()).collect();

        let has = |s: RunStatus| statuses.contains(&s);
        let status = if has(RunStatus::Running) && has(RunStatus::Failed) {
            BuildStatus::RunningWithFailures
        } else if has(RunStatus::Running) {
            BuildStatus::Running
        } else if !statuses.is_empty()
            && statuses.iter().all(|s| matches!(s, RunStatus::Passed | RunStatus::Failed))
        {
            let final_status =
                if has(RunStatus::Failed) { BuildStatus::CompletedWithFailures } else { BuildStatus::Completed };
            crate::propdir::write_atomic(&self.status_path(), &Value::String(final_status.to_string()))?;
            return Ok((final_status, true));
        } else {
            BuildStatus::Queued
        };
        Ok((status, false))
    }

    /// mtime of the `status` file, or 0 if not yet terminal (spec §4.3).
    pub fn completion_time(&self) -> u64 {
        std::fs::metadata(self.status_path())
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// Move the build directory aside then recursively remove it, so
    /// deletion is observationally atomic (spec §4.3).
    pub fn delete(&self, settings: &Settings) -> Result<(), ModelError> {
        let trash = settings.data_dir.join(format!(
            ".trash-{}-{}",
            std::process::id(),
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos()
        ));
        std::fs::rename(&self.dir, &trash)?;
        std::fs::remove_dir_all(&trash)?;
        Ok(())
    }
}
