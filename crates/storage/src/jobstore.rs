// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job group tree: recursive discovery of `JobDefinition` YAML files under
//! `jobs_dir()` (spec §3 JobGroup), plus the git-trigger ref cache (spec
//! §4.7, SPEC_FULL.md §C.1/§D.6).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bya_core::{flat_job_name, JobDefinition, ModelError, Settings};
use serde_json::Value;

const JOB_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// The subgroups and jobs directly inside one group directory
/// (SPEC_FULL.md §C.1: job-defs group listing).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobGroupListing {
    pub groups: Vec<String>,
    pub jobs: Vec<String>,
}

fn group_dir(settings: &Settings, group_path: &str) -> PathBuf {
    if group_path.is_empty() {
        settings.jobs_dir()
    } else {
        settings.jobs_dir().join(group_path)
    }
}

fn job_file_path(settings: &Settings, group_path: &str, job_name: &str) -> Option<PathBuf> {
    let dir = group_dir(settings, group_path);
    JOB_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{job_name}.{ext}")))
        .find(|p| p.is_file())
}

/// Load and validate a single job definition by group path + name.
pub fn find(settings: &Settings, group_path: &str, job_name: &str) -> Result<JobDefinition, ModelError> {
    let path = job_file_path(settings, group_path, job_name).ok_or_else(|| {
        ModelError::not_found(format!("JobDefinition({group_path}/{job_name}) does not exist"))
    })?;
    load_file(&path)
}

/// Reconstruct a job definition's group path + name from its flattened
/// build-directory name (the inverse of [`flat_job_name`]) and load it.
/// `#` cannot appear in a job or group-path component (spec §3's name
/// invariant), so the split is unambiguous.
pub fn find_by_flat_name(settings: &Settings, flat_name: &str) -> Result<JobDefinition, ModelError> {
    let mut parts: Vec<&str> = flat_name.split('#').collect();
    let job_name = parts.pop().ok_or_else(|| ModelError::not_found(format!("JobDefinition({flat_name})")))?;
    let group_path = parts.join("/");
    find(settings, &group_path, job_name)
}

fn load_file(path: &Path) -> Result<JobDefinition, ModelError> {
    let raw = std::fs::read_to_string(path)?;
    let job: JobDefinition =
        serde_yaml::from_str(&raw).map_err(|e| ModelError::validation(format!("{}: {e}", path.display())))?;
    job.validate()?;
    Ok(job)
}

/// List the immediate subgroups and jobs of one group (spec-supplemented
/// feature, mirrors the admin UI's directory listing).
pub fn list_group(settings: &Settings, group_path: &str) -> Result<JobGroupListing, ModelError> {
    let dir = group_dir(settings, group_path);
    if !dir.exists() {
        return Err(ModelError::not_found(format!("JobGroup({group_path}) does not exist")));
    }
    let mut listing = JobGroupListing::default();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            if name == ".git" {
                continue;
            }
            listing.groups.push(name);
        } else if let Some(stem) = strip_job_extension(&name) {
            listing.jobs.push(stem.to_string());
        }
    }
    listing.groups.sort();
    listing.jobs.sort();
    Ok(listing)
}

fn strip_job_extension(file_name: &str) -> Option<&str> {
    JOB_EXTENSIONS.iter().find_map(|ext| file_name.strip_suffix(&format!(".{ext}")))
}

/// One discovered job definition: its group path, name, flattened build-dir
/// name, and parsed body.
pub struct DiscoveredJob {
    pub group_path: String,
    pub name: String,
    pub flat_name: String,
    pub job: JobDefinition,
}

/// Recursively walk every job definition under `jobs_dir()`, skipping
/// `.git`. Used by the trigger engine's poll loop (spec §4.7) and the admin
/// CLI's job listing (SPEC_FULL.md §C.2).
pub fn list_all(settings: &Settings) -> Result<Vec<DiscoveredJob>, ModelError> {
    let mut out = Vec::new();
    walk(settings, "", &mut out)?;
    Ok(out)
}

fn walk(settings: &Settings, group_path: &str, out: &mut Vec<DiscoveredJob>) -> Result<(), ModelError> {
    let dir = group_dir(settings, group_path);
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            if name == ".git" {
                continue;
            }
            let child_group = if group_path.is_empty() { name.clone() } else { format!("{group_path}/{name}") };
            walk(settings, &child_group, out)?;
        } else if let Some(stem) = strip_job_extension(&name) {
            let job = load_file(&entry.path())?;
            out.push(DiscoveredJob {
                group_path: group_path.to_string(),
                name: stem.to_string(),
                flat_name: flat_job_name(group_path, stem),
                job,
            });
        }
    }
    Ok(())
}

/// Per-job cache of the last-seen commit sha per watched ref (spec §4.7
/// step 2: "skip polling unless the cached sha differs").
pub struct TriggerCache {
    path: PathBuf,
}

impl TriggerCache {
    pub fn for_job(settings: &Settings, flat_job_name: &str) -> Self {
        Self { path: settings.triggers_dir().join(format!("{flat_job_name}.json")) }
    }

    pub fn load(&self) -> Result<HashMap<String, String>, ModelError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn store(&self, refs: &HashMap<String, String>) -> Result<(), ModelError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let value: Value = serde_json::to_value(refs)?;
        crate::propdir::write_atomic(&self.path, &value)
    }
}
