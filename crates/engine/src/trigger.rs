// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The trigger poller (spec §4.7): per-job-def checkers comparing remote
//! reference state to a cache and creating builds on change.

use std::collections::HashMap;

use bya_core::{JobDefinition, ModelError, Settings, TriggerSpec};
use bya_storage::{Build, DiscoveredJob, TriggerCache};
use serde_json::json;

/// Polls a single git-backed HTTP remote's `info/refs` advertisement
/// (spec §4.7 steps 1-3).
pub struct GitChecker<'a> {
    pub client: &'a reqwest::Client,
}

impl<'a> GitChecker<'a> {
    /// Fetch and parse the advertised refs. A non-200 response is treated
    /// as "unchanged" (logged, empty result) rather than an error — a
    /// flaky remote must not stall the poll loop for every other job.
    pub async fn fetch_refs(&self, http_url: &str) -> Result<Vec<(String, String)>, ModelError> {
        let url = format!("{}/info/refs?service=git-upload-pack", http_url.trim_end_matches('/'));
        let resp = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(%url, error = %e, "git trigger request failed");
                return Ok(Vec::new());
            }
        };
        if !resp.status().is_success() {
            tracing::warn!(%url, status = %resp.status(), "git trigger check returned non-200");
            return Ok(Vec::new());
        }
        let body = resp.text().await.map_err(|e| ModelError::internal(e.to_string()))?;
        Ok(parse_refs(&body))
    }
}

/// Skip the first two lines (service announcement + flush), then read
/// `<sha> <ref>` pairs until a literal `0000` flush-pkt line (spec §4.7
/// step 3): split each line on the first space, dropping any trailing
/// NUL-separated capability list from the ref.
fn parse_refs(body: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for line in body.lines().skip(2) {
        let line = line.trim();
        if line == "0000" {
            break;
        }
        let Some((sha, rest)) = line.split_once(' ') else { continue };
        let reference = rest.split('\0').next().unwrap_or(rest).trim();
        if !sha.is_empty() && !reference.is_empty() {
            out.push((sha.to_string(), reference.to_string()));
        }
    }
    out
}

/// Iterates every job definition with declared triggers once per call
/// (spec §4.7); the daemon drives this on a `tokio::time::interval` loop.
pub struct TriggerManager<'a> {
    settings: &'a Settings,
    client: reqwest::Client,
}

impl<'a> TriggerManager<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings, client: reqwest::Client::new() }
    }

    /// Check every triggered job definition once. Returns the number of
    /// builds created.
    pub async fn run_once(&self) -> Result<usize, ModelError> {
        let mut created = 0;
        for discovered in bya_storage::jobstore::list_all(self.settings)? {
            for trig in &discovered.job.triggers {
                if self.check_trigger(&discovered, trig).await? {
                    created += 1;
                }
            }
        }
        Ok(created)
    }

    async fn check_trigger(&self, discovered: &DiscoveredJob, trig: &TriggerSpec) -> Result<bool, ModelError> {
        // validate() already rejects anything but "git"; defensive here too.
        if trig.kind != "git" {
            return Ok(false);
        }
        let http_url = trig.http_url.as_deref().unwrap_or_default();
        let observed = GitChecker { client: &self.client }.fetch_refs(http_url).await?;
        let observed: HashMap<&str, &str> =
            observed.iter().map(|(sha, r)| (r.as_str(), sha.as_str())).collect();

        let cache = TriggerCache::for_job(self.settings, &discovered.flat_name);
        let mut cached = cache.load()?;
        let mut changed: Option<(String, String, String)> = None;

        for wanted_ref in &trig.refs {
            let Some(&sha) = observed.get(wanted_ref.as_str()) else { continue };
            let previous = cached.get(wanted_ref).cloned().unwrap_or_default();
            if changed.is_none() && previous != sha {
                changed = Some((wanted_ref.clone(), previous, sha.to_string()));
            }
            cached.insert(wanted_ref.clone(), sha.to_string());
        }
        cache.store(&cached)?;

        let Some((git_ref, old_sha, new_sha)) = changed else { return Ok(false) };
        let trigger_data = json!({
            "BYA_TRIGGER": "git",
            "GIT_REF": git_ref,
            "GIT_OLD_SHA": old_sha,
            "GIT_SHA": new_sha,
        });
        let build =
            Build::create(self.settings, &discovered.job, &discovered.flat_name, trig.runs.clone(), trigger_data)?;
        build.append_summary(&format!("Triggered by git ref change: {git_ref} -> {new_sha}"))?;
        Ok(true)
    }

    /// Poll forever on a fixed interval (spec §4.7, §6 `TRIGGER_INTERVAL`).
    /// Intended to run as a background `tokio` task from the daemon's
    /// startup path.
    pub async fn run_forever(&self) -> ! {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(self.settings.trigger_interval_secs));
        loop {
            interval.tick().await;
            if let Err(e) = self.run_once().await {
                tracing::error!(error = %e, "trigger poll failed");
            }
        }
    }
}
