// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retention/cleanup (spec §4.8).

use std::time::{SystemTime, UNIX_EPOCH};

use bya_core::{JobDefinition, ModelError, RetentionUnit, Settings};
use bya_storage::Build;

const SECS_PER_DAY: u64 = 86_400;

/// Delete builds outside a job's retention policy. The most recent build
/// is always retained regardless of its status; only terminal builds
/// (`completion_time != 0`) among the rest are candidates (spec §4.8, S6).
/// Returns the numbers of builds deleted.
pub fn clean_builds(settings: &Settings, flat_job_name: &str, job: &JobDefinition) -> Result<Vec<u64>, ModelError> {
    let Some(retention) = &job.retention else { return Ok(Vec::new()) };
    let builds = Build::list(settings, flat_job_name)?; // reverse-chronological
    let mut deleted = Vec::new();
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    let mut retained_terminal = 0u64;

    for (i, build) in builds.iter().enumerate() {
        if i == 0 {
            continue; // most recent build is always retained
        }
        let completion = build.completion_time();
        if completion == 0 {
            continue; // non-terminal builds are never deleted
        }
        let should_delete = match retention.unit {
            RetentionUnit::Builds => {
                retained_terminal += 1;
                retained_terminal > retention.value
            }
            RetentionUnit::Days => now.saturating_sub(completion) > retention.value * SECS_PER_DAY,
        };
        if should_delete {
            build.delete(settings)?;
            deleted.push(build.number());
        }
    }
    Ok(deleted)
}
