// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner descriptor assembly (spec §4.6): the server-side, unpersisted
//! execution recipe handed to a worker in its check-in response.

use std::collections::HashMap;
use std::path::Path;
use std::time::UNIX_EPOCH;

use bya_core::{runner_script_path, JobDefinition, ModelError, Settings};
use bya_storage::RunRecord;
use serde_json::Value;

pub struct RunnerDescriptor {
    pub stdin: String,
    pub args: Vec<String>,
    pub runner: String,
    pub secrets: HashMap<String, String>,
}

/// Assemble the descriptor for a claimed run (spec §4.6). `trigger_data` is
/// the enclosing build's trigger-supplied param map, merged under the
/// run's own declared params for `--env`.
pub fn assemble_runner(
    settings: &Settings,
    job: &JobDefinition,
    flat_job_name: &str,
    build_num: u64,
    run_name: &str,
    run: &RunRecord,
    trigger_data: &Value,
) -> Result<RunnerDescriptor, ModelError> {
    let mut args = vec![
        "--api_key".to_string(),
        run.api_key.clone(),
        "--run".to_string(),
        run_name.to_string(),
        "--build_name".to_string(),
        flat_job_name.to_string(),
        "--build_num".to_string(),
        build_num.to_string(),
        "--timeout".to_string(),
        job.timeout.to_string(),
        "--container".to_string(),
        run.container.clone(),
    ];

    let mut env = run.params.clone();
    if let Some(obj) = trigger_data.as_object() {
        for (k, v) in obj {
            env.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
    let mut env_keys: Vec<&String> = env.keys().collect();
    env_keys.sort();
    for key in env_keys {
        let value = env[key].as_str().map(str::to_string).unwrap_or_else(|| env[key].to_string());
        args.push("--env".to_string());
        args.push(format!("{key}={value}"));
    }

    let runner = std::fs::read_to_string(runner_script_path(&settings.data_dir)).unwrap_or_default();
    let secrets = load_secrets(settings, &job.secrets)?;

    Ok(RunnerDescriptor { stdin: job.script.clone(), args, runner, secrets })
}

/// Mtime (unix seconds) of the canonical runner script, used as
/// `worker_version` in the host check-in response (spec §4.5 step 4). Read
/// fresh on every call per the source's behavior — see DESIGN.md's open
/// question decision on caching.
pub fn worker_version(data_dir: &Path) -> u64 {
    std::fs::metadata(runner_script_path(data_dir))
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Resolve job-declared secret names against the global secrets map.
/// Absent names resolve to `""` (spec §4.6).
fn load_secrets(settings: &Settings, names: &[String]) -> Result<HashMap<String, String>, ModelError> {
    let map: HashMap<String, String> = if settings.secrets_file().exists() {
        let raw = std::fs::read_to_string(settings.secrets_file())?;
        serde_yaml::from_str(&raw).map_err(|e| ModelError::internal(e.to_string()))?
    } else {
        HashMap::new()
    };
    Ok(names.iter().map(|n| (n.clone(), map.get(n).cloned().unwrap_or_default())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bya_core::model::ContainerSpec;
    use serde_json::json;
    use tempfile::tempdir;

    fn job() -> JobDefinition {
        JobDefinition {
            name: "demo".into(),
            description: "d".into(),
            timeout: 30,
            script: "echo hi".into(),
            secrets: vec!["token".into(), "missing".into()],
            retention: None,
            containers: vec![ContainerSpec { image: "img".into(), host_tag: None }],
            params: vec![],
            triggers: vec![],
            notify: vec![],
        }
    }

    fn run_record() -> RunRecord {
        let mut params = std::collections::HashMap::new();
        params.insert("K".to_string(), json!("V"));
        RunRecord {
            container: "img".into(),
            host_tag: "*".into(),
            params,
            api_key: "key123".into(),
            status: bya_core::RunStatus::Queued,
        }
    }

    #[test]
    fn assembles_args_and_resolves_secrets() {
        let dir = tempdir().unwrap();
        let settings = Settings::with_data_dir(dir.path());
        std::fs::create_dir_all(&settings.data_dir).unwrap();
        std::fs::write(settings.secrets_file(), "token: sekrit\n").unwrap();

        let descriptor =
            assemble_runner(&settings, &job(), "demo", 1, "r1", &run_record(), &json!({"GIT_SHA": "abc"}))
                .unwrap();

        assert_eq!(descriptor.stdin, "echo hi");
        assert!(descriptor.args.contains(&"--api_key".to_string()));
        assert!(descriptor.args.contains(&"key123".to_string()));
        assert!(descriptor.args.iter().any(|a| a == "K=V"));
        assert!(descriptor.args.iter().any(|a| a == "GIT_SHA=abc"));
        assert_eq!(descriptor.secrets.get("token").unwrap(), "sekrit");
        assert_eq!(descriptor.secrets.get("missing").unwrap(), "");
    }

    #[test]
    fn worker_version_reflects_runner_script_mtime() {
        let dir = tempdir().unwrap();
        let settings = Settings::with_data_dir(dir.path());
        std::fs::create_dir_all(&settings.data_dir).unwrap();
        assert_eq!(worker_version(&settings.data_dir), 0);
        std::fs::write(runner_script_path(&settings.data_dir), "#!/bin/sh\n").unwrap();
        assert!(worker_version(&settings.data_dir) > 0);
    }
}
