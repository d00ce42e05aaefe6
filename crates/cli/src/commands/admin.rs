// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Administrative subcommands (SPEC_FULL.md §C.2): job inspection,
//! one-shot trigger polling, and retention cleanup. Grounded in
//! `manage.py`'s `validate-jobdef`, `bya/triggers.py`'s poll loop, and
//! `bya/clean.py: clean_builds()`.

use std::collections::HashMap;

use clap::{Args, Subcommand};
use serde_json::Value;

use bya_core::model::RunSpec;
use bya_core::Settings;
use bya_storage::{jobstore, Build};

#[derive(Args)]
pub struct JobArgs {
    #[command(subcommand)]
    pub command: JobCommand,
}

#[derive(Subcommand)]
pub enum JobCommand {
    /// List the subgroups and jobs directly under a group path
    List {
        #[arg(default_value = "")]
        group_path: String,
    },
    /// Parse and validate one job definition by its flattened name
    Validate { flat_name: String },
    /// Queue a new build for a job with one run
    CreateBuild {
        flat_name: String,
        run_name: String,
        container: String,
        /// Repeatable `K=V` run parameters
        #[arg(long = "param")]
        params: Vec<String>,
    },
}

pub fn run(settings: &Settings, args: JobArgs) -> anyhow::Result<()> {
    match args.command {
        JobCommand::List { group_path } => {
            let listing = jobstore::list_group(settings, &group_path)?;
            for g in listing.groups {
                println!("{g}/");
            }
            for j in listing.jobs {
                println!("{j}");
            }
            Ok(())
        }
        JobCommand::Validate { flat_name } => {
            let job = jobstore::find_by_flat_name(settings, &flat_name)?;
            println!("OK: {} ({} containers)", job.name, job.containers.len());
            Ok(())
        }
        JobCommand::CreateBuild { flat_name, run_name, container, params } => {
            let job = jobstore::find_by_flat_name(settings, &flat_name)?;
            let mut parsed_params: HashMap<String, Value> = HashMap::new();
            for entry in params {
                let (k, v) = entry
                    .split_once('=')
                    .ok_or_else(|| anyhow::anyhow!("bad --param {entry:?}, expected K=V"))?;
                parsed_params.insert(k.to_string(), Value::String(v.to_string()));
            }
            let run = RunSpec { name: run_name, container, params: parsed_params };
            let build = Build::create(settings, &job, &flat_name, vec![run], Value::Null)?;
            println!("queued build {flat_name}/{}", build.number());
            Ok(())
        }
    }
}

#[derive(Args)]
pub struct TriggerArgs {
    #[command(subcommand)]
    pub command: TriggerCommand,
}

#[derive(Subcommand)]
pub enum TriggerCommand {
    /// Poll every job's git triggers once and queue any builds that fire
    RunOnce,
}

pub async fn run_trigger(settings: &Settings, args: TriggerArgs) -> anyhow::Result<()> {
    match args.command {
        TriggerCommand::RunOnce => {
            let manager = bya_engine::TriggerManager::new(settings);
            let fired = manager.run_once().await?;
            println!("{fired} build(s) queued from triggers");
            Ok(())
        }
    }
}

/// Delete builds past each job's retention policy (spec §4.8).
pub fn clean(settings: &Settings) -> anyhow::Result<()> {
    for discovered in jobstore::list_all(settings)? {
        let deleted = bya_engine::clean_builds(settings, &discovered.flat_name, &discovered.job)?;
        if !deleted.is_empty() {
            println!("{}: deleted builds {:?}", discovered.flat_name, deleted);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn settings(dir: &tempfile::TempDir) -> Settings {
        let s = Settings::with_data_dir(dir.path());
        s.ensure_dirs().unwrap();
        s
    }

    fn write_job(settings: &Settings, name: &str) {
        std::fs::write(
            settings.jobs_dir().join(format!("{name}.yml")),
            "description: d\ntimeout: 5\nscript: echo hi\ncontainers:\n  - {image: img, host_tag: tag}\n",
        )
        .unwrap();
    }

    #[test]
    fn create_build_queues_a_build() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        write_job(&settings, "demo");

        run(
            &settings,
            JobArgs {
                command: JobCommand::CreateBuild {
                    flat_name: "demo".into(),
                    run_name: "r1".into(),
                    container: "img".into(),
                    params: vec![],
                },
            },
        )
        .unwrap();

        assert_eq!(Build::list(&settings, "demo").unwrap().len(), 1);
    }

    #[test]
    fn create_build_rejects_malformed_param() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        write_job(&settings, "demo");

        let err = run(
            &settings,
            JobArgs {
                command: JobCommand::CreateBuild {
                    flat_name: "demo".into(),
                    run_name: "r1".into(),
                    container: "img".into(),
                    params: vec!["not-a-kv-pair".into()],
                },
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("bad --param"));
    }

    #[test]
    fn list_separates_groups_and_jobs() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        write_job(&settings, "demo");
        let listing = jobstore::list_group(&settings, "").unwrap();
        assert_eq!(listing.jobs, vec!["demo"]);
    }
}
