// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker CLI subcommands (spec §6): `register`, `uninstall`, `check`.
//! Mirrors `bya_worker.py`'s registration flow; actual run execution is
//! out of scope (spec §5: "subprocess I/O in the runner (not in scope
//! here)") so `check` reports a dispatched run rather than executing it.
//!
//! Every subcommand runs under a single advisory file lock (spec §5),
//! matching `bya_worker.py`'s whole-`main()` `flock` on the same path: a
//! second worker invocation that finds the lock held exits 0 rather than
//! racing the first.

use std::path::PathBuf;

use clap::Subcommand;
use fs2::FileExt;
use serde_json::json;
use sysinfo::System;

use bya_core::generate_api_key;

use crate::config::WorkerConfig;

const LOCK_PATH: &str = "/tmp/bya_worker.lock";

#[derive(Subcommand)]
pub enum WorkerCommand {
    /// Register this host with the configured BYA server
    Register {
        server_url: String,
        version: String,
        host_tags: String,
        /// Do not install the periodic `check` cron entry
        #[arg(long)]
        no_cron: bool,
        #[arg(long, default_value_t = 1)]
        concurrent_runs: u32,
    },
    /// Remove this worker's install state
    Uninstall,
    /// Check in with the server: heartbeat and receive any dispatched run
    Check,
}

const CRON_FILE: &str = "/etc/cron.d/bya_worker";

pub async fn run(command: WorkerCommand) -> anyhow::Result<()> {
    let lock_file = std::fs::OpenOptions::new().create(true).write(true).open(LOCK_PATH)?;
    if lock_file.try_lock_exclusive().is_err() {
        tracing::debug!(path = LOCK_PATH, "another worker process holds the lock; exiting");
        return Ok(());
    }

    match command {
        WorkerCommand::Register { server_url, version, host_tags, no_cron, concurrent_runs } => {
            register(&server_url, &version, &host_tags, no_cron, concurrent_runs).await
        }
        WorkerCommand::Uninstall => uninstall(),
        WorkerCommand::Check => check().await,
    }
}

fn host_name() -> String {
    std::env::var("BYA_HOST_NAME").ok().or_else(|| {
        std::fs::read_to_string("/etc/hostname").ok().map(|s| s.trim().to_string())
    }).unwrap_or_else(|| "unknown-host".to_string())
}

/// CPU/memory/distro snapshot for host registration (SPEC_FULL.md §D.10).
fn capacity_snapshot() -> (String, u64, u32, String) {
    let mut sys = System::new_all();
    sys.refresh_all();
    let distro = System::long_os_version().unwrap_or_else(|| "unknown".to_string());
    let mem_total = sys.total_memory();
    let cpu_total = sys.cpus().len() as u32;
    let cpu_type = sys.cpus().first().map(|c| c.brand().to_string()).unwrap_or_else(|| "unknown".to_string());
    (distro, mem_total, cpu_total, cpu_type)
}

async fn register(
    server_url: &str,
    version: &str,
    host_tags: &str,
    no_cron: bool,
    concurrent_runs: u32,
) -> anyhow::Result<()> {
    let name = host_name();
    let host_api_key = generate_api_key();
    let (distro, mem_total, cpu_total, cpu_type) = capacity_snapshot();

    let body = json!({
        "name": name,
        "api_key": host_api_key,
        "distro": distro,
        "mem_total": mem_total,
        "cpu_total": cpu_total,
        "cpu_type": cpu_type,
        "concurrent_runs": concurrent_runs,
        "host_tags": host_tags,
    });

    let client = reqwest::Client::new();
    let url = format!("{}/api/v1/host/", server_url.trim_end_matches('/'));
    let resp = client.post(&url).json(&body).send().await?;
    if !resp.status().is_success() {
        let text = resp.text().await.unwrap_or_default();
        anyhow::bail!("failed to register host: {text}");
    }

    let cfg = WorkerConfig {
        server_url: server_url.to_string(),
        version: version.to_string(),
        host_name: name,
        host_api_key,
        concurrent_runs,
        worker_script_version: None,
    };
    cfg.save()?;

    if !no_cron {
        let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("bya"));
        std::fs::write(CRON_FILE, format!("* * * * *\troot\t{} check\n", exe.display()))?;
    }

    tracing::info!(server = %server_url, "registered host");
    Ok(())
}

fn uninstall() -> anyhow::Result<()> {
    let _ = std::fs::remove_file(CRON_FILE);
    let _ = std::fs::remove_file(WorkerConfig::path());
    tracing::info!("worker uninstalled");
    Ok(())
}

async fn check() -> anyhow::Result<()> {
    let mut cfg = WorkerConfig::load()?;
    let client = reqwest::Client::new();
    let url = format!(
        "{}/api/v1/host/{}/?available_runners={}",
        cfg.server_url.trim_end_matches('/'),
        cfg.host_name,
        cfg.concurrent_runs
    );
    let resp = client.get(&url).header("Authorization", format!("Token {}", cfg.host_api_key)).send().await?;
    if !resp.status().is_success() {
        let text = resp.text().await.unwrap_or_default();
        tracing::error!(status = ?resp.status(), body = %text, "check-in failed");
        anyhow::bail!("check-in failed: {text}");
    }
    let body: serde_json::Value = resp.json().await?;

    if let Some(server_version) = body.get("worker_version").and_then(serde_json::Value::as_u64) {
        maybe_self_upgrade(&mut cfg, server_version).await?;
    }

    match body.get("runs").and_then(|r| r.as_array()).filter(|r| !r.is_empty()) {
        Some(runs) => {
            tracing::info!(count = runs.len(), "server dispatched run(s); execution is out of scope here");
        }
        None => tracing::debug!("check-in OK, nothing dispatched"),
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum VersionCheck {
    UpToDate,
    /// No prior check-in to compare against; record this as the baseline.
    Baseline,
    Stale,
}

fn check_worker_version(cached: Option<u64>, server_version: u64) -> VersionCheck {
    match cached {
        Some(v) if v == server_version => VersionCheck::UpToDate,
        None => VersionCheck::Baseline,
        Some(_) => VersionCheck::Stale,
    }
}

/// Compare the check-in response's `worker_version` (mtime of the server's
/// canonical worker script) against the last one this host saw, and
/// self-upgrade when it has moved (spec §9). The first check-in after
/// `register` has nothing to compare against, so it only records a
/// baseline rather than upgrading immediately.
async fn maybe_self_upgrade(cfg: &mut WorkerConfig, server_version: u64) -> anyhow::Result<()> {
    let decision = check_worker_version(cfg.worker_script_version, server_version);
    if decision == VersionCheck::UpToDate {
        return Ok(());
    }
    cfg.worker_script_version = Some(server_version);
    cfg.save()?;

    match decision {
        VersionCheck::Baseline => {
            tracing::debug!(worker_version = server_version, "recorded baseline worker script version");
            Ok(())
        }
        VersionCheck::Stale => {
            tracing::info!(worker_version = server_version, "worker script changed on server; upgrading");
            download_and_reexec(cfg).await
        }
        VersionCheck::UpToDate => unreachable!(),
    }
}

/// Download the new worker artifact to a sibling path, atomically rename it
/// over the running executable, then spawn the upgraded binary with the
/// same arguments and exit (spec §9).
async fn download_and_reexec(cfg: &WorkerConfig) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/api/v1/worker-script", cfg.server_url.trim_end_matches('/'));
    let resp = client.get(&url).send().await?;
    if !resp.status().is_success() {
        anyhow::bail!("failed to download worker artifact: {}", resp.status());
    }
    let bytes = resp.bytes().await?;

    let current_exe = std::env::current_exe()?;
    let staged = current_exe.with_extension("new");
    std::fs::write(&staged, &bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&staged, std::fs::Permissions::from_mode(0o755))?;
    }
    std::fs::rename(&staged, &current_exe)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    std::process::Command::new(&current_exe).args(&args).spawn()?;
    tracing::info!("re-exec'd after self-upgrade");
    std::process::exit(0);
}
