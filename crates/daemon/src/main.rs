// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;
use fs2::FileExt;

use bya_core::Settings;
use bya_daemon::{router, AppState};
use bya_engine::TriggerManager;

#[derive(Debug, Parser)]
#[command(name = "byad", about = "bya build daemon")]
struct Args {
    /// Root directory for job definitions, builds, hosts and queues.
    #[arg(long, env = "BYA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Address to bind the HTTP API to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = Settings::from_env();
    if let Some(data_dir) = args.data_dir {
        settings.data_dir = data_dir;
    }
    settings.ensure_dirs()?;

    let filter = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    let lock_path = settings.data_dir.join(".daemon.lock");
    let lock_file = std::fs::OpenOptions::new().create(true).write(true).open(&lock_path)?;
    lock_file.try_lock_exclusive().map_err(|_| {
        anyhow::anyhow!("another byad instance already holds the lock at {}", lock_path.display())
    })?;

    let settings = std::sync::Arc::new(settings);
    let trigger_settings = settings.clone();
    tokio::spawn(async move {
        TriggerManager::new(&trigger_settings).run_forever().await;
    });

    let state = AppState::new((*settings).clone());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    tracing::info!(bind = %args.bind, data_dir = %settings.data_dir.display(), "byad listening");
    axum::serve(listener, app).await?;

    Ok(())
}
