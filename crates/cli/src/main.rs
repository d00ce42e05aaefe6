// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::{Parser, Subcommand};

use bya::commands::{admin, runner, worker};
use bya_core::Settings;

#[derive(Parser)]
#[command(name = "bya", about = "BYA worker, runner, and admin CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register this host with the configured BYA server
    Register {
        server_url: String,
        version: String,
        host_tags: String,
        #[arg(long)]
        no_cron: bool,
        #[arg(long, default_value_t = 1)]
        concurrent_runs: u32,
    },
    /// Remove this worker's install state
    Uninstall,
    /// Check in with the server for dispatched work
    Check,
    /// Run-side entry point invoked with a runner descriptor's args
    Runner(runner::RunnerArgs),
    /// Inspect and queue builds for job definitions
    Job(admin::JobArgs),
    /// Poll job triggers
    Trigger(admin::TriggerArgs),
    /// Delete builds past their job's retention policy
    Clean,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Register { server_url, version, host_tags, no_cron, concurrent_runs } => {
            worker::run(worker::WorkerCommand::Register {
                server_url,
                version,
                host_tags,
                no_cron,
                concurrent_runs,
            })
            .await
        }
        Command::Uninstall => worker::run(worker::WorkerCommand::Uninstall).await,
        Command::Check => worker::run(worker::WorkerCommand::Check).await,
        Command::Runner(args) => runner::run(args),
        Command::Job(args) => admin::run(&Settings::from_env(), args),
        Command::Trigger(args) => admin::run_trigger(&Settings::from_env(), args).await,
        Command::Clean => admin::clean(&Settings::from_env()),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    Ok(())
}
