// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runner entry point (spec §6's "Runner CLI flags"), invoked with the
//! args embedded in a check-in response's runner descriptor
//! (`bya_engine::assemble_runner`). Mirrors `bya_runner.py`: it reads the
//! job script from stdin and reports back to the server. Actually
//! executing the script inside a container is explicitly out of scope
//! (spec §5) — this just demonstrates and validates the CLI contract.

use std::io::Read;

use clap::Args;

#[derive(Args)]
pub struct RunnerArgs {
    #[arg(long)]
    pub api_key: String,
    #[arg(long)]
    pub run: String,
    #[arg(long)]
    pub build_name: String,
    #[arg(long)]
    pub build_num: String,
    #[arg(long)]
    pub timeout: u32,
    #[arg(long)]
    pub container: String,
    /// Repeatable `K=V` environment entries
    #[arg(long = "env")]
    pub env: Vec<String>,
    /// Keep the run's working directory after it finishes
    #[arg(long)]
    pub keep_dir: bool,
    #[arg(long, default_value = "INFO")]
    pub log_level: String,
}

pub fn run(args: RunnerArgs) -> anyhow::Result<()> {
    let mut script = String::new();
    std::io::stdin().read_to_string(&mut script)?;

    tracing::info!(
        run = %args.run,
        build = %format!("{}/{}", args.build_name, args.build_num),
        container = %args.container,
        timeout = args.timeout,
        env_count = args.env.len(),
        script_bytes = script.len(),
        "runner invoked; container execution is out of scope here"
    );
    Ok(())
}
