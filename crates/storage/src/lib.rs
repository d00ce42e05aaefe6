// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bya-storage: the filesystem-as-database layer. Every entity here is a
//! plain directory under `Settings::data_dir`; there is no separate index
//! or write-ahead log (spec §9). `propdir` is the shared read-modify-write
//! primitive everything else builds on.

pub mod build;
pub mod host;
pub mod jobstore;
pub mod propdir;
pub mod queue;
pub mod run;

pub use build::{append_summary, Build, BuildStatus};
pub use host::{Host, ONLINE_WINDOW_SECS};
pub use jobstore::{DiscoveredJob, JobGroupListing, TriggerCache};
pub use propdir::PropDir;
pub use queue::RunQueue;
pub use run::{Run, RunRecord};
