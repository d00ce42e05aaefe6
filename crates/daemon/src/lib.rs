// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bya-daemon: the HTTP API server (spec §6). `http::router` is the axum
//! `Router`; `main.rs` is just the binary entry point (arg parsing,
//! tracing init, binding, trigger-poller startup).

pub mod auth;
pub mod error;
pub mod http;
pub mod state;

pub use error::ApiError;
pub use http::router;
pub use state::AppState;
