// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use bya_core::Settings;
use bya_engine::{LoggingSmtpSink, SmtpSink};

/// Shared server state, cheap to `Clone` into every request handler.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub notifier: Arc<dyn SmtpSink>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self { settings: Arc::new(settings), notifier: Arc::new(LoggingSmtpSink) }
    }

    #[cfg(test)]
    pub fn with_notifier(settings: Settings, notifier: Arc<dyn SmtpSink>) -> Self {
        Self { settings: Arc::new(settings), notifier }
    }
}
