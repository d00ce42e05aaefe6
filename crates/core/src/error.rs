// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single error type entities raise, carrying both a message and the
//! HTTP-facing status code it maps to (see spec §7's error taxonomy).

use thiserror::Error;

/// An error raised by entity validation or lookup.
///
/// `status_code` mirrors the source's `ModelError(message, status_code)` —
/// kept as a method rather than threading a status code through every call
/// site, since the kind of error already implies it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ModelError {
    pub message: String,
    pub status_code: u16,
}

impl ModelError {
    pub fn new(message: impl Into<String>, status_code: u16) -> Self {
        Self { message: message.into(), status_code }
    }

    /// 400 Bad Request — missing/invalid property, choice violation, bad param.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(message, 400)
    }

    /// 401 Unauthorized — missing/malformed/incorrect token, write to terminal run.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(message, 401)
    }

    /// 403 Forbidden — attempt to mutate a protected field via the API.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(message, 403)
    }

    /// 404 Not Found — job definition, job group, build, or host missing.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, 404)
    }

    /// 409 Conflict — duplicate creation (directory already exists).
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(message, 409)
    }

    /// 500 Internal — unexpected I/O; callers on the status-read path must
    /// never propagate this, they fall back to `RunStatus::Unknown` instead.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, 500)
    }
}

impl From<std::io::Error> for ModelError {
    fn from(e: std::io::Error) -> Self {
        ModelError::internal(e.to_string())
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        ModelError::validation(e.to_string())
    }
}
