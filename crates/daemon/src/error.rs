// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single error interceptor: every `ModelError` a handler propagates maps
//! to its carried HTTP status code (spec §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use bya_core::ModelError;

pub struct ApiError(pub ModelError);

impl From<ModelError> for ApiError {
    fn from(e: ModelError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, self.0.message).into_response()
    }
}
