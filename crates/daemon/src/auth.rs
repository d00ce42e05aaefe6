// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Authorization: Token <opaque-key>` parsing (spec §6). Axum's built-in
//! typed header only understands the `Bearer` scheme, so this is a small
//! manual extractor rather than `headers::Authorization<Bearer>`.

use axum::http::HeaderMap;

pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    raw.strip_prefix("Token ").map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_token_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Token abc123"));
        assert_eq!(token_from_headers(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn rejects_bearer_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(token_from_headers(&headers), None);
    }

    #[test]
    fn missing_header_is_none() {
        assert_eq!(token_from_headers(&HeaderMap::new()), None);
    }
}
