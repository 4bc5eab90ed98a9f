//! Origin allow-list and the CORS headers granted to allowed origins

use std::collections::HashSet;

use axum::http::{header, HeaderMap, HeaderValue};

const ALLOW_METHODS: &str = "GET, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Range, X-Terms-Accepted";
const EXPOSE_HEADERS: &str = "Content-Length, Content-Range";

/// Exact-match set of browser origins allowed to use the relay
#[derive(Debug, Clone, Default)]
pub struct OriginAllowList {
    origins: HashSet<String>,
}

impl OriginAllowList {
    /// Build from a comma-separated list; entries are trimmed, empty ones skipped.
    #[must_use]
    pub fn parse(list: &str) -> Self {
        let origins = list
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();
        Self { origins }
    }

    /// Case-sensitive exact match. The empty origin is never allowed.
    #[must_use]
    pub fn is_allowed(&self, origin: &str) -> bool {
        !origin.is_empty() && self.origins.contains(origin)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.origins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

/// Decide on the request's `Origin`.
///
/// Requests without an origin get no CORS headers and are not rejected. An
/// allowed origin gets the headers to attach to the response; any other origin
/// is returned as the error.
pub fn check_origin(allow_list: &OriginAllowList, headers: &HeaderMap) -> Result<HeaderMap, String> {
    let Some(value) = headers.get(header::ORIGIN) else {
        return Ok(HeaderMap::new());
    };
    if value.is_empty() {
        return Ok(HeaderMap::new());
    }

    if !value.to_str().is_ok_and(|origin| allow_list.is_allowed(origin)) {
        return Err(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    let mut cors = HeaderMap::with_capacity(5);
    cors.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value.clone());
    cors.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    cors.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    cors.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSE_HEADERS),
    );
    cors.insert(header::VARY, HeaderValue::from_static("Origin"));
    Ok(cors)
}
