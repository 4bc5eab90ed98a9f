//! Target resolution from the `url` query parameter.

use axum::http::Uri;
use url::{form_urlencoded, Url};

use crate::error::{ProxyError, ProxyResult};

/// Query parameter carrying the upstream URL
pub const TARGET_PARAM: &str = "url";

/// Extract the first `url` query parameter, percent-decoded.
#[must_use]
pub fn target_param(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == TARGET_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// Parse `raw` as an absolute URL the relay is able to fetch.
pub fn resolve_target(raw: &str) -> ProxyResult<Url> {
    let invalid = |reason: String| ProxyError::InvalidTarget {
        url: raw.to_string(),
        reason,
    };

    let target = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match target.scheme() {
        "http" | "https" => Ok(target),
        "" => Err(invalid("missing scheme".to_string())),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}
