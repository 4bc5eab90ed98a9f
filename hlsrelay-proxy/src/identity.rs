//! Client-facing identity of the relay.

use axum::http::{header, HeaderMap, Uri};

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Scheme and host the client used to reach the relay.
///
/// Captured from the inbound request before anything is sent upstream and
/// used to point rewritten playlist entries back at the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyIdentity {
    pub scheme: String,
    pub host: String,
}

impl ProxyIdentity {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
        }
    }

    /// Derive the identity from inbound request headers and URI.
    ///
    /// TLS is terminated in front of the relay, so `https` is inferred from an
    /// absolute `https` request URI or a leading `X-Forwarded-Proto: https`.
    #[must_use]
    pub fn capture(headers: &HeaderMap, uri: &Uri) -> Self {
        let forwarded_https = headers
            .get(FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"));
        let scheme = if forwarded_https || uri.scheme_str() == Some("https") {
            "https"
        } else {
            "http"
        };

        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
            .unwrap_or_else(|| "localhost".to_string());

        Self::new(scheme, host)
    }

    /// Prefix every rewritten reference starts with
    #[must_use]
    pub fn proxy_base(&self) -> String {
        format!("{}://{}/?url=", self.scheme, self.host)
    }
}
