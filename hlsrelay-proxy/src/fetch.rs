//! Outbound fetches with manual redirect handling.

use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderName};
use hlsrelay_core::config::{ProxyConfig, UpstreamPolicy};
use url::Url;

use crate::error::{ProxyError, ProxyResult};

/// Request headers the client sent that must not reach the origin.
///
/// `accept-encoding` is dropped so playlists arrive uncompressed for rewriting.
const SKIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authorization",
    "te",
    "trailer",
    "upgrade",
    "accept-encoding",
    "content-length",
    "transfer-encoding",
    "user-agent",
];

/// Issues upstream GETs and follows at most one redirect itself.
///
/// The underlying client never follows redirects, so the final response (and
/// the URL it came from) stays visible to the caller.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(config: &ProxyConfig) -> ProxyResult<Self> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(config.user_agent.as_str())
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .tcp_nodelay(true);

        if config.upstream_policy == UpstreamPolicy::Direct {
            builder = builder.no_proxy();
        }

        let client = builder.build().map_err(ProxyError::Client)?;
        Ok(Self { client })
    }

    /// Fetch `target`, replacing a `3xx` answer by the response of its `Location`.
    ///
    /// When the redirect target cannot be fetched the original redirect response
    /// is returned unchanged.
    pub async fn fetch(
        &self,
        target: &Url,
        client_headers: &HeaderMap,
    ) -> ProxyResult<reqwest::Response> {
        let headers = forwarded_headers(client_headers);
        let response = self.send(target, &headers).await?;

        let status = response.status().as_u16();
        if !(300..=308).contains(&status) {
            return Ok(response);
        }
        let Some(location) = response.headers().get(header::LOCATION) else {
            return Ok(response);
        };

        let next = location
            .to_str()
            .ok()
            .and_then(|location| target.join(location.trim()).ok())
            .ok_or_else(|| ProxyError::InvalidRedirect {
                url: target.to_string(),
                location: String::from_utf8_lossy(location.as_bytes()).into_owned(),
            })?;

        match self.send(&next, &headers).await {
            Ok(redirected) => {
                tracing::debug!(from = %target, to = %next, status, "Followed upstream redirect");
                Ok(redirected)
            }
            Err(e) => {
                tracing::warn!(
                    from = %target,
                    to = %next,
                    error = %e,
                    "Redirect target unreachable, returning redirect response"
                );
                Ok(response)
            }
        }
    }

    async fn send(&self, url: &Url, headers: &HeaderMap) -> ProxyResult<reqwest::Response> {
        self.client
            .get(url.clone())
            .headers(headers.clone())
            .send()
            .await
            .map_err(|source| ProxyError::Upstream {
                url: url.to_string(),
                source,
            })
    }
}

/// Client headers minus hop-by-hop and relay-owned ones
fn forwarded_headers(client_headers: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(client_headers.len());
    for (name, value) in client_headers {
        if is_skipped(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

fn is_skipped(name: &HeaderName) -> bool {
    SKIPPED_REQUEST_HEADERS.contains(&name.as_str())
}
