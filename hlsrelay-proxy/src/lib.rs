//! Manifest-aware upstream relay
//!
//! Resolves the target of a relay request, fetches it (following one redirect
//! by hand), rewrites HLS playlists so their entries point back at the relay,
//! and streams everything else through untouched.

pub mod error;
pub mod fetch;
pub mod gate;
pub mod identity;
pub mod manifest;
pub mod target;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue},
    response::Response,
};
use futures::StreamExt;
use url::Url;

pub use error::{ProxyError, ProxyResult};
pub use fetch::Fetcher;
pub use gate::{ConcurrencyGate, GatePermit};
pub use identity::ProxyIdentity;
pub use manifest::{is_manifest_content_type, rewrite_manifest};
pub use target::{resolve_target, target_param};

/// Upstream response headers that only describe the upstream connection
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Fetch `target` and turn the effective upstream response into a client response.
///
/// Playlists are rewritten unless the origin sent them with a content coding,
/// in which case they pass through like any other body.
///
/// The permit is held until the body has been produced: released right after
/// a playlist is rewritten, or carried by a streamed body until it ends or the
/// client goes away.
pub async fn relay_upstream(
    fetcher: &Fetcher,
    target: &Url,
    client_headers: &HeaderMap,
    identity: &ProxyIdentity,
    permit: GatePermit,
) -> ProxyResult<Response> {
    let upstream = fetcher.fetch(target, client_headers).await?;
    let status = upstream.status();
    let manifest_url = upstream.url().clone();
    let mut headers = sanitize_headers(upstream.headers());

    let is_manifest = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_manifest_content_type);
    let is_encoded = headers
        .get(header::CONTENT_ENCODING)
        .is_some_and(|v| !v.as_bytes().eq_ignore_ascii_case(b"identity"));
    if is_manifest && is_encoded {
        tracing::debug!(manifest = %manifest_url, "Relaying encoded playlist without rewriting");
    }

    let body = if is_manifest && !is_encoded {
        let original = upstream
            .bytes()
            .await
            .map_err(|source| ProxyError::UpstreamBody {
                url: manifest_url.to_string(),
                source,
            })?;
        drop(permit);

        let rewritten = rewrite_manifest(&original, &manifest_url, identity);
        headers.remove(header::CONTENT_ENCODING);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));
        Body::from(rewritten)
    } else {
        let stream = upstream.bytes_stream().map(move |chunk| {
            let _held = &permit;
            chunk
        });
        Body::from_stream(stream)
    };

    let mut response = Response::builder().status(status).body(body)?;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Drop upstream CORS and hop-by-hop headers; the gateway applies its own CORS policy.
#[must_use]
pub fn sanitize_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        let name_str = name.as_str();
        if name_str.starts_with("access-control-") || HOP_BY_HOP_HEADERS.contains(&name_str) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}
