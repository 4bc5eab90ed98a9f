//! Relay endpoint
//!
//! `GET|OPTIONS /?url=<percent-encoded URL>` on any path. Checks the origin,
//! answers preflights, enforces the terms header, then fetches the target
//! through the concurrency gate and returns the (possibly rewritten) response.

use axum::{
    extract::{Request, State},
    http::{header, request::Parts, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use hlsrelay_proxy::{relay_upstream, resolve_target, target_param, ProxyIdentity};

use crate::http::{
    cors,
    error::{AppError, AppResult},
    AppState,
};

/// Header a client sends to confirm it accepted the terms of service
pub const TERMS_HEADER: &str = "x-terms-accepted";

/// Fallback handler for every path
pub async fn handle_request(State(state): State<AppState>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();

    let cors_headers = match cors::check_origin(&state.allowed_origins, &parts.headers) {
        Ok(headers) => headers,
        Err(origin) => {
            tracing::warn!(origin = %origin, "Unauthorized origin blocked");
            return AppError::forbidden("Forbidden").into_response();
        }
    };

    let mut response = relay(&state, &parts)
        .await
        .unwrap_or_else(|err| err.into_response());

    let headers = response.headers_mut();
    for (name, value) in &cors_headers {
        // Upstream `Vary` entries still apply to the relayed body
        if name == header::VARY {
            headers.append(name.clone(), value.clone());
        } else {
            headers.insert(name.clone(), value.clone());
        }
    }
    response
}

async fn relay(state: &AppState, parts: &Parts) -> AppResult<Response> {
    if parts.method == Method::OPTIONS {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    if state.require_terms_accepted && !terms_accepted(&parts.headers) {
        return Err(AppError::forbidden("Terms of Service not accepted"));
    }

    let raw_target = target_param(&parts.uri)
        .filter(|target| !target.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing url"))?;

    let permit = state.gate.acquire().await?;

    let identity = ProxyIdentity::capture(&parts.headers, &parts.uri);
    let target = resolve_target(&raw_target)?;

    tracing::debug!(
        target = %target,
        proxy_host = %identity.host,
        in_flight = state.gate.in_flight(),
        "Relaying request"
    );

    let response =
        relay_upstream(&state.fetcher, &target, &parts.headers, &identity, permit).await?;
    Ok(response)
}

fn terms_accepted(headers: &HeaderMap) -> bool {
    headers
        .get(TERMS_HEADER)
        .is_some_and(|value| value.as_bytes() == b"true")
}
