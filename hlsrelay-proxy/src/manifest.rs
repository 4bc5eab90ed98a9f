//! M3U8 playlist rewriting.
//!
//! Every URI line of a playlist is resolved against the playlist's own URL
//! and replaced by a relay URL carrying it in the `url` query parameter, so a
//! player keeps fetching sub-playlists and segments through the relay.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::identity::ProxyIdentity;

/// Everything except `A-Z a-z 0-9 - _ . ~` is escaped.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Syntactic class of a playlist line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Empty, or a `#` tag / comment; passed through untouched
    Directive,
    /// A segment or sub-playlist URI
    Reference,
}

/// Classify by the first byte only; tag attributes are never parsed.
#[must_use]
pub fn classify(line: &[u8]) -> LineKind {
    match line.first() {
        None | Some(b'#') => LineKind::Directive,
        Some(_) => LineKind::Reference,
    }
}

/// `application/vnd.apple.mpegurl`, `application/x-mpegurl`, `audio/mpegurl`, ...
#[must_use]
pub fn is_manifest_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("mpegurl")
}

/// Percent-encode a value for use in a query string.
#[must_use]
pub fn encode_query_value(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

/// Relay URL that fetches `absolute` through the relay described by `identity`.
#[must_use]
pub fn proxied_url(identity: &ProxyIdentity, absolute: &str) -> String {
    format!("{}{}", identity.proxy_base(), encode_query_value(absolute))
}

/// Rewrite a playlist body.
///
/// Lines are split on `\n` with a trailing `\r` dropped, and every output line
/// ends in `\n`. An empty body stays empty. Reference lines that are not UTF-8
/// or cannot be resolved are kept as they are.
#[must_use]
pub fn rewrite_manifest(body: &[u8], manifest_url: &Url, identity: &ProxyIdentity) -> Vec<u8> {
    if body.is_empty() {
        return Vec::new();
    }

    let content = body.strip_suffix(b"\n").unwrap_or(body);
    let mut output = Vec::with_capacity(body.len() * 2);
    let mut rewritten = 0usize;
    let mut kept = 0usize;

    for raw_line in content.split(|b| *b == b'\n') {
        let line = raw_line.strip_suffix(b"\r").unwrap_or(raw_line);

        match classify(line) {
            LineKind::Directive => output.extend_from_slice(line),
            LineKind::Reference => match resolve_reference(line, manifest_url) {
                Some(absolute) => {
                    output.extend_from_slice(proxied_url(identity, absolute.as_str()).as_bytes());
                    rewritten += 1;
                }
                None => {
                    output.extend_from_slice(line);
                    kept += 1;
                }
            },
        }
        output.push(b'\n');
    }

    tracing::debug!(
        manifest = %manifest_url,
        rewritten,
        kept,
        "Rewrote playlist references"
    );

    output
}

fn resolve_reference(line: &[u8], base: &Url) -> Option<Url> {
    let Ok(reference) = std::str::from_utf8(line) else {
        tracing::debug!(manifest = %base, "Keeping non UTF-8 playlist line");
        return None;
    };

    let reference = reference.trim();
    if reference.is_empty() {
        tracing::debug!(manifest = %base, "Keeping blank playlist line");
        return None;
    }

    match base.join(reference) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::debug!(manifest = %base, line = reference, error = %e, "Keeping unresolvable playlist line");
            None
        }
    }
}
