// End-to-end behaviour of the relay gateway, driven in-process against a mock origin

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use hlsrelay_api::{create_router, AppState};
use hlsrelay_core::{config::UpstreamPolicy, Config};
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ALLOWED: &str = "http://test.com";
const MPEGURL: &str = "application/vnd.apple.mpegurl";

fn app(require_terms: bool, max_concurrent_fetches: usize) -> Router {
    let mut config = Config::default();
    config.cors.allowed_origins = format!("{ALLOWED}, https://player.example.com");
    config.proxy.require_terms_accepted = require_terms;
    config.proxy.max_concurrent_fetches = max_concurrent_fetches;
    config.proxy.upstream_policy = UpstreamPolicy::Direct;

    create_router(AppState::from_config(&config).unwrap())
}

fn relay_uri(target: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("/?url={encoded}")
}

fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::HOST, "relay.test")
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn playlist_origin() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/playlist.m3u8"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1280000\nchunk.m3u8", MPEGURL)
                .insert_header("Access-Control-Allow-Origin", "*"),
        )
        .mount(&server)
        .await;
    server
}

fn decoded_target(line: &str) -> String {
    Url::parse(line)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "url")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

#[tokio::test]
async fn test_allowed_origin_gets_rewritten_manifest_and_single_cors_origin() {
    let server = playlist_origin().await;
    let target = format!("{}/playlist.m3u8", server.uri());

    let request = get(&relay_uri(&target))
        .header(header::ORIGIN, ALLOWED)
        .header("X-Terms-Accepted", "true")
        .body(Body::empty())
        .unwrap();
    let response = app(true, 5).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let allow_origin: Vec<_> = response
        .headers()
        .get_all(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .iter()
        .collect();
    assert_eq!(allow_origin, vec![ALLOWED]);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_EXPOSE_HEADERS).unwrap(),
        "Content-Length, Content-Range"
    );

    let content_length = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let body = body_string(response).await;
    assert_eq!(content_length, body.len().to_string());

    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines[0], "#EXTM3U");
    assert_eq!(lines[1], "#EXT-X-STREAM-INF:BANDWIDTH=1280000");
    assert!(lines[2].starts_with("http://relay.test/?url="));
    assert_eq!(decoded_target(lines[2]), format!("{}/chunk.m3u8", server.uri()));
}

#[tokio::test]
async fn test_upstream_vary_is_kept_alongside_origin() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/seg.ts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(vec![0u8; 188], "video/mp2t")
                .insert_header("Vary", "Accept-Encoding"),
        )
        .mount(&server)
        .await;
    let target = format!("{}/seg.ts", server.uri());

    let request = get(&relay_uri(&target))
        .header(header::ORIGIN, ALLOWED)
        .body(Body::empty())
        .unwrap();
    let response = app(false, 5).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let vary: Vec<_> = response.headers().get_all(header::VARY).iter().collect();
    assert_eq!(vary, vec!["Accept-Encoding", "Origin"]);
}

#[tokio::test]
async fn test_forwarded_https_is_used_in_rewritten_urls() {
    let server = playlist_origin().await;
    let target = format!("{}/playlist.m3u8", server.uri());

    let request = get(&relay_uri(&target))
        .header("X-Forwarded-Proto", "https")
        .body(Body::empty())
        .unwrap();
    let response = app(false, 5).oneshot(request).await.unwrap();

    let body = body_string(response).await;
    assert!(body.lines().nth(2).unwrap().starts_with("https://relay.test/?url="));
}

#[tokio::test]
async fn test_disallowed_origin_is_rejected_without_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let target = format!("{}/playlist.m3u8", server.uri());

    let request = get(&relay_uri(&target))
        .header(header::ORIGIN, "http://evil.com")
        .header("X-Terms-Accepted", "true")
        .body(Body::empty())
        .unwrap();
    let response = app(true, 5).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_preflight_short_circuits() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/")
        .header(header::ORIGIN, "https://player.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app(true, 5).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://player.example.com"
    );
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
        "Content-Type, Range, X-Terms-Accepted"
    );

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/?url=http%3A%2F%2Ftarget.com%2Fplaylist.m3u8")
        .body(Body::empty())
        .unwrap();
    let response = app(true, 5).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_preflight_from_disallowed_origin_is_forbidden() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/")
        .header(header::ORIGIN, "http://evil.com")
        .body(Body::empty())
        .unwrap();
    let response = app(true, 5).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_terms_header_is_enforced_when_required() {
    let server = playlist_origin().await;
    let target = format!("{}/playlist.m3u8", server.uri());

    for value in [None, Some("false"), Some("1")] {
        let mut builder = get(&relay_uri(&target)).header(header::ORIGIN, ALLOWED);
        if let Some(value) = value {
            builder = builder.header("X-Terms-Accepted", value);
        }
        let response = app(true, 5)
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            ALLOWED
        );
    }

    let request = get(&relay_uri(&target)).body(Body::empty()).unwrap();
    let response = app(false, 5).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_url_is_bad_request() {
    for uri in ["/", "/?url=", "/?other=1"] {
        let request = get(uri)
            .header("X-Terms-Accepted", "true")
            .body(Body::empty())
            .unwrap();
        let response = app(true, 5).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri {uri}");
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], "Missing url");
        assert_eq!(body["status"], 400);
    }
}

#[tokio::test]
async fn test_malformed_target_is_bad_gateway() {
    let request = get(&relay_uri("not-a-url/playlist.m3u8"))
        .body(Body::empty())
        .unwrap();
    let response = app(false, 5).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_transport_failure_is_bad_gateway_with_cors() {
    let request = get(&relay_uri("http://127.0.0.1:1/playlist.m3u8"))
        .header(header::ORIGIN, ALLOWED)
        .body(Body::empty())
        .unwrap();
    let response = app(false, 5).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        ALLOWED
    );
}

#[tokio::test]
async fn test_any_path_relays_and_upstream_status_is_mirrored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.ts"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .mount(&server)
        .await;
    let target = format!("{}/missing.ts", server.uri());
    let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();

    let request = get(&format!("/some/player/path?url={encoded}"))
        .body(Body::empty())
        .unwrap();
    let response = app(false, 5).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "nope");
}

#[tokio::test]
async fn test_saturated_gate_queues_instead_of_failing() {
    let delay = Duration::from_millis(200);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/seg.ts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(vec![7u8; 188], "video/mp2t")
                .set_delay(delay),
        )
        .expect(2)
        .mount(&server)
        .await;
    let target = format!("{}/seg.ts", server.uri());

    let app = app(false, 1);
    let started = Instant::now();
    let requests = (0..2).map(|_| {
        let app = app.clone();
        let uri = relay_uri(&target);
        tokio::spawn(async move {
            let request = get(&uri).body(Body::empty()).unwrap();
            let response = app.oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, bytes.len())
        })
    });
    let results: Vec<_> = join_handles(requests.collect()).await;

    for (status, len) in results {
        assert_eq!(status, StatusCode::OK);
        assert_eq!(len, 188);
    }
    assert!(started.elapsed() >= delay * 2);
}

async fn join_handles(
    handles: Vec<tokio::task::JoinHandle<(StatusCode, usize)>>,
) -> Vec<(StatusCode, usize)> {
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}
