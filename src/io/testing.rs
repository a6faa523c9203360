//! Loopback HTTP server answering Range requests, for tests.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;

/// Serves ranged reads of the data.
pub(crate) const ARCHIVE_PATH: &str = "/archive.arc.gz";
/// Advertises ranges, then answers them with an empty 206.
pub(crate) const EMPTY_RANGE_PATH: &str = "/empty-range.arc.gz";
/// Advertises ranges, then answers them with the whole body and a 200.
pub(crate) const IGNORES_RANGE_PATH: &str = "/ignores-range.arc.gz";
/// No `Accept-Ranges` header at all.
pub(crate) const NO_RANGES_PATH: &str = "/no-ranges.arc.gz";

/// Serve `data` on an ephemeral loopback port and return the base URL.
pub(crate) async fn serve(data: Vec<u8>) -> String {
    let app = Router::new()
        .route(ARCHIVE_PATH, get(ranged))
        .route(EMPTY_RANGE_PATH, get(empty_range))
        .route(IGNORES_RANGE_PATH, get(whole))
        .route(NO_RANGES_PATH, get(no_ranges))
        .with_state(Bytes::from(data));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

/// Inclusive byte range from a `Range: bytes=a-b` header, clamped to `len`.
fn requested_range(headers: &HeaderMap, len: usize) -> Option<(usize, usize)> {
    let spec = headers
        .get(header::RANGE)?
        .to_str()
        .ok()?
        .strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: usize = start.parse().ok()?;
    let end: usize = end.parse().ok()?;
    if start >= len || start > end {
        return None;
    }
    Some((start, end.min(len - 1)))
}

async fn ranged(State(data): State<Bytes>, headers: HeaderMap) -> Response {
    let Some((start, end)) = requested_range(&headers, data.len()) else {
        return whole(State(data)).await;
    };
    let content_range = format!("bytes {}-{}/{}", start, end, data.len());
    (
        StatusCode::PARTIAL_CONTENT,
        [(header::CONTENT_RANGE, content_range)],
        data.slice(start..=end),
    )
        .into_response()
}

async fn empty_range(State(data): State<Bytes>, headers: HeaderMap) -> Response {
    if headers.contains_key(header::RANGE) {
        return StatusCode::PARTIAL_CONTENT.into_response();
    }
    whole(State(data)).await
}

async fn whole(State(data): State<Bytes>) -> Response {
    ([(header::ACCEPT_RANGES, "bytes")], data).into_response()
}

async fn no_ranges(State(data): State<Bytes>) -> Response {
    data.into_response()
}
