use std::time::Instant;
use warp::filters::BoxedFilter;
use warp::http::{Method, StatusCode};
use warp::reply::Response;
use warp::Filter;

/// Logs every request that reaches a route, with its status and duration.
pub fn with_request_logging(routes: BoxedFilter<(Response,)>) -> BoxedFilter<(Response,)> {
    warp::any()
        .and(warp::path::full())
        .and(warp::method())
        .map(|path: warp::path::FullPath, method: Method| {
            tracing::debug!(path = %path.as_str(), method = %method, "incoming request");
            (path, method, Instant::now())
        })
        .and(routes)
        .map(
            |(path, method, start): (warp::path::FullPath, Method, Instant), response: Response| {
                log_response(
                    response.status(),
                    path.as_str(),
                    method.as_str(),
                    start.elapsed().as_millis(),
                );
                response
            },
        )
        .boxed()
}

/// Log response with status code
pub fn log_response(status: StatusCode, path: &str, method: &str, duration_ms: u128) {
    let status_code = status.as_u16();
    if status.is_server_error() {
        tracing::error!(status = status_code, path, method, duration_ms, "server error");
    } else if status.is_client_error() {
        tracing::warn!(status = status_code, path, method, duration_ms, "client error");
    } else {
        tracing::info!(status = status_code, path, method, duration_ms, "response sent");
    }
}
