use assistant_core::RouteOutcome;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

// Sent on every response, errors and preflight included
const ALLOW_ORIGIN: &str = "*";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";
const ALLOW_METHODS: &str = "GET, POST, OPTIONS, PUT, DELETE";

/// Drops the first matching mount prefix. A path equal to the prefix becomes `/`;
/// `/apixyz` is not under `/api` and passes through untouched.
pub fn strip_mount_prefix<'a>(path: &'a str, prefixes: &[String]) -> &'a str {
    for prefix in prefixes {
        if let Some(rest) = path.strip_prefix(prefix.as_str()) {
            if rest.is_empty() {
                return "/";
            }
            if rest.starts_with('/') {
                return rest;
            }
        }
    }
    path
}

// Output: status + JSON text + the fixed header set
pub fn into_response(outcome: RouteOutcome) -> Response {
    let status = StatusCode::from_u16(outcome.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = (status, outcome.body()).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static(ALLOW_ORIGIN));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    response
}
