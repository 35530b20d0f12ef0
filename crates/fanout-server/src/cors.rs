//! CORS policy for browser clients.

use axum::http::{HeaderName, Method, header};
use tower_http::cors::{Any, CorsLayer};

/// Request headers browser clients may send.
pub const ALLOWED_HEADERS: [HeaderName; 9] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::ACCEPT_ENCODING,
    HeaderName::from_static("x-csrf-token"),
    header::AUTHORIZATION,
    header::ACCEPT,
    header::ORIGIN,
    header::CACHE_CONTROL,
    HeaderName::from_static("x-requested-with"),
];

/// Methods browser clients may use.
pub const ALLOWED_METHODS: [Method; 4] = [Method::POST, Method::OPTIONS, Method::GET, Method::PUT];

/// Allow any origin with the fixed method and header lists.
///
/// Credentials are not allowed: browsers refuse `*` together with
/// credentials.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(ALLOWED_HEADERS)
}
