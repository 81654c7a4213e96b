//! Routes of the HTTPS test server
//!
//! The session negotiated for a connection reaches the handlers as an
//! `Extension<Arc<SessionInfo>>`, added per connection by the handler.

use axum::{
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use log::info;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::tls::SessionInfo;

const SECURE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>TLS</title>
</head>
<body>
  <h1>SECURE</h1>
</body>
</html>
"#;

/// Build the application router
///
/// Every response carries `Connection: close`, plus
/// `Strict-Transport-Security` when `hsts_max_age` is set.
pub fn router(hsts_max_age: Option<u64>) -> Router {
    Router::new()
        .route("/api/secure-test", get(secure_test))
        .route("/cert-info", get(cert_info))
        .route("/", get(index))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(log_request))
                .layer(SetResponseHeaderLayer::overriding(
                    header::CONNECTION,
                    HeaderValue::from_static("close"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::STRICT_TRANSPORT_SECURITY,
                    move |_: &Response| hsts_header(hsts_max_age),
                )),
        )
}

fn hsts_header(max_age: Option<u64>) -> Option<HeaderValue> {
    max_age.and_then(|age| HeaderValue::from_str(&format!("max-age={}; includeSubDomains", age)).ok())
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    info!("{} {} -> {}", method, path, response.status().as_u16());
    response
}

async fn secure_test() -> Json<Value> {
    Json(json!({
        "message": "HTTPS connection established successfully!",
        "timestamp": Utc::now().to_rfc3339(),
        "secure": true,
    }))
}

async fn cert_info(Extension(session): Extension<Arc<SessionInfo>>) -> Json<Value> {
    Json(json!({
        "protocol": "HTTPS",
        "secure": true,
        "connection": {
            "cipher": { "name": session.cipher, "bits": session.cipher_bits },
            "protocol": session.protocol,
            "authorized": session.authorized,
        },
        "certificate": { "subject": session.peer_subject },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn index() -> Html<&'static str> {
    Html(SECURE_PAGE)
}

async fn not_found(request: Request) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("no route for {}", request.uri().path()) })),
    )
}
