//! HTTP-level middleware (cross-cutting concerns).
//!
//! Responsibility:
//! - Request-Id generation (X-Request-Id) for log correlation
//!   - a generated id is marked so the forwarder can drop it; a client's own id travels on
//! - Access logging / request tracing (TraceLayer)
//! - Panics in a handler become an unrecognized GatewayError (500, no detail)
//!
//! Notes:
//! - Nothing here touches a proxied response: no header-setting layers, no
//!   body limits, no global timeout (upstream bodies stream).

use std::any::Any;

use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{Response, header::HeaderName};
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::error::GatewayError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request extension: the `x-request-id` header was generated here, not sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedRequestId;

/// Apply HTTP-level middleware to the given Router.
pub fn apply(router: Router) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    let layers = ServiceBuilder::new()
        .layer(CatchPanicLayer::custom(unhandled_fault))
        // must run before SetRequestIdLayer fills the header in
        .layer(middleware::from_fn(mark_missing_request_id))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(TraceLayer::new_for_http());

    router.layer(layers)
}

fn unhandled_fault(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");

    GatewayError::unrecognized(format!("handler panicked: {detail}")).into_response()
}

async fn mark_missing_request_id(mut req: Request, next: Next) -> axum::response::Response {
    if !req.headers().contains_key(REQUEST_ID_HEADER) {
        req.extensions_mut().insert(GeneratedRequestId);
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;

    async fn boom() -> &'static str {
        panic!("handler failure")
    }

    async fn origin_of_id(req: Request) -> String {
        let generated = req.extensions().get::<GeneratedRequestId>().is_some();
        let id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        format!("{generated} {}", !id.is_empty())
    }

    async fn call(router: Router, req: HttpRequest<Body>) -> (StatusCode, String) {
        let response = router.oneshot(req).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, String::from_utf8(bytes.to_vec()).expect("utf8"))
    }

    #[tokio::test]
    async fn panic_becomes_undefined_error() {
        let router = apply(Router::new().route("/boom", get(boom)));
        let req = HttpRequest::get("/boom").body(Body::empty()).expect("request");

        let (status, body) = call(router, req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Undefined Error");
    }

    #[tokio::test]
    async fn missing_request_id_is_generated_and_marked() {
        let router = apply(Router::new().route("/id", get(origin_of_id)));
        let req = HttpRequest::get("/id").body(Body::empty()).expect("request");

        assert_eq!(call(router, req).await.1, "true true");
    }

    #[tokio::test]
    async fn client_request_id_is_not_marked() {
        let router = apply(Router::new().route("/id", get(origin_of_id)));
        let req = HttpRequest::get("/id")
            .header(REQUEST_ID_HEADER, "client-corr-1")
            .body(Body::empty())
            .expect("request");

        assert_eq!(call(router, req).await.1, "false true");
    }
}
