//! Upstream forwarder.
//!
//! Relays method, path, query, headers and body to the single upstream, then
//! streams the upstream response back untouched. Dropping the returned
//! response (client gone) drops the upstream body stream and its connection.

use std::time::Duration;

use axum::{
    body::{Body, HttpBody},
    http::{HeaderMap, HeaderName, HeaderValue, Uri, header, request::Parts},
    response::Response,
};
use serde_json::Value;
use url::Url;

use crate::error::GatewayError;
use crate::middleware::http::{GeneratedRequestId, REQUEST_ID_HEADER};

/// Connection-scoped headers, never relayed in either direction.
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];


/// What goes upstream as the request body.
#[derive(Debug)]
pub enum ForwardBody {
    /// The caller's body, streamed through.
    Stream(Body),
    /// A body the gateway rewrote (the enriched upload).
    Json(Value),
}

#[derive(Debug, Clone)]
pub struct ProxyForwarder {
    base_url: Url,
    client: reqwest::Client,
}

impl ProxyForwarder {
    pub fn new(
        base_url: Url,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        // No overall timeout: large listings stream for as long as they keep moving.
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { base_url, client })
    }

    /// Upstream base joined with the incoming path and query.
    pub fn target_url(&self, uri: &Uri) -> Result<Url, GatewayError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        Url::parse(&format!("{base}{path_and_query}")).map_err(|err| {
            tracing::error!(error = %err, "cannot build upstream url");
            GatewayError::internal("invalid upstream url")
        })
    }

    pub async fn forward(&self, parts: &Parts, body: ForwardBody) -> Result<Response, GatewayError> {
        let url = self.target_url(&parts.uri)?;
        let mut headers = request_headers(parts);

        let mut request = self.client.request(parts.method.clone(), url);
        request = match body {
            ForwardBody::Stream(body) if body.size_hint().exact() == Some(0) => request,
            ForwardBody::Stream(body) => {
                request.body(reqwest::Body::wrap_stream(body.into_data_stream()))
            }
            ForwardBody::Json(value) => {
                let bytes = serde_json::to_vec(&value).map_err(|err| {
                    tracing::error!(error = %err, "cannot serialize forwarded body");
                    GatewayError::internal("cannot serialize request body")
                })?;
                json_body_headers(&mut headers);
                request.body(bytes)
            }
        };

        let upstream = request
            .headers(headers)
            .send()
            .await
            .map_err(classify)?;

        Ok(relay(upstream))
    }
}

fn request_headers(parts: &Parts) -> HeaderMap {
    let mut headers = strip_hop_by_hop(&parts.headers);
    headers.remove(header::HOST);
    // only an id we generated is ours to drop; a client's id is its own header
    if parts.extensions.get::<GeneratedRequestId>().is_some() {
        headers.remove(REQUEST_ID_HEADER);
    }
    headers
}

/// Headers for a body the gateway re-serialized as JSON.
fn json_body_headers(headers: &mut HeaderMap) {
    headers.remove(header::CONTENT_LENGTH);
    let client_sent_json = headers
        .get(header::CONTENT_TYPE)
        .is_some_and(is_json_media_type);
    if !client_sent_json {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }
}

fn is_json_media_type(value: &HeaderValue) -> bool {
    let Ok(value) = value.to_str() else {
        return false;
    };
    let essence = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in HOP_BY_HOP.iter() {
        out.remove(name);
    }
    out
}

fn relay(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let headers = strip_hop_by_hop(upstream.headers());

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn classify(err: reqwest::Error) -> GatewayError {
    if err.is_builder() {
        tracing::error!(error = %err, "cannot build upstream request");
        return GatewayError::internal("cannot build upstream request");
    }

    let message = if err.is_timeout() {
        "upstream timed out"
    } else if err.is_connect() {
        "upstream unreachable"
    } else {
        "upstream unavailable"
    };
    tracing::warn!(error = %err, kind = "ServiceUnavailable", "{message}");
    GatewayError::service_unavailable(message)
}
