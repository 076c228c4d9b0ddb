/*
 * Responsibility
 * - Request-scoped context threaded through every pipeline stage
 * - Created once per request by the orchestrator, dropped when the request ends
 *
 * Notes
 * - origin only differentiates log records; it never feeds the access decision
 */
use std::fmt;

use axum::http::{HeaderMap, Method};

use crate::api::dto::upload::UploadPayload;
use crate::services::auth::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    /// Arrived through the public listener. The router has no other entry point.
    External,
}

impl fmt::Display for RequestOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestOrigin::External => f.write_str("external"),
        }
    }
}

#[derive(Debug)]
pub struct RequestCtx {
    pub origin: RequestOrigin,
    pub request_id: Option<String>,
    pub method: Method,
    pub route: &'static str,
    pub study_id: Option<String>,
    pub identity: Option<Identity>,
    /// Set by validation on the upload route; replaced by enrichment.
    pub upload: Option<UploadPayload>,
}

impl RequestCtx {
    /// Every request entering through the router is marked external.
    pub fn external(
        headers: &HeaderMap,
        method: Method,
        route: &'static str,
        study_id: Option<String>,
    ) -> Self {
        let request_id = headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Self {
            origin: RequestOrigin::External,
            request_id,
            method,
            route,
            study_id,
            identity: None,
            upload: None,
        }
    }
}
