//! Per-request stage chain.
//!
//! Stages run strictly in the order the route registers them. Each stage
//! either updates the request context or short-circuits with a
//! `GatewayError`, which is rendered once at the end. On success the
//! forwarder's response is returned as-is.

use axum::{
    body::Body,
    extract::Request,
    http::{header, request::Parts},
    response::{IntoResponse, Response},
};
use tracing::Instrument;

use crate::api::context::RequestCtx;
use crate::api::dto::upload::UploadPayload;
use crate::api::routes::RouteDef;
use crate::error::GatewayError;
use crate::services::access::scope;
use crate::services::proxy::ForwardBody;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Buffer and shape-check the upload body.
    Validate,
    /// Merge sample metadata into the validated upload.
    Enrich,
    /// Bearer token → Identity.
    Authenticate,
    /// Identity + route scope → allow, or Forbidden.
    Authorize,
}

pub const PUBLIC_CHAIN: &[Stage] = &[];
pub const PROTECTED_CHAIN: &[Stage] = &[Stage::Authenticate, Stage::Authorize];
pub const UPLOAD_CHAIN: &[Stage] = &[
    Stage::Validate,
    Stage::Enrich,
    Stage::Authenticate,
    Stage::Authorize,
];

/// Entry point for every registered route.
pub async fn handle(
    state: AppState,
    route: &'static RouteDef,
    study_id: Option<String>,
    req: Request,
) -> Response {
    let (parts, body) = req.into_parts();
    let ctx = RequestCtx::external(&parts.headers, parts.method.clone(), route.path, study_id);

    let span = tracing::info_span!(
        "gateway",
        origin = %ctx.origin,
        request_id = ctx.request_id.as_deref().unwrap_or("-"),
        method = %ctx.method,
        route = ctx.route
    );

    run(&state, route, ctx, parts, body)
        .instrument(span)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn run(
    state: &AppState,
    route: &'static RouteDef,
    mut ctx: RequestCtx,
    parts: Parts,
    body: Body,
) -> Result<Response, GatewayError> {
    let mut body = Some(body);

    for stage in route.chain() {
        execute(*stage, state, route, &mut ctx, &parts, &mut body).await?;
    }

    let forward_body = match ctx.upload.take() {
        Some(payload) => ForwardBody::Json(payload.into_value()),
        None => ForwardBody::Stream(body.take().unwrap_or_default()),
    };

    state.proxy.forward(&parts, forward_body).await
}

async fn execute(
    stage: Stage,
    state: &AppState,
    route: &'static RouteDef,
    ctx: &mut RequestCtx,
    parts: &Parts,
    body: &mut Option<Body>,
) -> Result<(), GatewayError> {
    match stage {
        Stage::Validate => {
            let raw = body
                .take()
                .ok_or_else(|| GatewayError::internal("request body already consumed"))?;
            let bytes = axum::body::to_bytes(raw, state.config.max_upload_bytes)
                .await
                .map_err(|err| {
                    tracing::warn!(error = %err, "upload body rejected");
                    GatewayError::bad_request("upload body is unreadable or too large")
                })?;
            ctx.upload = Some(UploadPayload::parse(&bytes)?);
        }
        Stage::Enrich => {
            let payload = ctx
                .upload
                .take()
                .ok_or_else(|| GatewayError::internal("enrichment requires a validated upload"))?;
            ctx.upload = Some(state.enricher.enrich(payload).await?);
        }
        Stage::Authenticate => {
            let identity = state
                .auth
                .authenticate(parts.headers.get(header::AUTHORIZATION))?;
            ctx.identity = Some(identity);
        }
        Stage::Authorize => {
            let identity = ctx
                .identity
                .as_ref()
                .ok_or_else(|| GatewayError::unauthorized("missing token"))?;
            let scope = scope::resolve(route.scope, route.path, ctx.study_id.as_deref())
                .ok_or_else(|| GatewayError::internal("route has no resource scope"))?;
            state.access.authorize(identity, &scope).await?;
        }
    }
    Ok(())
}
