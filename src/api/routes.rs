/*
 * Responsibility
 * - The gateway's route table: method, path template, scope rule
 * - Each route's stage chain follows from its rule (public / protected / upload)
 * - Builds the axum Router from the table; every route ends at the forwarder
 */
use axum::{
    Router,
    extract::{Path, Request, State, rejection::PathRejection},
    http::{Method, Uri},
    response::{IntoResponse, Response},
    routing::{MethodFilter, MethodRouter, on},
};
use serde::Deserialize;

use crate::api::pipeline::{self, PROTECTED_CHAIN, PUBLIC_CHAIN, Stage, UPLOAD_CHAIN};
use crate::error::GatewayError;
use crate::services::access::{Operation, ScopeRule};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub fn method(self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Put => Method::PUT,
            Verb::Delete => Method::DELETE,
        }
    }

    fn filter(self) -> MethodFilter {
        match self {
            Verb::Get => MethodFilter::GET,
            Verb::Post => MethodFilter::POST,
            Verb::Put => MethodFilter::PUT,
            Verb::Delete => MethodFilter::DELETE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDef {
    pub verb: Verb,
    pub path: &'static str,
    pub scope: ScopeRule,
    /// Validation + enrichment run before authentication.
    pub upload: bool,
}

impl RouteDef {
    const fn public(verb: Verb, path: &'static str) -> Self {
        Self {
            verb,
            path,
            scope: ScopeRule::Public,
            upload: false,
        }
    }

    const fn misc(verb: Verb, path: &'static str) -> Self {
        Self {
            verb,
            path,
            scope: ScopeRule::Misc,
            upload: false,
        }
    }

    const fn study(verb: Verb, path: &'static str, operation: Operation) -> Self {
        Self {
            verb,
            path,
            scope: ScopeRule::Study(operation),
            upload: false,
        }
    }

    const fn upload(path: &'static str) -> Self {
        Self {
            verb: Verb::Post,
            path,
            scope: ScopeRule::Study(Operation::Write),
            upload: true,
        }
    }

    pub fn chain(&self) -> &'static [Stage] {
        match (self.upload, self.scope) {
            (true, _) => UPLOAD_CHAIN,
            (false, ScopeRule::Public) => PUBLIC_CHAIN,
            (false, _) => PROTECTED_CHAIN,
        }
    }
}

use Operation::{Read, Write};
use Verb::{Delete, Get, Post, Put};

pub static ROUTES: &[RouteDef] = &[
    // public passthrough
    RouteDef::public(Get, "/isAlive"),
    RouteDef::public(Get, "/swagger-ui.html"),
    RouteDef::public(Get, "/swagger-resources"),
    RouteDef::public(Get, "/swagger-resources/{*path}"),
    RouteDef::public(Get, "/v2/api-docs"),
    RouteDef::public(Get, "/webjars/{*path}"),
    // analysis
    RouteDef::study(Get, "/studies/{study_id}/analysis", Read),
    RouteDef::study(Get, "/studies/{study_id}/analysis/{*path}", Read),
    RouteDef::study(Put, "/studies/{study_id}/analysis/{*path}", Write),
    RouteDef::study(Post, "/studies/{study_id}/analysis/{*path}", Write),
    // entities by id
    RouteDef::study(Get, "/studies/{study_id}/donors/{ids}", Read),
    RouteDef::study(Delete, "/studies/{study_id}/donors/{ids}", Write),
    RouteDef::study(Get, "/studies/{study_id}/files/{ids}", Read),
    RouteDef::study(Delete, "/studies/{study_id}/files/{ids}", Write),
    RouteDef::study(Get, "/studies/{study_id}/samples/{ids}", Read),
    RouteDef::study(Delete, "/studies/{study_id}/samples/{ids}", Write),
    RouteDef::study(Get, "/studies/{study_id}/specimens/{ids}", Read),
    RouteDef::study(Delete, "/studies/{study_id}/specimens/{ids}", Write),
    // studies
    RouteDef::misc(Get, "/studies/all"),
    RouteDef::study(Get, "/studies/{study_id}", Read),
    RouteDef::study(Get, "/studies/{study_id}/all", Read),
    RouteDef::study(Post, "/studies/{study_id}/", Write),
    // global resources
    RouteDef::misc(Get, "/entities"),
    RouteDef::misc(Get, "/entities/{id}"),
    RouteDef::misc(Get, "/schemas"),
    RouteDef::misc(Post, "/schemas"),
    RouteDef::misc(Get, "/schemas/{*path}"),
    // export
    RouteDef::misc(Get, "/export/analysis/{ids}"),
    RouteDef::study(Get, "/export/studies/{study_id}", Read),
    // upload
    RouteDef::upload("/submit/{study_id}"),
];

/// Find a registered route by method and path template.
pub fn lookup(method: &Method, template: &str) -> Option<&'static RouteDef> {
    ROUTES
        .iter()
        .find(|r| r.path == template && r.verb.method() == *method)
}

#[derive(Debug, Deserialize)]
struct StudyPath {
    study_id: String,
}

fn method_router(route: &'static RouteDef) -> MethodRouter<AppState> {
    let filter = route.verb.filter();
    match route.scope {
        ScopeRule::Study(_) => on(
            filter,
            move |State(state): State<AppState>,
                  path: Result<Path<StudyPath>, PathRejection>,
                  req: Request| async move {
                match path {
                    Ok(Path(path)) => pipeline::handle(state, route, Some(path.study_id), req).await,
                    Err(rejection) => study_path_rejected(rejection),
                }
            },
        ),
        ScopeRule::Public | ScopeRule::Misc => on(
            filter,
            move |State(state): State<AppState>, req: Request| {
                pipeline::handle(state, route, None, req)
            },
        ),
    }
}

fn study_path_rejected(rejection: PathRejection) -> Response {
    tracing::warn!(error = %rejection, "study path rejected");
    GatewayError::bad_request("invalid study id in path").into_response()
}

async fn not_found(method: Method, uri: Uri) -> GatewayError {
    GatewayError::not_found(format!("no route for {method} {}", uri.path()))
}

pub fn routes() -> Router<AppState> {
    ROUTES
        .iter()
        .fold(Router::new(), |router, route| {
            router.route(route.path, method_router(route))
        })
        .method_not_allowed_fallback(not_found)
        .fallback(not_found)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn study_routes_read_on_get_and_write_otherwise() {
        for route in ROUTES
            .iter()
            .filter(|r| r.path.starts_with("/studies/{study_id}"))
        {
            let expected = if route.verb == Get { Read } else { Write };
            assert_eq!(route.scope, ScopeRule::Study(expected), "{route:?}");
        }
    }

    #[test]
    fn global_routes_are_misc() {
        for (verb, path) in [
            (Get, "/studies/all"),
            (Get, "/entities"),
            (Get, "/entities/{id}"),
            (Get, "/schemas"),
            (Post, "/schemas"),
            (Get, "/schemas/{*path}"),
            (Get, "/export/analysis/{ids}"),
        ] {
            let route = lookup(&verb.method(), path).expect(path);
            assert_eq!(route.scope, ScopeRule::Misc, "{path}");
            assert_eq!(route.chain(), PROTECTED_CHAIN);
        }
    }

    #[test]
    fn study_export_is_study_read() {
        let route = lookup(&Method::GET, "/export/studies/{study_id}").expect("route");
        assert_eq!(route.scope, ScopeRule::Study(Read));
    }

    #[test]
    fn upload_validates_and_enriches_before_auth() {
        let route = lookup(&Method::POST, "/submit/{study_id}").expect("route");
        assert_eq!(route.scope, ScopeRule::Study(Write));
        assert_eq!(
            route.chain(),
            &[
                Stage::Validate,
                Stage::Enrich,
                Stage::Authenticate,
                Stage::Authorize
            ]
        );
    }

    #[test]
    fn public_routes_skip_auth() {
        let route = lookup(&Method::GET, "/isAlive").expect("route");
        assert!(route.chain().is_empty());
    }

    #[test]
    fn routes_are_unique() {
        let mut seen = HashSet::new();
        for route in ROUTES {
            assert!(seen.insert((route.verb, route.path)), "{route:?}");
        }
    }

    #[test]
    fn router_builds_without_conflicts() {
        let _router = routes();
    }
}
