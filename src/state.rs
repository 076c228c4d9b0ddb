/*
 * Responsibility
 * - Shared, read-only context bound to the Router (AppState)
 *   - config, token authenticator, access engine, enricher, forwarder
 * - Clone is cheap (everything behind Arc); nothing in here is mutated per request
 */
use std::sync::Arc;

use crate::config::Config;
use crate::services::access::{AccessEngine, build_access_engine};
use crate::services::auth::{TokenAuthenticator, build_token_authenticator};
use crate::services::metadata::{HttpSampleMetadata, SampleEnricher};
use crate::services::proxy::ProxyForwarder;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<TokenAuthenticator>,
    pub access: Arc<AccessEngine>,
    pub enricher: Arc<SampleEnricher>,
    pub proxy: Arc<ProxyForwarder>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        auth: Arc<TokenAuthenticator>,
        access: Arc<AccessEngine>,
        enricher: Arc<SampleEnricher>,
        proxy: Arc<ProxyForwarder>,
    ) -> Self {
        Self {
            config,
            auth,
            access,
            enricher,
            proxy,
        }
    }

    /// Build every component from `config` once, at start-up.
    pub fn from_config(config: Config) -> Result<Self, reqwest::Error> {
        let metadata = HttpSampleMetadata::new(
            config.metadata_url.clone(),
            config.upstream_connect_timeout,
            config.metadata_timeout,
        )?;
        let proxy = ProxyForwarder::new(
            config.upstream_url.clone(),
            config.upstream_connect_timeout,
            config.upstream_read_timeout,
        )?;

        Ok(Self::new(
            Arc::new(config.clone()),
            build_token_authenticator(&config),
            build_access_engine(&config),
            Arc::new(SampleEnricher::new(Arc::new(metadata))),
            Arc::new(proxy),
        ))
    }
}
