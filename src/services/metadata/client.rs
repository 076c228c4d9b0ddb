//! Sample-metadata service client.
//!
//! One batched lookup per upload:
//! `POST {base}/studies/{study_id}/samples/lookup` with
//! `{"submitterSampleIds": [...]}`, answered by
//! `{"samples": [{"submitterSampleId": "...", ...}]}`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::api::dto::upload::SUBMITTER_SAMPLE_ID;
use crate::error::GatewayError;

/// Metadata fields keyed by submitterSampleId.
pub type SampleMetadata = HashMap<String, Map<String, Value>>;

#[async_trait]
pub trait SampleMetadataSource: Send + Sync {
    /// Look up metadata for the given ids. Ids without a record are absent
    /// from the result.
    async fn lookup(
        &self,
        study_id: &str,
        submitter_sample_ids: &[String],
    ) -> Result<SampleMetadata, GatewayError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    submitter_sample_ids: &'a [String],
}

#[derive(Deserialize)]
struct LookupResponse {
    samples: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone)]
pub struct HttpSampleMetadata {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpSampleMetadata {
    pub fn new(
        base_url: Url,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self { base_url, client })
    }

    fn lookup_url(&self, study_id: &str) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::internal("sample metadata url is not a base url"))?
            .pop_if_empty()
            .extend(["studies", study_id, "samples", "lookup"]);
        Ok(url)
    }
}

#[async_trait]
impl SampleMetadataSource for HttpSampleMetadata {
    async fn lookup(
        &self,
        study_id: &str,
        submitter_sample_ids: &[String],
    ) -> Result<SampleMetadata, GatewayError> {
        let url = self.lookup_url(study_id)?;

        let resp = self
            .client
            .post(url)
            .json(&LookupRequest {
                submitter_sample_ids,
            })
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, timeout = err.is_timeout(), "sample metadata lookup failed");
                GatewayError::service_unavailable("sample metadata service unavailable")
            })?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(%status, "sample metadata service returned an error status");
            return Err(GatewayError::service_unavailable(format!(
                "sample metadata service returned {status}"
            )));
        }

        let bytes = resp.bytes().await.map_err(|err| {
            tracing::warn!(error = %err, "sample metadata response interrupted");
            GatewayError::service_unavailable("sample metadata service unavailable")
        })?;

        parse_lookup_response(&bytes)
    }
}

fn parse_lookup_response(bytes: &[u8]) -> Result<SampleMetadata, GatewayError> {
    let malformed = || GatewayError::internal("malformed sample metadata response");

    let parsed: LookupResponse = serde_json::from_slice(bytes).map_err(|err| {
        tracing::warn!(error = %err, "sample metadata response did not parse");
        malformed()
    })?;

    let mut out = HashMap::with_capacity(parsed.samples.len());
    for record in parsed.samples {
        let id = record
            .get(SUBMITTER_SAMPLE_ID)
            .and_then(Value::as_str)
            .ok_or_else(malformed)?
            .to_string();
        out.insert(id, record);
    }
    Ok(out)
}
