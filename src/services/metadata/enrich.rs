use std::sync::Arc;

use serde_json::{Map, Value};

use crate::api::dto::upload::{SUBMITTER_SAMPLE_ID, UploadPayload};
use crate::error::GatewayError;
use crate::services::metadata::client::SampleMetadataSource;

/// Merges per-sample metadata into a validated upload body.
pub struct SampleEnricher {
    source: Arc<dyn SampleMetadataSource>,
}

impl std::fmt::Debug for SampleEnricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleEnricher").finish_non_exhaustive()
    }
}

impl SampleEnricher {
    pub fn new(source: Arc<dyn SampleMetadataSource>) -> Self {
        Self { source }
    }

    /// One batched lookup for all distinct submitterSampleIds, then an
    /// in-place merge. Any lookup failure fails the whole upload.
    pub async fn enrich(&self, mut payload: UploadPayload) -> Result<UploadPayload, GatewayError> {
        let mut ids = payload.submitter_sample_ids();
        let mut seen = std::collections::HashSet::new();
        ids.retain(|id| seen.insert(id.clone()));

        if ids.is_empty() {
            return Ok(payload);
        }

        let study_id = payload.study_id().to_string();
        let metadata = self.source.lookup(&study_id, &ids).await?;
        tracing::debug!(
            study_id = %study_id,
            requested = ids.len(),
            found = metadata.len(),
            "sample metadata fetched"
        );

        for sample in payload.samples_mut() {
            if let Some(obj) = sample.as_object_mut()
                && let Some(fields) = obj
                    .get(SUBMITTER_SAMPLE_ID)
                    .and_then(Value::as_str)
                    .and_then(|id| metadata.get(id))
            {
                merge_sample(obj, fields);
            }
        }

        Ok(payload)
    }
}

/// Copy `fields` into `sample`. Existing keys are overwritten, except
/// submitterSampleId; nothing is removed.
pub fn merge_sample(sample: &mut Map<String, Value>, fields: &Map<String, Value>) {
    for (key, value) in fields {
        if key == SUBMITTER_SAMPLE_ID {
            continue;
        }
        sample.insert(key.clone(), value.clone());
    }
}
