/*
 * Responsibility
 * - Upload (POST /submit/{study_id}) body: parse + shape validation
 * - Only two constraints are enforced; unknown fields pass through untouched
 *   - studyId: non-empty string
 *   - samples: array of objects, each with a non-empty string submitterSampleId
 */
use serde_json::Value;

use crate::error::GatewayError;

pub const STUDY_ID: &str = "studyId";
pub const SAMPLES: &str = "samples";
pub const SUBMITTER_SAMPLE_ID: &str = "submitterSampleId";

/// A validated upload body. Holding one means the shape checks passed.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPayload {
    body: Value,
}

impl UploadPayload {
    pub fn parse(bytes: &[u8]) -> Result<Self, GatewayError> {
        let body: Value = serde_json::from_slice(bytes)
            .map_err(|e| GatewayError::bad_request(format!("upload body is not valid JSON: {e}")))?;
        Self::from_value(body)
    }

    pub fn from_value(body: Value) -> Result<Self, GatewayError> {
        validate(&body).map_err(GatewayError::bad_request)?;
        Ok(Self { body })
    }

    pub fn study_id(&self) -> &str {
        self.body
            .get(STUDY_ID)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn submitter_sample_ids(&self) -> Vec<String> {
        self.samples()
            .iter()
            .filter_map(|s| s.get(SUBMITTER_SAMPLE_ID).and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    pub fn samples(&self) -> &[Value] {
        self.body
            .get(SAMPLES)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn samples_mut(&mut self) -> &mut [Value] {
        match self.body.get_mut(SAMPLES).and_then(Value::as_array_mut) {
            Some(samples) => samples.as_mut_slice(),
            None => &mut [],
        }
    }

    pub fn into_value(self) -> Value {
        self.body
    }
}

fn non_empty_str(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

pub fn validate(body: &Value) -> Result<(), String> {
    let obj = body
        .as_object()
        .ok_or_else(|| "upload body must be a JSON object".to_string())?;

    if !non_empty_str(obj.get(STUDY_ID)) {
        return Err(format!("{STUDY_ID} must be a non-empty string"));
    }

    let samples = obj
        .get(SAMPLES)
        .and_then(Value::as_array)
        .ok_or_else(|| format!("{SAMPLES} must be an array"))?;

    for (i, sample) in samples.iter().enumerate() {
        let sample = sample
            .as_object()
            .ok_or_else(|| format!("{SAMPLES}[{i}] must be an object"))?;
        if !non_empty_str(sample.get(SUBMITTER_SAMPLE_ID)) {
            return Err(format!(
                "{SAMPLES}[{i}].{SUBMITTER_SAMPLE_ID} must be a non-empty string"
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_minimal_body_with_extra_fields() {
        let payload = UploadPayload::from_value(json!({
            "studyId": "ABC",
            "analysisType": {"name": "sequencingRead"},
            "samples": [{"submitterSampleId": "S1", "sampleType": "DNA"}]
        }))
        .expect("valid");
        assert_eq!(payload.study_id(), "ABC");
        assert_eq!(payload.submitter_sample_ids(), vec!["S1".to_string()]);
    }

    #[test]
    fn accepts_empty_samples() {
        assert!(validate(&json!({"studyId": "ABC", "samples": []})).is_ok());
    }

    #[test]
    fn rejects_non_object_body() {
        assert_eq!(
            validate(&json!([1, 2])).unwrap_err(),
            "upload body must be a JSON object"
        );
    }

    #[test]
    fn rejects_missing_or_empty_study_id() {
        for body in [
            json!({"samples": []}),
            json!({"studyId": "", "samples": []}),
            json!({"studyId": 7, "samples": []}),
        ] {
            assert_eq!(
                validate(&body).unwrap_err(),
                "studyId must be a non-empty string"
            );
        }
    }

    #[test]
    fn rejects_non_array_samples() {
        assert_eq!(
            validate(&json!({"studyId": "ABC", "samples": {}})).unwrap_err(),
            "samples must be an array"
        );
    }

    #[test]
    fn rejects_sample_without_submitter_id() {
        let body = json!({
            "studyId": "ABC",
            "samples": [{"submitterSampleId": "S1"}, {"sampleType": "DNA"}]
        });
        assert_eq!(
            validate(&body).unwrap_err(),
            "samples[1].submitterSampleId must be a non-empty string"
        );
    }

    #[test]
    fn invalid_json_is_bad_request() {
        let err = UploadPayload::parse(b"{not json").expect_err("invalid");
        assert_eq!(err.kind, crate::error::ErrorKind::BadRequest);
    }
}
