//! Experiment Record - the registry's view of a created experiment

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request sent to the registry to create an experiment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateExperimentRequest {
    /// Experiment name (shared by all runs of the experiment).
    pub name: String,
    /// Name of this particular run.
    pub run_name: String,
    /// Free-form metadata attached to the run.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl CreateExperimentRequest {
    /// Create a request without metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, run_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            run_name: run_name.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Experiment Record represents an experiment run known to the registry.
///
/// The `uuid` is the correlation id threaded through every trial.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExperimentRecord {
    uuid: String,
    name: String,
    run_name: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
}

impl ExperimentRecord {
    /// Create a new record for `request` with the current timestamp.
    #[must_use]
    pub fn new(uuid: impl Into<String>, request: CreateExperimentRequest) -> Self {
        Self::builder(uuid, request).build()
    }

    /// Create a builder for constructing a record with optional fields.
    #[must_use]
    pub fn builder(uuid: impl Into<String>, request: CreateExperimentRequest) -> ExperimentRecordBuilder {
        ExperimentRecordBuilder::new(uuid, request)
    }

    /// Get the experiment uuid.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Get the experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the run name.
    #[must_use]
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Get the run metadata.
    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Builder for `ExperimentRecord`.
#[derive(Debug)]
pub struct ExperimentRecordBuilder {
    uuid: String,
    request: CreateExperimentRequest,
    created_at: DateTime<Utc>,
}

impl ExperimentRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(uuid: impl Into<String>, request: CreateExperimentRequest) -> Self {
        Self {
            uuid: uuid.into(),
            request,
            created_at: Utc::now(),
        }
    }

    /// Set a custom creation timestamp (useful for deserialization/testing).
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Build the `ExperimentRecord`.
    #[must_use]
    pub fn build(self) -> ExperimentRecord {
        ExperimentRecord {
            uuid: self.uuid,
            name: self.request.name,
            run_name: self.request.run_name,
            metadata: self.request.metadata,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experiment_record_new() {
        let record = ExperimentRecord::new("uuid-1", CreateExperimentRequest::new("qa", "run-a"));
        assert_eq!(record.uuid(), "uuid-1");
        assert_eq!(record.name(), "qa");
        assert_eq!(record.run_name(), "run-a");
        assert!(record.metadata().is_empty());
    }

    #[test]
    fn test_experiment_record_builder() {
        let mut metadata = BTreeMap::new();
        metadata.insert("model".to_string(), "gpt-4o".to_string());
        let stamp = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let record = ExperimentRecord::builder(
            "uuid-2",
            CreateExperimentRequest::new("qa", "run-b").with_metadata(metadata.clone()),
        )
        .created_at(stamp)
        .build();

        assert_eq!(record.metadata(), &metadata);
        assert_eq!(record.created_at(), stamp);
    }

    #[test]
    fn test_request_skips_empty_metadata() {
        let json = serde_json::to_value(CreateExperimentRequest::new("qa", "run")).unwrap();
        assert_eq!(json, serde_json::json!({"name": "qa", "run_name": "run"}));
    }
}
