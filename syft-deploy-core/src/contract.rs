//! # contract: interface between the command handlers and the outside world
//!
//! This module defines the two seams the bulk commands talk through:
//!
//! - [`CatalogApi`]: dataset and endpoint collections of a Syft Space instance.
//! - [`DescriptionGenerator`]: a chat-completion service that writes dataset descriptions.
//!
//! Both traits are async and return [`RemoteError`]. The real implementations live in the
//! `syft-deploy` crate (reqwest clients); tests use the `mockall` mocks exported here.
//!
//! The HTTP status rules shared by every implementation are plain functions
//! ([`classify_create`], [`classify_delete`], [`is_success_for`]) so they can be tested
//! without a server.

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum number of characters of a response body kept in error messages.
pub const ERROR_BODY_LIMIT: usize = 200;

/// Identifier of a remote resource. The API returns integers on some
/// deployments and UUID strings on others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Int(i64),
    Text(String),
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Int(id) => write!(f, "{id}"),
            ResourceId::Text(id) => f.write_str(id),
        }
    }
}

/// Reads `null` as the type's default, so one sparse record cannot fail a whole listing.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A dataset record as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub id: Option<ResourceId>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub dtype: Option<String>,
    pub summary: Option<String>,
    pub tags: Option<String>,
}

/// The dataset an endpoint is bound to, embedded in endpoint records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetRef {
    pub id: Option<ResourceId>,
    pub name: Option<String>,
}

/// An endpoint record as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    pub id: Option<ResourceId>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(deserialize_with = "null_as_default")]
    pub published: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub published_to: Vec<serde_json::Value>,
    pub response_type: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub tags: String,
    pub dataset: Option<DatasetRef>,
    pub dataset_id: Option<ResourceId>,
    pub model: Option<serde_json::Value>,
}

impl Endpoint {
    /// An endpoint needs publishing until it is both flagged published and
    /// synced to at least one marketplace.
    pub fn needs_publish(&self) -> bool {
        !self.published || self.published_to.is_empty()
    }

    pub fn bound_dataset_id(&self) -> Option<&ResourceId> {
        self.dataset
            .as_ref()
            .and_then(|d| d.id.as_ref())
            .or(self.dataset_id.as_ref())
    }
}

/// One directory the platform should ingest for a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePath {
    pub path: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetConfiguration {
    pub file_paths: Vec<FilePath>,
    pub ingest_file_type_options: Vec<String>,
}

/// Payload for `POST /datasets/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDataset {
    pub name: String,
    pub dtype: String,
    pub configuration: DatasetConfiguration,
    pub summary: String,
    pub tags: String,
}

impl NewDataset {
    /// A `local_file` dataset pointing at a single directory inside the platform container.
    pub fn local_file(
        name: impl Into<String>,
        path: impl Into<String>,
        path_description: impl Into<String>,
        file_types: Vec<String>,
        summary: impl Into<String>,
        tags: impl Into<String>,
    ) -> Self {
        NewDataset {
            name: name.into(),
            dtype: "local_file".to_string(),
            configuration: DatasetConfiguration {
                file_paths: vec![FilePath {
                    path: path.into(),
                    description: path_description.into(),
                }],
                ingest_file_type_options: file_types,
            },
            summary: summary.into(),
            tags: tags.into(),
        }
    }
}

/// Payload for `POST /endpoints/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEndpoint {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub summary: String,
    pub response_type: String,
    /// Left out when the endpoint is published by a separate call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    pub tags: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<ResourceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<serde_json::Value>,
}

/// Payload for `PATCH /endpoints/{slug}`. Absent fields are left untouched remotely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Body sent to `POST /endpoints/{slug}/publish`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub publish_to_all_marketplaces: bool,
}

impl Default for PublishRequest {
    fn default() -> Self {
        PublishRequest {
            publish_to_all_marketplaces: true,
        }
    }
}

/// Result of a create call. A conflict is not an error: the resource is already there.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome<T> {
    Created(T),
    AlreadyExists,
}

/// Result of a delete call. A missing resource counts as deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Failure talking to a remote API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("{status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Builds a status error, keeping only the head of the body.
    pub fn status(status: u16, body: &str) -> Self {
        RemoteError::Status {
            status,
            body: truncate_chars(body, ERROR_BODY_LIMIT),
        }
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// What a create response means, before the body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateStatus {
    Created,
    AlreadyExists,
    Failed,
}

/// 201 is a fresh resource; 409, or any body saying "already exists", is a conflict.
pub fn classify_create(status: u16, body: &str) -> CreateStatus {
    if status == 201 {
        CreateStatus::Created
    } else if status == 409 || body.to_lowercase().contains("already exists") {
        CreateStatus::AlreadyExists
    } else {
        CreateStatus::Failed
    }
}

/// 200/204 delete the resource, 404 means it was already gone.
pub fn classify_delete(status: u16, body: &str) -> Result<DeleteOutcome, RemoteError> {
    match status {
        200 | 204 => Ok(DeleteOutcome::Deleted),
        404 => Ok(DeleteOutcome::NotFound),
        other => Err(RemoteError::status(other, body)),
    }
}

/// Remote operations whose success codes differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Get,
    Update,
    Publish,
}

pub fn is_success_for(op: Operation, status: u16) -> bool {
    match op {
        Operation::List => (200..300).contains(&status),
        Operation::Get | Operation::Update => status == 200,
        Operation::Publish => status == 200 || status == 201,
    }
}

/// Dataset and endpoint collections of one Syft Space instance.
///
/// Implemented by the reqwest client in the CLI crate and by `MockCatalogApi` in tests.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Base URL the client talks to, for display.
    fn base_url(&self) -> String;

    /// True when the API answers the dataset-types probe with 200.
    async fn check_connection(&self) -> bool;

    async fn list_datasets(&self) -> Result<Vec<Dataset>, RemoteError>;

    /// `None` when the dataset cannot be fetched (any non-200 answer).
    async fn get_dataset(&self, name: &str) -> Result<Option<Dataset>, RemoteError>;

    async fn create_dataset(
        &self,
        payload: &NewDataset,
    ) -> Result<CreateOutcome<Dataset>, RemoteError>;

    async fn delete_dataset(&self, name: &str) -> Result<DeleteOutcome, RemoteError>;

    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, RemoteError>;

    async fn get_endpoint(&self, slug: &str) -> Result<Option<Endpoint>, RemoteError>;

    async fn create_endpoint(
        &self,
        payload: &NewEndpoint,
    ) -> Result<CreateOutcome<Endpoint>, RemoteError>;

    async fn update_endpoint(&self, slug: &str, patch: &EndpointPatch)
        -> Result<(), RemoteError>;

    async fn delete_endpoint(&self, slug: &str) -> Result<DeleteOutcome, RemoteError>;

    /// Publishes to every marketplace the instance is connected to.
    async fn publish_endpoint(&self, slug: &str) -> Result<(), RemoteError>;
}

/// A single chat-completion request for a dataset description.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptionRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Writes free-text descriptions from a prompt.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DescriptionGenerator: Send + Sync {
    async fn generate(&self, request: &DescriptionRequest) -> Result<String, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_status_follows_conflict_rules() {
        assert_eq!(classify_create(201, "{}"), CreateStatus::Created);
        assert_eq!(classify_create(409, ""), CreateStatus::AlreadyExists);
        assert_eq!(
            classify_create(400, "Dataset 'x' Already Exists"),
            CreateStatus::AlreadyExists
        );
        assert_eq!(classify_create(500, "boom"), CreateStatus::Failed);
        assert_eq!(classify_create(200, "{}"), CreateStatus::Failed);
    }

    #[test]
    fn delete_treats_missing_as_done() {
        assert_eq!(classify_delete(204, ""), Ok(DeleteOutcome::Deleted));
        assert_eq!(classify_delete(200, ""), Ok(DeleteOutcome::Deleted));
        assert_eq!(classify_delete(404, ""), Ok(DeleteOutcome::NotFound));
        assert!(matches!(
            classify_delete(403, "forbidden"),
            Err(RemoteError::Status { status: 403, .. })
        ));
    }

    #[test]
    fn publish_accepts_200_and_201() {
        assert!(is_success_for(Operation::Publish, 200));
        assert!(is_success_for(Operation::Publish, 201));
        assert!(!is_success_for(Operation::Publish, 204));
        assert!(!is_success_for(Operation::Update, 204));
    }

    #[test]
    fn status_error_truncates_body() {
        let body = "x".repeat(500);
        let err = RemoteError::status(502, &body);
        assert_eq!(err.to_string(), format!("502: {}", "x".repeat(200)));
    }

    #[test]
    fn new_dataset_serializes_camel_case_configuration() {
        let payload = NewDataset::local_file(
            "acta-oa",
            "/root/datasets/acta",
            "acta",
            vec![".pdf".into()],
            "Acta",
            "journal",
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["dtype"], "local_file");
        assert_eq!(
            json["configuration"]["filePaths"][0]["path"],
            "/root/datasets/acta"
        );
        assert_eq!(json["configuration"]["ingestFileTypeOptions"][0], ".pdf");
    }

    #[test]
    fn endpoint_payload_omits_absent_dataset_id() {
        let payload = NewEndpoint {
            name: "a".into(),
            slug: "a".into(),
            description: String::new(),
            summary: String::new(),
            response_type: "both".into(),
            published: None,
            tags: String::new(),
            dataset_id: None,
            model: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("published").is_none());
        assert!(json.get("dataset_id").is_none());
        assert!(json.get("model").is_none());
    }

    #[test]
    fn endpoint_record_tolerates_sparse_json() {
        let ep: Endpoint = serde_json::from_str(
            r#"{"slug": "acta-oa", "name": "Acta OA", "dataset": {"id": "d-1"}, "extra": 1}"#,
        )
        .unwrap();
        assert!(ep.needs_publish());
        assert_eq!(
            ep.bound_dataset_id(),
            Some(&ResourceId::Text("d-1".to_string()))
        );
    }

    #[test]
    fn endpoint_listing_reads_nulls_as_defaults() {
        let endpoints: Vec<Endpoint> = serde_json::from_str(
            r#"[{"slug": "acta-oa", "name": "Acta OA", "summary": null, "tags": null,
                 "description": null, "published": true, "published_to": null},
                {"slug": "lex-oa", "name": null, "published": null}]"#,
        )
        .unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].summary, "");
        assert_eq!(endpoints[0].tags, "");
        assert!(endpoints[0].published);
        assert!(endpoints[0].needs_publish());
        assert_eq!(endpoints[1].name, "");
        assert!(!endpoints[1].published);

        let datasets: Vec<Dataset> =
            serde_json::from_str(r#"[{"name": null, "summary": null}]"#).unwrap();
        assert_eq!(datasets[0].name, "");
    }

    #[test]
    fn published_endpoint_without_marketplace_still_needs_publish() {
        let mut ep = Endpoint {
            published: true,
            ..Default::default()
        };
        assert!(ep.needs_publish());
        ep.published_to = vec![serde_json::json!({"marketplace": "default"})];
        assert!(!ep.needs_publish());
    }
}
