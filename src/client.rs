#![doc = "Syft Space REST client: the reqwest implementation of the core `CatalogApi` contract."]
//
//! # SpaceClient
//!
//! Talks to the `/datasets` and `/endpoints` collections of one Syft Space
//! instance with a bearer token. Status codes are interpreted by the pure
//! classification functions in [`syft_deploy_core::contract`], so conflict and
//! not-found handling is identical for the real client and the mocks.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

use syft_deploy_core::contract::{
    classify_create, classify_delete, is_success_for, CatalogApi, CreateOutcome, CreateStatus,
    Dataset, DeleteOutcome, Endpoint, EndpointPatch, NewDataset, NewEndpoint, Operation,
    PublishRequest, RemoteError,
};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SpaceClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl SpaceClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        tracing::info!(
            base_url = %base_url,
            api_key_set = !api_key.is_empty(),
            "Initialized SpaceClient"
        );
        Ok(SpaceClient {
            http,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorised(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
    }

    /// Sends the request and returns status and body text.
    async fn send(&self, builder: RequestBuilder) -> Result<(u16, String), RemoteError> {
        let response = self.authorised(builder).send().await.map_err(|e| {
            tracing::error!(error = %e, "Request to Syft Space failed");
            RemoteError::Transport(e.to_string())
        })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        tracing::debug!(status, body_len = body.len(), "Syft Space responded");
        Ok((status, body))
    }

    async fn fetch_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, RemoteError> {
        let (status, body) = self.send(self.http.get(self.url(path))).await?;
        if !is_success_for(Operation::List, status) {
            tracing::error!(path, status, "Listing failed");
            return Err(RemoteError::status(status, &body));
        }
        decode(&body)
    }

    async fn fetch_one<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, RemoteError> {
        let request = self.http.get(self.url(path)).timeout(PROBE_TIMEOUT);
        let (status, body) = self.send(request).await?;
        if !is_success_for(Operation::Get, status) {
            tracing::debug!(path, status, "Resource not fetched");
            return Ok(None);
        }
        decode(&body).map(Some)
    }

    async fn create<P, T>(&self, path: &str, payload: &P) -> Result<CreateOutcome<T>, RemoteError>
    where
        P: serde::Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let (status, body) = self.send(self.http.post(self.url(path)).json(payload)).await?;
        match classify_create(status, &body) {
            CreateStatus::Created => decode(&body).map(CreateOutcome::Created),
            CreateStatus::AlreadyExists => {
                tracing::info!(path, status, "Resource already exists");
                Ok(CreateOutcome::AlreadyExists)
            }
            CreateStatus::Failed => {
                tracing::error!(path, status, "Create failed");
                Err(RemoteError::status(status, &body))
            }
        }
    }

    async fn remove(&self, path: &str) -> Result<DeleteOutcome, RemoteError> {
        let (status, body) = self.send(self.http.delete(self.url(path))).await?;
        classify_delete(status, &body)
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, RemoteError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(error = %e, "Failed to decode Syft Space response");
        RemoteError::Decode(e.to_string())
    })
}

#[async_trait]
impl CatalogApi for SpaceClient {
    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    async fn check_connection(&self) -> bool {
        let request = self
            .http
            .get(self.url("datasets/types/"))
            .timeout(PROBE_TIMEOUT);
        match self.send(request).await {
            Ok((status, _)) => {
                tracing::info!(status, "Connection probe answered");
                status == 200
            }
            Err(e) => {
                tracing::warn!(error = %e, "Connection probe failed");
                false
            }
        }
    }

    async fn list_datasets(&self) -> Result<Vec<Dataset>, RemoteError> {
        self.fetch_list("datasets/").await
    }

    async fn get_dataset(&self, name: &str) -> Result<Option<Dataset>, RemoteError> {
        self.fetch_one(&format!("datasets/{name}")).await
    }

    async fn create_dataset(
        &self,
        payload: &NewDataset,
    ) -> Result<CreateOutcome<Dataset>, RemoteError> {
        tracing::info!(dataset = %payload.name, "Creating dataset");
        self.create("datasets/", payload).await
    }

    async fn delete_dataset(&self, name: &str) -> Result<DeleteOutcome, RemoteError> {
        tracing::info!(dataset = name, "Deleting dataset");
        self.remove(&format!("datasets/{name}")).await
    }

    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, RemoteError> {
        self.fetch_list("endpoints/").await
    }

    async fn get_endpoint(&self, slug: &str) -> Result<Option<Endpoint>, RemoteError> {
        self.fetch_one(&format!("endpoints/{slug}")).await
    }

    async fn create_endpoint(
        &self,
        payload: &NewEndpoint,
    ) -> Result<CreateOutcome<Endpoint>, RemoteError> {
        tracing::info!(endpoint = %payload.slug, "Creating endpoint");
        self.create("endpoints/", payload).await
    }

    async fn update_endpoint(&self, slug: &str, patch: &EndpointPatch) -> Result<(), RemoteError> {
        let request = self.http.patch(self.url(&format!("endpoints/{slug}"))).json(patch);
        let (status, body) = self.send(request).await?;
        if is_success_for(Operation::Update, status) {
            tracing::info!(endpoint = slug, "Updated endpoint");
            Ok(())
        } else {
            Err(RemoteError::status(status, &body))
        }
    }

    async fn delete_endpoint(&self, slug: &str) -> Result<DeleteOutcome, RemoteError> {
        tracing::info!(endpoint = slug, "Deleting endpoint");
        self.remove(&format!("endpoints/{slug}")).await
    }

    async fn publish_endpoint(&self, slug: &str) -> Result<(), RemoteError> {
        let request = self
            .http
            .post(self.url(&format!("endpoints/{slug}/publish")))
            .json(&PublishRequest::default());
        let (status, body) = self.send(request).await?;
        if is_success_for(Operation::Publish, status) {
            tracing::info!(endpoint = slug, "Published endpoint");
            Ok(())
        } else {
            Err(RemoteError::status(status, &body))
        }
    }
}
