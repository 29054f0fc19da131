//! Adapter for hosted backend-as-a-service providers.
//!
//! The dataset is a single row keyed by a fixed document id in a REST table
//! (`/rest/v1/{table}` with upsert semantics); assets go into a storage
//! bucket (`/storage/v1/object/{bucket}/{name}`). Provider wire types stay
//! private to this module; nothing provider-specific crosses the adapter
//! boundary.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use super::http::status_error;
use super::{sanitize_file_name, AssetLocator, AssetRef, StorageAdapter};
use crate::dataset::Dataset;
use crate::error::StorageError;
use crate::provider::normalize_endpoint;

/// Fixed primary key of the dataset row; one logical document per backend.
const DATASET_DOCUMENT_ID: &str = "primary";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct HostedBackendAdapter {
    client: reqwest::Client,
    base_url: Url,
    auth_key: String,
    table: String,
    bucket: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct DatasetRow {
    id: String,
    document: serde_json::Value,
}

impl HostedBackendAdapter {
    pub fn new(
        endpoint: &str,
        auth_key: &str,
        table: &str,
        bucket: &str,
    ) -> Result<Self, StorageError> {
        let normalized = normalize_endpoint(endpoint)?;
        let base_url = Url::parse(&format!("{normalized}/"))
            .map_err(|err| StorageError::Validation(format!("invalid endpoint url: {err}")))?;
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url,
            auth_key: auth_key.to_string(),
            table: table.to_string(),
            bucket: bucket.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, StorageError> {
        self.base_url
            .join(path)
            .map_err(|err| StorageError::Validation(format!("invalid request path {path}: {err}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.auth_key)
            .bearer_auth(&self.auth_key)
    }

    fn row_url(&self) -> Result<Url, StorageError> {
        let mut url = self.endpoint(&format!("rest/v1/{}", self.table))?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{DATASET_DOCUMENT_ID}"));
        Ok(url)
    }
}

#[async_trait]
impl StorageAdapter for HostedBackendAdapter {
    async fn read_dataset(&self) -> Result<Dataset, StorageError> {
        let response = self.request(Method::GET, self.row_url()?).send().await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let rows: Vec<DatasetRow> = response
            .json()
            .await
            .map_err(|err| StorageError::Validation(format!("malformed table response: {err}")))?;
        let row = rows.into_iter().next().ok_or(StorageError::NotFound)?;
        serde_json::from_value(row.document)
            .map_err(|err| StorageError::Validation(err.to_string()))
    }

    async fn write_dataset(&self, dataset: &Dataset) -> Result<(), StorageError> {
        let document = serde_json::to_value(dataset)
            .map_err(|err| StorageError::Validation(err.to_string()))?;
        let row = DatasetRow {
            id: DATASET_DOCUMENT_ID.to_string(),
            document,
        };
        let url = self.endpoint(&format!("rest/v1/{}", self.table))?;
        let response = self
            .request(Method::POST, url)
            .header("prefer", "resolution=merge-duplicates")
            .json(&[row])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }

    async fn upload_asset(
        &self,
        bytes: Vec<u8>,
        suggested_name: &str,
        path_hints: &[String],
    ) -> Result<AssetRef, StorageError> {
        let mut segments: Vec<String> = path_hints.iter().map(|h| sanitize_file_name(h)).collect();
        segments.push(sanitize_file_name(suggested_name));
        let object_name = segments.join("/");

        let url = self.endpoint(&format!("storage/v1/object/{}/{object_name}", self.bucket))?;
        let response = self
            .request(Method::POST, url)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(AssetRef::new(object_name))
    }

    fn resolve_asset_url(&self, asset: &AssetRef) -> AssetLocator {
        let path = format!("storage/v1/object/public/{}/{}", self.bucket, asset.name);
        match self.endpoint(&path) {
            Ok(url) => AssetLocator::Url(url.to_string()),
            Err(_) => AssetLocator::Url(format!("{}{path}", self.base_url)),
        }
    }

    async fn probe(&self) -> Result<(), StorageError> {
        // Selecting only the key column keeps the check cheap and read-only.
        let mut url = self.row_url()?;
        url.query_pairs_mut()
            .append_pair("select", "id")
            .append_pair("limit", "1");
        let response = self.request(Method::GET, url).send().await?;
        match response.status() {
            status if status.is_success() || status == StatusCode::NOT_FOUND => Ok(()),
            _ => Err(status_error(response).await),
        }
    }
}
