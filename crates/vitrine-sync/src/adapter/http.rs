//! Adapter for HTTP backends speaking the dataset wire contract.
//!
//! `GET {base}/data` returns the dataset (404 while uninitialized),
//! `POST {base}/data` replaces it, `POST {base}/upload` accepts a multipart
//! `file` field and answers `{"filename": ...}`, and assets are fetched from
//! `{base}/files/{name}`. An optional `x-api-key` header covers the keyed
//! variants; a 401/403 is an auth failure, never a network one.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{AssetLocator, AssetRef, StorageAdapter};
use crate::dataset::Dataset;
use crate::error::StorageError;
use crate::provider::normalize_endpoint;

pub const API_KEY_HEADER: &str = "x-api-key";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct HttpApiAdapter {
    client: reqwest::Client,
    base_url: Url,
    auth_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    filename: String,
}

impl HttpApiAdapter {
    pub fn new(endpoint: &str, auth_key: Option<String>) -> Result<Self, StorageError> {
        let normalized = normalize_endpoint(endpoint)?;
        // A trailing slash keeps Url::join from eating the last path segment.
        let base_url = Url::parse(&format!("{normalized}/"))
            .map_err(|err| StorageError::Validation(format!("invalid endpoint url: {err}")))?;
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url,
            auth_key,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, StorageError> {
        self.base_url
            .join(path)
            .map_err(|err| StorageError::Validation(format!("invalid request path {path}: {err}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.auth_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }
}

/// Map a non-success HTTP status onto the storage taxonomy.
pub(crate) async fn status_error(response: reqwest::Response) -> StorageError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::Auth(if body.is_empty() {
            format!("rejected with status {status}")
        } else {
            body
        }),
        StatusCode::NOT_FOUND => StorageError::NotFound,
        _ => StorageError::Network(format!("unexpected status {status}: {body}")),
    }
}

#[async_trait]
impl StorageAdapter for HttpApiAdapter {
    async fn read_dataset(&self) -> Result<Dataset, StorageError> {
        let response = self
            .request(Method::GET, self.endpoint("data")?)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|err| StorageError::Validation(err.to_string()))
    }

    async fn write_dataset(&self, dataset: &Dataset) -> Result<(), StorageError> {
        let response = self
            .request(Method::POST, self.endpoint("data")?)
            .json(dataset)
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
        _path_hints: &[String],
    ) -> Result<AssetRef, StorageError> {
        // Placement is the server's call on this transport; hints stay local.
        let part = Part::bytes(bytes).file_name(suggested_name.to_string());
        let form = Form::new().part("file", part);
        let response = self
            .request(Method::POST, self.endpoint("upload")?)
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let upload: UploadResponse = response
            .json()
            .await
            .map_err(|err| StorageError::Validation(format!("malformed upload response: {err}")))?;
        Ok(AssetRef::new(upload.filename))
    }

    fn resolve_asset_url(&self, asset: &AssetRef) -> AssetLocator {
        match self.endpoint(&format!("files/{}", asset.name)) {
            Ok(url) => AssetLocator::Url(url.to_string()),
            Err(_) => AssetLocator::Url(format!("{}files/{}", self.base_url, asset.name)),
        }
    }

    async fn probe(&self) -> Result<(), StorageError> {
        let response = self
            .request(Method::GET, self.endpoint("data")?)
            .send()
            .await?;
        match response.status() {
            // An uninitialized dataset still proves the backend is reachable
            // and the key is accepted.
            status if status.is_success() || status == StatusCode::NOT_FOUND => Ok(()),
            _ => Err(status_error(response).await),
        }
    }
}
