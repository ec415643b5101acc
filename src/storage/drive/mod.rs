pub mod client_builder;

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_channel::Sender;
use async_trait::async_trait;
use google_cloud_token::TokenSource;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;

use crate::config::{ClientConfig, Config};
use crate::query::DriveQuery;
use crate::storage::{Storage, StorageFactory, StorageTrait};
use crate::types::error::GdrmError;
use crate::types::{DeletionStatistics, ObjectPage};

const LIST_FIELDS: &str = "nextPageToken,incompleteSearch,files(id,name,modifiedTime)";

/// Flags that make `files.list` cover shared drives as well as My Drive.
const ALL_DRIVES_LIST_PARAMS: [(&str, &str); 3] = [
    ("supportsAllDrives", "true"),
    ("includeItemsFromAllDrives", "true"),
    ("corpora", "allDrives"),
];

#[derive(Debug, Default, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    error: ApiError,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorItem {
    #[serde(default)]
    reason: String,
}

/// Extracts the Drive error reason and message from an error response body.
///
/// Falls back to the HTTP status text and the raw body when the body is not
/// the usual `{"error": {...}}` document.
fn extract_api_error_details(status: StatusCode, body: &str) -> (String, String) {
    let parsed: ApiErrorResponse = serde_json::from_str(body).unwrap_or_default();

    let reason = parsed
        .error
        .errors
        .first()
        .map(|item| item.reason.clone())
        .filter(|reason| !reason.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());

    let message = if parsed.error.message.is_empty() {
        body.trim().to_string()
    } else {
        parsed.error.message
    };

    (reason, message)
}

/// Factory for creating Drive storage instances.
pub struct DriveStorageFactory;

#[async_trait]
impl StorageFactory for DriveStorageFactory {
    async fn create(
        _config: Config,
        client_config: ClientConfig,
        stats_sender: Sender<DeletionStatistics>,
    ) -> Result<Storage> {
        let http_client = client_config.create_http_client()?;
        let token_source = client_config.create_token_source().await?;

        Ok(Box::new(DriveStorage::new(
            &client_config.api_endpoint,
            http_client,
            token_source,
            stats_sender,
        )))
    }
}

/// Drive v3 storage backed by `reqwest` and a service-account token source.
///
/// Cloning is cheap: the HTTP client and the token source are shared.
#[derive(Clone)]
pub(crate) struct DriveStorage {
    api_endpoint: String,
    http_client: reqwest::Client,
    token_source: Arc<dyn TokenSource>,
    stats_sender: Sender<DeletionStatistics>,
}

impl DriveStorage {
    pub(crate) fn new(
        api_endpoint: &str,
        http_client: reqwest::Client,
        token_source: Arc<dyn TokenSource>,
        stats_sender: Sender<DeletionStatistics>,
    ) -> Self {
        Self {
            api_endpoint: api_endpoint.trim_end_matches('/').to_string(),
            http_client,
            token_source,
            stats_sender,
        }
    }

    async fn authorization(&self) -> Result<String> {
        let token = self
            .token_source
            .token()
            .await
            .map_err(|e| GdrmError::Credential(format!("failed to get access token: {}", e)))?;

        if token.starts_with("Bearer ") {
            Ok(token)
        } else {
            Ok(format!("Bearer {}", token))
        }
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.api_endpoint)
    }

    fn file_url(&self, id: &str) -> String {
        format!("{}/files/{}", self.api_endpoint, urlencoding::encode(id))
    }
}

#[async_trait]
impl StorageTrait for DriveStorage {
    async fn list_objects_page(
        &self,
        query: &DriveQuery,
        page_token: Option<String>,
        page_size: i32,
    ) -> Result<ObjectPage> {
        let authorization = self.authorization().await?;

        let mut request = self
            .http_client
            .get(self.files_url())
            .header(AUTHORIZATION, authorization)
            .query(&[
                ("q", query.as_str()),
                ("pageSize", page_size.to_string().as_str()),
                ("fields", LIST_FIELDS),
            ])
            .query(&ALL_DRIVES_LIST_PARAMS);
        if let Some(page_token) = page_token.as_deref() {
            request = request.query(&[("pageToken", page_token)]);
        }

        let response = request
            .send()
            .await
            .context("reqwest::RequestBuilder::send() failed for files.list.")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (reason, message) = extract_api_error_details(status, &body);
            tracing::error!(
                status = status.as_u16(),
                reason = reason,
                message = message,
                "Drive files.list API call failed: {} ({}).",
                reason,
                message,
            );
            return Err(anyhow!(
                "files.list returned HTTP {}: {} ({})",
                status.as_u16(),
                reason,
                message
            ));
        }

        response
            .json::<ObjectPage>()
            .await
            .context("failed to decode files.list response.")
    }

    async fn delete_object(&self, id: &str) -> Result<()> {
        let authorization = self.authorization().await?;

        let response = self
            .http_client
            .delete(self.file_url(id))
            .header(AUTHORIZATION, authorization)
            .query(&[("supportsAllDrives", "true")])
            .send()
            .await
            .map_err(|e| GdrmError::Delete(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let (reason, message) = extract_api_error_details(status, &body);

        if status == StatusCode::NOT_FOUND {
            tracing::debug!(
                file_id = id,
                reason = reason,
                "Drive files.delete reported the file as not found."
            );
            return Err(GdrmError::NotFoundOnDelete(id.to_string()).into());
        }

        tracing::warn!(
            file_id = id,
            status = status.as_u16(),
            reason = reason,
            message = message,
            "Drive files.delete API call failed for {}: {} ({}).",
            id,
            reason,
            message,
        );
        Err(GdrmError::Delete(format!("HTTP {}: {} ({})", status.as_u16(), reason, message)).into())
    }

    fn get_stats_sender(&self) -> Sender<DeletionStatistics> {
        self.stats_sender.clone()
    }

    async fn send_stats(&self, stats: DeletionStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }
}
