use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use google_cloud_auth::credentials::CredentialsFile;
use google_cloud_token::{TokenSource, TokenSourceProvider};

use crate::config::ClientConfig;
use crate::types::DriveCredentials;
use crate::types::error::GdrmError;

/// Full read/write access is required to delete files.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

impl ClientConfig {
    /// Build the HTTP client shared by every request of a run.
    pub fn create_http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));

        if let Some(timeout) = self.timeout_config.request_timeout_milliseconds {
            builder = builder.timeout(Duration::from_millis(timeout));
        }
        if let Some(timeout) = self.timeout_config.connect_timeout_milliseconds {
            builder = builder.connect_timeout(Duration::from_millis(timeout));
        }

        builder.build().context("reqwest::ClientBuilder::build() failed.")
    }

    /// Load the service-account key and build a token source for the Drive
    /// scope. The key is read once; tokens are refreshed by the source.
    pub async fn create_token_source(&self) -> Result<Arc<dyn TokenSource>> {
        match &self.credential {
            DriveCredentials::ServiceAccountFile(path) => {
                let key_json = tokio::fs::read_to_string(path).await.map_err(|e| {
                    GdrmError::Credential(format!(
                        "failed to read service account key file '{}': {}",
                        path.display(),
                        e
                    ))
                })?;

                let token_source = token_source_from_json(&key_json).await?;
                tracing::debug!(
                    key_file = %path.display(),
                    "Service account credential loaded."
                );

                Ok(token_source)
            }
        }
    }
}

async fn token_source_from_json(key_json: &str) -> Result<Arc<dyn TokenSource>> {
    let creds: CredentialsFile = serde_json::from_str(key_json).map_err(|e| {
        GdrmError::Credential(format!("failed to parse service account JSON: {}", e))
    })?;

    let config = google_cloud_auth::project::Config::default().with_scopes(&[DRIVE_SCOPE]);

    let provider = google_cloud_auth::token::DefaultTokenSourceProvider::new_with_credentials(
        config,
        Box::new(creds),
    )
    .await
    .map_err(|e| {
        GdrmError::Credential(format!(
            "failed to create token source from service account: {}",
            e
        ))
    })?;

    Ok(provider.token_source())
}
