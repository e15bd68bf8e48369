// # Instance Metadata Identity
//
// Reads the instance id and availability zone from the instance metadata
// service. A session token (IMDSv2) is requested first; when the token
// endpoint is unavailable the reads go out without one, as IMDSv1 clients do.

use async_trait::async_trait;
use enibind_core::traits::InstanceIdentityProvider;
use enibind_core::types::InstanceMetadata;
use enibind_core::{Error, Result};
use std::time::Duration;

/// Link-local metadata endpoint
pub const DEFAULT_IMDS_BASE_URL: &str = "http://169.254.169.254";

const TOKEN_PATH: &str = "/latest/api/token";
const INSTANCE_ID_PATH: &str = "/latest/meta-data/instance-id";
const AVAILABILITY_ZONE_PATH: &str = "/latest/meta-data/placement/availability-zone";

const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";
const TOKEN_TTL_SECS: u32 = 21_600;

/// Identity provider backed by the instance metadata service
pub struct ImdsIdentityProvider {
    base_url: String,
    client: reqwest::Client,
}

impl ImdsIdentityProvider {
    /// Provider for the standard link-local endpoint
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_IMDS_BASE_URL)
    }

    /// Provider for a custom endpoint (metadata proxies, local emulators)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_default(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request a session token; `None` means fall back to tokenless reads
    async fn session_token(&self) -> Option<String> {
        let response = self
            .client
            .put(self.url(TOKEN_PATH))
            .header(TOKEN_TTL_HEADER, TOKEN_TTL_SECS.to_string())
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(token) if !token.trim().is_empty() => Some(token.trim().to_string()),
                _ => None,
            },
            Ok(response) => {
                tracing::debug!(status = %response.status(), "Metadata token unavailable, reading without one");
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "Metadata token request failed, reading without one");
                None
            }
        }
    }

    async fn read(&self, path: &str, token: Option<&str>) -> Result<String> {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::identity(format!("Metadata request for {} failed: {}", path, e)))?;

        if !response.status().is_success() {
            return Err(Error::identity(format!(
                "Metadata request for {} returned {}",
                path,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::identity(format!("Failed to read metadata {}: {}", path, e)))?;

        metadata_value(path, &body)
    }
}

impl Default for ImdsIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-line metadata value, trimmed; empty is an error
pub fn metadata_value(path: &str, body: &str) -> Result<String> {
    let value = body.lines().next().unwrap_or_default().trim();
    if value.is_empty() {
        return Err(Error::identity(format!("Metadata {} is empty", path)));
    }
    Ok(value.to_string())
}

#[async_trait]
impl InstanceIdentityProvider for ImdsIdentityProvider {
    async fn metadata(&self) -> Result<InstanceMetadata> {
        let token = self.session_token().await;

        let instance_id = self.read(INSTANCE_ID_PATH, token.as_deref()).await?;
        let availability_zone = self.read(AVAILABILITY_ZONE_PATH, token.as_deref()).await?;

        tracing::debug!(%instance_id, %availability_zone, "Read instance metadata");
        Ok(InstanceMetadata::new(instance_id, availability_zone))
    }
}
