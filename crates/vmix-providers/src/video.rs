//! WaveSpeed image-to-video client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};

/// Configuration for the video-generation client.
#[derive(Debug, Clone)]
pub struct VideoGenConfig {
    /// Bearer token; requests fail with `NotConfigured` when unset
    pub api_key: Option<String>,
    /// API base URL
    pub base_url: String,
    /// Model path under `/api/v3/`
    pub model: String,
    /// Clip duration in seconds
    pub duration: u32,
    /// Output resolution
    pub resolution: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retries for transient poll failures
    pub max_retries: u32,
}

impl Default for VideoGenConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.wavespeed.ai".to_string(),
            model: "bytedance/seedance-v1-pro-fast/image-to-video".to_string(),
            duration: 5,
            resolution: "720p".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 2,
        }
    }
}

impl VideoGenConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("WAVESPEED_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: std::env::var("WAVESPEED_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("WAVESPEED_MODEL").unwrap_or(defaults.model),
            duration: std::env::var("VMIX_CLIP_DURATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.duration),
            resolution: std::env::var("VMIX_CLIP_RESOLUTION").unwrap_or(defaults.resolution),
            timeout: defaults.timeout,
            max_retries: defaults.max_retries,
        }
    }
}

/// State of a submitted prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictionStatus {
    /// Still queued or running
    Pending,
    /// Finished; carries the first output URL
    Completed(String),
    /// Provider reported failure
    Failed(String),
}

/// Hosted image-to-video generation.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Submit a generation request and return the prediction id.
    async fn submit(&self, image_url: &str, prompt: &str) -> ProviderResult<String>;

    /// Fetch the current state of a prediction.
    async fn poll(&self, prediction_id: &str) -> ProviderResult<PredictionStatus>;
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    camera_fixed: bool,
    duration: u32,
    image: &'a str,
    prompt: &'a str,
    resolution: &'a str,
    seed: i64,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PredictionData {
    status: Option<String>,
    #[serde(default)]
    outputs: Vec<String>,
    error: Option<String>,
}

impl PredictionData {
    fn into_status(self) -> ProviderResult<PredictionStatus> {
        match self.status.as_deref() {
            Some("completed") => self
                .outputs
                .into_iter()
                .next()
                .map(PredictionStatus::Completed)
                .ok_or_else(|| ProviderError::invalid_response("completed without outputs")),
            Some("failed") => Ok(PredictionStatus::Failed(
                self.error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| "Generation Failed".to_string()),
            )),
            _ => Ok(PredictionStatus::Pending),
        }
    }
}

/// Client for the WaveSpeed REST API.
pub struct WaveSpeedClient {
    http: Client,
    config: VideoGenConfig,
}

impl WaveSpeedClient {
    /// Create a new client.
    pub fn new(config: VideoGenConfig) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(VideoGenConfig::from_env())
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn api_key(&self) -> ProviderResult<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("WAVESPEED_API_KEY is not set".to_string()))
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    async fn poll_once(&self, url: &str, api_key: &str) -> ProviderResult<PredictionStatus> {
        let response = self.http.get(url).bearer_auth(api_key).send().await?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::ServiceUnavailable(format!("poll returned {}", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected(format!("poll returned {}: {}", status, body)));
        }

        let envelope: Envelope<PredictionData> = response.json().await?;
        envelope
            .data
            .ok_or_else(|| ProviderError::invalid_response("poll response without data"))?
            .into_status()
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> ProviderResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = ProviderResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Provider request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl VideoProvider for WaveSpeedClient {
    async fn submit(&self, image_url: &str, prompt: &str) -> ProviderResult<String> {
        let api_key = self.api_key()?;
        let url = format!("{}/api/v3/{}", self.base(), self.config.model);
        debug!("Submitting clip generation to {}", url);

        let body = SubmitRequest {
            camera_fixed: false,
            duration: self.config.duration,
            image: image_url,
            prompt,
            resolution: &self.config.resolution,
            seed: -1,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected(format!(
                "submit returned {}: {}",
                status, body
            )));
        }

        let envelope: Envelope<SubmitData> = response.json().await?;
        envelope
            .data
            .and_then(|d| d.id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::invalid_response("submit response without data.id"))
    }

    async fn poll(&self, prediction_id: &str) -> ProviderResult<PredictionStatus> {
        let api_key = self.api_key()?;
        let url = format!("{}/api/v3/predictions/{}/result", self.base(), prediction_id);

        self.with_retry(|| self.poll_once(&url, api_key)).await
    }
}
