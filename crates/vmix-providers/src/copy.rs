//! OpenAI chat-completions client drafting ad copy from a product image.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};

/// Configuration for the copywriting client.
#[derive(Debug, Clone)]
pub struct CopyConfig {
    /// Bearer token; requests fail with `NotConfigured` when unset
    pub api_key: Option<String>,
    /// API base URL
    pub base_url: String,
    /// Vision-capable chat model
    pub model: String,
    /// Language the voiceover and captions are written in
    pub language: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retries for transient failures
    pub max_retries: u32,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o".to_string(),
            language: "Indonesian".to_string(),
            timeout: Duration::from_secs(120),
            max_retries: 2,
        }
    }
}

impl CopyConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("OPENAI_MODEL").unwrap_or(defaults.model),
            language: std::env::var("VMIX_COPY_LANGUAGE").unwrap_or(defaults.language),
            timeout: defaults.timeout,
            max_retries: defaults.max_retries,
        }
    }
}

/// Building blocks the caption mixer combines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionComponents {
    #[serde(default)]
    pub hooks: Vec<String>,
    #[serde(default)]
    pub bodies: Vec<String>,
    #[serde(default)]
    pub ctas: Vec<String>,
    /// Each entry is a whole hashtag set
    #[serde(default)]
    pub hashtags: Vec<String>,
}

/// Model output for one product image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdCopyDraft {
    #[serde(default)]
    pub voiceover: String,
    #[serde(default)]
    pub caption_components: CaptionComponents,
    #[serde(default)]
    pub video_prompts: Vec<String>,
}

/// What to draft.
#[derive(Debug, Clone, Copy)]
pub struct CopyBrief<'a> {
    pub image_url: &'a str,
    /// Visual prompts wanted, one per clip
    pub prompt_count: usize,
    /// Captions the components must be able to fill
    pub caption_count: usize,
    pub product_name: &'a str,
}

/// Hosted copywriting.
#[async_trait]
pub trait CopyProvider: Send + Sync {
    /// Draft a voiceover, visual prompts and caption components for a product image.
    async fn draft(&self, brief: CopyBrief<'_>) -> ProviderResult<AdCopyDraft>;
}

/// Spoken length hint for a given clip count.
fn duration_hint(prompt_count: usize) -> &'static str {
    match prompt_count {
        0..=4 => "about 20 seconds (40-45 words)",
        5 => "about 25 seconds (40-45 words)",
        _ => "about 30 seconds (45-50 words)",
    }
}

fn instructions(brief: &CopyBrief<'_>, language: &str) -> String {
    format!(
        r#"Analyze this product image. The product is named "{product}".

Return one JSON object with the material for {captions} short-video variations:

1. "voiceover": a tight voiceover script in {language}, {duration}, told like an honest review to a friend, ending with a call to check the shopping cart.
2. "captionComponents": caption parts in {language}:
   - "hooks": 15 curiosity-driven headlines or questions
   - "bodies": 10 body texts on the product's strengths, each from a different angle (looks, function, price)
   - "ctas": 5 short calls to action
   - "hashtags": 5 hashtag sets of 4-5 relevant tags each, one string per set
3. "videoPrompts": exactly {prompts} distinct English visual prompts, each with a different camera move (close up, pan, zoom), focused on aesthetics.

Respond with JSON only:
{{"voiceover": "...", "captionComponents": {{"hooks": [], "bodies": [], "ctas": [], "hashtags": []}}, "videoPrompts": []}}"#,
        product = brief.product_name,
        captions = brief.caption_count,
        language = language,
        duration = duration_hint(brief.prompt_count),
        prompts = brief.prompt_count,
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: String },
    ImageUrl { image_url: ImageRef<'a> },
}

#[derive(Debug, Serialize)]
struct ImageRef<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for the OpenAI chat-completions API.
pub struct OpenAiCopyClient {
    http: Client,
    config: CopyConfig,
}

impl OpenAiCopyClient {
    /// Create a new client.
    pub fn new(config: CopyConfig) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(CopyConfig::from_env())
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn complete_once(
        &self,
        url: &str,
        api_key: &str,
        body: &ChatRequest<'_>,
    ) -> ProviderResult<AdCopyDraft> {
        let response = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::ServiceUnavailable(format!(
                "chat completion returned {}",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected(format!(
                "chat completion returned {}: {}",
                status, body
            )));
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::invalid_response("chat completion without content"))?;

        Ok(serde_json::from_str(&content)?)
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
                        "Copy request failed (attempt {}), retrying in {:?}: {}",
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
impl CopyProvider for OpenAiCopyClient {
    async fn draft(&self, brief: CopyBrief<'_>) -> ProviderResult<AdCopyDraft> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("OPENAI_API_KEY is not set".to_string()))?;
        let url = format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!(
            model = %self.config.model,
            prompts = brief.prompt_count,
            captions = brief.caption_count,
            "Requesting ad copy"
        );

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: instructions(&brief, &self.config.language),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageRef {
                            url: brief.image_url,
                        },
                    },
                ],
            }],
            response_format: ResponseFormat { kind: "json_object" },
        };

        self.with_retry(|| self.complete_once(&url, api_key, &body))
            .await
    }
}
