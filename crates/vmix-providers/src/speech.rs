//! Gemini streamed text-to-speech client.
//!
//! Audio arrives as server-sent events; each `data:` line is a
//! `GenerateContentResponse` whose first candidate may carry inline base64
//! PCM plus a MIME descriptor like `audio/L16;rate=24000`.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};

/// Stream of decoded response chunks.
pub type SpeechStream = Pin<Box<dyn Stream<Item = ProviderResult<SpeechChunk>> + Send>>;

/// Configuration for the speech client.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// API key; the client reports itself unconfigured when unset
    pub api_key: Option<String>,
    /// API base URL
    pub base_url: String,
    /// TTS model name
    pub model: String,
    /// Prebuilt voice name
    pub voice: String,
    /// Whole-stream timeout
    pub timeout: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash-preview-tts".to_string(),
            voice: "Achernar".to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

impl SpeechConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("GEMINI_TTS_MODEL").unwrap_or(defaults.model),
            voice: std::env::var("GEMINI_TTS_VOICE").unwrap_or(defaults.voice),
            timeout: defaults.timeout,
        }
    }
}

/// Base64 audio payload with its MIME descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineAudio {
    pub data: String,
    #[serde(default)]
    pub mime_type: String,
}

/// One streamed response; chunks may or may not carry audio.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeechChunk {
    pub audio: Option<InlineAudio>,
}

/// Streamed speech synthesis.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Whether credentials are present.
    fn is_configured(&self) -> bool;

    /// Open a synthesis stream for `script`.
    async fn stream_speech(&self, script: &str) -> ProviderResult<SpeechStream>;
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineAudio>,
}

impl From<GenerateContentResponse> for SpeechChunk {
    fn from(response: GenerateContentResponse) -> Self {
        let audio = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|content| content.parts.into_iter().find_map(|p| p.inline_data))
            .filter(|inline| !inline.data.is_empty());
        SpeechChunk { audio }
    }
}

/// Parse one SSE line; non-data lines yield `None`.
fn parse_sse_line(line: &str) -> Option<ProviderResult<SpeechChunk>> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    Some(
        serde_json::from_str::<GenerateContentResponse>(payload)
            .map(SpeechChunk::from)
            .map_err(ProviderError::from),
    )
}

/// Drain complete lines out of `buffer`.
///
/// Bytes are decoded one whole line at a time, so a multi-byte character split
/// across network chunks stays intact.
fn drain_lines(buffer: &mut Vec<u8>, out: &mut VecDeque<ProviderResult<SpeechChunk>>) {
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&line);
        if let Some(item) = parse_sse_line(text.trim_end_matches(['\r', '\n'])) {
            out.push_back(item);
        }
    }
}

struct SseState<S> {
    bytes: Pin<Box<S>>,
    buffer: Vec<u8>,
    pending: VecDeque<ProviderResult<SpeechChunk>>,
    finished: bool,
}

/// Turn an SSE byte stream into speech chunks.
fn sse_chunks<S, B>(bytes: S) -> impl Stream<Item = ProviderResult<SpeechChunk>> + Send
where
    S: Stream<Item = reqwest::Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(chunk.as_ref());
                    drain_lines(&mut state.buffer, &mut state.pending);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    state.pending.push_back(Err(ProviderError::Network(e)));
                }
                None => {
                    state.finished = true;
                    let rest = std::mem::take(&mut state.buffer);
                    if let Some(item) = parse_sse_line(String::from_utf8_lossy(&rest).trim()) {
                        state.pending.push_back(item);
                    }
                }
            }
        }
    })
}

/// Client for Gemini streamed TTS.
pub struct GeminiSpeechClient {
    http: Client,
    config: SpeechConfig,
}

impl GeminiSpeechClient {
    /// Create a new client.
    pub fn new(config: SpeechConfig) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(SpeechConfig::from_env())
    }

    fn request_body(&self, script: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": script }] }],
            "generationConfig": {
                "responseModalities": ["audio"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": self.config.voice }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl SpeechProvider for GeminiSpeechClient {
    fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn stream_speech(&self, script: &str) -> ProviderResult<SpeechStream> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("GEMINI_API_KEY is not set".to_string()))?;

        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        debug!(model = %self.config.model, voice = %self.config.voice, "Opening speech stream");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&self.request_body(script))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Speech synthesis rejected: {} {}", status, body);
            return Err(ProviderError::Rejected(format!(
                "speech returned {}: {}",
                status, body
            )));
        }

        Ok(Box::pin(sse_chunks(response.bytes_stream())))
    }
}
