//! Clients for the hosted AI providers.
//!
//! This crate provides:
//! - [`WaveSpeedClient`]: image-to-video submission and prediction polling
//! - [`GeminiSpeechClient`]: streamed text-to-speech returning raw PCM chunks
//!
//! Both sit behind traits so the pipeline can be exercised with fakes.

pub mod copy;
pub mod error;
pub mod speech;
pub mod video;

pub use copy::{
    AdCopyDraft, CaptionComponents, CopyBrief, CopyConfig, CopyProvider, OpenAiCopyClient,
};
pub use error::{ProviderError, ProviderResult};
pub use speech::{
    GeminiSpeechClient, InlineAudio, SpeechChunk, SpeechConfig, SpeechProvider, SpeechStream,
};
pub use video::{PredictionStatus, VideoGenConfig, VideoProvider, WaveSpeedClient};
