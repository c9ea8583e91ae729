//! Application state.

use std::sync::Arc;

use vmix_media::{FfmpegComposer, HttpDownloader};
use vmix_providers::{CopyProvider, GeminiSpeechClient, OpenAiCopyClient, WaveSpeedClient};
use vmix_storage::{ArtifactStore, S3Store};
use vmix_worker::{LocalMixer, PipelineDeps, ProgressChannel, VariationPipeline, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: VariationPipeline,
    pub mixer: LocalMixer,
    pub store: Arc<dyn ArtifactStore>,
    pub copy: Arc<dyn CopyProvider>,
    pub progress: ProgressChannel,
}

impl AppState {
    /// Build the production collaborators from the environment.
    pub async fn new(
        config: ApiConfig,
        worker_config: WorkerConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let video = WaveSpeedClient::from_env()?;
        if !video.is_configured() {
            tracing::warn!("WAVESPEED_API_KEY not set; clip generation will fail");
        }
        let speech = GeminiSpeechClient::from_env()?;
        let copy = OpenAiCopyClient::from_env()?;
        if !copy.is_configured() {
            tracing::warn!("OPENAI_API_KEY not set; ad-copy drafting will fail");
        }
        let downloader = HttpDownloader::new()?;
        let composer = Arc::new(FfmpegComposer::new(worker_config.ffmpeg_timeout_secs));
        let store: Arc<dyn ArtifactStore> = Arc::new(S3Store::from_env().await?);

        let progress = ProgressChannel::default();
        let pipeline = VariationPipeline::new(PipelineDeps {
            video: Arc::new(video),
            speech: Arc::new(speech),
            downloader: Arc::new(downloader),
            composer: composer.clone(),
            store: Arc::clone(&store),
            progress: progress.clone(),
            config: worker_config.clone(),
        });
        let mixer = LocalMixer::new(composer, progress.clone(), worker_config);

        Ok(Self::from_parts(config, pipeline, mixer, store, Arc::new(copy)))
    }

    /// Assemble state from already-built parts.
    ///
    /// The progress channel is taken from the pipeline so SSE subscribers
    /// see every job's events.
    pub fn from_parts(
        config: ApiConfig,
        pipeline: VariationPipeline,
        mixer: LocalMixer,
        store: Arc<dyn ArtifactStore>,
        copy: Arc<dyn CopyProvider>,
    ) -> Self {
        let progress = pipeline.progress().clone();
        Self {
            config,
            pipeline,
            mixer,
            store,
            copy,
            progress,
        }
    }
}
