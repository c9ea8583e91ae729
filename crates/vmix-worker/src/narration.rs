//! Narration synthesis.

use std::path::PathBuf;

use futures::StreamExt;
use tracing::{debug, info};
use vmix_media::decode_to_wav;
use vmix_providers::SpeechProvider;

use crate::error::{PipelineError, PipelineResult};
use crate::workspace::Workspace;

/// Synthesize `script` into a WAV file inside the workspace.
///
/// Consumes the provider stream only up to the first chunk carrying audio.
pub async fn synthesize(
    speech: &dyn SpeechProvider,
    script: &str,
    workspace: &Workspace,
) -> PipelineResult<PathBuf> {
    if !speech.is_configured() {
        return Err(PipelineError::synthesis("Speech provider is not configured"));
    }

    let mut stream = speech
        .stream_speech(script)
        .await
        .map_err(|e| PipelineError::synthesis(e.to_string()))?;

    let mut chunks_seen = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| PipelineError::synthesis(e.to_string()))?;
        chunks_seen += 1;

        let Some(audio) = chunk.audio else {
            continue;
        };

        debug!(mime_type = %audio.mime_type, "Narration audio received");
        let wav = decode_to_wav(&audio.data, &audio.mime_type)
            .map_err(|e| PipelineError::synthesis(e.to_string()))?;

        let path = workspace.path_for("audio", 0, "wav");
        tokio::fs::write(&path, &wav).await?;

        info!(job_id = %workspace.job_id(), bytes = wav.len(), "Narration written");
        return Ok(path);
    }

    debug!(chunks_seen, "Speech stream ended without audio");
    Err(PipelineError::synthesis(
        "Speech stream finished without audio data.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::Engine;
    use futures::stream;
    use vmix_media::WAV_HEADER_LEN;
    use vmix_models::JobId;
    use vmix_providers::{InlineAudio, ProviderResult, SpeechChunk, SpeechStream};

    use crate::error::ErrorKind;

    struct FixedSpeech {
        configured: bool,
        chunks: Vec<SpeechChunk>,
    }

    #[async_trait]
    impl SpeechProvider for FixedSpeech {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn stream_speech(&self, _script: &str) -> ProviderResult<SpeechStream> {
            let items: Vec<ProviderResult<SpeechChunk>> =
                self.chunks.iter().cloned().map(Ok).collect();
            Ok(Box::pin(stream::iter(items)))
        }
    }

    fn audio_chunk(pcm: &[u8]) -> SpeechChunk {
        SpeechChunk {
            audio: Some(InlineAudio {
                data: base64::engine::general_purpose::STANDARD.encode(pcm),
                mime_type: "audio/L16;rate=24000".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn test_first_audio_chunk_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), JobId::from("j1"));
        let speech = FixedSpeech {
            configured: true,
            chunks: vec![SpeechChunk::default(), audio_chunk(&[1, 2, 3, 4]), audio_chunk(&[9; 64])],
        };

        let path = synthesize(&speech, "hello", &ws).await.unwrap();
        assert_eq!(path, dir.path().join("audio_j1_0.wav"));
        assert!(ws.registered().contains(&path));

        let bytes = tokio::fs::read(&path).await.unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[WAV_HEADER_LEN..], &[1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_stream_without_audio_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), JobId::from("j2"));
        let speech = FixedSpeech {
            configured: true,
            chunks: vec![SpeechChunk::default(), SpeechChunk::default()],
        };

        let err = synthesize(&speech, "hello", &ws).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Synthesis);
        assert!(err.to_string().contains("without audio"));
        assert!(ws.registered().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), JobId::from("j3"));
        let speech = FixedSpeech {
            configured: false,
            chunks: vec![audio_chunk(&[1])],
        };

        let err = synthesize(&speech, "hello", &ws).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Synthesis);
    }
}
