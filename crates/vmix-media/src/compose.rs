//! Variation composition: silent visual concat, then narration mux.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Build the concat command for an ordered list of clips.
///
/// Only the video stream of each clip is kept; the result has no audio track.
pub fn build_concat_command(clips: &[PathBuf], output: &Path) -> MediaResult<FfmpegCommand> {
    if clips.is_empty() {
        return Err(MediaError::invalid_input("concat requires at least one clip"));
    }

    let labels: String = (0..clips.len()).map(|i| format!("[{}:v]", i)).collect();
    let filter = format!("{}concat=n={}:v=1:a=0[v]", labels, clips.len());

    Ok(FfmpegCommand::new(output)
        .inputs(clips)
        .filter_complex(filter)
        .map("[v]"))
}

/// Build the mux command that lays a narration track under a silent visual.
///
/// Video is stream-copied, audio is encoded to AAC.
pub fn build_mux_command(visual: &Path, audio: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .input(visual)
        .input(audio)
        .video_codec("copy")
        .audio_codec("aac")
        .map("0:v:0")
        .map("1:a:0")
}

/// Media composition seam used by the pipeline.
#[async_trait]
pub trait MediaComposer: Send + Sync {
    /// Concatenate the video streams of `clips` in order into `output`.
    async fn concat_visual(&self, clips: &[PathBuf], output: &Path) -> MediaResult<()>;

    /// Combine `visual` with the narration at `audio` into `output`.
    async fn mux_narration(&self, visual: &Path, audio: &Path, output: &Path) -> MediaResult<()>;
}

/// FFmpeg-backed composer.
#[derive(Debug, Clone, Default)]
pub struct FfmpegComposer {
    runner: FfmpegRunner,
}

impl FfmpegComposer {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(timeout_secs),
        }
    }

    async fn run_stage(&self, stage: &'static str, cmd: FfmpegCommand) -> MediaResult<()> {
        let start = Instant::now();
        let result = self.runner.run(&cmd).await;
        let elapsed = start.elapsed().as_secs_f64();

        metrics::histogram!("vmix_ffmpeg_duration_seconds", "stage" => stage).record(elapsed);
        debug!(stage, elapsed_secs = elapsed, ok = result.is_ok(), "FFmpeg stage finished");

        result?;

        if !cmd.output().exists() {
            return Err(MediaError::ffmpeg_failed(
                format!("{} produced no output file", stage),
                None,
                None,
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaComposer for FfmpegComposer {
    async fn concat_visual(&self, clips: &[PathBuf], output: &Path) -> MediaResult<()> {
        for clip in clips {
            if !clip.exists() {
                return Err(MediaError::FileNotFound(clip.clone()));
            }
        }

        info!(clips = clips.len(), output = ?output, "Concatenating visual track");
        let cmd = build_concat_command(clips, output)?;
        self.run_stage("concat", cmd).await
    }

    async fn mux_narration(&self, visual: &Path, audio: &Path, output: &Path) -> MediaResult<()> {
        for input in [visual, audio] {
            if !input.exists() {
                return Err(MediaError::FileNotFound(input.to_path_buf()));
            }
        }

        info!(output = ?output, "Muxing narration");
        self.run_stage("mux", build_mux_command(visual, audio, output))
            .await
    }
}
