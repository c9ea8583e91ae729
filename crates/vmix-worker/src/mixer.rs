//! Local stitching of caller-supplied clips.
//!
//! Same composition stages as the generation pipeline, but inputs are local
//! files and results stay on disk in the output directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;
use vmix_media::{remove_if_exists, unique_orderings, MediaComposer};
use vmix_models::{JobId, MAX_VARIATIONS};

use crate::config::WorkerConfig;
use crate::error::{JobFailure, PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::progress::{scaled_percent, ProgressChannel, ProgressReporter};
use crate::workspace::Workspace;

const OPERATION: &str = "mix_local";

/// Minimum number of clips worth mixing.
pub const MIN_MIX_CLIPS: usize = 2;

/// Files produced by one local mix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixResult {
    pub success: bool,
    pub process_id: JobId,
    pub files: Vec<PathBuf>,
}

/// Mixer writing `VARIATION_{processId}_{n}.mp4` files into the output dir.
#[derive(Clone)]
pub struct LocalMixer {
    composer: Arc<dyn MediaComposer>,
    progress: ProgressChannel,
    config: WorkerConfig,
}

impl LocalMixer {
    pub fn new(composer: Arc<dyn MediaComposer>, progress: ProgressChannel, config: WorkerConfig) -> Self {
        Self {
            composer,
            progress,
            config,
        }
    }

    /// Stitch `clip_paths` with `audio_path` into up to `target_variations` distinct orderings.
    ///
    /// The target is clamped to `1..=MAX_VARIATIONS`.
    pub async fn mix_local(
        &self,
        clip_paths: &[PathBuf],
        audio_path: &Path,
        target_variations: usize,
    ) -> Result<MixResult, JobFailure> {
        self.mix_with_id(JobId::short(), clip_paths, audio_path, target_variations)
            .await
    }

    /// Like [`mix_local`](Self::mix_local) with a caller-chosen process id.
    pub async fn mix_with_id(
        &self,
        process_id: JobId,
        clip_paths: &[PathBuf],
        audio_path: &Path,
        target_variations: usize,
    ) -> Result<MixResult, JobFailure> {
        let logger = JobLogger::new(&process_id, OPERATION);
        let reporter = self.progress.reporter(process_id.clone());
        let workspace = Workspace::new(&self.config.temp_dir, process_id.clone());
        let mut written = Vec::new();

        logger.log_start(&format!("{} clips", clip_paths.len()));
        let result = self
            .execute(
                clip_paths,
                audio_path,
                target_variations.clamp(1, MAX_VARIATIONS),
                &workspace,
                &reporter,
                &mut written,
            )
            .await;

        workspace.purge().await;

        match result {
            Ok(()) => {
                reporter.report("Done!", 100);
                metrics::record_job_completed(OPERATION);
                logger.log_completion(&format!("{} variations written", written.len()));
                Ok(MixResult {
                    success: true,
                    process_id,
                    files: written,
                })
            }
            Err(e) => {
                for path in &written {
                    if let Err(remove_err) = remove_if_exists(path).await {
                        warn!(path = ?path, "Failed to remove partial variation: {}", remove_err);
                    }
                }
                let failure = JobFailure::from(e);
                metrics::record_job_failed(OPERATION, failure.kind);
                logger.log_error(failure.kind, &failure.message);
                Err(failure)
            }
        }
    }

    async fn execute(
        &self,
        clip_paths: &[PathBuf],
        audio_path: &Path,
        target: usize,
        workspace: &Workspace,
        reporter: &ProgressReporter,
        written: &mut Vec<PathBuf>,
    ) -> PipelineResult<()> {
        if clip_paths.len() < MIN_MIX_CLIPS {
            return Err(PipelineError::validation(format!(
                "At least {} video clips are required.",
                MIN_MIX_CLIPS
            )));
        }
        if !audio_path.is_file() {
            return Err(PipelineError::validation("An audio file is required."));
        }

        tokio::fs::create_dir_all(&self.config.temp_dir).await?;
        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        reporter.report("Generating unique orderings...", 10);
        let orderings = unique_orderings(clip_paths.len(), target);
        let total = orderings.len();
        reporter.report(format!("Stitching {} variations...", total), 20);

        for (i, ordering) in orderings.iter().enumerate() {
            let ordered: Vec<PathBuf> = ordering.iter().map(|&k| clip_paths[k].clone()).collect();

            let visual = workspace.path_for("vis", i, "mp4");
            self.composer
                .concat_visual(&ordered, &visual)
                .await
                .map_err(|e| PipelineError::composition(e.to_string()))?;

            let output = self.config.output_dir.join(format!(
                "VARIATION_{}_{}.mp4",
                workspace.job_id(),
                i + 1
            ));
            // Tracked before muxing so a half-written file is removed on failure.
            written.push(output.clone());
            self.composer
                .mux_narration(&visual, audio_path, &output)
                .await
                .map_err(|e| PipelineError::composition(e.to_string()))?;

            reporter.report(
                format!("Variation {} done.", i + 1),
                scaled_percent(20, 75, i + 1, total),
            );
        }

        Ok(())
    }
}
