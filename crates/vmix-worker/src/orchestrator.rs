//! Variation pipeline orchestration.
//!
//! One [`VariationPipeline::run`] call drives a job end to end:
//! clips and narration are generated concurrently, clips are downloaded,
//! distinct orderings are stitched and muxed one at a time, and every
//! result is uploaded. Temp files are purged whatever the outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::Instrument;
use vmix_media::{unique_orderings, ClipDownloader, MediaComposer};
use vmix_models::{
    variation_target, ClipOutcome, ClipTask, GenerateVariationsRequest, Job, JobId, JobState,
    VariationsResult,
};
use vmix_providers::{SpeechProvider, VideoProvider};
use vmix_storage::{variation_key, ArtifactStore, VIDEO_CONTENT_TYPE};

use crate::clip_worker::{settle_clip, PollPolicy};
use crate::config::WorkerConfig;
use crate::error::{JobFailure, PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::narration;
use crate::progress::{scaled_percent, ProgressChannel, ProgressReporter};
use crate::workspace::Workspace;

const OPERATION: &str = "generate_variations";

/// External collaborators of the pipeline, built once at startup.
pub struct PipelineDeps {
    pub video: Arc<dyn VideoProvider>,
    pub speech: Arc<dyn SpeechProvider>,
    pub downloader: Arc<dyn ClipDownloader>,
    pub composer: Arc<dyn MediaComposer>,
    pub store: Arc<dyn ArtifactStore>,
    pub progress: ProgressChannel,
    pub config: WorkerConfig,
}

/// Entry point for variation jobs. Cheap to clone.
#[derive(Clone)]
pub struct VariationPipeline {
    deps: Arc<PipelineDeps>,
}

impl VariationPipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        Self {
            deps: Arc::new(deps),
        }
    }

    pub fn progress(&self) -> &ProgressChannel {
        &self.deps.progress
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.deps.config
    }

    /// Run a job described by an API request.
    pub async fn run_request(
        &self,
        request: GenerateVariationsRequest,
    ) -> Result<VariationsResult, JobFailure> {
        let job_id = request.job_id();
        self.run(request.images, request.prompts, request.script, job_id)
            .await
    }

    /// Produce every variation for one job.
    ///
    /// On failure no partial results are returned; the failure keeps the
    /// original stage message and its kind.
    pub async fn run(
        &self,
        images: Vec<String>,
        prompts: Vec<String>,
        script: String,
        job_id: JobId,
    ) -> Result<VariationsResult, JobFailure> {
        let logger = JobLogger::new(&job_id, OPERATION);
        let mut job = Job::new(job_id.clone(), images, prompts, script);
        let workspace = Workspace::new(&self.deps.config.temp_dir, job_id.clone());
        let reporter = self.deps.progress.reporter(job_id.clone());

        logger.log_start(&format!("{} clips", job.clip_count()));

        let result = self
            .execute(&mut job, &workspace, &reporter, &logger)
            .instrument(logger.create_span())
            .await;

        workspace.purge().await;

        match result {
            Ok(urls) => {
                job.variations = urls;
                job.complete();
                reporter.report("Done! Files uploaded.", 100);
                metrics::record_job_completed(OPERATION);
                logger.log_completion(&format!("{} variations uploaded", job.variations.len()));
                Ok(VariationsResult::new(job_id, job.variations))
            }
            Err(e) => {
                let failure = JobFailure::from(e);
                job.fail(failure.message.clone());
                metrics::record_job_failed(OPERATION, failure.kind);
                logger.log_error(failure.kind, &failure.message);
                Err(failure)
            }
        }
    }

    async fn execute(
        &self,
        job: &mut Job,
        workspace: &Workspace,
        reporter: &ProgressReporter,
        logger: &JobLogger,
    ) -> PipelineResult<Vec<String>> {
        let total_clips = job.clip_count();
        let target = variation_target(total_clips)
            .ok_or_else(|| PipelineError::validation("Prompts must be 4, 5, or 6."))?;
        if job.images.is_empty() {
            return Err(PipelineError::validation("At least one image is required."));
        }

        tokio::fs::create_dir_all(workspace.dir()).await?;

        // Generation: every clip worker and the narration run to completion.
        job.transition(JobState::Generating);
        emit(job, reporter, logger, "Generating video & audio...", 10);

        let policy = PollPolicy {
            interval: self.deps.config.poll_interval,
            max_attempts: self.deps.config.max_poll_attempts,
        };
        let clip_futures = ClipTask::plan(&job.images, &job.prompts)
            .into_iter()
            .map(|task| settle_clip(self.deps.video.as_ref(), task, policy, reporter.clone()));
        let narration = narration::synthesize(self.deps.speech.as_ref(), &job.script, workspace);

        let (outcomes, audio) = tokio::join!(join_all(clip_futures), narration);
        let audio_path = audio?;
        let clip_urls = collect_clips(outcomes, total_clips, logger)?;

        // Download, in index order.
        job.transition(JobState::Downloading);
        let mut raw_paths: Vec<PathBuf> = Vec::with_capacity(total_clips);
        for (done, (index, url)) in clip_urls.iter().enumerate() {
            let path = workspace.path_for("raw", *index, "mp4");
            emit(
                job,
                reporter,
                logger,
                &format!("Downloading clip #{}/{}...", index + 1, total_clips),
                scaled_percent(20, 20, done + 1, total_clips),
            );

            let started = Instant::now();
            self.deps
                .downloader
                .download(url, &path)
                .await
                .map_err(|e| PipelineError::download(e.to_string()))?;
            metrics::record_download_duration(started.elapsed().as_secs_f64());
            raw_paths.push(path);
        }

        // Stitch, mux and upload each ordering sequentially.
        let orderings = unique_orderings(total_clips, target);
        if orderings.len() < target {
            logger.log_warning(&format!(
                "Only {} of {} orderings available",
                orderings.len(),
                target
            ));
        }
        job.transition(JobState::Stitching);
        emit(
            job,
            reporter,
            logger,
            &format!("Stitching {} variations...", orderings.len()),
            40,
        );

        let total = orderings.len();
        let mut urls = Vec::with_capacity(total);
        for (i, ordering) in orderings.iter().enumerate() {
            let ordered: Vec<PathBuf> = ordering.iter().map(|&k| raw_paths[k].clone()).collect();

            job.transition(JobState::Stitching);
            let visual = workspace.path_for("vis", i, "mp4");
            self.deps
                .composer
                .concat_visual(&ordered, &visual)
                .await
                .map_err(|e| PipelineError::composition(e.to_string()))?;

            let variation = workspace.path_for("var", i, "mp4");
            self.deps
                .composer
                .mux_narration(&visual, &audio_path, &variation)
                .await
                .map_err(|e| PipelineError::composition(e.to_string()))?;

            job.transition(JobState::Uploading);
            let started = Instant::now();
            let key = variation_key(job.id.as_str(), i + 1);
            let url = self
                .deps
                .store
                .upload_file(&variation, &key, VIDEO_CONTENT_TYPE)
                .await?;
            metrics::record_upload_duration(started.elapsed().as_secs_f64());
            metrics::record_variation_uploaded();
            urls.push(url);

            emit(
                job,
                reporter,
                logger,
                &format!("Uploaded variation {}/{}", i + 1, total),
                scaled_percent(40, 55, i + 1, total),
            );
        }

        Ok(urls)
    }
}

fn emit(job: &mut Job, reporter: &ProgressReporter, logger: &JobLogger, message: &str, percent: u8) {
    let effective = reporter.report(message, percent);
    job.set_progress(effective);
    logger.log_progress(effective, message);
}

/// Successful clip URLs in index order, or a failure if any clip is missing.
fn collect_clips(
    outcomes: Vec<ClipOutcome>,
    expected: usize,
    logger: &JobLogger,
) -> PipelineResult<Vec<(usize, String)>> {
    let mut successes = Vec::with_capacity(expected);
    let mut failed = 0;

    for outcome in outcomes {
        match outcome {
            ClipOutcome::Success { index, url } => successes.push((index, url)),
            ClipOutcome::Failed { index, error } => {
                failed += 1;
                logger.log_warning(&format!("Clip {} failed: {}", index, error));
            }
        }
    }
    metrics::record_clips_generated(successes.len(), failed);

    if successes.len() != expected {
        return Err(PipelineError::PartialGeneration(
            "Failed to generate all clips.".to_string(),
        ));
    }

    successes.sort_by_key(|(index, _)| *index);
    Ok(successes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn logger() -> JobLogger {
        JobLogger::new(&JobId::from("t"), OPERATION)
    }

    #[test]
    fn test_collect_clips_sorts_by_index() {
        let outcomes = vec![
            ClipOutcome::Success { index: 1, url: "b".into() },
            ClipOutcome::Success { index: 0, url: "a".into() },
        ];
        let clips = collect_clips(outcomes, 2, &logger()).unwrap();
        assert_eq!(clips, vec![(0, "a".to_string()), (1, "b".to_string())]);
    }

    #[test]
    fn test_collect_clips_rejects_any_failure() {
        let outcomes = vec![
            ClipOutcome::Success { index: 0, url: "a".into() },
            ClipOutcome::Failed { index: 1, error: "nsfw".into() },
        ];
        let err = collect_clips(outcomes, 2, &logger()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PartialGeneration);
        assert_eq!(err.to_string(), "Failed to generate all clips.");
    }
}
