//! Clip generation against the hosted video provider.

use std::time::Duration;

use tracing::{debug, error, info};
use vmix_models::{ClipOutcome, ClipTask};
use vmix_providers::{PredictionStatus, ProviderError, VideoProvider};

use crate::error::{PipelineError, PipelineResult};
use crate::progress::ProgressReporter;

/// Poll budget for one clip.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

/// Generate one clip and return its remote URL.
///
/// Submits once, then sleeps and polls until the prediction completes, fails,
/// or the attempt budget runs out. The whole cycle is never retried.
pub async fn generate_clip(
    provider: &dyn VideoProvider,
    task: &ClipTask,
    policy: PollPolicy,
    progress: &ProgressReporter,
) -> PipelineResult<String> {
    let job_id = progress.job_id().clone();
    progress.report(format!("[Clip {}] Starting video generation...", task.index), 12);

    let prediction_id = provider.submit(&task.image_url, &task.prompt).await?;
    progress.report(
        format!("[Clip {}] ID: {} | Processing...", task.index, prediction_id),
        15,
    );

    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;

        match provider.poll(&prediction_id).await? {
            PredictionStatus::Completed(url) => {
                info!(job_id = %job_id, clip = task.index, attempt, "Clip generated");
                progress.report(format!("[Clip {}] Generated!", task.index), 18);
                return Ok(url);
            }
            PredictionStatus::Failed(message) => return Err(PipelineError::provider(message)),
            PredictionStatus::Pending => {
                debug!(job_id = %job_id, clip = task.index, attempt, "Clip still processing");
            }
        }
    }

    Err(ProviderError::Timeout {
        attempts: policy.max_attempts,
    }
    .into())
}

/// Run [`generate_clip`] and settle the result into a [`ClipOutcome`].
pub async fn settle_clip(
    provider: &dyn VideoProvider,
    task: ClipTask,
    policy: PollPolicy,
    progress: ProgressReporter,
) -> ClipOutcome {
    match generate_clip(provider, &task, policy, &progress).await {
        Ok(url) => ClipOutcome::Success {
            index: task.index,
            url,
        },
        Err(e) => {
            error!(job_id = %progress.job_id(), clip = task.index, "Clip generation failed: {}", e);
            ClipOutcome::Failed {
                index: task.index,
                error: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use vmix_models::JobId;
    use vmix_providers::ProviderResult;

    use crate::error::ErrorKind;
    use crate::progress::ProgressChannel;

    /// Provider replaying a fixed poll script.
    struct ScriptedProvider {
        polls: Mutex<Vec<PredictionStatus>>,
        poll_calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(mut polls: Vec<PredictionStatus>) -> Self {
            polls.reverse();
            Self {
                polls: Mutex::new(polls),
                poll_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl VideoProvider for ScriptedProvider {
        async fn submit(&self, _image_url: &str, _prompt: &str) -> ProviderResult<String> {
            Ok("pred-1".to_string())
        }

        async fn poll(&self, _prediction_id: &str) -> ProviderResult<PredictionStatus> {
            self.poll_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .polls
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(PredictionStatus::Pending))
        }
    }

    fn task() -> ClipTask {
        ClipTask {
            index: 2,
            image_url: "https://img/a.png".to_string(),
            prompt: "waves".to_string(),
        }
    }

    fn policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    fn reporter() -> ProgressReporter {
        ProgressChannel::default().reporter(JobId::from("job"))
    }

    #[tokio::test]
    async fn test_completes_after_pending_polls() {
        let provider = ScriptedProvider::new(vec![
            PredictionStatus::Pending,
            PredictionStatus::Pending,
            PredictionStatus::Completed("https://cdn/c.mp4".to_string()),
        ]);
        let progress = reporter();

        let url = generate_clip(&provider, &task(), policy(10), &progress)
            .await
            .unwrap();
        assert_eq!(url, "https://cdn/c.mp4");
        assert_eq!(provider.poll_calls.load(Ordering::SeqCst), 3);
        assert_eq!(progress.current(), 18);
    }

    #[tokio::test]
    async fn test_failed_prediction_surfaces_provider_text() {
        let provider = ScriptedProvider::new(vec![PredictionStatus::Failed("nsfw".to_string())]);
        let err = generate_clip(&provider, &task(), policy(10), &reporter())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(err.to_string(), "nsfw");
    }

    #[tokio::test]
    async fn test_attempt_budget_exhausted() {
        let provider = ScriptedProvider::new(vec![]);
        let err = generate_clip(&provider, &task(), policy(4), &reporter())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(provider.poll_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_settle_never_fails() {
        let provider = ScriptedProvider::new(vec![PredictionStatus::Failed("boom".to_string())]);
        let outcome = settle_clip(&provider, task(), policy(2), reporter()).await;
        assert_eq!(
            outcome,
            ClipOutcome::Failed {
                index: 2,
                error: "boom".to_string()
            }
        );
    }
}
