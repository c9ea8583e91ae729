//! Ad-copy drafting and caption mixing.
//!
//! The copy provider returns caption components (hooks, bodies, CTAs and
//! hashtag sets); full captions are assembled locally by picking one of each.

use rand::seq::IndexedRandom;
use rand::Rng;
use vmix_models::{caption_target, AdCopy, GenerateAdCopyRequest, JobId};
use vmix_providers::{CaptionComponents, CopyBrief, CopyProvider};

use crate::error::{JobFailure, PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::metrics;

const OPERATION: &str = "generate_ad_copy";

/// Assemble `count` captions as `hook\n\nbody\n\ncta\n\nhashtags`.
///
/// Parts are picked independently at random, so captions may repeat.
/// Returns `None` when any component list is empty.
pub fn mix_captions<R: Rng + ?Sized>(
    components: &CaptionComponents,
    count: usize,
    rng: &mut R,
) -> Option<Vec<String>> {
    (0..count)
        .map(|_| {
            let hook = components.hooks.choose(rng)?;
            let body = components.bodies.choose(rng)?;
            let cta = components.ctas.choose(rng)?;
            let tags = components.hashtags.choose(rng)?;
            Some(format!("{}\n\n{}\n\n{}\n\n{}", hook, body, cta, tags))
        })
        .collect()
}

/// Draft voiceover, visual prompts and mixed captions for a product image.
pub async fn generate_ad_copy(
    provider: &dyn CopyProvider,
    request: &GenerateAdCopyRequest,
) -> Result<AdCopy, JobFailure> {
    let logger = JobLogger::new(&JobId::short(), OPERATION);
    logger.log_start(&format!("{} prompts", request.prompt_count));

    match draft_copy(provider, request, &logger).await {
        Ok(copy) => {
            metrics::record_job_completed(OPERATION);
            logger.log_completion(&format!("{} captions mixed", copy.captions.len()));
            Ok(copy)
        }
        Err(e) => {
            let failure = JobFailure::from(e);
            metrics::record_job_failed(OPERATION, failure.kind);
            logger.log_error(failure.kind, &failure.message);
            Err(failure)
        }
    }
}

async fn draft_copy(
    provider: &dyn CopyProvider,
    request: &GenerateAdCopyRequest,
    logger: &JobLogger,
) -> PipelineResult<AdCopy> {
    let prompt_count = request.prompt_count;
    let caption_count = caption_target(prompt_count)
        .ok_or_else(|| PipelineError::validation("Count must be 4, 5, or 6."))?;

    let brief = CopyBrief {
        image_url: &request.image_url,
        prompt_count,
        caption_count,
        product_name: request.product_name.as_deref().unwrap_or_default(),
    };
    let draft = provider
        .draft(brief)
        .await
        .map_err(|e| PipelineError::provider(format!("OpenAI Error: {}", e)))?;

    if draft.video_prompts.len() != prompt_count {
        logger.log_warning(&format!(
            "Asked for {} video prompts, got {}",
            prompt_count,
            draft.video_prompts.len()
        ));
    }

    let captions = mix_captions(&draft.caption_components, caption_count, &mut rand::rng())
        .ok_or_else(|| PipelineError::provider("OpenAI Error: caption components are incomplete"))?;

    Ok(AdCopy {
        voiceover: draft.voiceover,
        video_prompts: draft.video_prompts,
        captions,
        count_setting: prompt_count,
        total_variations: caption_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use vmix_providers::{AdCopyDraft, ProviderError, ProviderResult};

    use crate::error::ErrorKind;

    fn components() -> CaptionComponents {
        CaptionComponents {
            hooks: vec!["H1".into(), "H2".into()],
            bodies: vec!["B1".into()],
            ctas: vec!["C1".into(), "C2".into()],
            hashtags: vec!["#a #b".into()],
        }
    }

    /// Returns a fixed draft and records the brief it was given.
    struct FakeCopy {
        draft: Option<AdCopyDraft>,
        calls: AtomicUsize,
        briefs: Mutex<Vec<(usize, usize, String)>>,
    }

    impl FakeCopy {
        fn new(draft: Option<AdCopyDraft>) -> Self {
            Self {
                draft,
                calls: AtomicUsize::new(0),
                briefs: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CopyProvider for FakeCopy {
        async fn draft(&self, brief: CopyBrief<'_>) -> ProviderResult<AdCopyDraft> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.briefs.lock().unwrap().push((
                brief.prompt_count,
                brief.caption_count,
                brief.product_name.to_string(),
            ));
            self.draft
                .clone()
                .ok_or_else(|| ProviderError::Rejected("401 invalid api key".to_string()))
        }
    }

    fn draft(prompts: usize) -> AdCopyDraft {
        AdCopyDraft {
            voiceover: "Honestly...".to_string(),
            caption_components: components(),
            video_prompts: (0..prompts).map(|i| format!("shot {}", i)).collect(),
        }
    }

    fn request(prompt_count: usize) -> GenerateAdCopyRequest {
        GenerateAdCopyRequest {
            image_url: "https://img.fake/p.png".to_string(),
            prompt_count,
            product_name: Some("Aqua Flask".to_string()),
        }
    }

    #[test]
    fn test_captions_are_built_from_one_of_each_part() {
        let mut rng = StdRng::seed_from_u64(7);
        let captions = mix_captions(&components(), 10, &mut rng).unwrap();
        assert_eq!(captions.len(), 10);

        for caption in &captions {
            let parts: Vec<&str> = caption.split("\n\n").collect();
            assert_eq!(parts.len(), 4, "{:?}", caption);
            assert!(["H1", "H2"].contains(&parts[0]));
            assert_eq!(parts[1], "B1");
            assert!(["C1", "C2"].contains(&parts[2]));
            assert_eq!(parts[3], "#a #b");
        }
    }

    #[test]
    fn test_missing_component_yields_none() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut incomplete = components();
        incomplete.ctas.clear();
        assert!(mix_captions(&incomplete, 5, &mut rng).is_none());
        assert_eq!(mix_captions(&incomplete, 0, &mut rng), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_caption_count_follows_prompt_count() {
        for (prompts, captions) in [(4, 5), (5, 10), (6, 15)] {
            let provider = FakeCopy::new(Some(draft(prompts)));
            let copy = generate_ad_copy(&provider, &request(prompts)).await.unwrap();

            assert_eq!(copy.captions.len(), captions);
            assert_eq!(copy.total_variations, captions);
            assert_eq!(copy.count_setting, prompts);
            assert_eq!(copy.video_prompts.len(), prompts);
            assert_eq!(
                provider.briefs.lock().unwrap()[0],
                (prompts, captions, "Aqua Flask".to_string())
            );
        }
    }

    #[tokio::test]
    async fn test_unsupported_count_makes_no_provider_call() {
        let provider = FakeCopy::new(Some(draft(4)));
        let failure = generate_ad_copy(&provider, &request(7)).await.unwrap_err();

        assert_eq!(failure.kind, ErrorKind::Validation);
        assert_eq!(failure.message, "Count must be 4, 5, or 6.");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_failures_surface_as_provider_kind() {
        let provider = FakeCopy::new(None);
        let failure = generate_ad_copy(&provider, &request(4)).await.unwrap_err();
        assert_eq!(failure.kind, ErrorKind::Provider);
        assert!(failure.message.starts_with("OpenAI Error"));

        let mut empty = draft(4);
        empty.caption_components.hooks.clear();
        let provider = FakeCopy::new(Some(empty));
        let failure = generate_ad_copy(&provider, &request(4)).await.unwrap_err();
        assert_eq!(failure.kind, ErrorKind::Provider);
        assert!(failure.message.contains("incomplete"));
    }
}
