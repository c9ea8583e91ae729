//! Orchestrator entry payloads.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateUrl, ValidationError};

use crate::{JobId, MIN_CLIPS};

/// Input of one variation-generation run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVariationsRequest {
    /// Reference image URLs (at least one)
    #[validate(length(min = 1, message = "At least one image is required."))]
    #[validate(custom(function = "validate_image_urls"))]
    pub images: Vec<String>,

    /// Visual prompts; the 4/5/6 count rule is enforced by the pipeline
    #[validate(length(min = 1, message = "Prompts must not be empty."))]
    pub prompts: Vec<String>,

    /// Narration script
    #[validate(length(min = 1, message = "Script must not be empty."))]
    pub script: String,

    /// Caller-chosen job id used to correlate progress events
    #[validate(length(min = 1, message = "jobId must not be empty."))]
    #[validate(custom(function = "validate_job_id"))]
    pub job_id: String,
}

impl GenerateVariationsRequest {
    pub fn job_id(&self) -> JobId {
        JobId::from_string(self.job_id.clone())
    }
}

#[allow(clippy::ptr_arg)]
fn validate_image_urls(images: &Vec<String>) -> Result<(), ValidationError> {
    if images.iter().all(|url| url.validate_url()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("url");
        err.message = Some("Every image must be a valid URL.".into());
        Err(err)
    }
}

/// Job ids end up in temp and object-key names, so only `[A-Za-z0-9_-]` is allowed.
fn validate_job_id(job_id: &str) -> Result<(), ValidationError> {
    if job_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Ok(())
    } else {
        let mut err = ValidationError::new("job_id");
        err.message = Some("jobId may only contain letters, digits, '-' and '_'.".into());
        Err(err)
    }
}

/// Output of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VariationsResult {
    pub job_id: JobId,
    /// Number of uploaded variations (may be below the table target)
    pub total_variations: usize,
    /// Public URLs, in production order
    pub variations: Vec<String>,
}

impl VariationsResult {
    pub fn new(job_id: JobId, variations: Vec<String>) -> Self {
        Self {
            job_id,
            total_variations: variations.len(),
            variations,
        }
    }
}

fn default_prompt_count() -> usize {
    MIN_CLIPS
}

/// Input of an ad-copy drafting call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateAdCopyRequest {
    /// Product image the copy is written for
    #[validate(url(message = "imageUrl must be a valid URL."))]
    pub image_url: String,

    /// Number of video prompts to draft
    #[serde(default = "default_prompt_count")]
    #[validate(range(min = 4, max = 6, message = "promptCount must be 4, 5, or 6."))]
    pub prompt_count: usize,

    /// Optional product name woven into the copy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}

/// Drafted narration, prompts and mixed captions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdCopy {
    pub voiceover: String,
    pub video_prompts: Vec<String>,
    pub captions: Vec<String>,
    /// Prompt count the copy was drafted for
    pub count_setting: usize,
    /// Number of mixed captions.
    pub total_variations: usize,
}
