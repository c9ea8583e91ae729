//! Clip generation tasks.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One clip to generate: a prompt paired with a reference image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClipTask {
    /// Position of the prompt in the job (0-based)
    pub index: usize,
    /// Reference image URL
    pub image_url: String,
    /// Visual prompt
    pub prompt: String,
}

impl ClipTask {
    /// Build the task list for a job.
    ///
    /// Clip `i` uses `images[i]` when present and `images[0]` otherwise.
    /// Returns an empty list when no images were supplied.
    pub fn plan(images: &[String], prompts: &[String]) -> Vec<ClipTask> {
        let Some(first) = images.first() else {
            return Vec::new();
        };

        prompts
            .iter()
            .enumerate()
            .map(|(index, prompt)| ClipTask {
                index,
                image_url: images.get(index).unwrap_or(first).clone(),
                prompt: prompt.clone(),
            })
            .collect()
    }
}

/// Settled result of one clip task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClipOutcome {
    /// Provider produced a clip at `url`
    Success { index: usize, url: String },
    /// Provider rejected, failed or timed out
    Failed { index: usize, error: String },
}
