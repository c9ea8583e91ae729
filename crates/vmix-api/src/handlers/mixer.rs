//! Local video mixer handler.

use std::path::PathBuf;

use axum::extract::{Multipart, State};
use axum::Json;
use tracing::info;
use vmix_models::{JobId, MAX_VARIATIONS};
use vmix_worker::{MixResult, Workspace};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Most clips accepted by one mix request.
pub const MAX_MIX_CLIPS: usize = 6;

/// Stitch uploaded clips (`clips`) with an uploaded narration (`audio`).
///
/// `variations` defaults to 1 and is capped at `MAX_VARIATIONS`.
/// Uploads are staged in the temp dir and removed once the mix returns;
/// the variations themselves stay in the output dir.
pub async fn video_mixer(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<MixResult>> {
    let staging = Workspace::new(&state.pipeline.config().temp_dir, JobId::short());
    tokio::fs::create_dir_all(staging.dir())
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let mut clips: Vec<PathBuf> = Vec::new();
    let mut audio: Option<PathBuf> = None;
    let mut variations: usize = 1;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("clips") => {
                if clips.len() == MAX_MIX_CLIPS {
                    return Err(ApiError::bad_request(format!(
                        "At most {} clips can be mixed at once.",
                        MAX_MIX_CLIPS
                    )));
                }
                let ext = extension_of(field.file_name(), "mp4");
                let path = staging.path_for("upload_clip", clips.len(), &ext);
                let bytes = field.bytes().await?;
                write_upload(&path, &bytes).await?;
                clips.push(path);
            }
            Some("audio") => {
                if audio.is_some() {
                    return Err(ApiError::bad_request("Only one audio file is allowed."));
                }
                let ext = extension_of(field.file_name(), "mp3");
                let path = staging.path_for("upload_audio", 0, &ext);
                let bytes = field.bytes().await?;
                write_upload(&path, &bytes).await?;
                audio = Some(path);
            }
            Some("variations") => {
                let text = field.text().await?;
                variations = text.trim().parse::<usize>().unwrap_or(1).min(MAX_VARIATIONS);
            }
            _ => {}
        }
    }

    info!(
        staging_id = %staging.job_id(),
        clips = clips.len(),
        variations,
        "Local mix requested"
    );

    let audio = audio.unwrap_or_else(|| staging.dir().join("missing-audio"));
    let result = state.mixer.mix_local(&clips, &audio, variations).await;
    staging.purge().await;

    Ok(Json(result?))
}

fn extension_of(file_name: Option<&str>, fallback: &str) -> String {
    file_name
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| fallback.to_string())
}

async fn write_upload(path: &std::path::Path, bytes: &[u8]) -> ApiResult<()> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to stage upload: {}", e)))
}
