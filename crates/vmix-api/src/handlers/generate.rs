//! Variation generation, ad copy, progress and reference-image upload handlers.

use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::{Stream, StreamExt};
use serde::Serialize;
use tracing::info;
use validator::Validate;
use vmix_models::{
    AdCopy, GenerateAdCopyRequest, GenerateVariationsRequest, JobId, VariationsResult,
};
use vmix_worker::{generate_ad_copy, upload_images, ImageFile, ImageUploadResult};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Success envelope: `{statusCode, message, data}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status_code: 200,
            message: "Success".to_string(),
            data,
        }
    }
}

/// Run a variation job to completion and return the uploaded URLs.
pub async fn generate_video(
    State(state): State<AppState>,
    payload: Result<Json<GenerateVariationsRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<VariationsResult>>> {
    let Json(request) = payload?;
    request.validate()?;

    info!(
        job_id = %request.job_id,
        clips = request.prompts.len(),
        "Generation requested"
    );

    let result = state.pipeline.run_request(request).await?;
    Ok(Json(ApiResponse::success(result)))
}

/// Draft voiceover, visual prompts and captions for a product image.
pub async fn generate_text(
    State(state): State<AppState>,
    payload: Result<Json<GenerateAdCopyRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<AdCopy>>> {
    let Json(request) = payload?;
    request.validate()?;

    info!(prompts = request.prompt_count, "Ad copy requested");

    let copy = generate_ad_copy(state.copy.as_ref(), &request).await?;
    Ok(Json(ApiResponse::success(copy)))
}

/// Stream `{message, progress}` events of one job as Server-Sent Events.
///
/// Events published before the subscription are not replayed. The stream
/// ends after the job's completion event.
pub async fn progress_stream(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let job_id = JobId::from_string(job_id);
    info!(job_id = %job_id, "Progress subscriber connected");

    let guard = metrics::SseGuard::open();
    let events = state.progress.subscribe_job(job_id).map(move |event| {
        let _active = &guard;
        let data = event.payload().to_string();
        Ok(Event::default().data(data))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Upload reference images sent as multipart field `files`.
pub async fn upload_reference_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ImageUploadResult>> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("files") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("Every file needs a file name."))?;
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;

        files.push(ImageFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    let result = upload_images(state.store.as_ref(), files).await?;
    metrics::record_images_uploaded(result.image_urls.len());
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let body = ApiResponse::success(VariationsResult::new(JobId::from("j"), vec!["u".into()]));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["message"], "Success");
        assert_eq!(json["data"]["totalVariations"], 1);
    }
}
