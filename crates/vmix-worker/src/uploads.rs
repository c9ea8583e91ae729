//! Reference-image uploads.

use serde::Serialize;
use tracing::info;
use vmix_storage::{image_content_type, input_image_key, ArtifactStore};

use crate::error::{PipelineError, PipelineResult};

/// Most images accepted in one upload.
pub const MAX_IMAGE_FILES: usize = 6;

/// One image received from a client.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    /// Declared content type, if the client sent one
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    /// Accepted content type, from the declared type or the file extension.
    pub fn resolved_content_type(&self) -> Option<String> {
        match self.content_type.as_deref() {
            Some(declared) => {
                let subtype = declared.rsplit_once('/')?.1.to_ascii_lowercase();
                matches!(subtype.as_str(), "jpg" | "jpeg" | "png" | "webp")
                    .then(|| declared.to_ascii_lowercase())
            }
            None => image_content_type(&self.file_name).map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUploadResult {
    pub message: String,
    pub image_urls: Vec<String>,
}

/// Store every image and return their public URLs in input order.
///
/// All files are validated before the first upload.
pub async fn upload_images(
    store: &dyn ArtifactStore,
    files: Vec<ImageFile>,
) -> PipelineResult<ImageUploadResult> {
    if files.is_empty() {
        return Err(PipelineError::validation("No files found."));
    }
    if files.len() > MAX_IMAGE_FILES {
        return Err(PipelineError::validation(format!(
            "At most {} images can be uploaded at once.",
            MAX_IMAGE_FILES
        )));
    }

    let mut typed = Vec::with_capacity(files.len());
    for file in files {
        let content_type = file.resolved_content_type().ok_or_else(|| {
            PipelineError::validation("Only image files are allowed (jpg, png, webp).")
        })?;
        typed.push((file, content_type));
    }

    let count = typed.len();
    let mut image_urls = Vec::with_capacity(count);
    for (file, content_type) in typed {
        let key = input_image_key(&file.file_name);
        info!(key = %key, bytes = file.bytes.len(), "Uploading image");
        let url = store.upload_bytes(file.bytes, &key, &content_type).await?;
        image_urls.push(url);
    }

    Ok(ImageUploadResult {
        message: format!("{} images uploaded successfully", count),
        image_urls,
    })
}
