//! Object key layout.

use rand::Rng;

/// Content type of uploaded variations.
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Key of the `number`-th (1-based) variation of a job.
pub fn variation_key(job_id: &str, number: usize) -> String {
    format!("results/{job}/VARIATION_{job}_{n}.mp4", job = job_id, n = number)
}

/// Key of an uploaded input image.
///
/// The timestamp plus a random suffix keeps keys unique across concurrent
/// uploads of files with the same name.
pub fn input_image_key(original_name: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::rng().random_range(0..1000);
    let name: String = original_name
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_whitespace() { '_' } else { c })
        .collect();
    format!("input_{}_{}_{}", millis, suffix, name)
}

/// Content type for an image upload by file extension.
///
/// Returns `None` for anything other than JPEG, PNG or WebP.
pub fn image_content_type(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
