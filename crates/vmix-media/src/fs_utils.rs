//! Filesystem helpers.

use std::path::Path;
use tokio::fs;

use crate::error::MediaResult;

/// Remove a file, treating "already gone" as success.
///
/// Returns `true` when a file was actually deleted.
pub async fn remove_if_exists(path: impl AsRef<Path>) -> MediaResult<bool> {
    match fs::remove_file(path.as_ref()).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
