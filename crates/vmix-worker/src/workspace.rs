//! Per-job temp file bookkeeping.
//!
//! Every intermediate file a job creates is registered here before it is
//! written, so a single purge removes all of them whether the job succeeded
//! or failed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::{debug, info, warn};
use vmix_media::remove_if_exists;
use vmix_models::JobId;

/// Extensions removed by the startup sweep.
const STALE_EXTENSIONS: [&str; 3] = ["mp4", "wav", "zip"];

/// Registered temp files of one job.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    job_id: JobId,
    files: Mutex<Vec<PathBuf>>,
    purged: AtomicBool,
}

impl Workspace {
    pub fn new(dir: impl Into<PathBuf>, job_id: JobId) -> Self {
        Self {
            dir: dir.into(),
            job_id,
            files: Mutex::new(Vec::new()),
            purged: AtomicBool::new(false),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Track `path` for deletion on purge.
    pub fn register(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        if !files.contains(&path) {
            files.push(path);
        }
    }

    /// `{stage}_{jobId}_{index}.{ext}` inside the temp dir, registered.
    pub fn path_for(&self, stage: &str, index: usize, ext: &str) -> PathBuf {
        let path = self
            .dir
            .join(format!("{}_{}_{}.{}", stage, self.job_id, index, ext));
        self.register(path.clone());
        path
    }

    /// Snapshot of the registered paths.
    pub fn registered(&self) -> Vec<PathBuf> {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Delete every registered file that still exists.
    ///
    /// Only the first call does any work. Returns the number of files removed.
    pub async fn purge(&self) -> usize {
        if self.purged.swap(true, Ordering::SeqCst) {
            return 0;
        }

        let files = std::mem::take(&mut *self.files.lock().unwrap_or_else(|e| e.into_inner()));
        let mut removed = 0;
        for path in &files {
            match remove_if_exists(path).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(job_id = %self.job_id, path = ?path, "Failed to remove temp file: {}", e),
            }
        }

        debug!(job_id = %self.job_id, registered = files.len(), removed, "Workspace purged");
        removed
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.purged.swap(true, Ordering::SeqCst) {
            return;
        }

        let files = std::mem::take(self.files.get_mut().unwrap_or_else(|e| e.into_inner()));
        for path in files {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(job_id = %self.job_id, path = ?path, "Failed to remove temp file: {}", e),
            }
        }
    }
}

/// Remove media leftovers of a crashed process from `dir`.
///
/// Only `.mp4`, `.wav` and `.zip` files are touched. Errors are logged and
/// never returned. Returns the number of files removed.
pub async fn sweep_stale(dir: &Path) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(e) => {
            warn!(dir = ?dir, "Temp sweep skipped: {}", e);
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(dir = ?dir, "Temp sweep aborted: {}", e);
                break;
            }
        };

        let path = entry.path();
        let is_stale = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| STALE_EXTENSIONS.contains(&ext))
            .unwrap_or(false);
        if !is_stale || !path.is_file() {
            continue;
        }

        match remove_if_exists(&path).await {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => warn!(path = ?path, "Failed to remove stale file: {}", e),
        }
    }

    if removed > 0 {
        info!(dir = ?dir, removed, "Removed stale temp files");
    }
    removed
}
