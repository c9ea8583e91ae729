//! End-to-end pipeline scenarios against in-memory fakes.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use futures::stream;
use tempfile::TempDir;

use vmix_media::{ClipDownloader, MediaComposer, MediaError, MediaResult};
use vmix_models::{JobId, ProgressEvent, MAX_VARIATIONS};
use vmix_providers::{
    InlineAudio, PredictionStatus, ProviderError, ProviderResult, SpeechChunk, SpeechProvider, SpeechStream,
    VideoProvider,
};
use vmix_storage::{ArtifactStore, StorageError, StorageResult};
use vmix_worker::{
    ErrorKind, LocalMixer, PipelineDeps, ProgressChannel, VariationPipeline, WorkerConfig,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Completes every prompt except those listed in `failing`.
///
/// With `stalled` set every poll stays pending.
#[derive(Default)]
struct FakeVideo {
    failing: HashSet<String>,
    stalled: bool,
    submits: AtomicUsize,
    polls: Mutex<HashMap<String, usize>>,
}

#[async_trait]
impl VideoProvider for FakeVideo {
    async fn submit(&self, _image_url: &str, prompt: &str) -> ProviderResult<String> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        Ok(prompt.to_string())
    }

    async fn poll(&self, prediction_id: &str) -> ProviderResult<PredictionStatus> {
        if self.failing.contains(prediction_id) {
            return Ok(PredictionStatus::Failed("Generation Failed".to_string()));
        }
        let seen = {
            let mut polls = self.polls.lock().unwrap();
            let count = polls.entry(prediction_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        if self.stalled {
            return Ok(PredictionStatus::Pending);
        }
        // First poll of every prediction is still pending.
        if seen == 1 {
            return Ok(PredictionStatus::Pending);
        }
        Ok(PredictionStatus::Completed(format!(
            "https://cdn.fake/{}.mp4",
            prediction_id.replace(' ', "_")
        )))
    }
}

struct FakeSpeech {
    with_audio: bool,
    rejects: bool,
    calls: AtomicUsize,
}

impl FakeSpeech {
    fn new(with_audio: bool) -> Self {
        Self {
            with_audio,
            rejects: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn rejecting() -> Self {
        Self {
            rejects: true,
            ..Self::new(false)
        }
    }
}

#[async_trait]
impl SpeechProvider for FakeSpeech {
    fn is_configured(&self) -> bool {
        true
    }

    async fn stream_speech(&self, _script: &str) -> ProviderResult<SpeechStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.rejects {
            return Err(ProviderError::Rejected("quota exceeded".to_string()));
        }
        let mut chunks = vec![Ok(SpeechChunk::default())];
        if self.with_audio {
            chunks.push(Ok(SpeechChunk {
                audio: Some(InlineAudio {
                    data: base64::engine::general_purpose::STANDARD.encode([0u8; 480]),
                    mime_type: "audio/L16;rate=24000".to_string(),
                }),
            }));
        }
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// Fails the `fail_on`-th download (1-based) when set.
#[derive(Default)]
struct FakeDownloader {
    calls: AtomicUsize,
    fail_on: Option<usize>,
}

#[async_trait]
impl ClipDownloader for FakeDownloader {
    async fn download(&self, url: &str, dest: &Path) -> MediaResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(call) {
            return Err(MediaError::download_failed(format!("HTTP 404 for {}", url)));
        }
        tokio::fs::write(dest, url.as_bytes()).await?;
        Ok(())
    }
}

/// Writes placeholder outputs and records the clip order of every concat.
#[derive(Default)]
struct FakeComposer {
    concats: Mutex<Vec<Vec<PathBuf>>>,
    muxes: AtomicUsize,
    fail_mux: bool,
}

#[async_trait]
impl MediaComposer for FakeComposer {
    async fn concat_visual(&self, clips: &[PathBuf], output: &Path) -> MediaResult<()> {
        for clip in clips {
            if !clip.exists() {
                return Err(MediaError::FileNotFound(clip.clone()));
            }
        }
        self.concats.lock().unwrap().push(clips.to_vec());
        tokio::fs::write(output, b"visual").await?;
        Ok(())
    }

    async fn mux_narration(&self, visual: &Path, audio: &Path, output: &Path) -> MediaResult<()> {
        assert!(visual.exists() && audio.exists());
        self.muxes.fetch_add(1, Ordering::SeqCst);
        if self.fail_mux {
            // ffmpeg leaves a truncated file behind when it dies mid-write.
            tokio::fs::write(output, b"partial").await?;
            return Err(MediaError::ffmpeg_failed("Invalid data found", None, Some(1)));
        }
        tokio::fs::write(output, b"variation").await?;
        Ok(())
    }
}

/// Fails the `fail_on`-th file upload (1-based) when set.
#[derive(Default)]
struct FakeStore {
    keys: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    fail_on: Option<usize>,
}

#[async_trait]
impl ArtifactStore for FakeStore {
    async fn upload_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<String> {
        assert!(path.exists(), "uploaded file must exist");
        assert_eq!(content_type, "video/mp4");
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(attempt) {
            return Err(StorageError::upload_failed("SlowDown: please reduce your request rate"));
        }
        self.keys.lock().unwrap().push(key.to_string());
        Ok(format!("https://bucket.s3.us-east-1.amazonaws.com/{}", key))
    }

    async fn upload_bytes(&self, _data: Vec<u8>, key: &str, _ct: &str) -> StorageResult<String> {
        self.keys.lock().unwrap().push(key.to_string());
        Ok(format!("https://bucket.s3.us-east-1.amazonaws.com/{}", key))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    _root: TempDir,
    config: WorkerConfig,
    video: Arc<FakeVideo>,
    speech: Arc<FakeSpeech>,
    downloader: Arc<FakeDownloader>,
    composer: Arc<FakeComposer>,
    store: Arc<FakeStore>,
    progress: ProgressChannel,
}

impl Harness {
    fn new(video: FakeVideo, speech: FakeSpeech, composer: FakeComposer) -> Self {
        let root = tempfile::tempdir().unwrap();
        let config = WorkerConfig {
            temp_dir: root.path().join("temp"),
            output_dir: root.path().join("output"),
            poll_interval: Duration::from_millis(1),
            max_poll_attempts: 10,
            ffmpeg_timeout_secs: 5,
        };
        Self {
            _root: root,
            config,
            video: Arc::new(video),
            speech: Arc::new(speech),
            downloader: Arc::new(FakeDownloader::default()),
            composer: Arc::new(composer),
            store: Arc::new(FakeStore::default()),
            progress: ProgressChannel::new(1024),
        }
    }

    fn with_downloader(mut self, downloader: FakeDownloader) -> Self {
        self.downloader = Arc::new(downloader);
        self
    }

    fn with_store(mut self, store: FakeStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    fn output_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.config.output_dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn pipeline(&self) -> VariationPipeline {
        VariationPipeline::new(PipelineDeps {
            video: self.video.clone(),
            speech: self.speech.clone(),
            downloader: self.downloader.clone(),
            composer: self.composer.clone(),
            store: self.store.clone(),
            progress: self.progress.clone(),
            config: self.config.clone(),
        })
    }

    fn temp_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.config.temp_dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn prompts(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("prompt {}", i)).collect()
}

fn images() -> Vec<String> {
    vec![
        "https://img.fake/a.png".to_string(),
        "https://img.fake/b.png".to_string(),
    ]
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_four_clips_produce_twenty_variations() {
    let h = Harness::new(FakeVideo::default(), FakeSpeech::new(true), FakeComposer::default());
    let mut rx = h.progress.subscribe();

    let result = h
        .pipeline()
        .run(images(), prompts(4), "Buy now".to_string(), JobId::from("job-a"))
        .await
        .unwrap();

    assert_eq!(result.job_id.as_str(), "job-a");
    assert_eq!(result.total_variations, 20);
    assert_eq!(result.variations.len(), 20);
    assert_eq!(h.video.submits.load(Ordering::SeqCst), 4);
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 4);
    assert_eq!(h.composer.muxes.load(Ordering::SeqCst), 20);

    let keys = h.store.keys.lock().unwrap().clone();
    assert_eq!(keys.len(), 20);
    assert_eq!(keys[0], "results/job-a/VARIATION_job-a_1.mp4");
    assert_eq!(keys[19], "results/job-a/VARIATION_job-a_20.mp4");
    assert!(result.variations[0].ends_with(&keys[0]));

    // Every concat used a distinct ordering of all four clips.
    let concats = h.composer.concats.lock().unwrap().clone();
    let distinct: HashSet<Vec<PathBuf>> = concats.iter().cloned().collect();
    assert_eq!(distinct.len(), 20);
    assert!(concats.iter().all(|c| c.len() == 4));

    assert!(h.temp_files().is_empty(), "workspace not purged: {:?}", h.temp_files());

    let events = drain(&mut rx);
    let percents: Vec<u8> = events.iter().map(|e| e.progress).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{:?}", percents);
    assert_eq!(percents.first(), Some(&10));
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.contains(&40));
    assert!(events.iter().all(|e| e.job_id.as_str() == "job-a"));
}

#[tokio::test]
async fn test_single_failed_clip_aborts_job() {
    let video = FakeVideo {
        failing: ["prompt 3".to_string()].into_iter().collect(),
        ..FakeVideo::default()
    };
    let h = Harness::new(video, FakeSpeech::new(true), FakeComposer::default());

    let failure = h
        .pipeline()
        .run(images(), prompts(5), "script".to_string(), JobId::from("job-b"))
        .await
        .unwrap_err();

    assert_eq!(failure.kind, ErrorKind::PartialGeneration);
    assert!(failure.message.contains("generate all clips"));
    assert_eq!(h.video.submits.load(Ordering::SeqCst), 5);
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 0);
    assert!(h.store.keys.lock().unwrap().is_empty());
    // The narration file was written, then purged.
    assert!(h.temp_files().is_empty());
}

#[tokio::test]
async fn test_missing_narration_audio_stops_before_stitching() {
    let h = Harness::new(FakeVideo::default(), FakeSpeech::new(false), FakeComposer::default());

    let failure = h
        .pipeline()
        .run(images(), prompts(4), "script".to_string(), JobId::from("job-c"))
        .await
        .unwrap_err();

    assert_eq!(failure.kind, ErrorKind::Synthesis);
    assert!(failure.message.contains("without audio"));
    assert!(h.composer.concats.lock().unwrap().is_empty());
    assert_eq!(h.composer.muxes.load(Ordering::SeqCst), 0);
    assert!(h.store.keys.lock().unwrap().is_empty());
    assert!(h.temp_files().is_empty());
}

#[tokio::test]
async fn test_unsupported_clip_counts_make_no_provider_calls() {
    for count in [3, 7] {
        let h = Harness::new(FakeVideo::default(), FakeSpeech::new(true), FakeComposer::default());

        let failure = h
            .pipeline()
            .run(images(), prompts(count), "script".to_string(), JobId::from("job-v"))
            .await
            .unwrap_err();

        assert_eq!(failure.kind, ErrorKind::Validation);
        assert_eq!(failure.message, "Prompts must be 4, 5, or 6.");
        assert_eq!(h.video.submits.load(Ordering::SeqCst), 0);
        assert_eq!(h.speech.calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_composition_failure_purges_and_uploads_nothing() {
    let composer = FakeComposer {
        fail_mux: true,
        ..FakeComposer::default()
    };
    let h = Harness::new(FakeVideo::default(), FakeSpeech::new(true), composer);

    let failure = h
        .pipeline()
        .run(images(), prompts(4), "script".to_string(), JobId::from("job-d"))
        .await
        .unwrap_err();

    assert_eq!(failure.kind, ErrorKind::Composition);
    assert!(failure.message.contains("Invalid data found"));
    assert!(h.store.keys.lock().unwrap().is_empty());
    assert!(h.temp_files().is_empty());
}

#[tokio::test]
async fn test_upload_failure_mid_loop_returns_no_partial_result() {
    let h = Harness::new(FakeVideo::default(), FakeSpeech::new(true), FakeComposer::default())
        .with_store(FakeStore {
            fail_on: Some(3),
            ..FakeStore::default()
        });

    let failure = h
        .pipeline()
        .run(images(), prompts(4), "script".to_string(), JobId::from("job-s"))
        .await
        .unwrap_err();

    assert_eq!(failure.kind, ErrorKind::Storage);
    assert!(failure.message.contains("SlowDown"));
    // Two variations made it to storage before the third upload failed; no more were stitched.
    assert_eq!(h.store.keys.lock().unwrap().len(), 2);
    assert_eq!(h.composer.muxes.load(Ordering::SeqCst), 3);
    assert!(h.temp_files().is_empty(), "workspace not purged: {:?}", h.temp_files());
}

#[tokio::test]
async fn test_download_failure_aborts_before_stitching() {
    let h = Harness::new(FakeVideo::default(), FakeSpeech::new(true), FakeComposer::default())
        .with_downloader(FakeDownloader {
            fail_on: Some(2),
            ..FakeDownloader::default()
        });

    let failure = h
        .pipeline()
        .run(images(), prompts(4), "script".to_string(), JobId::from("job-dl"))
        .await
        .unwrap_err();

    assert_eq!(failure.kind, ErrorKind::Download);
    assert!(failure.message.contains("HTTP 404"));
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 2);
    assert!(h.composer.concats.lock().unwrap().is_empty());
    assert!(h.store.keys.lock().unwrap().is_empty());
    assert!(h.temp_files().is_empty());
}

#[tokio::test]
async fn test_stalled_clips_exhaust_poll_budget() {
    let video = FakeVideo {
        stalled: true,
        ..FakeVideo::default()
    };
    let h = Harness::new(video, FakeSpeech::new(true), FakeComposer::default());

    let failure = h
        .pipeline()
        .run(images(), prompts(4), "script".to_string(), JobId::from("job-t"))
        .await
        .unwrap_err();

    // Per-clip timeouts settle as failed clips, so the job reports missing clips.
    assert_eq!(failure.kind, ErrorKind::PartialGeneration);
    let polls = h.video.polls.lock().unwrap().clone();
    assert_eq!(polls.len(), 4);
    assert!(polls.values().all(|&n| n == h.config.max_poll_attempts as usize));
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 0);
    assert!(h.temp_files().is_empty());
}

#[tokio::test]
async fn test_narration_failure_waits_for_every_clip() {
    let h = Harness::new(FakeVideo::default(), FakeSpeech::rejecting(), FakeComposer::default());

    let failure = h
        .pipeline()
        .run(images(), prompts(6), "script".to_string(), JobId::from("job-n"))
        .await
        .unwrap_err();

    assert_eq!(failure.kind, ErrorKind::Synthesis);
    assert!(failure.message.contains("quota exceeded"));
    // Every clip worker still ran to completion: submitted once, pending once, then done.
    assert_eq!(h.video.submits.load(Ordering::SeqCst), 6);
    let polls = h.video.polls.lock().unwrap().clone();
    assert_eq!(polls.len(), 6);
    assert!(polls.values().all(|&n| n == 2), "{:?}", polls);
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 0);
    assert!(h.temp_files().is_empty());
}

#[tokio::test]
async fn test_progress_subscription_sees_only_its_job() {
    use futures::StreamExt;

    let h = Harness::new(FakeVideo::default(), FakeSpeech::new(true), FakeComposer::default());
    let stream = h.progress.subscribe_job(JobId::from("job-e"));

    h.pipeline()
        .run(images(), prompts(4), "script".to_string(), JobId::from("job-e"))
        .await
        .unwrap();

    let events: Vec<ProgressEvent> = stream.collect().await;
    assert!(events.last().unwrap().is_done());
    assert!(events.iter().all(|e| e.job_id.as_str() == "job-e"));
}

// ---------------------------------------------------------------------------
// Local mixer
// ---------------------------------------------------------------------------

async fn write_inputs(dir: &Path, clips: usize) -> (Vec<PathBuf>, PathBuf) {
    tokio::fs::create_dir_all(dir).await.unwrap();
    let mut paths = Vec::new();
    for i in 0..clips {
        let path = dir.join(format!("clip{}.mp4", i));
        tokio::fs::write(&path, b"clip").await.unwrap();
        paths.push(path);
    }
    let audio = dir.join("voice.mp3");
    tokio::fs::write(&audio, b"audio").await.unwrap();
    (paths, audio)
}

#[tokio::test]
async fn test_local_mix_writes_variations_to_output_dir() {
    let h = Harness::new(FakeVideo::default(), FakeSpeech::new(true), FakeComposer::default());
    let inputs = h.config.temp_dir.parent().unwrap().join("uploads");
    let (clips, audio) = write_inputs(&inputs, 3).await;

    let mixer = LocalMixer::new(h.composer.clone(), h.progress.clone(), h.config.clone());
    let result = mixer
        .mix_with_id(JobId::from("mix1"), &clips, &audio, 4)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.files.len(), 4);
    assert_eq!(result.files[0], h.config.output_dir.join("VARIATION_mix1_1.mp4"));
    assert!(result.files.iter().all(|f| f.exists()));
    assert!(h.temp_files().is_empty());
}

#[tokio::test]
async fn test_local_mix_defaults_and_validation() {
    let h = Harness::new(FakeVideo::default(), FakeSpeech::new(true), FakeComposer::default());
    let inputs = h.config.temp_dir.parent().unwrap().join("uploads");
    let (clips, audio) = write_inputs(&inputs, 2).await;
    let mixer = LocalMixer::new(h.composer.clone(), h.progress.clone(), h.config.clone());

    let result = mixer.mix_local(&clips, &audio, 0).await.unwrap();
    assert_eq!(result.files.len(), 1);
    assert_eq!(result.process_id.as_str().len(), 8);

    let failure = mixer.mix_local(&clips[..1], &audio, 1).await.unwrap_err();
    assert_eq!(failure.kind, ErrorKind::Validation);

    let failure = mixer
        .mix_local(&clips, &inputs.join("missing.mp3"), 1)
        .await
        .unwrap_err();
    assert_eq!(failure.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_local_mix_caps_variation_count() {
    let h = Harness::new(FakeVideo::default(), FakeSpeech::new(true), FakeComposer::default());
    let inputs = h.config.temp_dir.parent().unwrap().join("uploads");
    let (clips, audio) = write_inputs(&inputs, 6).await;
    let mixer = LocalMixer::new(h.composer.clone(), h.progress.clone(), h.config.clone());

    let result = mixer
        .mix_with_id(JobId::from("mixcap"), &clips, &audio, usize::MAX)
        .await
        .unwrap();

    assert_eq!(result.files.len(), MAX_VARIATIONS);
    assert_eq!(h.composer.muxes.load(Ordering::SeqCst), MAX_VARIATIONS);
}

#[tokio::test]
async fn test_local_mix_failure_leaves_no_output_files() {
    let composer = FakeComposer {
        fail_mux: true,
        ..FakeComposer::default()
    };
    let h = Harness::new(FakeVideo::default(), FakeSpeech::new(true), composer);
    let inputs = h.config.temp_dir.parent().unwrap().join("uploads");
    let (clips, audio) = write_inputs(&inputs, 3).await;
    let mixer = LocalMixer::new(h.composer.clone(), h.progress.clone(), h.config.clone());

    let failure = mixer
        .mix_with_id(JobId::from("mixfail"), &clips, &audio, 4)
        .await
        .unwrap_err();

    assert_eq!(failure.kind, ErrorKind::Composition);
    assert!(h.output_files().is_empty(), "left behind: {:?}", h.output_files());
    assert!(h.temp_files().is_empty());
}
