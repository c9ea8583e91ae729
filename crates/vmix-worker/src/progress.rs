//! Progress broadcast.
//!
//! A single [`ProgressChannel`] is shared by every job in the process.
//! Publishing never blocks and never fails: events sent while nobody is
//! subscribed are dropped, and late subscribers only see later events.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures::stream::{self, Stream};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use vmix_models::{JobId, ProgressEvent};

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Process-wide fan-out of progress events.
#[derive(Debug, Clone)]
pub struct ProgressChannel {
    sender: broadcast::Sender<ProgressEvent>,
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ProgressChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: ProgressEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Raw receiver of every job's events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Events of one job, ending after its completion event.
    ///
    /// Lagged receivers skip the lost events instead of failing.
    pub fn subscribe_job(&self, job_id: JobId) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        let receiver = self.sender.subscribe();

        stream::unfold(Some(receiver), move |state| {
            let job_id = job_id.clone();
            async move {
                let mut receiver = state?;
                loop {
                    match receiver.recv().await {
                        Ok(event) if event.job_id == job_id => {
                            let next = (!event.is_done()).then_some(receiver);
                            return Some((event, next));
                        }
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(job_id = %job_id, skipped, "Progress subscriber lagged");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        })
    }

    /// Reporter bound to one job.
    pub fn reporter(&self, job_id: JobId) -> ProgressReporter {
        ProgressReporter {
            channel: self.clone(),
            job_id,
            high_water: Arc::new(AtomicU8::new(0)),
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Per-job emitter whose reported percent never decreases.
///
/// Clones share the same high-water mark, so concurrent clip workers can
/// each hold one.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    channel: ProgressChannel,
    job_id: JobId,
    high_water: Arc<AtomicU8>,
}

impl ProgressReporter {
    /// Emit `message` at `percent`, clamped to the highest percent seen so far.
    ///
    /// Returns the percent actually published.
    pub fn report(&self, message: impl Into<String>, percent: u8) -> u8 {
        let percent = percent.min(100);
        let previous = self.high_water.fetch_max(percent, Ordering::SeqCst);
        let effective = previous.max(percent);

        let event = ProgressEvent::new(self.job_id.clone(), message, effective);
        debug!(job_id = %self.job_id, progress = effective, "{}", event.message);
        self.channel.publish(event);
        effective
    }

    pub fn current(&self) -> u8 {
        self.high_water.load(Ordering::SeqCst)
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }
}

/// Percent for the `done`-th of `total` items inside `[start, start + span]`.
pub fn scaled_percent(start: u8, span: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return start.saturating_add(span).min(100);
    }
    let done = done.min(total);
    // Round half up.
    let step = (done * usize::from(span) * 2 + total) / (2 * total);
    (usize::from(start) + step).min(100) as u8
}
