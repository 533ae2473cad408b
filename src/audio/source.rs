use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::frame::{AudioFrame, CaptureFormat};
use crate::error::SessionError;

/// Buffered frames per subscriber (~3 seconds at 100 ms frames).
const SUBSCRIBER_BUFFER: usize = 32;

type SubscriberMap = Mutex<HashMap<u64, mpsc::Sender<AudioFrame>>>;

/// A live audio input delivering an ordered sequence of PCM frames.
///
/// Each call to `subscribe` yields an independent stream of the same
/// frames; a subscription ends when its guard is released (or dropped).
#[async_trait::async_trait]
pub trait AudioFrameSource: Send + Sync {
    /// Negotiate `format` and start receiving frames.
    async fn subscribe(&self, format: CaptureFormat) -> Result<FrameSubscription, SessionError>;
}

/// One consumer's view of the frame stream.
pub struct FrameSubscription {
    frames: mpsc::Receiver<AudioFrame>,
    guard: SubscriptionGuard,
}

impl FrameSubscription {
    pub fn new(frames: mpsc::Receiver<AudioFrame>, guard: SubscriptionGuard) -> Self {
        Self { frames, guard }
    }

    /// Receive the next frame; `None` once the subscription is released
    /// or the source shuts down.
    pub async fn recv(&mut self) -> Option<AudioFrame> {
        self.frames.recv().await
    }

    /// A handle that can release this subscription from elsewhere.
    pub fn guard(&self) -> SubscriptionGuard {
        self.guard.clone()
    }
}

/// Releases a subscription at the source. Release is idempotent and
/// also happens when the last clone is dropped.
#[derive(Clone)]
pub struct SubscriptionGuard {
    inner: Arc<GuardInner>,
}

struct GuardInner {
    id: u64,
    released: AtomicBool,
    subscribers: Arc<SubscriberMap>,
}

impl SubscriptionGuard {
    fn new(id: u64, subscribers: Arc<SubscriberMap>) -> Self {
        Self {
            inner: Arc::new(GuardInner {
                id,
                released: AtomicBool::new(false),
                subscribers,
            }),
        }
    }

    /// Stop frame delivery for this subscription. Safe to call twice.
    pub fn release(&self) {
        if !self.inner.released.swap(true, Ordering::SeqCst) {
            self.inner.subscribers.lock().unwrap().remove(&self.inner.id);
            debug!("frame subscription {} released", self.inner.id);
        }
    }
}

impl Drop for GuardInner {
    fn drop(&mut self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.subscribers.lock().unwrap().remove(&self.id);
        }
    }
}

/// Fans one physical frame stream out to any number of subscribers.
///
/// The driver never blocks on a subscriber: frames are delivered with
/// `try_send`, so a consumer that stops draining its buffer loses
/// frames instead of stalling the capture path.
pub struct FrameFanout {
    format: CaptureFormat,
    subscribers: Arc<SubscriberMap>,
    next_id: AtomicU64,
}

impl FrameFanout {
    pub fn new(format: CaptureFormat) -> Self {
        Self {
            format,
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Spawn the task that drains the physical input and feeds every
    /// live subscriber. The task ends when `input` closes.
    pub fn spawn_driver(&self, mut input: mpsc::Receiver<AudioFrame>) -> JoinHandle<()> {
        let subscribers = Arc::clone(&self.subscribers);
        tokio::spawn(async move {
            while let Some(frame) = input.recv().await {
                let senders: Vec<mpsc::Sender<AudioFrame>> =
                    subscribers.lock().unwrap().values().cloned().collect();
                for tx in senders {
                    // Enqueue-only: a full subscriber drops the frame.
                    let _ = tx.try_send(frame.clone());
                }
            }
            debug!("frame fan-out driver stopped");
        })
    }

    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl AudioFrameSource for FrameFanout {
    async fn subscribe(&self, format: CaptureFormat) -> Result<FrameSubscription, SessionError> {
        if format != self.format {
            return Err(SessionError::DeviceUnavailable(format!(
                "requested {}Hz/{}ch, source delivers {}Hz/{}ch",
                format.sample_rate, format.channels, self.format.sample_rate, self.format.channels
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers.lock().unwrap().insert(id, tx);
        debug!("frame subscription {} opened", id);

        Ok(FrameSubscription::new(
            rx,
            SubscriptionGuard::new(id, Arc::clone(&self.subscribers)),
        ))
    }
}

/// A microphone stand-in that generates a steady sine tone at the
/// capture cadence. Used by the demo binary and integration tests.
pub struct SyntheticFrameSource {
    fanout: Arc<FrameFanout>,
    running: Arc<AtomicBool>,
}

impl SyntheticFrameSource {
    /// Start generating frames at `format`'s cadence.
    pub fn start(format: CaptureFormat) -> Self {
        let fanout = Arc::new(FrameFanout::new(format));
        let running = Arc::new(AtomicBool::new(true));

        let (tx, rx) = mpsc::channel(8);
        fanout.spawn_driver(rx);

        let flag = Arc::clone(&running);
        tokio::spawn(async move {
            let samples_per_frame = format.samples_per_frame();
            let mut interval =
                tokio::time::interval(std::time::Duration::from_millis(format.frame_ms));
            let mut index: u64 = 0;

            info!(
                "synthetic frame source started ({}Hz, {}ch, {}ms frames)",
                format.sample_rate, format.channels, format.frame_ms
            );

            loop {
                interval.tick().await;
                if !flag.load(Ordering::SeqCst) {
                    break;
                }

                let frame = AudioFrame {
                    samples: sine_samples(samples_per_frame, index, format.sample_rate),
                    sample_rate: format.sample_rate,
                    channels: format.channels,
                    timestamp_ms: index * format.frame_ms,
                };
                index += 1;

                if tx.send(frame).await.is_err() {
                    break;
                }
            }
            debug!("synthetic frame source stopped");
        });

        Self { fanout, running }
    }
}

impl Drop for SyntheticFrameSource {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl AudioFrameSource for SyntheticFrameSource {
    async fn subscribe(&self, format: CaptureFormat) -> Result<FrameSubscription, SessionError> {
        self.fanout.subscribe(format).await
    }
}

fn sine_samples(count: usize, frame_index: u64, sample_rate: u32) -> Vec<i16> {
    let offset = frame_index as usize * count;
    (0..count)
        .map(|i| {
            let t = (offset + i) as f32 / sample_rate as f32;
            let v = (2.0 * std::f32::consts::PI * 440.0 * t).sin();
            (v * 0.2 * i16::MAX as f32) as i16
        })
        .collect()
}
