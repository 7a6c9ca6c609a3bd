//! Background scan ingestion.
//!
//! [`StreamIngestor`] decouples scan production rate from consumption
//! rate: one producer thread drains a [`ScanSource`], converts each scan
//! into a [`PointFrame`], and publishes it into a FIFO hand-off channel
//! that consumers poll without blocking.

pub mod synthetic;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{error, info, warn};
use thiserror::Error;

use crate::config::StreamConfig;
use crate::core::frame::{combine_xyzr, compress_grid, PointFrame, ScanSource};

pub use synthetic::{SyntheticScan, SyntheticScanSource};

/// Errors that can occur in the ingestor lifecycle.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("ingestion is already running")]
    AlreadyRunning,

    #[error("ingestion already ran; create a new ingestor to restart")]
    Finished,

    #[error("failed to spawn producer thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("producer thread panicked")]
    ProducerPanicked,
}

/// Result type for ingestor operations.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Owns the producer thread and the hand-off channel.
///
/// Frames are delivered in scan order (strict FIFO). With the default
/// unbounded channel nothing is ever dropped; a slow consumer simply
/// accumulates frames. A bounded channel switches to a drop-newest
/// policy under backpressure.
pub struct StreamIngestor<S>
where
    S: ScanSource + Send + 'static,
{
    source: Option<S>,
    tx: Option<Sender<PointFrame>>,
    rx: Receiver<PointFrame>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    bounded: bool,
    startup_delay: Duration,
}

impl<S> StreamIngestor<S>
where
    S: ScanSource + Send + 'static,
{
    /// Creates an ingestor over `source`. No thread is spawned until
    /// [`start`](Self::start).
    pub fn new(source: S, config: &StreamConfig) -> Self {
        let (tx, rx) = match config.channel_capacity {
            Some(capacity) => crossbeam_channel::bounded(capacity),
            None => crossbeam_channel::unbounded(),
        };

        Self {
            source: Some(source),
            tx: Some(tx),
            rx,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            bounded: config.channel_capacity.is_some(),
            startup_delay: Duration::from_millis(config.startup_delay_ms),
        }
    }

    /// Spawns the producer loop.
    ///
    /// Blocks briefly (the configured startup delay) so the loop reaches
    /// steady state before the first poll. Errors if the loop is already
    /// live, or if this ingestor already ran once; a second concurrent
    /// loop is never spawned.
    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(StreamError::AlreadyRunning);
        }

        let source = self.source.take().ok_or(StreamError::Finished)?;
        let tx = self.tx.take().ok_or(StreamError::Finished)?;

        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let bounded = self.bounded;
        let handle = thread::Builder::new()
            .name("scan-ingest".to_string())
            .spawn(move || ingest_loop(source, tx, running, bounded));

        let handle = match handle {
            Ok(h) => h,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(StreamError::Spawn(e));
            }
        };

        self.handle = Some(handle);
        thread::sleep(self.startup_delay);

        Ok(())
    }

    /// Signals the loop to terminate and waits for it to exit.
    ///
    /// The loop observes the signal once per iteration, so shutdown
    /// latency is bounded by one scan acquisition. Safe to call if
    /// [`start`](Self::start) never ran.
    pub fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| StreamError::ProducerPanicked)?;
        }

        Ok(())
    }

    /// Non-blocking poll: the oldest unread frame, or `None` when the
    /// channel is currently empty. Cheap to call repeatedly; buffered
    /// frames remain retrievable after the producer has exited.
    pub fn get_frame(&self) -> Option<PointFrame> {
        self.rx.try_recv().ok()
    }

    /// True only while the producer loop is live. The loop clears this
    /// on every exit path, so a dead producer is observable here.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of frames currently buffered in the hand-off channel.
    pub fn queued_frames(&self) -> usize {
        self.rx.len()
    }
}

impl<S> Drop for StreamIngestor<S>
where
    S: ScanSource + Send + 'static,
{
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// The producer loop. Clears `running` on every exit path.
fn ingest_loop<S: ScanSource>(
    mut source: S,
    tx: Sender<PointFrame>,
    running: Arc<AtomicBool>,
    bounded: bool,
) {
    while running.load(Ordering::SeqCst) {
        let scan = match source.next_scan() {
            Ok(Some(scan)) => scan,
            Ok(None) => {
                info!("scan source exhausted, ingestion ending");
                break;
            }
            Err(e) => {
                error!("scan source failed, ingestion ending: {e:#}");
                break;
            }
        };

        let positions = source.positions(&scan);
        let intensities = source.intensities(&scan);
        let frame = compress_grid(combine_xyzr(&positions, &intensities));

        if bounded {
            match tx.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("hand-off channel full, dropping frame");
                }
                Err(TrySendError::Disconnected(_)) => break,
            }
        } else if tx.send(frame).is_err() {
            // Receiver side is gone.
            break;
        }
    }

    running.store(false, Ordering::SeqCst);
}
