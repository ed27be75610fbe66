use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use nd_plugin_threshold::ThresholdPlugin;
use nd_threshold_common::frame::Frame;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::host::IocHost;

type Plugin = ThresholdPlugin<IocHost>;

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    dropped: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriverStats {
    /// Frames offered by the source.
    pub delivered: u64,
    /// Frames lost to a full queue or disabled callbacks.
    pub dropped: u64,
    pub processed: u64,
    /// Frames the plugin rejected.
    pub failed: u64,
}

/// Delivers frames to the plugin one at a time.
///
/// With blocking callbacks the caller waits for the plugin. Otherwise frames
/// go through a bounded queue drained by a [`QueueWorker`], and frames that
/// do not fit are dropped.
pub struct FrameDriver {
    plugin: Arc<Plugin>,
    queue: Option<mpsc::Sender<Frame>>,
    counters: Arc<Counters>,
}

/// Drains the frame queue into the plugin.
pub struct QueueWorker {
    plugin: Arc<Plugin>,
    rx: mpsc::Receiver<Frame>,
    counters: Arc<Counters>,
}

impl FrameDriver {
    pub fn new(
        plugin: Arc<Plugin>,
        queue_size: usize,
        blocking: bool,
    ) -> (Self, Option<QueueWorker>) {
        let counters = Arc::new(Counters::default());
        if blocking {
            let driver = Self {
                plugin,
                queue: None,
                counters,
            };
            return (driver, None);
        }

        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let worker = QueueWorker {
            plugin: Arc::clone(&plugin),
            rx,
            counters: Arc::clone(&counters),
        };
        let driver = Self {
            plugin,
            queue: Some(tx),
            counters,
        };
        (driver, Some(worker))
    }

    pub async fn deliver(&self, frame: Frame) {
        self.counters.delivered.fetch_add(1, Ordering::Relaxed);

        if !self.plugin.host().callbacks_enabled() {
            debug!(unique_id = frame.unique_id, "callbacks disabled, frame ignored");
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        match &self.queue {
            None => process(&self.plugin, frame, &self.counters).await,
            Some(tx) => match tx.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(frame)) => {
                    warn!(
                        port = self.plugin.port_name(),
                        unique_id = frame.unique_id,
                        "frame queue full, dropping frame"
                    );
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Closed(frame)) => {
                    warn!(unique_id = frame.unique_id, "frame queue closed, dropping frame");
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                }
            },
        }
    }

    pub fn stats(&self) -> DriverStats {
        self.counters.snapshot()
    }
}

impl QueueWorker {
    /// Runs until every sender is dropped and the queue is empty.
    pub async fn run(mut self) -> DriverStats {
        info!(port = self.plugin.port_name(), "frame queue worker started");
        while let Some(frame) = self.rx.recv().await {
            process(&self.plugin, frame, &self.counters).await;
        }
        info!(port = self.plugin.port_name(), "frame queue worker stopped");
        self.counters.snapshot()
    }
}

impl Counters {
    fn snapshot(&self) -> DriverStats {
        DriverStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Run the pixel scan on the blocking pool so it never stalls the runtime.
async fn process(plugin: &Arc<Plugin>, frame: Frame, counters: &Counters) {
    let plugin = Arc::clone(plugin);
    let result = tokio::task::spawn_blocking(move || plugin.process_frame(&frame)).await;
    match result {
        Ok(Ok(_)) => {
            counters.processed.fetch_add(1, Ordering::Relaxed);
        }
        // already logged by the plugin
        Ok(Err(_)) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            error!(error = %e, "frame processing task failed");
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}
