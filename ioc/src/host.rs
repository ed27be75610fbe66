use std::collections::HashMap;
use std::sync::Arc;

use nd_plugin_threshold::{HostError, HostRuntime, ParamSnapshot};
use nd_threshold_common::frame::{Frame, FrameInfo};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::pool::FramePool;

pub const ENABLE_CALLBACKS: &str = "ENABLE_CALLBACKS";
pub const BLOCKING_CALLBACKS: &str = "BLOCKING_CALLBACKS";
pub const MIN_CALLBACK_TIME: &str = "MIN_CALLBACK_TIME";
pub const MAX_BYTE_RATE: &str = "MAX_BYTE_RATE";

/// Base driver parameters the host answers for.
struct BaseParams {
    ints: HashMap<&'static str, i32>,
    floats: HashMap<&'static str, f64>,
}

impl BaseParams {
    fn new(blocking_callbacks: bool) -> Self {
        let ints = HashMap::from([
            (ENABLE_CALLBACKS, 1),
            (BLOCKING_CALLBACKS, blocking_callbacks as i32),
        ]);
        let floats = HashMap::from([(MIN_CALLBACK_TIME, 0.0), (MAX_BYTE_RATE, 0.0)]);
        Self { ints, floats }
    }
}

/// In-process host: output buffers come from a [`FramePool`] and forwarded
/// frames go to the sink channel.
pub struct IocHost {
    pool: Arc<FramePool>,
    downstream: UnboundedSender<Frame>,
    base: Mutex<BaseParams>,
    published: Mutex<Option<ParamSnapshot>>,
}

impl IocHost {
    pub fn new(
        pool: Arc<FramePool>,
        downstream: UnboundedSender<Frame>,
        blocking_callbacks: bool,
    ) -> Self {
        Self {
            pool,
            downstream,
            base: Mutex::new(BaseParams::new(blocking_callbacks)),
            published: Mutex::new(None),
        }
    }

    pub fn callbacks_enabled(&self) -> bool {
        self.base_int(ENABLE_CALLBACKS).unwrap_or(0) != 0
    }

    pub fn base_int(&self, name: &str) -> Option<i32> {
        self.base.lock().ints.get(name).copied()
    }

    /// Last parameter values the plugin published.
    pub fn published(&self) -> Option<ParamSnapshot> {
        *self.published.lock()
    }
}

impl HostRuntime for IocHost {
    fn alloc_frame(&self, info: &FrameInfo) -> Result<Frame, HostError> {
        self.pool.alloc(info)
    }

    fn forward_frame(&self, frame: Frame, notify_downstream: bool) {
        if !notify_downstream {
            self.pool.release(&frame);
            return;
        }
        if let Err(e) = self.downstream.send(frame) {
            warn!(unique_id = e.0.unique_id, "downstream closed, discarding frame");
            self.pool.release(&e.0);
        }
    }

    fn release_frame(&self, frame: Frame) {
        self.pool.release(&frame);
    }

    fn write_int32(&self, name: &str, value: i32) -> Result<(), HostError> {
        let mut base = self.base.lock();
        match base.ints.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(HostError::UnknownParam(name.to_string())),
        }
    }

    fn write_float64(&self, name: &str, value: f64) -> Result<(), HostError> {
        let mut base = self.base.lock();
        match base.floats.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(HostError::UnknownParam(name.to_string())),
        }
    }

    fn param_callbacks(&self, params: &ParamSnapshot) {
        debug!(
            status = params.status as i32,
            num_pix_thresh = params.num_pix_thresh,
            threshold = params.threshold,
            "params updated"
        );
        *self.published.lock() = Some(*params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nd_threshold_common::frame::{ColorMode, DataType};
    use tokio::sync::mpsc;

    fn host(pool: Arc<FramePool>) -> (IocHost, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (IocHost::new(pool, tx, false), rx)
    }

    #[test]
    fn forwarded_frame_reaches_sink() {
        let pool = Arc::new(FramePool::new(0, 0));
        let (host, mut rx) = host(Arc::clone(&pool));
        let info = FrameInfo::new(2, 2, ColorMode::Mono, DataType::UInt8);
        let frame = host.alloc_frame(&info).unwrap();
        host.forward_frame(frame, true);
        assert!(rx.try_recv().is_ok());
        assert_eq!(pool.usage().buffers, 1);
    }

    #[test]
    fn unnotified_or_undeliverable_frames_are_released() {
        let pool = Arc::new(FramePool::new(0, 0));
        let (host, rx) = host(Arc::clone(&pool));
        let info = FrameInfo::new(2, 2, ColorMode::Mono, DataType::UInt8);

        let frame = host.alloc_frame(&info).unwrap();
        host.forward_frame(frame, false);
        assert_eq!(pool.usage().buffers, 0);

        drop(rx);
        let frame = host.alloc_frame(&info).unwrap();
        host.forward_frame(frame, true);
        assert_eq!(pool.usage().buffers, 0);
    }

    #[test]
    fn base_params_known_names_only() {
        let (host, _rx) = host(Arc::new(FramePool::new(0, 0)));
        assert!(host.callbacks_enabled());
        host.write_int32(ENABLE_CALLBACKS, 0).unwrap();
        assert!(!host.callbacks_enabled());
        host.write_float64(MIN_CALLBACK_TIME, 0.5).unwrap();
        assert_eq!(host.base.lock().floats.get(MIN_CALLBACK_TIME), Some(&0.5));
        assert!(matches!(
            host.write_int32("THR_BOGUS", 1),
            Err(HostError::UnknownParam(_))
        ));
        assert!(host.write_float64("THR_BOGUS", 1.0).is_err());
    }
}
