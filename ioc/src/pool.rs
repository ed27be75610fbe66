use nd_plugin_threshold::HostError;
use nd_threshold_common::frame::{Frame, FrameInfo};
use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolUsage {
    pub buffers: usize,
    pub bytes: usize,
}

/// Output buffer budget: caps the number and total size of frames handed out
/// and not yet released. A limit of 0 disables that cap.
pub struct FramePool {
    max_buffers: usize,
    max_memory: usize,
    usage: Mutex<PoolUsage>,
}

impl FramePool {
    pub fn new(max_buffers: usize, max_memory: usize) -> Self {
        Self {
            max_buffers,
            max_memory,
            usage: Mutex::new(PoolUsage::default()),
        }
    }

    pub fn alloc(&self, info: &FrameInfo) -> Result<Frame, HostError> {
        let requested = info.total_bytes();
        let mut usage = self.usage.lock();

        if self.max_buffers > 0 && usage.buffers >= self.max_buffers {
            return Err(HostError::BufferLimit {
                outstanding: usage.buffers,
                max: self.max_buffers,
            });
        }
        if self.max_memory > 0 && usage.bytes + requested > self.max_memory {
            return Err(HostError::MemoryLimit {
                requested,
                outstanding: usage.bytes,
                max: self.max_memory,
            });
        }

        usage.buffers += 1;
        usage.bytes += requested;
        debug!(requested, buffers = usage.buffers, bytes = usage.bytes, "buffer allocated");
        Ok(Frame::zeroed(*info))
    }

    /// Give back the budget held by `frame`.
    pub fn release(&self, frame: &Frame) {
        self.release_bytes(frame.info().total_bytes());
    }

    /// Give back one buffer of `bytes` when the frame itself is gone.
    pub fn release_bytes(&self, bytes: usize) {
        let mut usage = self.usage.lock();
        usage.buffers = usage.buffers.saturating_sub(1);
        usage.bytes = usage.bytes.saturating_sub(bytes);
    }

    pub fn usage(&self) -> PoolUsage {
        *self.usage.lock()
    }
}
