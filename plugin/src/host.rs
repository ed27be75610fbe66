use nd_threshold_common::frame::{Frame, FrameInfo};

use crate::error::HostError;
use crate::params::ParamSnapshot;

/// Services the plugin needs from the frame-processing runtime hosting it.
///
/// Implementations own buffer allocation, downstream delivery and the base
/// driver parameters the plugin does not manage itself.
pub trait HostRuntime: Send + Sync {
    /// Obtain an output buffer shaped like `info`.
    fn alloc_frame(&self, info: &FrameInfo) -> Result<Frame, HostError>;

    /// Hand a finished frame downstream.
    fn forward_frame(&self, frame: Frame, notify_downstream: bool);

    /// Return a buffer from `alloc_frame` that will not be forwarded.
    fn release_frame(&self, _frame: Frame) {}

    /// Integer write for a parameter the base driver owns.
    fn write_int32(&self, name: &str, value: i32) -> Result<(), HostError>;

    /// Float write for a parameter the base driver owns.
    fn write_float64(&self, name: &str, value: f64) -> Result<(), HostError>;

    /// Publish current plugin parameter values.
    fn param_callbacks(&self, _params: &ParamSnapshot) {}
}
