//! areaDetector-style threshold plugin: turns 8-bit monochrome frames into a
//! binary 0/255 mask and counts the pixels under a configurable threshold.

pub mod error;
pub mod host;
pub mod params;
pub mod plugin;
pub mod transform;

pub use error::{HostError, ThresholdError};
pub use host::HostRuntime;
pub use params::{Param, ParamSnapshot, PluginStatus};
pub use plugin::ThresholdPlugin;
