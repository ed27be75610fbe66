use std::collections::HashMap;
use std::fmt;

use crate::error::ThresholdError;

/// Threshold used until the first successful write.
pub const DEFAULT_THRESHOLD: u8 = 0;

pub const PLUGIN_TYPE: &str = "NDPluginThreshold";
pub const VERSION: u32 = 0;
pub const REVISION: u32 = 0;
pub const MODIFICATION: u32 = 1;

pub fn version_string() -> String {
    format!("{VERSION}.{REVISION}.{MODIFICATION}")
}

/// Integer parameters owned by the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    /// Outcome of the last frame, read-only.
    Status,
    /// Pixels under threshold in the last processed frame, read-only.
    NumPixThresh,
    /// Threshold value, read/write.
    Value,
}

impl Param {
    pub const ALL: [Param; 3] = [Param::Status, Param::NumPixThresh, Param::Value];

    /// Driver string used to address the parameter.
    pub fn drv_info(&self) -> &'static str {
        match self {
            Param::Status => "THR_STATUS",
            Param::NumPixThresh => "THR_NUM_PIX_THRESH",
            Param::Value => "THR_VALUE",
        }
    }

    pub fn from_drv_info(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.drv_info() == name)
    }

    pub fn is_read_only(&self) -> bool {
        !matches!(self, Param::Value)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Param::Status => "STATUS",
            Param::NumPixThresh => "NUM_PIX_THRESH",
            Param::Value => "VALUE",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PluginStatus {
    #[default]
    Ok = 0,
    Error = 1,
}

/// The single validated threshold value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdConfig {
    value: u8,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            value: DEFAULT_THRESHOLD,
        }
    }
}

impl ThresholdConfig {
    pub fn get(&self) -> u8 {
        self.value
    }

    /// Store `value` if it lies in `0..=255`; leaves the old value otherwise.
    pub fn set(&mut self, value: i64) -> Result<(), ThresholdError> {
        self.value = u8::try_from(value).map_err(|_| ThresholdError::OutOfRange(value))?;
        Ok(())
    }
}

/// Mutable plugin state, guarded by the plugin lock.
#[derive(Debug, Default)]
pub struct ParamStore {
    pub threshold: ThresholdConfig,
    pub status: PluginStatus,
    pub num_pix_thresh: u64,
    /// Floating point writes, kept as given.
    pub floats: HashMap<String, f64>,
}

impl ParamStore {
    pub fn int_value(&self, param: Param) -> i64 {
        match param {
            Param::Status => self.status as i64,
            Param::NumPixThresh => self.num_pix_thresh as i64,
            Param::Value => self.threshold.get() as i64,
        }
    }

    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            status: self.status,
            num_pix_thresh: self.num_pix_thresh,
            threshold: self.threshold.get(),
        }
    }
}

/// Copy of the plugin parameters handed to the host on every callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSnapshot {
    pub status: PluginStatus,
    pub num_pix_thresh: u64,
    pub threshold: u8,
}
