use nd_threshold_common::config::PluginConfig;
use nd_threshold_common::frame::Frame;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::error::ThresholdError;
use crate::host::HostRuntime;
use crate::params::{self, Param, ParamSnapshot, ParamStore, PluginStatus};
use crate::transform::{self, ThresholdOutput};

/// Threshold plugin bound to a host runtime.
///
/// One lock guards every plugin parameter. Frame processing holds it to read
/// the threshold, drops it for the pixel scan, then takes it again to publish
/// the result and forward the output.
pub struct ThresholdPlugin<H: HostRuntime> {
    config: PluginConfig,
    host: H,
    state: Mutex<ParamStore>,
    version: String,
}

impl<H: HostRuntime> ThresholdPlugin<H> {
    /// Build the plugin and apply the configured initial threshold, if any.
    pub fn configure(config: PluginConfig, host: H) -> Result<Self, ThresholdError> {
        let plugin = Self {
            host,
            state: Mutex::new(ParamStore::default()),
            version: params::version_string(),
            config,
        };

        if let Some(threshold) = plugin.config.threshold {
            plugin.set_threshold(threshold)?;
        }

        info!(
            port = plugin.config.port_name,
            array_port = plugin.config.array_port,
            array_addr = plugin.config.array_addr,
            version = plugin.version,
            threshold = plugin.threshold(),
            "initialization complete"
        );
        Ok(plugin)
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn port_name(&self) -> &str {
        &self.config.port_name
    }

    pub fn plugin_type(&self) -> &'static str {
        params::PLUGIN_TYPE
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn threshold(&self) -> u8 {
        self.state.lock().threshold.get()
    }

    pub fn set_threshold(&self, value: i64) -> Result<(), ThresholdError> {
        self.write_param(Param::Value.drv_info(), value)
    }

    pub fn int_param(&self, param: Param) -> i64 {
        self.state.lock().int_value(param)
    }

    pub fn float_param(&self, name: &str) -> Option<f64> {
        self.state.lock().floats.get(name).copied()
    }

    pub fn snapshot(&self) -> ParamSnapshot {
        self.state.lock().snapshot()
    }

    /// Integer write from the record layer.
    ///
    /// Plugin parameters are handled here; anything else belongs to the base
    /// driver and goes to the host.
    pub fn write_int32(&self, name: &str, value: i32) -> Result<(), ThresholdError> {
        self.write_param(name, value.into())
    }

    fn write_param(&self, name: &str, value: i64) -> Result<(), ThresholdError> {
        let mut state = self.state.lock();
        let result = match Param::from_drv_info(name) {
            Some(Param::Value) => state.threshold.set(value),
            Some(param) => Err(ThresholdError::ReadOnly(param.drv_info())),
            None => i32::try_from(value)
                .map_err(|_| ThresholdError::OutOfRange(value))
                .and_then(|v| self.host.write_int32(name, v).map_err(Into::into)),
        };
        self.host.param_callbacks(&state.snapshot());
        drop(state);

        if let Err(e) = &result {
            error!(param = name, value, error = %e, "failed to write int32 parameter");
        }
        result
    }

    /// Float write from the record layer. Values are stored without range checks.
    pub fn write_float64(&self, name: &str, value: f64) -> Result<(), ThresholdError> {
        let mut state = self.state.lock();
        let result = match Param::from_drv_info(name) {
            Some(param) => Err(ThresholdError::WrongType(param.drv_info())),
            None => self
                .host
                .write_float64(name, value)
                .map(|()| {
                    state.floats.insert(name.to_string(), value);
                })
                .map_err(Into::into),
        };
        self.host.param_callbacks(&state.snapshot());
        drop(state);

        if let Err(e) = &result {
            error!(param = name, value, error = %e, "failed to write float64 parameter");
        }
        result
    }

    /// Threshold one delivered frame and forward the result.
    ///
    /// Returns the number of pixels under threshold. On error the frame is
    /// dropped, nothing is forwarded and NUM_PIX_THRESH keeps its old value.
    pub fn process_frame(&self, frame: &Frame) -> Result<u64, ThresholdError> {
        let threshold = {
            let state = self.state.lock();
            debug!(
                port = self.config.port_name,
                unique_id = frame.unique_id,
                "processing frame"
            );
            state.threshold.get()
        };

        let scanned = self.scan(frame, threshold);

        let mut state = self.state.lock();
        match scanned {
            Ok(ThresholdOutput {
                frame: mut output,
                pixels_under,
            }) => {
                output.copy_metadata_from(frame);
                state.num_pix_thresh = pixels_under;
                state.status = PluginStatus::Ok;
                self.host.forward_frame(output, true);
                self.host.param_callbacks(&state.snapshot());
                debug!(unique_id = frame.unique_id, threshold, pixels_under, "frame thresholded");
                Ok(pixels_under)
            }
            Err(e) => {
                state.status = PluginStatus::Error;
                self.host.param_callbacks(&state.snapshot());
                error!(
                    port = self.config.port_name,
                    unique_id = frame.unique_id,
                    error = %e,
                    "frame not processed"
                );
                Err(e)
            }
        }
    }

    fn scan(&self, frame: &Frame, threshold: u8) -> Result<ThresholdOutput, ThresholdError> {
        transform::check_format(frame.info())?;

        let mut output =
            self.host
                .alloc_frame(frame.info())
                .map_err(|e| ThresholdError::AllocationFailure {
                    bytes: frame.info().total_bytes(),
                    reason: e.to_string(),
                })?;

        match transform::apply_into(frame, threshold, &mut output) {
            Ok(pixels_under) => Ok(ThresholdOutput {
                frame: output,
                pixels_under,
            }),
            Err(e) => {
                self.host.release_frame(output);
                Err(e)
            }
        }
    }
}
