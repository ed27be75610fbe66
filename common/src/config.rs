use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub plugin: PluginConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Arguments of the plugin configure call.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginConfig {
    pub port_name: String,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default)]
    pub blocking_callbacks: bool,
    /// Port of the upstream driver that produces the frames.
    pub array_port: String,
    #[serde(default)]
    pub array_addr: i32,
    /// Outstanding output frames allowed, 0 = unlimited.
    #[serde(default)]
    pub max_buffers: usize,
    /// Outstanding output bytes allowed, 0 = unlimited.
    #[serde(default)]
    pub max_memory: usize,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub stack_size: usize,
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
    /// Initial threshold, written through the validated parameter path.
    #[serde(default)]
    pub threshold: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_mode")]
    pub mode: String,
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default = "default_height")]
    pub height: usize,
    #[serde(default = "default_count")]
    pub count: u64,
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Emit RGB frames instead of monochrome.
    #[serde(default)]
    pub color: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mode: default_source_mode(),
            width: default_width(),
            height: default_height(),
            count: default_count(),
            fps: default_fps(),
            dir: None,
            color: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if config.plugin.queue_size == 0 {
            return Err(ConfigError::Invalid("plugin.queue_size must be at least 1".into()));
        }
        let fps = config.source.fps;
        let period = Duration::try_from_secs_f64(1.0 / fps).unwrap_or(Duration::ZERO);
        if !fps.is_finite() || fps <= 0.0 || period.is_zero() {
            return Err(ConfigError::Invalid(format!(
                "source.fps must be a positive rate with a non-zero frame period, got {fps}"
            )));
        }
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_queue_size() -> usize {
    20
}
fn default_max_threads() -> usize {
    1
}
fn default_source_mode() -> String {
    "ramp".into()
}
fn default_width() -> usize {
    640
}
fn default_height() -> usize {
    480
}
fn default_count() -> u64 {
    100
}
fn default_fps() -> f64 {
    10.0
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::parse(
            r#"
            [plugin]
            port_name = "THR1"
            array_port = "SIM1"
            "#,
        )
        .unwrap();
        assert_eq!(config.plugin.queue_size, 20);
        assert_eq!(config.plugin.max_threads, 1);
        assert!(!config.plugin.blocking_callbacks);
        assert!(config.plugin.threshold.is_none());
        assert_eq!(config.source.mode, "ramp");
        assert_eq!(config.logging.level, "info");
        assert!(config.output.dir.is_none());
    }

    #[test]
    fn full_config_parses() {
        let config = Config::parse(
            r#"
            [plugin]
            port_name = "THR1"
            queue_size = 4
            blocking_callbacks = true
            array_port = "SIM1"
            array_addr = 2
            max_buffers = 8
            max_memory = 1048576
            threshold = 100

            [source]
            mode = "files"
            dir = "/data/frames"
            color = true

            [output]
            dir = "/tmp/thr"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.plugin.queue_size, 4);
        assert!(config.plugin.blocking_callbacks);
        assert_eq!(config.plugin.array_addr, 2);
        assert_eq!(config.plugin.threshold, Some(100));
        assert_eq!(config.source.dir, Some(PathBuf::from("/data/frames")));
        assert!(config.source.color);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn missing_plugin_section_fails() {
        assert!(matches!(
            Config::parse("[logging]\nlevel = \"info\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn zero_queue_rejected() {
        let result = Config::parse(
            r#"
            [plugin]
            port_name = "THR1"
            array_port = "SIM1"
            queue_size = 0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unusable_fps_rejected() {
        for fps in ["nan", "inf", "1e12", "0.0", "-5.0"] {
            let result = Config::parse(&format!(
                "[plugin]\nport_name = \"THR1\"\narray_port = \"SIM1\"\n\n[source]\ncount = 1\nfps = {fps}\n"
            ));
            assert!(matches!(result, Err(ConfigError::Invalid(_))), "fps = {fps}");
        }
    }

    #[test]
    fn modest_fps_accepted() {
        let config = Config::parse(
            r#"
            [plugin]
            port_name = "THR1"
            array_port = "SIM1"

            [source]
            fps = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.source.fps, 0.5);
    }
}
