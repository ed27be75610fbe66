use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use nd_threshold_common::config::SourceConfig;
use nd_threshold_common::frame::{ColorMode, DataType, Frame, FrameInfo};
use tracing::{debug, info, warn};

use crate::driver::FrameDriver;
use crate::IocError;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "pgm", "ppm"];

/// Stands in for the upstream detector driver.
pub enum FrameSource {
    /// Synthetic gradient frames.
    Ramp {
        width: usize,
        height: usize,
        count: u64,
        color: bool,
    },
    /// Image files from a directory, in name order.
    Files { paths: Vec<PathBuf>, color: bool },
}

impl FrameSource {
    pub fn from_config(config: &SourceConfig) -> Result<Self, IocError> {
        match config.mode.as_str() {
            "ramp" => Ok(FrameSource::Ramp {
                width: config.width,
                height: config.height,
                count: config.count,
                color: config.color,
            }),
            "files" => {
                let dir = config.dir.as_deref().ok_or(IocError::MissingSourceDir)?;
                Ok(FrameSource::Files {
                    paths: list_images(dir)?,
                    color: config.color,
                })
            }
            other => Err(IocError::UnknownSourceMode(other.to_string())),
        }
    }

    pub fn len(&self) -> u64 {
        match self {
            FrameSource::Ramp { count, .. } => *count,
            FrameSource::Files { paths, .. } => paths.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produce frame `index`, stamped with `unique_id` and the current time.
    pub fn frame(&self, index: u64, unique_id: u64) -> Result<Frame, IocError> {
        let captured_at_ms = Utc::now().timestamp_millis();
        match self {
            FrameSource::Ramp {
                width,
                height,
                color,
                ..
            } => ramp_frame(*width, *height, *color, index, unique_id, captured_at_ms),
            FrameSource::Files { paths, color } => {
                let path = paths
                    .get(index as usize)
                    .ok_or(IocError::SourceExhausted(index))?;
                load_image(path, *color, unique_id, captured_at_ms)
            }
        }
    }
}

/// Horizontal gradient that shifts by `index` every frame.
pub fn ramp_frame(
    width: usize,
    height: usize,
    color: bool,
    index: u64,
    unique_id: u64,
    captured_at_ms: i64,
) -> Result<Frame, IocError> {
    let row: Vec<u8> = (0..width)
        .map(|x| ((x * 256 / width.max(1)) as u64 + index) as u8)
        .collect();

    let (color_mode, channels) = if color {
        (ColorMode::Rgb1, 3)
    } else {
        (ColorMode::Mono, 1)
    };
    let mut data = Vec::with_capacity(width * height * channels);
    for _ in 0..height {
        for &value in &row {
            data.extend(std::iter::repeat(value).take(channels));
        }
    }

    let info = FrameInfo::new(width, height, color_mode, DataType::UInt8);
    Ok(Frame::new(info, data, unique_id, captured_at_ms)?)
}

fn load_image(
    path: &Path,
    color: bool,
    unique_id: u64,
    captured_at_ms: i64,
) -> Result<Frame, IocError> {
    let img = image::open(path)?;
    let (width, height) = (img.width() as usize, img.height() as usize);
    let (color_mode, data) = if color {
        (ColorMode::Rgb1, img.to_rgb8().into_raw())
    } else {
        (ColorMode::Mono, img.to_luma8().into_raw())
    };
    let info = FrameInfo::new(width, height, color_mode, DataType::UInt8);
    Ok(Frame::new(info, data, unique_id, captured_at_ms)?)
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, IocError> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| IocError::Io(dir.display().to_string(), e))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Feed every source frame to the driver at `fps`.
pub async fn run_source(source: &FrameSource, driver: &FrameDriver, fps: f64) {
    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / fps));
    if source.is_empty() {
        warn!("frame source has no frames");
        return;
    }
    let total = source.len();
    info!(total, fps, "frame source started");

    for index in 0..total {
        interval.tick().await;
        let unique_id = index + 1;
        match source.frame(index, unique_id) {
            Ok(frame) => driver.deliver(frame).await,
            Err(e) => {
                warn!(index, error = %e, "failed to produce frame, skipping");
                continue;
            }
        }
        if unique_id % 100 == 0 {
            debug!(unique_id, "frames delivered");
        }
    }
    info!(total, "frame source finished");
}
