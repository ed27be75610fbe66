use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use nd_threshold_common::frame::{ColorMode, Frame};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinError;
use tracing::{debug, error, info};

use crate::pool::FramePool;
use crate::IocError;

fn fmt_ts(ms: i64) -> String {
    let dt: DateTime<Utc> = Utc
        .timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(Utc::now);
    dt.format("%Y%m%dT%H%M%S%3fZ").to_string()
}

/// File name for a forwarded frame, e.g. "20260218T093000000Z_000042.png".
pub fn frame_file_name(frame: &Frame) -> String {
    format!("{}_{:06}.png", fmt_ts(frame.captured_at_ms), frame.unique_id)
}

/// Write an 8-bit frame as PNG.
pub fn write_png(path: &Path, frame: &Frame) -> Result<(), IocError> {
    let (width, height) = (frame.width() as u32, frame.height() as u32);
    let data = frame.data().to_vec();
    match frame.info().color_mode {
        ColorMode::Mono => image::GrayImage::from_raw(width, height, data)
            .ok_or(IocError::Encode(frame.unique_id))?
            .save(path)?,
        ColorMode::Rgb1 => image::RgbImage::from_raw(width, height, data)
            .ok_or(IocError::Encode(frame.unique_id))?
            .save(path)?,
        _ => return Err(IocError::Encode(frame.unique_id)),
    }
    Ok(())
}

type WriteOutcome = (Frame, PathBuf, Result<(), IocError>);

/// Log the outcome of a frame write and return the frame's budget to the
/// pool. `bytes` covers the case where the writer task died with the frame.
fn settle_write(pool: &FramePool, bytes: usize, written: Result<WriteOutcome, JoinError>) {
    match written {
        Ok((frame, path, Ok(()))) => {
            debug!(unique_id = frame.unique_id, path = %path.display(), "frame written");
            pool.release(&frame);
        }
        Ok((frame, path, Err(e))) => {
            error!(
                unique_id = frame.unique_id,
                path = %path.display(),
                error = %e,
                "failed to write frame"
            );
            pool.release(&frame);
        }
        Err(e) => {
            error!(error = %e, "frame writer task failed");
            pool.release_bytes(bytes);
        }
    }
}

/// Downstream end of the plugin: optionally writes each forwarded frame to
/// `dir`, then returns its buffer to the pool. Returns the number of frames
/// received once the channel closes.
pub async fn run_sink(
    mut rx: UnboundedReceiver<Frame>,
    dir: Option<PathBuf>,
    pool: Arc<FramePool>,
) -> u64 {
    if let Some(dir) = &dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            error!(dir = %dir.display(), error = %e, "failed to create output directory");
        }
    }

    let mut received = 0u64;
    while let Some(frame) = rx.recv().await {
        received += 1;
        match &dir {
            Some(dir) => {
                let bytes = frame.info().total_bytes();
                let path = dir.join(frame_file_name(&frame));
                let written = tokio::task::spawn_blocking(move || {
                    let result = write_png(&path, &frame);
                    (frame, path, result)
                })
                .await;
                settle_write(&pool, bytes, written);
            }
            None => pool.release(&frame),
        }
    }

    info!(received, "frame sink closed");
    received
}

#[cfg(test)]
mod tests {
    use super::*;
    use nd_threshold_common::frame::{DataType, FrameInfo};
    use tokio::sync::mpsc;

    #[test]
    fn file_name_uses_timestamp_and_id() {
        let frame = Frame::mono8(1, 1, vec![0], 42, 1708300000000).unwrap();
        assert_eq!(frame_file_name(&frame), "20240218T234640000Z_000042.png");
    }

    #[test]
    fn unsupported_layout_not_encoded() {
        let info = FrameInfo::new(2, 2, ColorMode::Yuv422, DataType::UInt8);
        let frame = Frame::new(info, vec![0; 8], 3, 0).unwrap();
        let path = std::env::temp_dir().join("nd-threshold-yuv.png");
        assert!(matches!(write_png(&path, &frame), Err(IocError::Encode(3))));
    }

    #[tokio::test]
    async fn sink_writes_frames_and_releases_buffers() {
        let dir = std::env::temp_dir().join(format!("nd-threshold-sink-{}", std::process::id()));
        let pool = Arc::new(FramePool::new(0, 0));
        let info = FrameInfo::new(2, 2, ColorMode::Mono, DataType::UInt8);

        let mut frame = pool.alloc(&info).unwrap();
        frame.data_mut().copy_from_slice(&[0, 255, 255, 0]);
        frame.unique_id = 7;
        frame.captured_at_ms = 1708300000000;
        let name = frame_file_name(&frame);

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(frame).unwrap();
        drop(tx);

        let received = run_sink(rx, Some(dir.clone()), Arc::clone(&pool)).await;
        assert_eq!(received, 1);
        assert_eq!(pool.usage().buffers, 0);

        let written = image::open(dir.join(name)).unwrap().to_luma8();
        assert_eq!(written.into_raw(), vec![0, 255, 255, 0]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn failed_writer_task_still_releases_budget() {
        let pool = FramePool::new(1, 0);
        let info = FrameInfo::new(2, 2, ColorMode::Mono, DataType::UInt8);
        let frame = pool.alloc(&info).unwrap();
        let bytes = frame.info().total_bytes();

        let written = tokio::task::spawn_blocking(move || -> WriteOutcome {
            drop(frame);
            panic!("encoder crashed");
        })
        .await;
        assert!(written.is_err());

        settle_write(&pool, bytes, written);
        assert_eq!(pool.usage().buffers, 0);
        assert_eq!(pool.usage().bytes, 0);
        assert!(pool.alloc(&info).is_ok());
    }
}
