use nd_threshold_common::frame::{Frame, FrameInfo};

use crate::error::ThresholdError;

/// Output value for pixels strictly below the threshold.
pub const BELOW: u8 = 0;
/// Output value for pixels at or above the threshold.
pub const AT_OR_ABOVE: u8 = 255;

/// Result of thresholding one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdOutput {
    pub frame: Frame,
    pub pixels_under: u64,
}

/// Fails with `ColorFormatUnsupported` unless the frame is 8-bit monochrome.
pub fn check_format(info: &FrameInfo) -> Result<(), ThresholdError> {
    if info.is_mono8() {
        Ok(())
    } else {
        Err(ThresholdError::ColorFormatUnsupported {
            color_mode: info.color_mode,
            data_type: info.data_type,
        })
    }
}

/// Threshold `frame` into a freshly allocated output frame.
///
/// Nothing is allocated when the format check fails.
pub fn apply(frame: &Frame, threshold: u8) -> Result<ThresholdOutput, ThresholdError> {
    check_format(frame.info())?;

    let bytes = frame.info().total_bytes();
    let mut data = Vec::new();
    data.try_reserve_exact(bytes)
        .map_err(|e| ThresholdError::AllocationFailure {
            bytes,
            reason: e.to_string(),
        })?;
    data.resize(bytes, 0);
    let mut output = Frame::new(*frame.info(), data, frame.unique_id, frame.captured_at_ms)
        .map_err(|_| ThresholdError::OutputSize {
            got: 0,
            expected: bytes,
        })?;

    let pixels_under = apply_into(frame, threshold, &mut output)?;
    Ok(ThresholdOutput {
        frame: output,
        pixels_under,
    })
}

/// Threshold `frame` into `output`, which must have the same shape.
///
/// Every output byte becomes [`BELOW`] when the input byte is `< threshold`
/// and [`AT_OR_ABOVE`] otherwise. Returns the number of pixels below.
pub fn apply_into(
    frame: &Frame,
    threshold: u8,
    output: &mut Frame,
) -> Result<u64, ThresholdError> {
    check_format(frame.info())?;
    if output.info() != frame.info() {
        return Err(ThresholdError::OutputSize {
            got: output.info().total_bytes(),
            expected: frame.info().total_bytes(),
        });
    }

    let mut pixels_under = 0u64;
    for (dst, &src) in output.data_mut().iter_mut().zip(frame.data()) {
        if src < threshold {
            *dst = BELOW;
            pixels_under += 1;
        } else {
            *dst = AT_OR_ABOVE;
        }
    }
    Ok(pixels_under)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nd_threshold_common::frame::{ColorMode, DataType};

    fn every_value() -> Frame {
        Frame::mono8(16, 16, (0..=255u8).collect(), 1, 0).unwrap()
    }

    #[test]
    fn all_zero_frame_is_fully_under() {
        let frame = Frame::mono8(4, 4, vec![0; 16], 1, 0).unwrap();
        let out = apply(&frame, 1).unwrap();
        assert_eq!(out.pixels_under, 16);
        assert!(out.frame.data().iter().all(|&p| p == 0));
    }

    #[test]
    fn stepped_values_split_at_threshold() {
        let values: Vec<u8> = (0..16).map(|i| i * 10).collect();
        let frame = Frame::mono8(4, 4, values, 1, 0).unwrap();
        let out = apply(&frame, 100).unwrap();
        assert_eq!(out.pixels_under, 10);
        assert_eq!(&out.frame.data()[..10], &[0; 10]);
        assert_eq!(&out.frame.data()[10..], &[255; 6]);
    }

    #[test]
    fn zero_threshold_counts_nothing() {
        let out = apply(&every_value(), 0).unwrap();
        assert_eq!(out.pixels_under, 0);
        assert!(out.frame.data().iter().all(|&p| p == 255));
    }

    #[test]
    fn max_threshold_keeps_only_saturated() {
        let out = apply(&every_value(), 255).unwrap();
        assert_eq!(out.pixels_under, 255);
        assert_eq!(out.frame.data()[255], 255);
        assert!(out.frame.data()[..255].iter().all(|&p| p == 0));
    }

    #[test]
    fn mask_matches_comparison_for_every_threshold() {
        let frame = every_value();
        for t in 0..=255u8 {
            let out = apply(&frame, t).unwrap();
            assert_eq!(out.pixels_under, t as u64, "threshold {t}");
            for (i, (&src, &dst)) in frame.data().iter().zip(out.frame.data()).enumerate() {
                assert_eq!(dst == 0, src < t, "threshold {t}, pixel {i}");
                assert!(dst == 0 || dst == 255);
            }
        }
    }

    #[test]
    fn repeated_application_is_identical() {
        let values: Vec<u8> = (0..64).map(|i| (i * 37 % 256) as u8).collect();
        let frame = Frame::mono8(8, 8, values, 5, 0).unwrap();
        let first = apply(&frame, 90).unwrap();
        let second = apply(&frame, 90).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn output_keeps_identity() {
        let frame = Frame::mono8(2, 1, vec![3, 200], 77, 1708300000000).unwrap();
        let out = apply(&frame, 100).unwrap();
        assert_eq!(out.frame.unique_id, 77);
        assert_eq!(out.frame.captured_at_ms, 1708300000000);
        assert_eq!(out.frame.info(), frame.info());
    }

    #[test]
    fn color_frame_rejected() {
        let info = FrameInfo::new(2, 2, ColorMode::Rgb1, DataType::UInt8);
        let frame = Frame::new(info, vec![0; 12], 1, 0).unwrap();
        assert!(matches!(
            apply(&frame, 10),
            Err(ThresholdError::ColorFormatUnsupported {
                color_mode: ColorMode::Rgb1,
                ..
            })
        ));
    }

    #[test]
    fn wide_mono_rejected() {
        let info = FrameInfo::new(2, 2, ColorMode::Mono, DataType::UInt16);
        let frame = Frame::new(info, vec![0; 8], 1, 0).unwrap();
        assert!(matches!(
            apply(&frame, 10),
            Err(ThresholdError::ColorFormatUnsupported {
                data_type: DataType::UInt16,
                ..
            })
        ));
    }

    #[test]
    fn apply_into_rejects_mismatched_output() {
        let frame = Frame::mono8(4, 4, vec![0; 16], 1, 0).unwrap();
        let mut output = Frame::zeroed(FrameInfo::new(2, 2, ColorMode::Mono, DataType::UInt8));
        assert!(matches!(
            apply_into(&frame, 1, &mut output),
            Err(ThresholdError::OutputSize { got: 4, expected: 16 })
        ));
    }
}
