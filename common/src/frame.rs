use std::fmt;

/// Pixel layout of a frame, numbered the way areaDetector numbers `NDColorMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorMode {
    Mono,
    Bayer,
    /// Pixel-interleaved RGB.
    Rgb1,
    /// Row-interleaved RGB.
    Rgb2,
    /// Plane-interleaved RGB.
    Rgb3,
    Yuv444,
    Yuv422,
    Yuv411,
}

impl ColorMode {
    /// Number of data elements needed to hold `pixels` pixels in this layout.
    pub fn elements_for(&self, pixels: usize) -> usize {
        match self {
            ColorMode::Mono | ColorMode::Bayer => pixels,
            ColorMode::Rgb1 | ColorMode::Rgb2 | ColorMode::Rgb3 | ColorMode::Yuv444 => pixels * 3,
            ColorMode::Yuv422 => pixels * 2,
            // 4 pixels share 6 bytes
            ColorMode::Yuv411 => pixels * 3 / 2,
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorMode::Mono => "Mono",
            ColorMode::Bayer => "Bayer",
            ColorMode::Rgb1 => "RGB1",
            ColorMode::Rgb2 => "RGB2",
            ColorMode::Rgb3 => "RGB3",
            ColorMode::Yuv444 => "YUV444",
            ColorMode::Yuv422 => "YUV422",
            ColorMode::Yuv411 => "YUV411",
        };
        f.write_str(name)
    }
}

/// Element type of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl DataType {
    pub fn bytes_per_element(&self) -> usize {
        match self {
            DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::UInt64 | DataType::Float64 => 8,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Shape and format of a frame, without the pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub width: usize,
    pub height: usize,
    pub color_mode: ColorMode,
    pub data_type: DataType,
}

impl FrameInfo {
    pub fn new(width: usize, height: usize, color_mode: ColorMode, data_type: DataType) -> Self {
        Self {
            width,
            height,
            color_mode,
            data_type,
        }
    }

    pub fn total_pixels(&self) -> usize {
        self.width * self.height
    }

    /// Size of the backing buffer in bytes, derived from the metadata alone.
    pub fn total_bytes(&self) -> usize {
        self.color_mode.elements_for(self.total_pixels()) * self.data_type.bytes_per_element()
    }

    /// Returns true for the single layout the threshold plugin accepts.
    pub fn is_mono8(&self) -> bool {
        self.color_mode == ColorMode::Mono && self.data_type == DataType::UInt8
    }
}

/// One acquired image: a row-major pixel buffer plus its metadata.
///
/// The buffer length is checked against the metadata once, in [`Frame::new`],
/// so consumers can index the data without re-validating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    info: FrameInfo,
    data: Vec<u8>,
    pub unique_id: u64,
    pub captured_at_ms: i64,
}

impl Frame {
    pub fn new(
        info: FrameInfo,
        data: Vec<u8>,
        unique_id: u64,
        captured_at_ms: i64,
    ) -> Result<Self, FrameError> {
        let expected = info.total_bytes();
        if data.len() != expected {
            return Err(FrameError::SizeMismatch {
                got: data.len(),
                expected,
            });
        }
        Ok(Self {
            info,
            data,
            unique_id,
            captured_at_ms,
        })
    }

    /// Convenience constructor for an 8-bit monochrome frame.
    pub fn mono8(
        width: usize,
        height: usize,
        data: Vec<u8>,
        unique_id: u64,
        captured_at_ms: i64,
    ) -> Result<Self, FrameError> {
        let info = FrameInfo::new(width, height, ColorMode::Mono, DataType::UInt8);
        Self::new(info, data, unique_id, captured_at_ms)
    }

    /// Zero-filled frame with the given shape.
    pub fn zeroed(info: FrameInfo) -> Self {
        Self {
            info,
            data: vec![0; info.total_bytes()],
            unique_id: 0,
            captured_at_ms: 0,
        }
    }

    pub fn info(&self) -> &FrameInfo {
        &self.info
    }

    pub fn width(&self) -> usize {
        self.info.width
    }

    pub fn height(&self) -> usize {
        self.info.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the pixel bytes. The length is fixed by the metadata.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Copy identity and timing from the frame this one was derived from.
    pub fn copy_metadata_from(&mut self, source: &Frame) {
        self.unique_id = source.unique_id;
        self.captured_at_ms = source.captured_at_ms;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame buffer size mismatch: got {got} bytes, expected {expected}")]
    SizeMismatch { got: usize, expected: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono8_accepts_exact_size() {
        let frame = Frame::mono8(4, 2, vec![7; 8], 3, 1708300000000).unwrap();
        assert_eq!(frame.info().total_pixels(), 8);
        assert_eq!(frame.info().total_bytes(), 8);
        assert!(frame.info().is_mono8());
        assert_eq!(frame.unique_id, 3);
    }

    #[test]
    fn rejects_short_buffer() {
        let result = Frame::mono8(4, 4, vec![0; 15], 0, 0);
        assert!(matches!(
            result,
            Err(FrameError::SizeMismatch {
                got: 15,
                expected: 16
            })
        ));
    }

    #[test]
    fn total_bytes_accounts_for_layout_and_type() {
        let rgb = FrameInfo::new(10, 10, ColorMode::Rgb1, DataType::UInt8);
        assert_eq!(rgb.total_bytes(), 300);
        assert!(!rgb.is_mono8());

        let mono16 = FrameInfo::new(10, 10, ColorMode::Mono, DataType::UInt16);
        assert_eq!(mono16.total_bytes(), 200);
        assert!(!mono16.is_mono8());

        let yuv411 = FrameInfo::new(4, 2, ColorMode::Yuv411, DataType::UInt8);
        assert_eq!(yuv411.total_bytes(), 12);
    }

    #[test]
    fn copy_metadata_keeps_shape() {
        let src = Frame::mono8(2, 2, vec![1, 2, 3, 4], 42, 99).unwrap();
        let mut dst = Frame::zeroed(*src.info());
        dst.copy_metadata_from(&src);
        assert_eq!(dst.unique_id, 42);
        assert_eq!(dst.captured_at_ms, 99);
        assert_eq!(dst.data(), &[0, 0, 0, 0]);
    }
}
