//! Image shape and sample type descriptors.
//!
//! [`ImageSpec`] describes the geometry and storage type of an image
//! without carrying any pixel data. It is built once and handed to an
//! [`ImageBuf`](crate::ImageBuf), which never changes it afterwards.

use core::fmt;

use crate::buffer::BufferError;

// ---------------------------------------------------------------------------
// SampleType
// ---------------------------------------------------------------------------

/// Storage type of a single channel value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SampleType {
    /// 8-bit unsigned integer, normalized to `[0, 1]`.
    U8,
    /// 8-bit signed integer, normalized to `[-1, 1]`.
    I8,
    /// 16-bit unsigned integer, normalized to `[0, 1]`.
    U16,
    /// 16-bit signed integer, normalized to `[-1, 1]`.
    I16,
    /// 32-bit unsigned integer, normalized to `[0, 1]`.
    U32,
    /// 32-bit signed integer, normalized to `[-1, 1]`.
    I32,
    /// 16-bit IEEE half float, widened to `f32` exactly.
    F16,
    /// 32-bit IEEE float, stored as-is.
    F32,
}

impl SampleType {
    /// Byte size of a single sample.
    #[inline]
    pub const fn byte_size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 | Self::F16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
        }
    }

    /// Whether samples are stored as floating point.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F16 | Self::F32)
    }

    /// Whether the integer encoding is signed. Always `true` for floats.
    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::F16 | Self::F32
        )
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::U8 => "uint8",
            Self::I8 => "int8",
            Self::U16 => "uint16",
            Self::I16 => "int16",
            Self::U32 => "uint32",
            Self::I32 => "int32",
            Self::F16 => "half",
            Self::F32 => "float",
        })
    }
}

// ---------------------------------------------------------------------------
// ImageSpec
// ---------------------------------------------------------------------------

/// Shape and sample type of an image.
///
/// Pixels are laid out row-major with channels interleaved and no row
/// padding, so every stride is implied by the spec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageSpec {
    width: u32,
    height: u32,
    nchannels: u16,
    format: SampleType,
}

impl ImageSpec {
    /// Create a spec, validating that every dimension is non-zero and that
    /// the total byte count fits in memory.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidSpec`] for a zero width, height or
    /// channel count, or when `width * height * nchannels * sample size`
    /// overflows `usize`.
    pub fn new(
        width: u32,
        height: u32,
        nchannels: u16,
        format: SampleType,
    ) -> Result<Self, BufferError> {
        if width == 0 || height == 0 {
            return Err(BufferError::InvalidSpec {
                reason: "width and height must be positive",
            });
        }
        if nchannels == 0 {
            return Err(BufferError::InvalidSpec {
                reason: "channel count must be positive",
            });
        }
        let spec = Self {
            width,
            height,
            nchannels,
            format,
        };
        if spec.checked_image_bytes().is_none() {
            return Err(BufferError::InvalidSpec {
                reason: "image byte size overflows",
            });
        }
        Ok(spec)
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of interleaved channels per pixel.
    #[inline]
    pub fn nchannels(&self) -> u16 {
        self.nchannels
    }

    /// Storage type shared by all channels.
    #[inline]
    pub fn format(&self) -> SampleType {
        self.format
    }

    /// Bytes per sample.
    #[inline]
    pub fn sample_bytes(&self) -> usize {
        self.format.byte_size()
    }

    /// Bytes per pixel (all channels).
    #[inline]
    pub fn pixel_bytes(&self) -> usize {
        self.nchannels as usize * self.format.byte_size()
    }

    /// Bytes per row.
    #[inline]
    pub fn scanline_bytes(&self) -> usize {
        self.width as usize * self.pixel_bytes()
    }

    /// Total bytes of pixel data. Validated not to overflow at construction.
    #[inline]
    pub fn image_bytes(&self) -> usize {
        self.scanline_bytes() * self.height as usize
    }

    /// Number of pixels.
    #[inline]
    pub fn image_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Byte offset of the sample at `(x, y, channel)`, or `None` when any
    /// coordinate is out of range.
    #[inline]
    pub fn sample_offset(&self, x: u32, y: u32, channel: u16) -> Option<usize> {
        if x >= self.width || y >= self.height || channel >= self.nchannels {
            return None;
        }
        Some(
            y as usize * self.scanline_bytes()
                + x as usize * self.pixel_bytes()
                + channel as usize * self.sample_bytes(),
        )
    }

    fn checked_image_bytes(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.nchannels as usize)?
            .checked_mul(self.format.byte_size())
    }
}

impl fmt::Display for ImageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{} {}",
            self.width, self.height, self.nchannels, self.format
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_type_byte_size() {
        assert_eq!(SampleType::U8.byte_size(), 1);
        assert_eq!(SampleType::I8.byte_size(), 1);
        assert_eq!(SampleType::U16.byte_size(), 2);
        assert_eq!(SampleType::I16.byte_size(), 2);
        assert_eq!(SampleType::U32.byte_size(), 4);
        assert_eq!(SampleType::I32.byte_size(), 4);
        assert_eq!(SampleType::F16.byte_size(), 2);
        assert_eq!(SampleType::F32.byte_size(), 4);
    }

    #[test]
    fn spec_arithmetic() {
        let spec = ImageSpec::new(10, 5, 3, SampleType::U16).unwrap();
        assert_eq!(spec.sample_bytes(), 2);
        assert_eq!(spec.pixel_bytes(), 6);
        assert_eq!(spec.scanline_bytes(), 60);
        assert_eq!(spec.image_bytes(), 300);
        assert_eq!(spec.image_pixels(), 50);
    }

    #[test]
    fn sample_offset_is_row_major_interleaved() {
        let spec = ImageSpec::new(4, 3, 2, SampleType::F32).unwrap();
        assert_eq!(spec.sample_offset(0, 0, 0), Some(0));
        assert_eq!(spec.sample_offset(0, 0, 1), Some(4));
        assert_eq!(spec.sample_offset(1, 0, 0), Some(8));
        assert_eq!(spec.sample_offset(0, 1, 0), Some(32));
        assert_eq!(spec.sample_offset(3, 2, 1), Some(2 * 32 + 3 * 8 + 4));
    }

    #[test]
    fn sample_offset_rejects_out_of_range() {
        let spec = ImageSpec::new(4, 3, 2, SampleType::U8).unwrap();
        assert_eq!(spec.sample_offset(4, 0, 0), None);
        assert_eq!(spec.sample_offset(0, 3, 0), None);
        assert_eq!(spec.sample_offset(0, 0, 2), None);
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(matches!(
            ImageSpec::new(0, 8, 1, SampleType::F32),
            Err(BufferError::InvalidSpec { .. })
        ));
        assert!(matches!(
            ImageSpec::new(8, 0, 1, SampleType::F32),
            Err(BufferError::InvalidSpec { .. })
        ));
        assert!(matches!(
            ImageSpec::new(8, 8, 0, SampleType::F32),
            Err(BufferError::InvalidSpec { .. })
        ));
    }

    #[test]
    fn rejects_overflowing_size() {
        assert!(matches!(
            ImageSpec::new(u32::MAX, u32::MAX, 4, SampleType::F32),
            Err(BufferError::InvalidSpec { .. })
        ));
    }

    #[test]
    fn display_is_compact() {
        let spec = ImageSpec::new(8, 8, 1, SampleType::F32).unwrap();
        assert_eq!(format!("{spec}"), "8x8x1 float");
    }
}
