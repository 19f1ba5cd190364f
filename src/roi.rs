//! Rectangular regions of interest.

use core::fmt;

use crate::spec::ImageSpec;

/// A rectangle of pixels, `x..x + width` by `y..y + height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Roi {
    /// Left edge, inclusive.
    pub x: u32,
    /// Top edge, inclusive.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Roi {
    /// Create a region from its origin and size.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The region covering a whole image.
    pub fn full(spec: &ImageSpec) -> Self {
        Self::new(0, 0, spec.width(), spec.height())
    }

    /// Whether the region contains no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether `(x, y)` lies inside the region.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x
            && y >= self.y
            && x - self.x < self.width
            && y - self.y < self.height
    }

    /// Whether the region lies entirely inside the image described by `spec`.
    pub fn fits(&self, spec: &ImageSpec) -> bool {
        self.x
            .checked_add(self.width)
            .is_some_and(|end| end <= spec.width())
            && self
                .y
                .checked_add(self.height)
                .is_some_and(|end| end <= spec.height())
    }

    /// Row indices covered by the region, cut off at `u32::MAX`.
    pub fn rows(&self) -> core::ops::Range<u32> {
        self.y..self.y.saturating_add(self.height)
    }

    /// Column indices covered by the region, cut off at `u32::MAX`.
    pub fn columns(&self) -> core::ops::Range<u32> {
        self.x..self.x.saturating_add(self.width)
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.width, self.height, self.x, self.y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::SampleType;

    #[test]
    fn full_covers_image() {
        let spec = ImageSpec::new(10, 4, 1, SampleType::U8).unwrap();
        let roi = Roi::full(&spec);
        assert_eq!(roi, Roi::new(0, 0, 10, 4));
        assert!(roi.fits(&spec));
        assert_eq!(roi.pixels(), 40);
    }

    #[test]
    fn fits_rejects_overhang_and_overflow() {
        let spec = ImageSpec::new(10, 4, 1, SampleType::U8).unwrap();
        assert!(Roi::new(5, 1, 5, 3).fits(&spec));
        assert!(!Roi::new(6, 0, 5, 1).fits(&spec));
        assert!(!Roi::new(0, 2, 1, 3).fits(&spec));
        assert!(!Roi::new(u32::MAX, 0, 2, 1).fits(&spec));
    }

    #[test]
    fn contains_is_half_open() {
        let roi = Roi::new(2, 3, 4, 2);
        assert!(roi.contains(2, 3));
        assert!(roi.contains(5, 4));
        assert!(!roi.contains(6, 4));
        assert!(!roi.contains(5, 5));
        assert!(!roi.contains(1, 3));
    }

    #[test]
    fn ranges_and_display() {
        let roi = Roi::new(2, 3, 4, 2);
        assert_eq!(roi.rows(), 3..5);
        assert_eq!(roi.columns(), 2..6);
        assert_eq!(format!("{roi}"), "4x2+2+3");
        assert!(Roi::new(0, 0, 0, 5).is_empty());
    }

    #[test]
    fn ranges_saturate_instead_of_overflowing() {
        let roi = Roi::new(u32::MAX - 1, u32::MAX, 5, 2);
        assert_eq!(roi.columns(), u32::MAX - 1..u32::MAX);
        assert_eq!(roi.rows(), u32::MAX..u32::MAX);
        assert!(roi.rows().is_empty());
    }
}
