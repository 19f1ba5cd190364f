//! Image format detection for the filesystem backend.

use std::path::Path;

use crate::spec::{ImageSpec, SampleType};

/// Lossless formats understood by [`FileCodec`](crate::FileCodec).
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Binary graymap (`P5`), one channel, 8 or 16 bits.
    Pgm,
    /// Binary pixmap (`P6`), three channels, 8 or 16 bits.
    Ppm,
    /// Portable arbitrary map (`P7`), any channel count, 8 or 16 bits.
    Pam,
    /// Portable float map (`Pf` gray, `PF` color), 32-bit float.
    Pfm,
}

impl ImageFormat {
    /// Detect format from magic bytes. Returns `None` if unrecognized.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.len() < 2 || data[0] != b'P' {
            return None;
        }
        match data[1] {
            b'5' => Some(ImageFormat::Pgm),
            b'6' => Some(ImageFormat::Ppm),
            b'7' => Some(ImageFormat::Pam),
            b'f' | b'F' => Some(ImageFormat::Pfm),
            _ => None,
        }
    }

    /// Detect format from file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pgm" => Some(ImageFormat::Pgm),
            "ppm" => Some(ImageFormat::Ppm),
            "pam" => Some(ImageFormat::Pam),
            "pfm" => Some(ImageFormat::Pfm),
            _ => None,
        }
    }

    /// Detect format from the extension of a path.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// MIME type string.
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Pgm => "image/x-portable-graymap",
            ImageFormat::Ppm => "image/x-portable-pixmap",
            ImageFormat::Pam => "image/x-portable-arbitrarymap",
            ImageFormat::Pfm => "image/x-portable-floatmap",
        }
    }

    /// Common file extensions.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ImageFormat::Pgm => &["pgm"],
            ImageFormat::Ppm => &["ppm"],
            ImageFormat::Pam => &["pam"],
            ImageFormat::Pfm => &["pfm"],
        }
    }

    /// Whether this format stores images of `spec` without loss.
    pub fn supports(self, spec: &ImageSpec) -> bool {
        let integer = matches!(spec.format(), SampleType::U8 | SampleType::U16);
        match self {
            ImageFormat::Pgm => integer && spec.nchannels() == 1,
            ImageFormat::Ppm => integer && spec.nchannels() == 3,
            ImageFormat::Pam => integer,
            ImageFormat::Pfm => {
                spec.format() == SampleType::F32 && matches!(spec.nchannels(), 1 | 3)
            }
        }
    }
}

impl core::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            ImageFormat::Pgm => "PGM",
            ImageFormat::Ppm => "PPM",
            ImageFormat::Pam => "PAM",
            ImageFormat::Pfm => "PFM",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_magic() {
        assert_eq!(ImageFormat::detect(b"P5\n1 1\n255\n\0"), Some(ImageFormat::Pgm));
        assert_eq!(ImageFormat::detect(b"P6\n"), Some(ImageFormat::Ppm));
        assert_eq!(ImageFormat::detect(b"P7\nWIDTH 1\n"), Some(ImageFormat::Pam));
        assert_eq!(ImageFormat::detect(b"Pf\n1 1\n-1.0\n"), Some(ImageFormat::Pfm));
        assert_eq!(ImageFormat::detect(b"PF\n"), Some(ImageFormat::Pfm));
    }

    #[test]
    fn detect_rejects_other_magic() {
        assert_eq!(ImageFormat::detect(b"P3\n"), None);
        assert_eq!(ImageFormat::detect(b"P"), None);
        assert_eq!(ImageFormat::detect(&[0x89, b'P', b'N', b'G']), None);
        assert_eq!(ImageFormat::detect(b""), None);
    }

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(ImageFormat::from_extension("PFM"), Some(ImageFormat::Pfm));
        assert_eq!(ImageFormat::from_extension("pam"), Some(ImageFormat::Pam));
        assert_eq!(ImageFormat::from_extension("tif"), None);
        assert_eq!(ImageFormat::from_path("dir/A.pgm"), Some(ImageFormat::Pgm));
        assert_eq!(ImageFormat::from_path("noext"), None);
    }

    #[test]
    fn extensions_roundtrip() {
        for format in [
            ImageFormat::Pgm,
            ImageFormat::Ppm,
            ImageFormat::Pam,
            ImageFormat::Pfm,
        ] {
            for ext in format.extensions() {
                assert_eq!(ImageFormat::from_extension(ext), Some(format));
            }
        }
    }

    #[test]
    fn supports_by_channel_and_type() {
        let gray_f = ImageSpec::new(4, 4, 1, SampleType::F32).unwrap();
        let rgba8 = ImageSpec::new(4, 4, 4, SampleType::U8).unwrap();
        let rgb16 = ImageSpec::new(4, 4, 3, SampleType::U16).unwrap();
        let gray_i16 = ImageSpec::new(4, 4, 1, SampleType::I16).unwrap();

        assert!(ImageFormat::Pfm.supports(&gray_f));
        assert!(!ImageFormat::Pgm.supports(&gray_f));
        assert!(ImageFormat::Pam.supports(&rgba8));
        assert!(!ImageFormat::Ppm.supports(&rgba8));
        assert!(ImageFormat::Ppm.supports(&rgb16));
        assert!(!ImageFormat::Pfm.supports(&rgb16));
        assert!(!ImageFormat::Pam.supports(&gray_i16));
    }

    #[test]
    fn display_and_mime() {
        assert_eq!(ImageFormat::Pfm.to_string(), "PFM");
        assert_eq!(ImageFormat::Pgm.mime_type(), "image/x-portable-graymap");
    }
}
