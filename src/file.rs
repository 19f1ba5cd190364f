//! Filesystem codec over the Netpbm family.

use std::path::Path;

use enough::{Stop, Unstoppable};
use log::debug;

use crate::codec::{CodecError, DecodeOutput, ImageCodec};
use crate::format::ImageFormat;
use crate::limits::ResourceLimits;
use crate::pnm;
use crate::spec::ImageSpec;

/// Reads and writes Netpbm files, treating resource names as paths.
///
/// Decoding detects the format from the file's magic bytes. Encoding uses
/// the format set with [`with_format`](Self::with_format), or else the
/// path's extension.
///
/// # Example
///
/// ```no_run
/// use imagebuf::{FileCodec, ImageBuf, ResourceLimits};
///
/// let codec = FileCodec::new().with_limits(ResourceLimits::none().with_max_pixels(1 << 24));
/// let mut buf = ImageBuf::from_file("scan.pfm");
/// buf.read_with(&codec)?;
/// # Ok::<(), imagebuf::BufferError>(())
/// ```
#[derive(Clone, Copy)]
pub struct FileCodec<'a> {
    limits: ResourceLimits,
    stop: &'a dyn Stop,
    format: Option<ImageFormat>,
}

impl FileCodec<'static> {
    /// No limits, no cancellation, format from extension.
    pub fn new() -> Self {
        Self {
            limits: ResourceLimits::none(),
            stop: &Unstoppable,
            format: None,
        }
    }
}

impl Default for FileCodec<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> FileCodec<'a> {
    /// Apply resource limits to decode and encode.
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Encode as `format` regardless of extension.
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Poll `stop` once per row while coding.
    pub fn with_stop<'b>(self, stop: &'b dyn Stop) -> FileCodec<'b> {
        FileCodec {
            limits: self.limits,
            stop,
            format: self.format,
        }
    }

    /// Configured limits.
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }
}

impl core::fmt::Debug for FileCodec<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FileCodec")
            .field("limits", &self.limits)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl ImageCodec for FileCodec<'_> {
    fn decode(&self, resource: &str) -> Result<DecodeOutput, CodecError> {
        let io_error = |source: std::io::Error| CodecError::Io {
            resource: resource.to_owned(),
            source,
        };
        if self.limits.max_file_size.is_some() {
            let len = std::fs::metadata(resource).map_err(io_error)?.len();
            self.limits.check_file_size(len)?;
        }
        let data = std::fs::read(resource).map_err(io_error)?;
        if ImageFormat::detect(&data).is_none() {
            return Err(CodecError::UnknownFormat {
                resource: resource.to_owned(),
            });
        }
        let (spec, pixels, format) = pnm::decode(&data, &self.limits, self.stop)?;
        debug!("decoded {resource:?} as {format} ({spec})");
        Ok(DecodeOutput::new(spec, pixels).with_format(format))
    }

    fn encode(&self, resource: &str, spec: &ImageSpec, pixels: &[u8]) -> Result<(), CodecError> {
        let format = self
            .format
            .or_else(|| ImageFormat::from_path(Path::new(resource)))
            .ok_or_else(|| CodecError::UnknownFormat {
                resource: resource.to_owned(),
            })?;
        self.limits.check_spec(spec)?;
        let encoded = pnm::encode(spec, pixels, format, self.stop)?;
        std::fs::write(resource, &encoded).map_err(|source| CodecError::Io {
            resource: resource.to_owned(),
            source,
        })?;
        debug!(
            "wrote {resource:?} as {format} ({spec}, {} bytes)",
            encoded.len()
        );
        Ok(())
    }
}
