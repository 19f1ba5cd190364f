//! The codec capability consumed by [`ImageBuf`](crate::ImageBuf).
//!
//! An [`ImageCodec`] moves a rectangular grid of typed samples between
//! memory and a named resource. The buffer never looks at file formats; it
//! hands over its [`ImageSpec`] and packed pixel bytes and gets the same
//! back on decode.
//!
//! Pixel bytes crossing this interface are tightly packed, row-major,
//! channel-interleaved, native-endian samples of `spec.format()`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::format::ImageFormat;
use crate::limits::LimitExceeded;
use crate::spec::ImageSpec;

/// Decode and encode images identified by a resource name.
///
/// Implementations choose what a resource name means (a filesystem path,
/// a key in a map, an object store URL) and how the format is chosen.
pub trait ImageCodec {
    /// Decode the resource into a spec and packed pixel bytes.
    fn decode(&self, resource: &str) -> Result<DecodeOutput, CodecError>;

    /// Encode `pixels`, laid out as described by `spec`, to the resource.
    ///
    /// `pixels` holds exactly `spec.image_bytes()` bytes.
    fn encode(&self, resource: &str, spec: &ImageSpec, pixels: &[u8]) -> Result<(), CodecError>;
}

impl<C: ImageCodec + ?Sized> ImageCodec for &C {
    fn decode(&self, resource: &str) -> Result<DecodeOutput, CodecError> {
        (**self).decode(resource)
    }

    fn encode(&self, resource: &str, spec: &ImageSpec, pixels: &[u8]) -> Result<(), CodecError> {
        (**self).encode(resource, spec, pixels)
    }
}

// ---------------------------------------------------------------------------
// DecodeOutput
// ---------------------------------------------------------------------------

/// Output from a decode operation.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodeOutput {
    spec: ImageSpec,
    pixels: Vec<u8>,
    format: Option<ImageFormat>,
}

impl DecodeOutput {
    /// Create a new decode output.
    pub fn new(spec: ImageSpec, pixels: Vec<u8>) -> Self {
        Self {
            spec,
            pixels,
            format: None,
        }
    }

    /// Record the on-disk format the pixels came from.
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Shape and sample type of the decoded image.
    pub fn spec(&self) -> &ImageSpec {
        &self.spec
    }

    /// Borrow the packed pixel bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Source format, when the codec reports one.
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    /// Split into spec and pixel bytes.
    pub fn into_parts(self) -> (ImageSpec, Vec<u8>) {
        (self.spec, self.pixels)
    }
}

// ---------------------------------------------------------------------------
// CodecError
// ---------------------------------------------------------------------------

/// Errors reported by a codec.
#[derive(Debug)]
#[non_exhaustive]
pub enum CodecError {
    /// No resource with this name exists.
    NotFound {
        /// Resource name.
        resource: String,
    },
    /// Reading or writing the resource failed.
    Io {
        /// Resource name.
        resource: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The format could not be determined from content or name.
    UnknownFormat {
        /// Resource name.
        resource: String,
    },
    /// The encoded data is corrupt or truncated.
    Malformed(String),
    /// The format cannot represent this image (channel count, sample type).
    Unsupported(String),
    /// A resource limit was exceeded.
    Limit(LimitExceeded),
    /// The operation was cancelled through a stop token.
    Cancelled,
    /// Error from a third-party backend.
    Backend {
        /// Resource name.
        resource: String,
        /// Backend error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CodecError {
    /// Wrap an arbitrary backend error.
    pub fn backend(
        resource: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Backend {
            resource: resource.into(),
            source: source.into(),
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { resource } => write!(f, "resource {resource:?} not found"),
            Self::Io { resource, source } => write!(f, "I/O error on {resource:?}: {source}"),
            Self::UnknownFormat { resource } => {
                write!(f, "cannot determine image format of {resource:?}")
            }
            Self::Malformed(reason) => write!(f, "malformed image data: {reason}"),
            Self::Unsupported(reason) => write!(f, "unsupported image: {reason}"),
            Self::Limit(limit) => write!(f, "{limit}"),
            Self::Cancelled => f.write_str("operation cancelled"),
            Self::Backend { resource, source } => write!(f, "codec error on {resource:?}: {source}"),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Limit(limit) => Some(limit),
            Self::Backend { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<LimitExceeded> for CodecError {
    fn from(limit: LimitExceeded) -> Self {
        Self::Limit(limit)
    }
}

// ---------------------------------------------------------------------------
// MemoryCodec
// ---------------------------------------------------------------------------

/// Keeps encoded images in memory, keyed by resource name.
///
/// Lossless for every sample type. Useful for tests and for staging images
/// between pipeline stages without touching the filesystem.
#[derive(Debug, Default)]
pub struct MemoryCodec {
    images: Mutex<HashMap<String, (ImageSpec, Vec<u8>)>>,
}

impl MemoryCodec {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a resource with this name has been encoded.
    pub fn contains(&self, resource: &str) -> bool {
        self.lock().contains_key(resource)
    }

    /// Drop a stored resource. Returns whether it existed.
    pub fn remove(&self, resource: &str) -> bool {
        self.lock().remove(resource).is_some()
    }

    /// Number of stored resources.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (ImageSpec, Vec<u8>)>> {
        self.images.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ImageCodec for MemoryCodec {
    fn decode(&self, resource: &str) -> Result<DecodeOutput, CodecError> {
        let images = self.lock();
        let (spec, pixels) = images.get(resource).ok_or_else(|| CodecError::NotFound {
            resource: resource.to_owned(),
        })?;
        Ok(DecodeOutput::new(*spec, pixels.clone()))
    }

    fn encode(&self, resource: &str, spec: &ImageSpec, pixels: &[u8]) -> Result<(), CodecError> {
        if pixels.len() != spec.image_bytes() {
            return Err(CodecError::Malformed(format!(
                "expected {} pixel bytes for {spec}, got {}",
                spec.image_bytes(),
                pixels.len()
            )));
        }
        self.lock()
            .insert(resource.to_owned(), (*spec, pixels.to_vec()));
        Ok(())
    }
}
