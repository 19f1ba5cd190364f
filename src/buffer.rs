//! Image buffers over owned or borrowed pixel storage.
//!
//! An [`ImageBuf`] either allocates and owns its pixels, borrows them from
//! an application array without copying, or starts out empty and bound to a
//! resource name until [`ImageBuf::read`] fills it through a codec.
//!
//! Every accessor is bounds-checked and reports [`BufferError::OutOfBounds`]
//! instead of touching memory outside the image.

use core::fmt;

use imgref::{ImgRefMut, ImgVec};
use log::{debug, warn};

use crate::codec::{CodecError, ImageCodec};
use crate::file::FileCodec;
use crate::sample::Sample;
use crate::spec::{ImageSpec, SampleType};

// ---------------------------------------------------------------------------
// BufferError
// ---------------------------------------------------------------------------

/// Errors from image buffer operations.
#[derive(Debug)]
#[non_exhaustive]
pub enum BufferError {
    /// Zero dimension, zero channel count, or a byte size that overflows.
    InvalidSpec {
        /// What was wrong.
        reason: &'static str,
    },
    /// Pixel coordinate or channel outside the image.
    OutOfBounds {
        /// Requested column.
        x: u32,
        /// Requested row.
        y: u32,
        /// Requested channel.
        channel: u16,
    },
    /// Caller-supplied storage is smaller than the spec requires.
    InsufficientData {
        /// Bytes the spec requires.
        required: usize,
        /// Bytes supplied.
        actual: usize,
    },
    /// Element type of the supplied storage does not match the spec.
    SampleTypeMismatch {
        /// Sample type declared by the spec.
        expected: SampleType,
        /// Sample type of the supplied storage.
        actual: SampleType,
    },
    /// An argument other than a coordinate was invalid.
    InvalidArgument(String),
    /// The buffer wraps read-only memory.
    ReadOnly,
    /// The buffer holds no pixels yet.
    Uninitialized,
    /// The buffer already holds pixels and cannot be read into.
    AlreadyInitialized,
    /// The operation was cancelled through a stop token.
    Cancelled,
    /// Decoding or encoding failed.
    Codec(CodecError),
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSpec { reason } => write!(f, "invalid image spec: {reason}"),
            Self::OutOfBounds { x, y, channel } => {
                write!(f, "pixel ({x}, {y}) channel {channel} is out of bounds")
            }
            Self::InsufficientData { required, actual } => write!(
                f,
                "storage holds {actual} bytes but the image needs {required}"
            ),
            Self::SampleTypeMismatch { expected, actual } => {
                write!(f, "storage holds {actual} samples but the spec says {expected}")
            }
            Self::InvalidArgument(reason) => write!(f, "invalid argument: {reason}"),
            Self::ReadOnly => f.write_str("buffer wraps read-only memory"),
            Self::Uninitialized => f.write_str("buffer holds no pixels"),
            Self::AlreadyInitialized => f.write_str("buffer already holds pixels"),
            Self::Cancelled => f.write_str("operation cancelled"),
            Self::Codec(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for BufferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Codec(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CodecError> for BufferError {
    fn from(err: CodecError) -> Self {
        Self::Codec(err)
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Where a buffer's pixels live.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageMode {
    /// No pixels until a read succeeds.
    Uninitialized,
    /// Pixels allocated and freed by the buffer.
    Owned,
    /// Pixels borrowed from the caller.
    Wrapped,
}

enum Storage<'a> {
    Uninitialized,
    Owned(Vec<u8>),
    Wrapped(&'a mut [u8]),
    WrappedRef(&'a [u8]),
}

// ---------------------------------------------------------------------------
// ImageBuf
// ---------------------------------------------------------------------------

/// An image held in memory.
///
/// The lifetime `'a` is the lifetime of wrapped caller memory. Buffers that
/// own their pixels, or have none yet, are `ImageBuf<'static>`.
///
/// Pixels are row-major, channel-interleaved, tightly packed and stored in
/// native byte order, with the layout fixed by the buffer's [`ImageSpec`].
///
/// # Example
///
/// ```
/// use imagebuf::{ImageBuf, ImageSpec, SampleType};
///
/// let mut pixels = [0.0f32; 4 * 2];
/// let spec = ImageSpec::new(4, 2, 1, SampleType::F32)?;
/// let base = pixels.as_ptr() as *const u8;
///
/// let mut buf = ImageBuf::wrap("plane", spec, &mut pixels)?;
/// assert_eq!(buf.pixeladdr(0, 0, 0)?.as_ptr(), base);
///
/// buf.setchannel(3, 1, 0, 0.5)?;
/// assert_eq!(buf.getchannel(3, 1, 0)?, 0.5);
/// drop(buf);
/// assert_eq!(pixels[7], 0.5);
/// # Ok::<(), imagebuf::BufferError>(())
/// ```
pub struct ImageBuf<'a> {
    name: String,
    resource: Option<String>,
    spec: Option<ImageSpec>,
    storage: Storage<'a>,
}

impl ImageBuf<'static> {
    /// Allocate a zero-filled buffer that owns its pixels.
    pub fn new(name: impl Into<String>, spec: ImageSpec) -> Self {
        Self {
            name: name.into(),
            resource: None,
            spec: Some(spec),
            storage: Storage::Owned(vec![0u8; spec.image_bytes()]),
        }
    }

    /// Create an empty buffer bound to `resource`.
    ///
    /// No I/O happens until [`read`](ImageBuf::read).
    pub fn from_resource(name: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource: Some(resource.into()),
            spec: None,
            storage: Storage::Uninitialized,
        }
    }

    /// Create an empty buffer named after, and bound to, `resource`.
    pub fn from_file(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self::from_resource(resource.clone(), resource)
    }
}

impl<'a> ImageBuf<'a> {
    /// Wrap caller memory without copying.
    ///
    /// `data` may be longer than the image; only the leading
    /// `spec.image_bytes()` bytes are used. Writes through the buffer land
    /// directly in `data`.
    ///
    /// # Errors
    ///
    /// [`BufferError::SampleTypeMismatch`] if `T` does not match
    /// `spec.format()`, [`BufferError::InsufficientData`] if `data` is too
    /// short for the spec.
    pub fn wrap<T: Sample>(
        name: impl Into<String>,
        spec: ImageSpec,
        data: &'a mut [T],
    ) -> Result<Self, BufferError> {
        check_sample_type::<T>(&spec)?;
        let bytes: &'a mut [u8] = bytemuck::cast_slice_mut(data);
        let required = check_extent(&spec, bytes.len())?;
        let name = name.into();
        debug!(
            "wrapping {:p} as {name:?} ({spec}, writable)",
            bytes.as_ptr()
        );
        Ok(Self {
            name,
            resource: None,
            spec: Some(spec),
            storage: Storage::Wrapped(&mut bytes[..required]),
        })
    }

    /// Wrap read-only caller memory without copying.
    ///
    /// Reads behave as for [`wrap`](Self::wrap); every write fails with
    /// [`BufferError::ReadOnly`].
    pub fn wrap_ref<T: Sample>(
        name: impl Into<String>,
        spec: ImageSpec,
        data: &'a [T],
    ) -> Result<Self, BufferError> {
        check_sample_type::<T>(&spec)?;
        let bytes: &'a [u8] = bytemuck::cast_slice(data);
        let required = check_extent(&spec, bytes.len())?;
        let name = name.into();
        debug!(
            "wrapping {:p} as {name:?} ({spec}, read-only)",
            bytes.as_ptr()
        );
        Ok(Self {
            name,
            resource: None,
            spec: Some(spec),
            storage: Storage::WrappedRef(&bytes[..required]),
        })
    }

    /// Wrap a single-channel `imgref` image without copying.
    ///
    /// # Errors
    ///
    /// [`BufferError::InvalidArgument`] if the image has row padding
    /// (`stride != width`), since buffers are always tightly packed.
    pub fn wrap_img<T: Sample>(
        name: impl Into<String>,
        img: ImgRefMut<'a, T>,
    ) -> Result<Self, BufferError> {
        if img.stride() != img.width() {
            return Err(BufferError::InvalidArgument(format!(
                "stride {} differs from width {}",
                img.stride(),
                img.width()
            )));
        }
        let too_large = || BufferError::InvalidSpec {
            reason: "dimension exceeds u32",
        };
        let width = u32::try_from(img.width()).map_err(|_| too_large())?;
        let height = u32::try_from(img.height()).map_err(|_| too_large())?;
        let spec = ImageSpec::new(width, height, 1, T::TYPE)?;
        Self::wrap(name, spec, img.into_buf())
    }

    /// Name used in diagnostics and as the default resource.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resource read from and saved to by default: the bound resource, or
    /// the buffer name when none was bound.
    pub fn resource_name(&self) -> &str {
        self.resource.as_deref().unwrap_or(&self.name)
    }

    /// Image spec, `None` until the buffer holds pixels.
    pub fn spec(&self) -> Option<&ImageSpec> {
        self.spec.as_ref()
    }

    /// How the pixels are held.
    pub fn mode(&self) -> StorageMode {
        match self.storage {
            Storage::Uninitialized => StorageMode::Uninitialized,
            Storage::Owned(_) => StorageMode::Owned,
            Storage::Wrapped(_) | Storage::WrappedRef(_) => StorageMode::Wrapped,
        }
    }

    /// Whether the buffer holds pixels.
    pub fn is_initialized(&self) -> bool {
        !matches!(self.storage, Storage::Uninitialized)
    }

    /// Whether pixels can be written.
    pub fn is_writable(&self) -> bool {
        matches!(self.storage, Storage::Owned(_) | Storage::Wrapped(_))
    }

    /// Packed pixel bytes, `None` while uninitialized.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.storage {
            Storage::Uninitialized => None,
            Storage::Owned(data) => Some(data.as_slice()),
            Storage::Wrapped(data) => Some(&**data),
            Storage::WrappedRef(data) => Some(*data),
        }
    }

    // --- Codec operations ---

    /// Decode the bound resource from the filesystem.
    ///
    /// Equivalent to [`read_with`](Self::read_with) and a default
    /// [`FileCodec`].
    pub fn read(&mut self) -> Result<(), BufferError> {
        self.read_with(&FileCodec::new())
    }

    /// Decode the bound resource through `codec` and take ownership of the
    /// decoded pixels.
    ///
    /// # Errors
    ///
    /// [`BufferError::AlreadyInitialized`] unless the buffer is
    /// uninitialized; [`BufferError::Codec`] if decoding fails or the codec
    /// returns fewer bytes than its spec requires. On error the buffer is
    /// left uninitialized.
    pub fn read_with<C: ImageCodec + ?Sized>(&mut self, codec: &C) -> Result<(), BufferError> {
        if self.is_initialized() {
            return Err(BufferError::AlreadyInitialized);
        }
        let decoded = match codec.decode(self.resource_name()) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("reading {:?} failed: {err}", self.resource_name());
                return Err(BufferError::Codec(err));
            }
        };
        let (spec, mut pixels) = decoded.into_parts();
        let required = spec.image_bytes();
        if pixels.len() < required {
            let err = CodecError::Malformed(format!(
                "decoded {} bytes for {spec}, expected {required}",
                pixels.len()
            ));
            warn!("reading {:?} failed: {err}", self.resource_name());
            return Err(BufferError::Codec(err));
        }
        pixels.truncate(required);
        debug!("read {:?} ({spec})", self.resource_name());
        self.spec = Some(spec);
        self.storage = Storage::Owned(pixels);
        Ok(())
    }

    /// Encode to the buffer's own resource on the filesystem.
    pub fn save(&self) -> Result<(), BufferError> {
        self.save_as(self.resource_name())
    }

    /// Encode to `resource` on the filesystem, format chosen by extension.
    pub fn save_as(&self, resource: &str) -> Result<(), BufferError> {
        self.save_with(&FileCodec::new(), resource)
    }

    /// Encode to `resource` through `codec`. The buffer is never modified.
    pub fn save_with<C: ImageCodec + ?Sized>(
        &self,
        codec: &C,
        resource: &str,
    ) -> Result<(), BufferError> {
        let (spec, data) = self.pixels()?;
        if let Err(err) = codec.encode(resource, spec, data) {
            warn!("saving {:?} to {resource:?} failed: {err}", self.name);
            return Err(BufferError::Codec(err));
        }
        debug!("saved {:?} to {resource:?} ({spec})", self.name);
        Ok(())
    }

    // --- Pixel access ---

    /// Bytes of the sample at `(x, y, channel)`, borrowed from storage.
    ///
    /// For a wrapped buffer the returned slice points into the caller's
    /// memory, so `pixeladdr(0, 0, 0)` starts at the caller's first byte.
    pub fn pixeladdr(&self, x: u32, y: u32, channel: u16) -> Result<&[u8], BufferError> {
        let (spec, data) = self.pixels()?;
        let offset = spec
            .sample_offset(x, y, channel)
            .ok_or(BufferError::OutOfBounds { x, y, channel })?;
        Ok(&data[offset..offset + spec.sample_bytes()])
    }

    /// Mutable bytes of the sample at `(x, y, channel)`.
    pub fn pixeladdr_mut(
        &mut self,
        x: u32,
        y: u32,
        channel: u16,
    ) -> Result<&mut [u8], BufferError> {
        let (spec, data) = self.pixels_mut()?;
        let offset = spec
            .sample_offset(x, y, channel)
            .ok_or(BufferError::OutOfBounds { x, y, channel })?;
        Ok(&mut data[offset..offset + spec.sample_bytes()])
    }

    /// Sample at `(x, y, channel)` as a canonical `f32`.
    ///
    /// See [`SampleType`] for how each storage type maps to `f32`.
    pub fn getchannel(&self, x: u32, y: u32, channel: u16) -> Result<f32, BufferError> {
        let format = self.pixel_format()?;
        Ok(format.to_f32(self.pixeladdr(x, y, channel)?))
    }

    /// Store a canonical `f32` at `(x, y, channel)`, converting to the
    /// native sample type.
    pub fn setchannel(
        &mut self,
        x: u32,
        y: u32,
        channel: u16,
        value: f32,
    ) -> Result<(), BufferError> {
        let format = self.pixel_format()?;
        format.from_f32(value, self.pixeladdr_mut(x, y, channel)?);
        Ok(())
    }

    /// All channels of pixel `(x, y)` as canonical `f32` values.
    pub fn getpixel(&self, x: u32, y: u32) -> Result<Vec<f32>, BufferError> {
        let (spec, data) = self.pixels()?;
        let start = spec
            .sample_offset(x, y, 0)
            .ok_or(BufferError::OutOfBounds { x, y, channel: 0 })?;
        let format = spec.format();
        Ok(data[start..start + spec.pixel_bytes()]
            .chunks_exact(spec.sample_bytes())
            .map(|sample| format.to_f32(sample))
            .collect())
    }

    /// Store every channel of pixel `(x, y)`.
    ///
    /// # Errors
    ///
    /// [`BufferError::InvalidArgument`] unless `values` has one entry per
    /// channel.
    pub fn setpixel(&mut self, x: u32, y: u32, values: &[f32]) -> Result<(), BufferError> {
        let (spec, data) = self.pixels_mut()?;
        check_channel_values(&spec, values)?;
        let start = spec
            .sample_offset(x, y, 0)
            .ok_or(BufferError::OutOfBounds { x, y, channel: 0 })?;
        let format = spec.format();
        for (sample, &value) in data[start..start + spec.pixel_bytes()]
            .chunks_exact_mut(spec.sample_bytes())
            .zip(values)
        {
            format.from_f32(value, sample);
        }
        Ok(())
    }

    /// Set every pixel to `values`, one entry per channel.
    pub fn fill(&mut self, values: &[f32]) -> Result<(), BufferError> {
        let (spec, data) = self.pixels_mut()?;
        check_channel_values(&spec, values)?;
        let mut pixel = vec![0u8; spec.pixel_bytes()];
        for (sample, &value) in pixel.chunks_exact_mut(spec.sample_bytes()).zip(values) {
            spec.format().from_f32(value, sample);
        }
        for dst in data.chunks_exact_mut(pixel.len()) {
            dst.copy_from_slice(&pixel);
        }
        Ok(())
    }

    /// Copy one channel out as a plane of canonical `f32` values.
    pub fn to_imgvec(&self, channel: u16) -> Result<ImgVec<f32>, BufferError> {
        let (spec, data) = self.pixels()?;
        if channel >= spec.nchannels() {
            return Err(BufferError::OutOfBounds {
                x: 0,
                y: 0,
                channel,
            });
        }
        let format = spec.format();
        let skip = channel as usize * spec.sample_bytes();
        let plane = data
            .chunks_exact(spec.pixel_bytes())
            .map(|pixel| format.to_f32(&pixel[skip..]))
            .collect();
        Ok(ImgVec::new(
            plane,
            spec.width() as usize,
            spec.height() as usize,
        ))
    }

    /// Spec and packed bytes, or [`BufferError::Uninitialized`].
    pub(crate) fn pixels(&self) -> Result<(&ImageSpec, &[u8]), BufferError> {
        match (&self.spec, self.as_bytes()) {
            (Some(spec), Some(data)) => Ok((spec, data)),
            _ => Err(BufferError::Uninitialized),
        }
    }

    fn pixels_mut(&mut self) -> Result<(ImageSpec, &mut [u8]), BufferError> {
        let spec = self.spec.ok_or(BufferError::Uninitialized)?;
        let data = match &mut self.storage {
            Storage::Uninitialized => return Err(BufferError::Uninitialized),
            Storage::WrappedRef(_) => return Err(BufferError::ReadOnly),
            Storage::Owned(data) => data.as_mut_slice(),
            Storage::Wrapped(data) => &mut **data,
        };
        Ok((spec, data))
    }

    fn pixel_format(&self) -> Result<SampleType, BufferError> {
        self.spec
            .map(|spec| spec.format())
            .ok_or(BufferError::Uninitialized)
    }
}

impl fmt::Debug for ImageBuf<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBuf")
            .field("name", &self.name)
            .field("resource", &self.resource)
            .field("spec", &self.spec)
            .field("mode", &self.mode())
            .field("writable", &self.is_writable())
            .finish()
    }
}

fn check_sample_type<T: Sample>(spec: &ImageSpec) -> Result<(), BufferError> {
    if T::TYPE != spec.format() {
        return Err(BufferError::SampleTypeMismatch {
            expected: spec.format(),
            actual: T::TYPE,
        });
    }
    Ok(())
}

fn check_extent(spec: &ImageSpec, actual: usize) -> Result<usize, BufferError> {
    let required = spec.image_bytes();
    if actual < required {
        return Err(BufferError::InsufficientData { required, actual });
    }
    Ok(required)
}

fn check_channel_values(spec: &ImageSpec, values: &[f32]) -> Result<(), BufferError> {
    if values.len() != spec.nchannels() as usize {
        return Err(BufferError::InvalidArgument(format!(
            "{} values given for {} channels",
            values.len(),
            spec.nchannels()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
