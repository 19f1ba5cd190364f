//! In-memory image buffers with owned or borrowed pixel storage.
//!
//! - [`ImageBuf`]: a named image that owns its pixels, wraps caller memory
//!   without copying, or waits to be filled by [`ImageBuf::read`]
//! - [`ImageSpec`] / [`SampleType`]: resolution, channel count and sample type
//! - [`ImageCodec`]: the decode/encode capability a buffer reads and saves
//!   through, with [`FileCodec`] (Netpbm files) and [`MemoryCodec`]
//! - [`histogram`] / [`histogram_with`]: binned counts of one channel
//! - [`ResourceLimits`]: caps checked by codecs before allocating
//!
//! Samples are exchanged as canonical `f32` values: unsigned integers map to
//! `[0, 1]`, signed integers to `[-1, 1]`, floats pass through unchanged
//! (16-bit floats widen exactly).

#![forbid(unsafe_code)]

mod buffer;
mod codec;
mod file;
mod format;
mod histogram;
mod limits;
pub mod pnm;
mod roi;
mod sample;
mod spec;

pub use buffer::{BufferError, ImageBuf, StorageMode};
pub use codec::{CodecError, DecodeOutput, ImageCodec, MemoryCodec};
pub use file::FileCodec;
pub use format::ImageFormat;
#[cfg(feature = "rayon")]
pub use histogram::histogram_par;
pub use histogram::{Histogram, HistogramOptions, histogram, histogram_with, histogram_with_stop};
pub use limits::{LimitExceeded, ResourceLimits};
pub use roi::Roi;
pub use sample::Sample;
pub use spec::{ImageSpec, SampleType};

// Re-exports for codec implementors and users.
pub use enough::{Stop, Unstoppable};
pub use half::f16;
pub use imgref::{ImgRef, ImgRefMut, ImgVec};
