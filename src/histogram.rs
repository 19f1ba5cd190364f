//! Binned frequency distribution of one channel of an [`ImageBuf`].
//!
//! Samples are read as canonical `f32` values and sorted into equal-width
//! bins over `[min, max]`. Bin `i` covers `[min + i·w, min + (i+1)·w)`, the
//! last bin also takes `max` itself. Values below `min` or above `max` are
//! not binned but counted in [`Histogram::below`] and [`Histogram::above`].
//! NaN samples are ignored.
//!
//! # Example
//!
//! ```
//! use imagebuf::{histogram, ImageBuf, ImageSpec, SampleType};
//!
//! let mut pixels = [0.0f32, 0.5, 0.75, 1.0];
//! let spec = ImageSpec::new(2, 2, 1, SampleType::F32)?;
//! let buf = ImageBuf::wrap("ramp", spec, &mut pixels)?;
//! assert_eq!(histogram(&buf, 0, 2)?, vec![1, 3]);
//! # Ok::<(), imagebuf::BufferError>(())
//! ```

use enough::{Stop, Unstoppable};
use log::debug;

use crate::buffer::{BufferError, ImageBuf};
use crate::roi::Roi;
use crate::spec::ImageSpec;

/// Bin count, value domain and region for a histogram.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistogramOptions {
    bins: usize,
    min: f32,
    max: f32,
    roi: Option<Roi>,
}

impl HistogramOptions {
    /// `bins` bins over the canonical domain `[0, 1]`, whole image.
    ///
    /// Unsigned integer samples always fall in `[0, 1]`; use
    /// [`with_range`](Self::with_range) for signed or float data.
    pub fn new(bins: usize) -> Self {
        Self {
            bins,
            min: 0.0,
            max: 1.0,
            roi: None,
        }
    }

    /// Bin over `[min, max]` instead.
    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Only count pixels inside `roi`.
    pub fn with_roi(mut self, roi: Roi) -> Self {
        self.roi = Some(roi);
        self
    }

    /// Number of bins.
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Domain as `(min, max)`.
    pub fn range(&self) -> (f32, f32) {
        (self.min, self.max)
    }

    /// Region, `None` meaning the whole image.
    pub fn roi(&self) -> Option<Roi> {
        self.roi
    }
}

/// Counts per bin, plus the samples that fell outside the domain.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    bins: Vec<u64>,
    min: f32,
    max: f32,
    below: u64,
    above: u64,
}

impl Histogram {
    fn empty(opts: &HistogramOptions) -> Self {
        Self {
            bins: vec![0; opts.bins],
            min: opts.min,
            max: opts.max,
            below: 0,
            above: 0,
        }
    }

    /// Counts, one per bin.
    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    /// Take the counts.
    pub fn into_bins(self) -> Vec<u64> {
        self.bins
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Always false; a histogram has at least one bin.
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Lower end of the domain.
    pub fn min(&self) -> f32 {
        self.min
    }

    /// Upper end of the domain.
    pub fn max(&self) -> f32 {
        self.max
    }

    /// Width of each bin.
    pub fn bin_width(&self) -> f64 {
        (self.max as f64 - self.min as f64) / self.bins.len() as f64
    }

    /// Bounds `(low, high)` of bin `index`: low inclusive, high exclusive
    /// except for the last bin.
    pub fn bin_range(&self, index: usize) -> Option<(f64, f64)> {
        if index >= self.bins.len() {
            return None;
        }
        let width = self.bin_width();
        let low = self.min as f64 + index as f64 * width;
        let high = if index + 1 == self.bins.len() {
            self.max as f64
        } else {
            self.min as f64 + (index + 1) as f64 * width
        };
        Some((low, high))
    }

    /// Samples below `min`.
    pub fn below(&self) -> u64 {
        self.below
    }

    /// Samples above `max`.
    pub fn above(&self) -> u64 {
        self.above
    }

    /// Samples that landed in a bin.
    pub fn total(&self) -> u64 {
        self.bins.iter().sum()
    }

    /// Add the counts of `other`, which must have the same bins and domain.
    pub fn merge(&mut self, other: &Histogram) -> Result<(), BufferError> {
        if self.bins.len() != other.bins.len() || self.min != other.min || self.max != other.max
        {
            return Err(BufferError::InvalidArgument(format!(
                "cannot merge {} bins over [{}, {}] into {} bins over [{}, {}]",
                other.bins.len(),
                other.min,
                other.max,
                self.bins.len(),
                self.min,
                self.max
            )));
        }
        self.absorb(other);
        Ok(())
    }

    fn absorb(&mut self, other: &Histogram) {
        for (dst, src) in self.bins.iter_mut().zip(&other.bins) {
            *dst += src;
        }
        self.below += other.below;
        self.above += other.above;
    }
}

/// Counts of `channel` in `bins` bins over `[0, 1]`, whole image.
///
/// Shorthand for [`histogram_with`] and [`HistogramOptions::new`].
pub fn histogram(buf: &ImageBuf<'_>, channel: u16, bins: usize) -> Result<Vec<u64>, BufferError> {
    histogram_with(buf, channel, &HistogramOptions::new(bins)).map(Histogram::into_bins)
}

/// Histogram of `channel` as configured by `opts`.
///
/// # Errors
///
/// [`BufferError::InvalidArgument`] for zero bins, a domain that is not
/// finite with `min < max`, a channel the image lacks, or a region outside
/// the image. [`BufferError::Uninitialized`] if the buffer holds no pixels.
pub fn histogram_with(
    buf: &ImageBuf<'_>,
    channel: u16,
    opts: &HistogramOptions,
) -> Result<Histogram, BufferError> {
    histogram_with_stop(buf, channel, opts, &Unstoppable)
}

/// [`histogram_with`], polling `stop` before each row.
pub fn histogram_with_stop(
    buf: &ImageBuf<'_>,
    channel: u16,
    opts: &HistogramOptions,
    stop: &dyn Stop,
) -> Result<Histogram, BufferError> {
    let job = Job::new(buf, channel, opts)?;
    let mut hist = Histogram::empty(opts);
    for y in job.roi.rows() {
        if stop.check().is_err() {
            return Err(BufferError::Cancelled);
        }
        job.add_row(&mut hist, y);
    }
    debug!(
        "histogram of {:?} channel {channel} over {}: {} binned, {} below, {} above",
        buf.name(),
        job.roi,
        hist.total(),
        hist.below,
        hist.above
    );
    Ok(hist)
}

/// [`histogram_with`] with rows spread across the rayon thread pool.
///
/// Each worker fills its own bins; the partial histograms are summed, so the
/// result equals the sequential one.
#[cfg(feature = "rayon")]
pub fn histogram_par(
    buf: &ImageBuf<'_>,
    channel: u16,
    opts: &HistogramOptions,
) -> Result<Histogram, BufferError> {
    use rayon::prelude::*;

    let job = Job::new(buf, channel, opts)?;
    let hist = job
        .roi
        .rows()
        .into_par_iter()
        .fold(
            || Histogram::empty(opts),
            |mut hist, y| {
                job.add_row(&mut hist, y);
                hist
            },
        )
        .reduce(
            || Histogram::empty(opts),
            |mut acc, part| {
                acc.absorb(&part);
                acc
            },
        );
    debug!(
        "parallel histogram of {:?} channel {channel} over {}: {} binned",
        buf.name(),
        job.roi,
        hist.total()
    );
    Ok(hist)
}

// Validated inputs shared by the sequential and parallel paths.
struct Job<'b> {
    spec: &'b ImageSpec,
    data: &'b [u8],
    channel: u16,
    roi: Roi,
    min: f32,
    max: f32,
    ratio: f32,
    last: usize,
}

impl<'b> Job<'b> {
    fn new(
        buf: &'b ImageBuf<'_>,
        channel: u16,
        opts: &HistogramOptions,
    ) -> Result<Self, BufferError> {
        if opts.bins == 0 {
            return Err(BufferError::InvalidArgument(
                "histogram needs at least one bin".into(),
            ));
        }
        if !(opts.min.is_finite() && opts.max.is_finite() && opts.min < opts.max) {
            return Err(BufferError::InvalidArgument(format!(
                "histogram range [{}, {}] must be finite with min < max",
                opts.min, opts.max
            )));
        }
        let (spec, data) = buf.pixels()?;
        if channel >= spec.nchannels() {
            return Err(BufferError::InvalidArgument(format!(
                "channel {channel} of an image with {} channels",
                spec.nchannels()
            )));
        }
        let roi = opts.roi.unwrap_or_else(|| Roi::full(spec));
        if !roi.fits(spec) {
            return Err(BufferError::InvalidArgument(format!(
                "region {roi} outside {}x{} image",
                spec.width(),
                spec.height()
            )));
        }
        Ok(Self {
            spec,
            data,
            channel,
            roi,
            min: opts.min,
            max: opts.max,
            ratio: opts.bins as f32 / (opts.max - opts.min),
            last: opts.bins - 1,
        })
    }

    fn add_row(&self, hist: &mut Histogram, y: u32) {
        if self.roi.is_empty() {
            return;
        }
        let Some(start) = self.spec.sample_offset(self.roi.x, y, self.channel) else {
            return;
        };
        let format = self.spec.format();
        let samples = self.data[start..]
            .chunks(self.spec.pixel_bytes())
            .take(self.roi.width as usize);
        for sample in samples {
            self.add(hist, format.to_f32(sample));
        }
    }

    // f32 throughout: on [0, 1] with 10 bins, k / 10.0 lands in bin k.
    #[inline]
    fn add(&self, hist: &mut Histogram, value: f32) {
        if value.is_nan() {
            return;
        }
        if value < self.min {
            hist.below += 1;
        } else if value > self.max {
            hist.above += 1;
        } else {
            let index = ((value - self.min) * self.ratio) as usize;
            hist.bins[index.min(self.last)] += 1;
        }
    }
}
