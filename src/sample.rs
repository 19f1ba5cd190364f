//! Conversions between native sample storage and canonical `f32` values.
//!
//! Every [`SampleType`] maps to `f32` through a fixed rule:
//!
//! - `F32` is copied bit for bit; `F16` widens exactly and narrows with
//!   round-to-nearest-even.
//! - Unsigned integers are divided by their maximum (`u8` value `v` reads as
//!   `v / 255.0`). Writes clamp to `[0, 1]` and round to nearest.
//! - Signed integers are divided by their maximum and clamped below at
//!   `-1.0`. Writes clamp to `[-1, 1]` and round to nearest.
//!
//! Samples are stored in native byte order.

use crate::spec::SampleType;

/// Rust scalar types that can back an image buffer.
///
/// The `Pod` bound lets caller arrays be reinterpreted as bytes in place,
/// which is what makes wrapping zero-copy.
pub trait Sample: bytemuck::Pod + Send + Sync {
    /// The storage tag matching this type.
    const TYPE: SampleType;
}

impl Sample for u8 {
    const TYPE: SampleType = SampleType::U8;
}

impl Sample for i8 {
    const TYPE: SampleType = SampleType::I8;
}

impl Sample for u16 {
    const TYPE: SampleType = SampleType::U16;
}

impl Sample for i16 {
    const TYPE: SampleType = SampleType::I16;
}

impl Sample for u32 {
    const TYPE: SampleType = SampleType::U32;
}

impl Sample for i32 {
    const TYPE: SampleType = SampleType::I32;
}

impl Sample for half::f16 {
    const TYPE: SampleType = SampleType::F16;
}

impl Sample for f32 {
    const TYPE: SampleType = SampleType::F32;
}

impl SampleType {
    // Callers pass slices of at least `byte_size()` bytes.
    #[inline]
    pub(crate) fn to_f32(self, bytes: &[u8]) -> f32 {
        match self {
            Self::U8 => bytes[0] as f32 / u8::MAX as f32,
            Self::I8 => (bytes[0] as i8 as f32 / i8::MAX as f32).max(-1.0),
            Self::U16 => u16::from_ne_bytes([bytes[0], bytes[1]]) as f32 / u16::MAX as f32,
            Self::I16 => {
                (i16::from_ne_bytes([bytes[0], bytes[1]]) as f32 / i16::MAX as f32).max(-1.0)
            }
            Self::U32 => (u32::from_ne_bytes(word(bytes)) as f64 / u32::MAX as f64) as f32,
            Self::I32 => {
                ((i32::from_ne_bytes(word(bytes)) as f64 / i32::MAX as f64) as f32).max(-1.0)
            }
            Self::F16 => half::f16::from_bits(u16::from_ne_bytes([bytes[0], bytes[1]])).to_f32(),
            Self::F32 => f32::from_ne_bytes(word(bytes)),
        }
    }

    // Integer targets clamp to their normalized range; NaN becomes zero.
    #[inline]
    pub(crate) fn from_f32(self, value: f32, out: &mut [u8]) {
        match self {
            Self::U8 => out[0] = unorm(value, u8::MAX as f64) as u8,
            Self::I8 => out[0] = (snorm(value, i8::MAX as f64) as i8) as u8,
            Self::U16 => {
                out[..2].copy_from_slice(&(unorm(value, u16::MAX as f64) as u16).to_ne_bytes())
            }
            Self::I16 => {
                out[..2].copy_from_slice(&(snorm(value, i16::MAX as f64) as i16).to_ne_bytes())
            }
            Self::U32 => {
                out[..4].copy_from_slice(&(unorm(value, u32::MAX as f64) as u32).to_ne_bytes())
            }
            Self::I32 => {
                out[..4].copy_from_slice(&(snorm(value, i32::MAX as f64) as i32).to_ne_bytes())
            }
            Self::F16 => {
                out[..2].copy_from_slice(&half::f16::from_f32(value).to_bits().to_ne_bytes())
            }
            Self::F32 => out[..4].copy_from_slice(&value.to_ne_bytes()),
        }
    }
}

#[inline]
fn word(bytes: &[u8]) -> [u8; 4] {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

// Float-to-int `as` casts saturate and map NaN to zero.
#[inline]
fn unorm(value: f32, max: f64) -> f64 {
    (value as f64).clamp(0.0, 1.0) * max + 0.5
}

#[inline]
fn snorm(value: f32, max: f64) -> f64 {
    ((value as f64).clamp(-1.0, 1.0) * max).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(ty: SampleType, value: f32) -> f32 {
        let mut bytes = [0u8; 4];
        ty.from_f32(value, &mut bytes);
        ty.to_f32(&bytes)
    }

    #[test]
    fn u8_scale_is_255() {
        assert_eq!(SampleType::U8.to_f32(&[255]), 1.0);
        assert_eq!(SampleType::U8.to_f32(&[0]), 0.0);
        assert_eq!(SampleType::U8.to_f32(&[51]), 51.0 / 255.0);
    }

    #[test]
    fn u8_write_rounds_and_clamps() {
        let mut out = [0u8; 1];
        SampleType::U8.from_f32(0.5, &mut out);
        assert_eq!(out[0], 128);
        SampleType::U8.from_f32(2.0, &mut out);
        assert_eq!(out[0], 255);
        SampleType::U8.from_f32(-1.0, &mut out);
        assert_eq!(out[0], 0);
        SampleType::U8.from_f32(f32::NAN, &mut out);
        assert_eq!(out[0], 0);
    }

    #[test]
    fn every_u8_value_survives() {
        for v in 0..=255u8 {
            let f = SampleType::U8.to_f32(&[v]);
            let mut out = [0u8; 1];
            SampleType::U8.from_f32(f, &mut out);
            assert_eq!(out[0], v);
        }
    }

    #[test]
    fn signed_types_clamp_at_minus_one() {
        assert_eq!(SampleType::I8.to_f32(&[i8::MIN as u8]), -1.0);
        assert_eq!(SampleType::I8.to_f32(&[127]), 1.0);
        assert_eq!(SampleType::I16.to_f32(&i16::MIN.to_ne_bytes()), -1.0);
        assert_eq!(SampleType::I32.to_f32(&i32::MIN.to_ne_bytes()), -1.0);
        assert_eq!(roundtrip(SampleType::I16, -3.0), -1.0);
    }

    #[test]
    fn u16_extremes() {
        assert_eq!(SampleType::U16.to_f32(&u16::MAX.to_ne_bytes()), 1.0);
        assert_eq!(roundtrip(SampleType::U16, 1.0), 1.0);
        assert_eq!(roundtrip(SampleType::U16, 0.0), 0.0);
    }

    #[test]
    fn u32_extremes() {
        assert_eq!(SampleType::U32.to_f32(&u32::MAX.to_ne_bytes()), 1.0);
        assert_eq!(roundtrip(SampleType::U32, 1.0), 1.0);
        assert_eq!(roundtrip(SampleType::U32, 0.0), 0.0);
    }

    #[test]
    fn f32_is_exact() {
        for v in [0.0f32, -0.0, 1.0, 0.09, 1.0e-30, -12345.678, f32::MAX] {
            assert_eq!(roundtrip(SampleType::F32, v).to_bits(), v.to_bits());
        }
        assert!(roundtrip(SampleType::F32, f32::NAN).is_nan());
    }

    #[test]
    fn f16_widening_is_exact() {
        for bits in [0x0000u16, 0x3c00, 0xbc00, 0x3555, 0x7bff, 0x0001, 0x2e66] {
            let value = SampleType::F16.to_f32(&bits.to_ne_bytes());
            assert_eq!(value, half::f16::from_bits(bits).to_f32());
            let mut out = [0u8; 2];
            SampleType::F16.from_f32(value, &mut out);
            assert_eq!(u16::from_ne_bytes(out), bits);
        }
    }

    #[test]
    fn f16_narrowing_rounds() {
        assert_eq!(roundtrip(SampleType::F16, 0.5), 0.5);
        assert_eq!(roundtrip(SampleType::F16, 1.0e6), f32::INFINITY);
        assert_eq!(roundtrip(SampleType::F16, 0.1), half::f16::from_f32(0.1).to_f32());
        assert!(roundtrip(SampleType::F16, f32::NAN).is_nan());
    }

    #[test]
    fn sample_tags_match_byte_sizes() {
        assert_eq!(<half::f16 as Sample>::TYPE.byte_size(), size_of::<half::f16>());
        assert_eq!(<u8 as Sample>::TYPE.byte_size(), size_of::<u8>());
        assert_eq!(<i16 as Sample>::TYPE.byte_size(), size_of::<i16>());
        assert_eq!(<u32 as Sample>::TYPE.byte_size(), size_of::<u32>());
        assert_eq!(<f32 as Sample>::TYPE.byte_size(), size_of::<f32>());
    }
}
