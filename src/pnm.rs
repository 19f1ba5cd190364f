//! Netpbm coding: binary PGM (`P5`), PPM (`P6`), PAM (`P7`) and PFM.
//!
//! Decoded pixels use the in-memory layout of [`ImageBuf`](crate::ImageBuf):
//! packed, top-to-bottom, native-endian. Maxvals below 256 decode to
//! [`SampleType::U8`], larger ones to [`SampleType::U16`]; maxvals other than
//! 255 and 65535 are rescaled to the full range of the output type.
//!
//! On disk, 16-bit samples are big-endian and PFM rows run bottom-to-top.
//! PFM is written little-endian (negative scale).

use enough::Stop;
use log::trace;

use crate::codec::CodecError;
use crate::format::ImageFormat;
use crate::limits::ResourceLimits;
use crate::spec::{ImageSpec, SampleType};

/// Decode a Netpbm image.
///
/// Limits are checked against the parsed header before the pixel buffer is
/// allocated. `stop` is polled once per row.
pub fn decode(
    data: &[u8],
    limits: &ResourceLimits,
    stop: &dyn Stop,
) -> Result<(ImageSpec, Vec<u8>, ImageFormat), CodecError> {
    let format =
        ImageFormat::detect(data).ok_or_else(|| malformed("missing Netpbm magic number"))?;
    let mut cursor = Cursor { data, pos: 2 };
    let header = match format {
        ImageFormat::Pgm | ImageFormat::Ppm => {
            let width = cursor.number("width")?;
            let height = cursor.number("height")?;
            let maxval = cursor.number("maxval")?;
            let depth = if format == ImageFormat::Pgm { 1 } else { 3 };
            Header::integer(width, height, depth, maxval)?
        }
        ImageFormat::Pam => parse_pam(&mut cursor)?,
        ImageFormat::Pfm => {
            let depth = if data[1] == b'F' { 3 } else { 1 };
            let width = cursor.number("width")?;
            let height = cursor.number("height")?;
            let scale: f32 = cursor.number("scale")?;
            if scale == 0.0 || !scale.is_finite() {
                return Err(malformed("PFM scale must be finite and nonzero"));
            }
            Header {
                width,
                height,
                depth,
                encoding: Encoding::Float {
                    little_endian: scale < 0.0,
                },
            }
        }
    };
    let raster = cursor.raster()?;

    let spec = ImageSpec::new(header.width, header.height, header.depth, header.sample_type())
        .map_err(|err| CodecError::Malformed(err.to_string()))?;
    limits.check_spec(&spec)?;
    if raster.len() < spec.image_bytes() {
        return Err(CodecError::Malformed(format!(
            "raster holds {} bytes, {spec} needs {}",
            raster.len(),
            spec.image_bytes()
        )));
    }

    let row_bytes = spec.scanline_bytes();
    let height = spec.height() as usize;
    let mut pixels = vec![0u8; spec.image_bytes()];
    for (y, dst) in pixels.chunks_exact_mut(row_bytes).enumerate() {
        if stop.check().is_err() {
            return Err(CodecError::Cancelled);
        }
        match header.encoding {
            Encoding::Integer { maxval } => {
                let src = &raster[y * row_bytes..][..row_bytes];
                if maxval < 256 {
                    unpack_u8(src, dst, maxval);
                } else {
                    unpack_u16(src, dst, maxval);
                }
            }
            Encoding::Float { little_endian } => {
                let src = &raster[(height - 1 - y) * row_bytes..][..row_bytes];
                for (src, dst) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
                    let bytes = [src[0], src[1], src[2], src[3]];
                    let value = if little_endian {
                        f32::from_le_bytes(bytes)
                    } else {
                        f32::from_be_bytes(bytes)
                    };
                    dst.copy_from_slice(&value.to_ne_bytes());
                }
            }
        }
    }
    trace!("decoded {format} raster, {spec}");
    Ok((spec, pixels, format))
}

/// Encode packed native-endian pixels as `format`.
///
/// # Errors
///
/// [`CodecError::Unsupported`] when `format` cannot store `spec` (see
/// [`ImageFormat::supports`]), [`CodecError::Malformed`] when `pixels` is
/// not exactly `spec.image_bytes()` long.
pub fn encode(
    spec: &ImageSpec,
    pixels: &[u8],
    format: ImageFormat,
    stop: &dyn Stop,
) -> Result<Vec<u8>, CodecError> {
    if !format.supports(spec) {
        return Err(CodecError::Unsupported(format!("{format} cannot store {spec}")));
    }
    if pixels.len() != spec.image_bytes() {
        return Err(CodecError::Malformed(format!(
            "expected {} pixel bytes for {spec}, got {}",
            spec.image_bytes(),
            pixels.len()
        )));
    }

    let mut out = header_text(spec, format).into_bytes();
    out.reserve(pixels.len());
    let row_bytes = spec.scanline_bytes();
    let height = spec.height() as usize;
    for y in 0..height {
        if stop.check().is_err() {
            return Err(CodecError::Cancelled);
        }
        let src_y = if format == ImageFormat::Pfm {
            height - 1 - y
        } else {
            y
        };
        let row = &pixels[src_y * row_bytes..][..row_bytes];
        match spec.format() {
            SampleType::U8 => out.extend_from_slice(row),
            SampleType::U16 => {
                for s in row.chunks_exact(2) {
                    out.extend_from_slice(&u16::from_ne_bytes([s[0], s[1]]).to_be_bytes());
                }
            }
            SampleType::F32 => {
                for s in row.chunks_exact(4) {
                    out.extend_from_slice(
                        &f32::from_ne_bytes([s[0], s[1], s[2], s[3]]).to_le_bytes(),
                    );
                }
            }
            other => {
                return Err(CodecError::Unsupported(format!(
                    "{format} cannot store {other} samples"
                )));
            }
        }
    }
    trace!("encoded {spec} as {format}, {} bytes", out.len());
    Ok(out)
}

// ---------------------------------------------------------------------------
// Header parsing
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
enum Encoding {
    Integer { maxval: u32 },
    Float { little_endian: bool },
}

#[derive(Clone, Copy, Debug)]
struct Header {
    width: u32,
    height: u32,
    depth: u16,
    encoding: Encoding,
}

impl Header {
    fn integer(width: u32, height: u32, depth: u16, maxval: u32) -> Result<Self, CodecError> {
        if !(1..=u16::MAX as u32).contains(&maxval) {
            return Err(CodecError::Malformed(format!(
                "maxval {maxval} outside 1..=65535"
            )));
        }
        Ok(Self {
            width,
            height,
            depth,
            encoding: Encoding::Integer { maxval },
        })
    }

    fn sample_type(&self) -> SampleType {
        match self.encoding {
            Encoding::Integer { maxval } if maxval < 256 => SampleType::U8,
            Encoding::Integer { .. } => SampleType::U16,
            Encoding::Float { .. } => SampleType::F32,
        }
    }
}

fn parse_pam(cursor: &mut Cursor<'_>) -> Result<Header, CodecError> {
    let (mut width, mut height, mut depth, mut maxval) = (None, None, None, None);
    loop {
        match cursor.token()? {
            "WIDTH" => width = Some(cursor.number("width")?),
            "HEIGHT" => height = Some(cursor.number("height")?),
            "DEPTH" => depth = Some(cursor.number("depth")?),
            "MAXVAL" => maxval = Some(cursor.number("maxval")?),
            "TUPLTYPE" => {
                cursor.token()?;
            }
            "ENDHDR" => break,
            other => {
                return Err(CodecError::Malformed(format!(
                    "unknown PAM header field {other:?}"
                )));
            }
        }
    }
    match (width, height, depth, maxval) {
        (Some(width), Some(height), Some(depth), Some(maxval)) => {
            Header::integer(width, height, depth, maxval)
        }
        _ => Err(malformed("PAM header lacks WIDTH, HEIGHT, DEPTH or MAXVAL")),
    }
}

fn header_text(spec: &ImageSpec, format: ImageFormat) -> String {
    let (w, h) = (spec.width(), spec.height());
    let maxval = if spec.format() == SampleType::U16 {
        u16::MAX as u32
    } else {
        u8::MAX as u32
    };
    match format {
        ImageFormat::Pgm => format!("P5\n{w} {h}\n{maxval}\n"),
        ImageFormat::Ppm => format!("P6\n{w} {h}\n{maxval}\n"),
        ImageFormat::Pam => {
            let tupltype = match spec.nchannels() {
                1 => "TUPLTYPE GRAYSCALE\n",
                2 => "TUPLTYPE GRAYSCALE_ALPHA\n",
                3 => "TUPLTYPE RGB\n",
                4 => "TUPLTYPE RGB_ALPHA\n",
                _ => "",
            };
            format!(
                "P7\nWIDTH {w}\nHEIGHT {h}\nDEPTH {}\nMAXVAL {maxval}\n{tupltype}ENDHDR\n",
                spec.nchannels()
            )
        }
        ImageFormat::Pfm => {
            let magic = if spec.nchannels() == 3 { "PF" } else { "Pf" };
            format!("{magic}\n{w} {h}\n-1.0\n")
        }
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn skip_blanks(&mut self) {
        while let Some(&b) = self.data.get(self.pos) {
            if b == b'#' {
                while let Some(&c) = self.data.get(self.pos) {
                    self.pos += 1;
                    if c == b'\n' {
                        break;
                    }
                }
            } else if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn token(&mut self) -> Result<&'a str, CodecError> {
        self.skip_blanks();
        let start = self.pos;
        while self
            .data
            .get(self.pos)
            .is_some_and(|b| !b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(malformed("truncated header"));
        }
        core::str::from_utf8(&self.data[start..self.pos])
            .map_err(|_| malformed("header is not ASCII"))
    }

    fn number<T: core::str::FromStr>(&mut self, field: &str) -> Result<T, CodecError> {
        let token = self.token()?;
        token
            .parse()
            .map_err(|_| CodecError::Malformed(format!("invalid {field} {token:?}")))
    }

    // A single whitespace byte separates the header from the raster.
    fn raster(&self) -> Result<&'a [u8], CodecError> {
        match self.data.get(self.pos) {
            Some(b) if b.is_ascii_whitespace() => Ok(&self.data[self.pos + 1..]),
            _ => Err(malformed("missing whitespace before raster")),
        }
    }
}

fn unpack_u8(src: &[u8], dst: &mut [u8], maxval: u32) {
    if maxval == u8::MAX as u32 {
        dst.copy_from_slice(src);
        return;
    }
    for (s, d) in src.iter().zip(dst.iter_mut()) {
        *d = rescale(*s as u32, maxval, u8::MAX as u32) as u8;
    }
}

fn unpack_u16(src: &[u8], dst: &mut [u8], maxval: u32) {
    for (s, d) in src.chunks_exact(2).zip(dst.chunks_exact_mut(2)) {
        let value = u16::from_be_bytes([s[0], s[1]]) as u32;
        let value = if maxval == u16::MAX as u32 {
            value
        } else {
            rescale(value, maxval, u16::MAX as u32)
        };
        d.copy_from_slice(&(value as u16).to_ne_bytes());
    }
}

// Out-of-range samples saturate at maxval.
fn rescale(value: u32, maxval: u32, target: u32) -> u32 {
    (value.min(maxval) * target + maxval / 2) / maxval
}

fn malformed(reason: &str) -> CodecError {
    CodecError::Malformed(reason.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::LimitExceeded;
    use enough::{StopReason, Unstoppable};

    struct Cancelled;

    impl Stop for Cancelled {
        fn check(&self) -> Result<(), StopReason> {
            Err(StopReason::Cancelled)
        }
    }

    fn decode_ok(data: &[u8]) -> (ImageSpec, Vec<u8>, ImageFormat) {
        decode(data, &ResourceLimits::none(), &Unstoppable).unwrap()
    }

    #[test]
    fn pgm_with_comments() {
        let data = b"P5\n# made by hand\n3 2 # size\n255\n\x00\x10\x20\x30\x40\xff";
        let (spec, pixels, format) = decode_ok(data);
        assert_eq!(format, ImageFormat::Pgm);
        assert_eq!((spec.width(), spec.height(), spec.nchannels()), (3, 2, 1));
        assert_eq!(spec.format(), SampleType::U8);
        assert_eq!(pixels, [0x00, 0x10, 0x20, 0x30, 0x40, 0xff]);
    }

    #[test]
    fn ppm_16bit_is_big_endian_on_disk() {
        let mut data = b"P6\n1 1\n65535\n".to_vec();
        data.extend_from_slice(&[0x12, 0x34, 0x00, 0x01, 0xff, 0xff]);
        let (spec, pixels, _) = decode_ok(&data);
        assert_eq!(spec.format(), SampleType::U16);
        assert_eq!(spec.nchannels(), 3);
        let samples: Vec<u16> = pixels
            .chunks_exact(2)
            .map(|s| u16::from_ne_bytes([s[0], s[1]]))
            .collect();
        assert_eq!(samples, [0x1234, 1, 0xffff]);
    }

    #[test]
    fn odd_maxval_is_rescaled() {
        let data = b"P5\n3 1\n15\n\x00\x0f\x07";
        let (spec, pixels, _) = decode_ok(data);
        assert_eq!(spec.format(), SampleType::U8);
        assert_eq!(pixels, [0, 255, 119]);

        let mut data = b"P5\n1 1\n1023\n".to_vec();
        data.extend_from_slice(&1023u16.to_be_bytes());
        let (spec, pixels, _) = decode_ok(&data);
        assert_eq!(spec.format(), SampleType::U16);
        assert_eq!(u16::from_ne_bytes([pixels[0], pixels[1]]), u16::MAX);
    }

    #[test]
    fn pam_rgba() {
        let data = b"P7\nWIDTH 2\nHEIGHT 1\nDEPTH 4\nMAXVAL 255\nTUPLTYPE RGB_ALPHA\nENDHDR\n\
                     \x01\x02\x03\x04\x05\x06\x07\x08";
        let (spec, pixels, format) = decode_ok(data);
        assert_eq!(format, ImageFormat::Pam);
        assert_eq!(spec.nchannels(), 4);
        assert_eq!(pixels, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn pam_missing_field() {
        let data = b"P7\nWIDTH 2\nHEIGHT 1\nMAXVAL 255\nENDHDR\n\x00\x00";
        let err = decode(data, &ResourceLimits::none(), &Unstoppable).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn pfm_big_endian_bottom_up() {
        let mut data = b"Pf\n1 2\n1.0\n".to_vec();
        data.extend_from_slice(&0.25f32.to_be_bytes());
        data.extend_from_slice(&0.75f32.to_be_bytes());
        let (spec, pixels, format) = decode_ok(&data);
        assert_eq!(format, ImageFormat::Pfm);
        assert_eq!(spec.format(), SampleType::F32);
        let top = f32::from_ne_bytes([pixels[0], pixels[1], pixels[2], pixels[3]]);
        let bottom = f32::from_ne_bytes([pixels[4], pixels[5], pixels[6], pixels[7]]);
        assert_eq!((top, bottom), (0.75, 0.25));
    }

    #[test]
    fn truncated_raster_is_malformed() {
        let err = decode(b"P5\n4 4\n255\n\x00\x00", &ResourceLimits::none(), &Unstoppable)
            .unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
        let err = decode(b"P5\n4", &ResourceLimits::none(), &Unstoppable).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn zero_dimension_is_malformed() {
        let err = decode(b"P5\n0 4\n255\n", &ResourceLimits::none(), &Unstoppable).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn limits_checked_before_allocation() {
        let limits = ResourceLimits::none().with_max_width(100);
        let err = decode(b"P5\n100000 1\n255\n", &limits, &Unstoppable).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Limit(LimitExceeded::Width {
                actual: 100000,
                max: 100
            })
        ));
    }

    #[test]
    fn decode_and_encode_honor_stop() {
        let data = b"P5\n1 1\n255\n\x00";
        assert!(matches!(
            decode(data, &ResourceLimits::none(), &Cancelled),
            Err(CodecError::Cancelled)
        ));
        let spec = ImageSpec::new(1, 1, 1, SampleType::U8).unwrap();
        assert!(matches!(
            encode(&spec, &[0], ImageFormat::Pgm, &Cancelled),
            Err(CodecError::Cancelled)
        ));
    }

    #[test]
    fn encode_headers() {
        let spec = ImageSpec::new(2, 1, 1, SampleType::U8).unwrap();
        let out = encode(&spec, &[9, 10], ImageFormat::Pgm, &Unstoppable).unwrap();
        assert_eq!(out, b"P5\n2 1\n255\n\x09\x0a");

        let spec = ImageSpec::new(1, 1, 2, SampleType::U8).unwrap();
        let out = encode(&spec, &[1, 2], ImageFormat::Pam, &Unstoppable).unwrap();
        assert_eq!(
            out,
            b"P7\nWIDTH 1\nHEIGHT 1\nDEPTH 2\nMAXVAL 255\nTUPLTYPE GRAYSCALE_ALPHA\nENDHDR\n\x01\x02"
        );
    }

    #[test]
    fn encode_pfm_little_endian_bottom_up() {
        let spec = ImageSpec::new(1, 2, 1, SampleType::F32).unwrap();
        let mut pixels = 0.25f32.to_ne_bytes().to_vec();
        pixels.extend_from_slice(&0.75f32.to_ne_bytes());
        let out = encode(&spec, &pixels, ImageFormat::Pfm, &Unstoppable).unwrap();
        let header = b"Pf\n1 2\n-1.0\n";
        assert_eq!(&out[..header.len()], header);
        assert_eq!(&out[header.len()..header.len() + 4], &0.75f32.to_le_bytes());
        assert_eq!(&out[header.len() + 4..], &0.25f32.to_le_bytes());
    }

    #[test]
    fn encode_then_decode_u16_rgb() {
        let spec = ImageSpec::new(2, 2, 3, SampleType::U16).unwrap();
        let pixels: Vec<u8> = (0u16..12)
            .flat_map(|v| (v * 5000).to_ne_bytes())
            .collect();
        let out = encode(&spec, &pixels, ImageFormat::Ppm, &Unstoppable).unwrap();
        let (decoded_spec, decoded, format) = decode_ok(&out);
        assert_eq!(format, ImageFormat::Ppm);
        assert_eq!(decoded_spec, spec);
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn encode_rejects_unsupported() {
        let spec = ImageSpec::new(1, 1, 1, SampleType::I16).unwrap();
        let err = encode(&spec, &[0, 0], ImageFormat::Pgm, &Unstoppable).unwrap_err();
        assert!(matches!(err, CodecError::Unsupported(_)));

        let spec = ImageSpec::new(1, 1, 4, SampleType::F32).unwrap();
        let err = encode(&spec, &[0; 16], ImageFormat::Pfm, &Unstoppable).unwrap_err();
        assert!(matches!(err, CodecError::Unsupported(_)));
    }

    #[test]
    fn encode_rejects_wrong_length() {
        let spec = ImageSpec::new(2, 2, 1, SampleType::U8).unwrap();
        let err = encode(&spec, &[0; 3], ImageFormat::Pgm, &Unstoppable).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }
}
