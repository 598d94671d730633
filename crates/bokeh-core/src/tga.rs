//! Uncompressed true-color TGA (version 1) encoding and decoding.
//!
//! Only image type 2 at 24 or 32 bits per pixel is supported. Color maps,
//! RLE compression and the version 2 footer are not. Pixels are stored on
//! disk as B, G, R(, A) and are swizzled to and from the R, G, B(, A) order
//! of [`ImageBuffer`].
//!
//! Decoding is bounded: [`DecodeLimits`] caps the number of bytes consumed
//! from the stream and the number of pixels an image may declare, so a
//! hostile header cannot make the decoder allocate or read without limit.

use std::io::{self, Read, Write};

use tracing::debug;

use crate::error::TgaError;
use crate::image::{Bitdepth, ImageBuffer};

/// Size of the fixed TGA header.
pub const HEADER_LEN: usize = 18;

/// Image type code for uncompressed true-color images.
const IMAGE_TYPE_TRUE_COLOR: u8 = 2;
/// Descriptor bit announcing an 8-bit alpha channel.
const DESCRIPTOR_ALPHA: u8 = 0x08;
/// Descriptor bit for top-left origin.
const DESCRIPTOR_TOP_ORIGIN: u8 = 0x20;

/// Three million pixels, a ceiling preset for [`DecodeLimits::pixels`].
pub const THREE_MEGAPIXELS: u64 = 3_000_000;
/// Six million pixels, e.g. 3000x2000.
pub const SIX_MEGAPIXELS: u64 = 6_000_000;
/// Nine million pixels.
pub const NINE_MEGAPIXELS: u64 = 9_000_000;
/// Twelve million pixels, e.g. 4000x3000.
pub const TWELVE_MEGAPIXELS: u64 = 12_000_000;

/// Resource ceilings applied while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum number of bytes read from the stream, header included.
    pub max_bytes: u64,
    /// Maximum number of pixels (width x height) an image may have.
    pub max_pixels: u64,
}

impl DecodeLimits {
    /// No practical limit: every byte and any 16-bit x 16-bit image.
    pub const UNLIMITED: DecodeLimits = DecodeLimits {
        max_bytes: u64::MAX,
        max_pixels: u32::MAX as u64,
    };

    /// Unlimited bytes, at most `pixels` pixels.
    ///
    /// ```
    /// use bokeh_core::tga::{DecodeLimits, SIX_MEGAPIXELS};
    /// let limits = DecodeLimits::pixels(SIX_MEGAPIXELS);
    /// assert_eq!(limits.max_pixels, 6_000_000);
    /// ```
    pub const fn pixels(pixels: u64) -> Self {
        DecodeLimits {
            max_bytes: u64::MAX,
            max_pixels: pixels,
        }
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        DecodeLimits::UNLIMITED
    }
}

/// Bytes per scanline for an image of `width` pixels.
pub fn stride(width: u32, bitdepth: Bitdepth) -> u64 {
    width as u64 * bitdepth.bytes_per_pixel() as u64
}

/// Length of the pixel payload for the given dimensions.
pub fn payload_len(width: u32, height: u32, bitdepth: Bitdepth) -> u64 {
    stride(width, bitdepth) * height as u64
}

/// Write `image` to `sink` as an uncompressed, top-origin TGA.
///
/// # Errors
///
/// Returns [`TgaError::DimensionsTooLarge`] if either dimension exceeds
/// 65535 (checked before anything is written) and [`TgaError::Io`] if the
/// sink fails.
///
/// # Examples
///
/// ```
/// use bokeh_core::{tga, Bitdepth, ImageBuffer};
/// let img = ImageBuffer::from_raw(1, 1, Bitdepth::Bgr24, vec![10, 20, 30]).unwrap();
/// let bytes = tga::encode_to_vec(&img).unwrap();
/// assert_eq!(bytes.len(), 18 + 3);
/// assert_eq!(&bytes[18..], &[30, 20, 10]);
/// ```
pub fn encode<W: Write>(image: &ImageBuffer, mut sink: W) -> Result<(), TgaError> {
    let width = u16::try_from(image.width());
    let height = u16::try_from(image.height());
    let (Ok(width), Ok(height)) = (width, height) else {
        return Err(TgaError::DimensionsTooLarge {
            width: image.width(),
            height: image.height(),
        });
    };

    let bitdepth = image.bitdepth();
    let mut descriptor = DESCRIPTOR_TOP_ORIGIN;
    if bitdepth.has_alpha() {
        descriptor |= DESCRIPTOR_ALPHA;
    }

    let mut header = [0u8; HEADER_LEN];
    header[2] = IMAGE_TYPE_TRUE_COLOR;
    header[12..14].copy_from_slice(&width.to_le_bytes());
    header[14..16].copy_from_slice(&height.to_le_bytes());
    header[16] = bitdepth.bits();
    header[17] = descriptor;
    sink.write_all(&header)?;

    let bpp = image.pixel_stride();
    let mut row = vec![0u8; image.row_stride()];
    for src in image.as_bytes().chunks_exact(image.row_stride()) {
        row.copy_from_slice(src);
        for px in row.chunks_exact_mut(bpp) {
            px.swap(0, 2);
        }
        sink.write_all(&row)?;
    }
    sink.flush()?;
    Ok(())
}

/// Encode `image` into a freshly allocated byte vector.
pub fn encode_to_vec(image: &ImageBuffer) -> Result<Vec<u8>, TgaError> {
    let len = HEADER_LEN as u64 + payload_len(image.width(), image.height(), image.bitdepth());
    let mut out = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
    encode(image, &mut out)?;
    Ok(out)
}

/// Read a TGA image from `source`.
///
/// Header fields are validated in stream order and the first violation is
/// returned. The identification field is skipped. The origin bits of the
/// descriptor are not interpreted, so rows keep their stream order.
///
/// Since [`encode`] always writes top-origin, decoding a bottom-origin file
/// and encoding it again keeps the pixel bytes but flips the image when
/// viewed.
///
/// # Errors
///
/// * [`TgaError::ColorMapped`], [`TgaError::Compressed`],
///   [`TgaError::InvalidDimensions`], [`TgaError::UnsupportedBitdepth`],
///   [`TgaError::MalformedHeader`] for unsupported or inconsistent headers.
/// * [`TgaError::TooFar`] if the image declares more than
///   `limits.max_pixels` pixels or the stream runs past `limits.max_bytes`.
/// * [`TgaError::Eof`] if the stream ends or fails early.
/// * [`TgaError::AllocationFailed`] if the pixel store cannot be allocated.
///
/// # Examples
///
/// ```
/// use bokeh_core::tga::{self, DecodeLimits};
/// use bokeh_core::TgaError;
///
/// let mut bytes = vec![0u8; 18];
/// bytes[1] = 1; // color map present
/// let err = tga::decode(&bytes[..], DecodeLimits::UNLIMITED).unwrap_err();
/// assert!(matches!(err, TgaError::ColorMapped));
/// ```
pub fn decode<R: Read>(source: R, limits: DecodeLimits) -> Result<ImageBuffer, TgaError> {
    let mut reader = BoundedReader::new(source, limits.max_bytes);

    let ident_len = reader.read_u8()?;

    if reader.read_u8()? != 0 {
        return Err(TgaError::ColorMapped);
    }
    if reader.read_u8()? != IMAGE_TYPE_TRUE_COLOR {
        return Err(TgaError::Compressed);
    }

    // Color map specification and x/y origin.
    reader.skip(5 + 2 + 2)?;

    let width = reader.read_u16_le()?;
    let height = reader.read_u16_le()?;
    if width == 0 || height == 0 {
        return Err(TgaError::InvalidDimensions { width, height });
    }

    let bits = reader.read_u8()?;
    let bitdepth = Bitdepth::from_bits(bits).ok_or(TgaError::UnsupportedBitdepth(bits))?;

    let descriptor = reader.read_u8()?;
    if (descriptor & DESCRIPTOR_ALPHA != 0) != bitdepth.has_alpha() {
        return Err(TgaError::MalformedHeader {
            bitdepth: bits,
            descriptor,
        });
    }

    reader.skip(ident_len as u64)?;

    let pixels = width as u64 * height as u64;
    if pixels > limits.max_pixels {
        debug!(pixels, max_pixels = limits.max_pixels, "TGA exceeds pixel budget");
        return Err(TgaError::TooFar);
    }

    debug!(width, height, bits, "decoding TGA payload");
    let mut image = ImageBuffer::new(width as u32, height as u32, bitdepth)?;
    reader.read_payload(image.as_bytes_mut())?;
    image.swap_red_blue();
    Ok(image)
}

/// A reader that counts every byte against a budget.
struct BoundedReader<R> {
    inner: R,
    consumed: u64,
    max_bytes: u64,
}

impl<R: Read> BoundedReader<R> {
    fn new(inner: R, max_bytes: u64) -> Self {
        BoundedReader {
            inner,
            consumed: 0,
            max_bytes,
        }
    }

    fn read_u8(&mut self) -> Result<u8, TgaError> {
        if self.consumed >= self.max_bytes {
            return Err(TgaError::TooFar);
        }
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Err(TgaError::Eof),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return Err(TgaError::Eof),
            }
        }
        self.consumed += 1;
        Ok(buf[0])
    }

    fn read_u16_le(&mut self) -> Result<u16, TgaError> {
        let lo = self.read_u8()?;
        let hi = self.read_u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn skip(&mut self, count: u64) -> Result<(), TgaError> {
        for _ in 0..count {
            self.read_u8()?;
        }
        Ok(())
    }

    /// Fill `out`, reading no further than the remaining budget.
    fn read_payload(&mut self, out: &mut [u8]) -> Result<(), TgaError> {
        let remaining = self.max_bytes - self.consumed;
        let allowed = (out.len() as u64).min(remaining) as usize;
        let (head, tail) = out.split_at_mut(allowed);
        self.inner.read_exact(head).map_err(|_| TgaError::Eof)?;
        self.consumed += allowed as u64;
        if !tail.is_empty() {
            return Err(TgaError::TooFar);
        }
        Ok(())
    }
}
