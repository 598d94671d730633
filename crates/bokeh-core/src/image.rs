//! Owned packed-byte image buffers.
//!
//! Pixels are stored row-major, top row first, with no padding between rows.
//! Channel order in memory is R, G, B and optionally A; conversion to the
//! B, G, R(, A) order used on disk happens in the [`tga`](crate::tga) codec.

use crate::error::ImageError;

/// Pixel layout of an [`ImageBuffer`], named after its TGA bits per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bitdepth {
    /// 24 bits per pixel, three channels.
    Bgr24,
    /// 32 bits per pixel, three channels plus alpha.
    Bgra32,
}

impl Bitdepth {
    /// Bytes used by one pixel (3 or 4).
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Bitdepth::Bgr24 => 3,
            Bitdepth::Bgra32 => 4,
        }
    }

    /// Bits per pixel as written to a TGA header (24 or 32).
    pub const fn bits(self) -> u8 {
        match self {
            Bitdepth::Bgr24 => 24,
            Bitdepth::Bgra32 => 32,
        }
    }

    /// Map TGA bits per pixel back to a layout.
    pub const fn from_bits(bits: u8) -> Option<Bitdepth> {
        match bits {
            24 => Some(Bitdepth::Bgr24),
            32 => Some(Bitdepth::Bgra32),
            _ => None,
        }
    }

    /// Whether the layout carries an alpha channel.
    pub const fn has_alpha(self) -> bool {
        matches!(self, Bitdepth::Bgra32)
    }
}

/// A rectangular image with a fixed pixel layout.
///
/// The store always holds exactly `row_stride() * height()` bytes, and the
/// dimensions cannot change after construction.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    bitdepth: Bitdepth,
    data: Vec<u8>,
}

impl ImageBuffer {
    /// Allocate a zeroed image.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::InvalidDimensions`] for a zero width or height,
    /// or a size whose byte count overflows `usize`, and
    /// [`ImageError::AllocationFailed`] if the store cannot be reserved.
    ///
    /// # Examples
    ///
    /// ```
    /// use bokeh_core::{Bitdepth, ImageBuffer};
    /// let img = ImageBuffer::new(4, 2, Bitdepth::Bgr24).unwrap();
    /// assert_eq!(img.row_stride(), 12);
    /// assert_eq!(img.as_bytes().len(), 24);
    /// ```
    pub fn new(width: u32, height: u32, bitdepth: Bitdepth) -> Result<Self, ImageError> {
        let len = byte_len(width, height, bitdepth)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| ImageError::AllocationFailed { bytes: len })?;
        data.resize(len, 0);
        Ok(ImageBuffer {
            width,
            height,
            bitdepth,
            data,
        })
    }

    /// Wrap an existing RGB(A) byte store.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::BufferLength`] if `data` is not exactly
    /// `width * height * bytes_per_pixel` long.
    pub fn from_raw(
        width: u32,
        height: u32,
        bitdepth: Bitdepth,
        data: Vec<u8>,
    ) -> Result<Self, ImageError> {
        let expected = byte_len(width, height, bitdepth)?;
        if data.len() != expected {
            return Err(ImageError::BufferLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(ImageBuffer {
            width,
            height,
            bitdepth,
            data,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel layout.
    pub fn bitdepth(&self) -> Bitdepth {
        self.bitdepth
    }

    /// Bytes per pixel.
    pub fn pixel_stride(&self) -> usize {
        self.bitdepth.bytes_per_pixel()
    }

    /// Bytes per row; there is never any padding.
    pub fn row_stride(&self) -> usize {
        self.width as usize * self.pixel_stride()
    }

    /// The whole pixel store.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The whole pixel store, mutably.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the image, returning its store.
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Byte offset of pixel `(x, y)`, or `None` when out of bounds.
    pub fn pixel_offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.row_stride() + x as usize * self.pixel_stride())
    }

    /// Byte offset of pixel `(x, y)` with toroidal wraparound.
    ///
    /// Coordinates outside the image wrap modulo the dimension in both
    /// directions, so this is always a valid offset.
    ///
    /// # Examples
    ///
    /// ```
    /// use bokeh_core::{Bitdepth, ImageBuffer};
    /// let img = ImageBuffer::new(5, 3, Bitdepth::Bgr24).unwrap();
    /// assert_eq!(img.wrapped_offset(-1, 0), img.wrapped_offset(4, 0));
    /// assert_eq!(img.wrapped_offset(5, 3), 0);
    /// ```
    pub fn wrapped_offset(&self, x: i64, y: i64) -> usize {
        let ax = x.rem_euclid(self.width as i64) as usize;
        let ay = y.rem_euclid(self.height as i64) as usize;
        ay * self.row_stride() + ax * self.pixel_stride()
    }

    /// Channels of pixel `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        let offset = self.pixel_offset(x, y)?;
        Some(&self.data[offset..offset + self.pixel_stride()])
    }

    /// Channels of pixel `(x, y)` with toroidal wraparound.
    pub fn pixel_wrapped(&self, x: i64, y: i64) -> &[u8] {
        let offset = self.wrapped_offset(x, y);
        &self.data[offset..offset + self.pixel_stride()]
    }

    /// Mutable channels of pixel `(x, y)`, or `None` when out of bounds.
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut [u8]> {
        let offset = self.pixel_offset(x, y)?;
        let stride = self.pixel_stride();
        Some(&mut self.data[offset..offset + stride])
    }

    /// Exchange the first and third channel of every pixel.
    pub fn swap_red_blue(&mut self) {
        let stride = self.pixel_stride();
        for px in self.data.chunks_exact_mut(stride) {
            px.swap(0, 2);
        }
    }
}

impl std::fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bitdepth", &self.bitdepth)
            .field("bytes", &self.data.len())
            .finish()
    }
}

fn byte_len(width: u32, height: u32, bitdepth: Bitdepth) -> Result<usize, ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidDimensions {
            width,
            height,
            reason: "width and height must be > 0",
        });
    }
    (width as u64)
        .checked_mul(height as u64)
        .and_then(|v| v.checked_mul(bitdepth.bytes_per_pixel() as u64))
        .and_then(|v| usize::try_from(v).ok())
        .ok_or(ImageError::InvalidDimensions {
            width,
            height,
            reason: "dimensions overflow buffer size calculation",
        })
}
