//! Error types for image allocation, TGA coding and blurring.

use thiserror::Error;

/// Errors raised while constructing an [`ImageBuffer`](crate::ImageBuffer).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    /// The image dimensions are invalid (zero, or too large to address).
    #[error("invalid dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        /// The width value.
        width: u32,
        /// The height value.
        height: u32,
        /// Why the dimensions are invalid.
        reason: &'static str,
    },

    /// The pixel store could not be allocated.
    #[error("could not allocate {bytes} bytes for image data")]
    AllocationFailed {
        /// Size of the rejected allocation.
        bytes: usize,
    },

    /// A caller-supplied pixel store does not match the dimensions.
    #[error("pixel buffer length {actual} does not match expected {expected}")]
    BufferLength {
        /// row stride x height.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },
}

/// Errors that can occur while reading or writing a TGA stream.
///
/// Decoding stops at the first error; no partially decoded image is ever
/// returned.
#[derive(Debug, Error)]
pub enum TgaError {
    /// The header announces a color map.
    #[error("Color mapped pictures not supported.")]
    ColorMapped,

    /// The image type is anything but uncompressed true-color.
    #[error("Compression not supported.")]
    Compressed,

    /// Width or height is zero.
    #[error("Width or height reported as zero ({width}x{height}).")]
    InvalidDimensions {
        /// Width read from the header.
        width: u16,
        /// Height read from the header.
        height: u16,
    },

    /// Bits per pixel is neither 24 nor 32.
    #[error("TGA header indicated unsupported bitdepth {0}, only 24bpp and 32bpp are supported.")]
    UnsupportedBitdepth(u8),

    /// The descriptor's alpha bit contradicts the bitdepth.
    #[error("Header indicated {bitdepth}bpp, but Image Descriptor 0x{descriptor:02x} is contradictory.")]
    MalformedHeader {
        /// Bits per pixel from the header.
        bitdepth: u8,
        /// The image descriptor byte.
        descriptor: u8,
    },

    /// The byte or pixel budget was exhausted.
    #[error("Image data was larger than permitted.")]
    TooFar,

    /// The stream failed or ended before the image was complete.
    #[error("Stream error or unexpected EOF.")]
    Eof,

    /// The pixel payload could not be allocated.
    #[error("Could not allocate {bytes} bytes for image data.")]
    AllocationFailed {
        /// Size of the rejected allocation.
        bytes: usize,
    },

    /// The image is too large for the 16-bit TGA dimension fields.
    #[error("{width}x{height} does not fit in a TGA header (max 65535x65535)")]
    DimensionsTooLarge {
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
    },

    /// Writing to the sink failed.
    #[error("TGA write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl TgaError {
    /// Numeric code of this error, compatible with the classic `tga_read`
    /// result codes (success is 1, these start at 2).
    ///
    /// Encoder-only errors have no classic counterpart and report `0`.
    pub fn code(&self) -> u8 {
        match self {
            TgaError::MalformedHeader { .. } => 2,
            TgaError::InvalidDimensions { .. } => 3,
            TgaError::Compressed => 4,
            TgaError::ColorMapped => 5,
            TgaError::Eof => 6,
            TgaError::UnsupportedBitdepth(_) => 7,
            TgaError::AllocationFailed { .. } => 8,
            TgaError::TooFar => 9,
            TgaError::DimensionsTooLarge { .. } | TgaError::Io(_) => 0,
        }
    }
}

impl From<ImageError> for TgaError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::AllocationFailed { bytes } => TgaError::AllocationFailed { bytes },
            // The decoder validates dimensions before allocating, so these
            // only surface for impossible sizes.
            ImageError::InvalidDimensions { .. } | ImageError::BufferLength { .. } => {
                TgaError::TooFar
            }
        }
    }
}

/// Errors that can occur while building a kernel or running a blur.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlurError {
    /// The radius is outside `1.0001..=126.9999`.
    #[error("kernel radius {0} out of range (must be 1.0001..=126.9999)")]
    InvalidRadius(f32),

    /// Every kernel weight evaluated to zero, so it cannot be normalized.
    #[error("kernel radius {0} produces an all-zero kernel")]
    DegenerateKernel(f32),

    /// The worker pool needs at least one thread.
    #[error("thread count must be at least 1")]
    InvalidThreadCount,

    /// The output image could not be created.
    #[error(transparent)]
    Image(#[from] ImageError),
}
