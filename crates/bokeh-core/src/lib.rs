//! # bokeh-core
//!
//! A bounded TGA codec and a tile-parallel bokeh blur in pure Rust.
//!
//! Images are decoded from uncompressed 24/32-bit TGA into an
//! [`ImageBuffer`], blurred with a smoothed-disk [`Kernel`] by a fixed pool of
//! worker threads pulling 64x64 tiles from a shared queue, and encoded back.
//!
//! ## Quick Start
//!
//! ```
//! use bokeh_core::tga::{self, DecodeLimits};
//! use bokeh_core::{Bitdepth, BlurConfig, ImageBuffer};
//!
//! let image = ImageBuffer::new(96, 80, Bitdepth::Bgr24).unwrap();
//! let bytes = tga::encode_to_vec(&image).unwrap();
//!
//! let decoded = tga::decode(&bytes[..], DecodeLimits::UNLIMITED).unwrap();
//! let blurred = BlurConfig::new(3.5).run(&decoded).unwrap();
//! assert_eq!((blurred.width(), blurred.height()), (96, 80));
//! ```

pub mod error;
pub mod image;
pub mod kernel;
pub mod tga;
pub mod tile;

mod convolve;

// Re-export primary types at crate root.
pub use convolve::{blur, BlurConfig, DEFAULT_THREADS};
pub use error::{BlurError, ImageError, TgaError};
pub use image::{Bitdepth, ImageBuffer};
pub use kernel::Kernel;
pub use tga::DecodeLimits;
