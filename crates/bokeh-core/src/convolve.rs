//! Tile-parallel bokeh blur.
//!
//! Every output pixel is the kernel-weighted sum of its footprint in the
//! input. Samples outside the image wrap around to the opposite edge, so
//! content bleeds across borders but no sample is ever out of bounds.

use tracing::info;

use crate::error::BlurError;
use crate::image::ImageBuffer;
use crate::kernel::Kernel;
use crate::tile::{partition_mut, run_workers, TaskQueue, TileMut};

/// Number of worker threads used unless configured otherwise.
pub const DEFAULT_THREADS: usize = 4;

/// Accumulated channel values above this saturate to 255.
const SATURATION: f32 = 254.5;

/// Parameters for one blur run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurConfig {
    /// Kernel radius in pixels.
    pub radius: f32,
    /// Size of the worker pool.
    pub threads: usize,
}

impl BlurConfig {
    /// A config for `radius` with [`DEFAULT_THREADS`] workers.
    pub fn new(radius: f32) -> Self {
        BlurConfig {
            radius,
            threads: DEFAULT_THREADS,
        }
    }

    /// Replace the worker count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Build the kernel and blur `input` with it.
    ///
    /// The kernel is validated before any thread is spawned.
    ///
    /// # Errors
    ///
    /// See [`Kernel::new`] and [`blur`].
    pub fn run(&self, input: &ImageBuffer) -> Result<ImageBuffer, BlurError> {
        let kernel = Kernel::new(self.radius)?;
        blur(input, &kernel, self.threads)
    }
}

/// Blur `input` with `kernel` on a pool of `threads` workers.
///
/// The output has the same dimensions and bitdepth as the input. For 32-bit
/// images the alpha channel is copied through unblurred. The result does not
/// depend on `threads`.
///
/// # Errors
///
/// Returns [`BlurError::InvalidThreadCount`] when `threads` is zero and
/// [`BlurError::Image`] if the output cannot be allocated.
///
/// # Examples
///
/// ```
/// use bokeh_core::{blur, Bitdepth, ImageBuffer, Kernel};
/// let input = ImageBuffer::from_raw(2, 2, Bitdepth::Bgr24, vec![90; 12]).unwrap();
/// let kernel = Kernel::new(2.0).unwrap();
/// let output = blur(&input, &kernel, 2).unwrap();
/// assert_eq!(output.as_bytes(), input.as_bytes());
/// ```
pub fn blur(input: &ImageBuffer, kernel: &Kernel, threads: usize) -> Result<ImageBuffer, BlurError> {
    if threads == 0 {
        return Err(BlurError::InvalidThreadCount);
    }

    let mut output = ImageBuffer::new(input.width(), input.height(), input.bitdepth())?;
    {
        let queue = TaskQueue::new(partition_mut(&mut output));
        info!(
            width = input.width(),
            height = input.height(),
            kernel_width = kernel.width(),
            tasks = queue.len(),
            threads,
            "blurring"
        );
        run_workers(&queue, threads, |tile| convolve_tile(input, kernel, tile));
    }
    Ok(output)
}

/// Convolve the region of `tile` from `input` into the tile's rows.
///
/// `tile` must come from [`partition_mut`] over a buffer with the same
/// dimensions and bitdepth as `input`.
pub(crate) fn convolve_tile(input: &ImageBuffer, kernel: &Kernel, mut tile: TileMut<'_>) {
    let task = tile.task;
    let bpp = input.pixel_stride();
    assert!(
        task.x + task.width <= input.width()
            && task.y + task.height <= input.height()
            && tile.rows.len() == task.height as usize
            && tile.rows.iter().all(|row| row.len() == task.width as usize * bpp),
        "tile {task:?} does not match the {}x{} {:?} input",
        input.width(),
        input.height(),
        input.bitdepth()
    );
    let kw = kernel.width();
    let center = kernel.center() as i64;

    // Wrapped byte offsets of every column and row the tile's footprint can
    // touch, indexed from the footprint's top-left corner.
    let width = input.width() as i64;
    let height = input.height() as i64;
    let row_stride = input.row_stride();
    let cols: Vec<usize> = (0..(task.width as usize + kw) as i64)
        .map(|i| (task.x as i64 - center + i).rem_euclid(width) as usize * bpp)
        .collect();
    let rows: Vec<usize> = (0..(task.height as usize + kw) as i64)
        .map(|j| (task.y as i64 - center + j).rem_euclid(height) as usize * row_stride)
        .collect();

    let src = input.as_bytes();
    let weights = kernel.weights();
    let c = center as usize;

    for (y, out_row) in tile.rows.iter_mut().enumerate() {
        for x in 0..task.width as usize {
            let mut r = 0.0f32;
            let mut g = 0.0f32;
            let mut b = 0.0f32;

            for (j, weight_row) in weights.chunks_exact(kw).enumerate() {
                let row_offset = rows[y + j];
                for (i, &w) in weight_row.iter().enumerate() {
                    let p = row_offset + cols[x + i];
                    r += src[p] as f32 * w;
                    g += src[p + 1] as f32 * w;
                    b += src[p + 2] as f32 * w;
                }
            }

            let out = &mut out_row[x * bpp..(x + 1) * bpp];
            out[0] = narrow(r);
            out[1] = narrow(g);
            out[2] = narrow(b);
            if bpp == 4 {
                out[3] = src[rows[y + c] + cols[x + c] + 3];
            }
        }
    }
}

/// Saturate above [`SATURATION`], otherwise truncate toward zero.
fn narrow(value: f32) -> u8 {
    if value > SATURATION {
        255
    } else {
        value as u8
    }
}
