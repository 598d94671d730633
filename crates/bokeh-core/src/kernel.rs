//! Bokeh convolution kernel.
//!
//! The kernel is built by evaluating the distance from each cell to a circle
//! of radius one. Cell coordinates are mapped onto `[-1.5, 1.5]`, which pads
//! the circle enough that the falloff is smooth and its edges are not
//! truncated.

use crate::error::BlurError;

/// Smallest accepted radius.
pub const MIN_RADIUS: f32 = 1.0001;
/// Largest accepted radius.
pub const MAX_RADIUS: f32 = 126.9999;

/// Half the extent of the evaluated square.
const EXTENT: f32 = 1.5;

/// A square, normalized, non-negative convolution kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    width: usize,
    center: usize,
    weights: Vec<f32>,
}

impl Kernel {
    /// Build the kernel for a blur `radius` in pixels.
    ///
    /// The width is `trunc(radius) * 2`: the radius is truncated before it is
    /// doubled, so `2.9` yields the same kernel as `2.0`.
    ///
    /// # Errors
    ///
    /// Returns [`BlurError::InvalidRadius`] outside
    /// [`MIN_RADIUS`]`..=`[`MAX_RADIUS`] (or for NaN), and
    /// [`BlurError::DegenerateKernel`] when every weight is zero, which is the
    /// case for radii below 2.
    ///
    /// # Examples
    ///
    /// ```
    /// use bokeh_core::Kernel;
    /// let k = Kernel::new(2.0).unwrap();
    /// assert_eq!(k.width(), 4);
    /// assert_eq!(k.center(), 2);
    /// let total: f32 = k.weights().iter().sum();
    /// assert!((total - 1.0).abs() < 1e-4);
    /// ```
    pub fn new(radius: f32) -> Result<Self, BlurError> {
        if !(MIN_RADIUS..=MAX_RADIUS).contains(&radius) {
            return Err(BlurError::InvalidRadius(radius));
        }

        let width = radius.trunc() as usize * 2;
        let step = 2.0 * EXTENT / (width as f32 - 1.0);

        let mut weights = Vec::with_capacity(width * width);
        let mut total = 0.0f32;
        for y in 0..width {
            let ey = step * y as f32 - EXTENT;
            for x in 0..width {
                let ex = step * x as f32 - EXTENT;
                // Negative values would turn this into a difference kernel.
                let v = (1.0 - (ex * ex + ey * ey - 1.0).abs()).max(0.0);
                weights.push(v);
                total += v;
            }
        }

        if total <= 0.0 {
            return Err(BlurError::DegenerateKernel(radius));
        }
        for w in &mut weights {
            *w /= total;
        }

        Ok(Kernel {
            width,
            center: (width / 2).max(1),
            weights,
        })
    }

    /// Side length of the kernel.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Offset from the kernel's top-left cell to the sampled pixel.
    pub fn center(&self) -> usize {
        self.center
    }

    /// Row-major weights, `width * width` of them.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Weight of cell `(x, y)`, or `None` outside the kernel.
    pub fn weight(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.width {
            return None;
        }
        Some(self.weights[y * self.width + x])
    }
}
