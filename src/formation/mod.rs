//! Image Formation for Multi-Frame Pixel Super-Resolution
//!
//! A high-resolution scene $`v`$ is observed as a stack of low-resolution
//! frames, each displaced by a sub-pixel shift and blurred by the sensor
//! aperture:
//! ```math
//! b_k = P\, W_k B v, \qquad k = 0, \dots, M-1
//! ```
//! where $`B`$ is a box blur, $`W_k`$ a bilinear warp by the $`k`$-th shift
//! and $`P`$ subsamples onto the sensor grid. Every operator here is linear
//! and comes with its exact adjoint.

use ndarray::prelude::*;
use ndarray::{Data, NdFloat};

mod blur;
pub use blur::*;

mod gradient;
pub use gradient::*;

mod warp;
pub use warp::*;

/// Linear interpolation kernel
///
/// ```math
/// k(d) = \max(0, 1 - |d|)
/// ```
#[inline]
pub fn kernel_linear<A: NdFloat>(d: A) -> A {
    let dd = d.abs();
    if dd < A::one() {
        A::one() - dd
    } else {
        A::zero()
    }
}

/// Table of per-frame sub-pixel shifts, shape `(2, n_steps²)`
///
/// Frame `k` sits at grid position `(k / n_steps, k % n_steps)`; row 0
/// holds the x shift and row 1 the y shift, both negated and scaled by
/// `step_size * upsample` so they are expressed in high-resolution pixels.
///
/// Parameters
/// ----------
/// - __n_steps:__    number of illumination positions along one axis
/// - __upsample:__   interpolation factor, decoupled from the step size
/// - __step_size:__  lateral shift as a fraction of the sensor pixel size
pub fn subpixel_shift<A: NdFloat>(n_steps: usize, upsample: usize, step_size: A) -> Array2<A> {
    let scale = step_size * A::from(upsample).unwrap();
    let frames = n_steps * n_steps;
    Array2::from_shape_fn((2, frames), |(axis, k)| {
        let grid = if axis == 0 { k / n_steps } else { k % n_steps };
        -A::from(grid).unwrap() * scale
    })
}

/// Copy of a 2D signal surrounded by `border` pixels of zeros
pub fn constant_exterior<A, S>(input: &ArrayBase<S, Ix2>, border: usize) -> Array2<A>
where
    A: NdFloat,
    S: Data<Elem = A>,
{
    let (h, w) = input.dim();
    let mut padded = Array2::zeros((h + 2 * border, w + 2 * border));
    padded
        .slice_mut(s![border..border + h, border..border + w])
        .assign(input);
    padded
}

/// Copy of a 3D stack with each frame surrounded by `border` pixels of zeros
pub fn constant_exterior3<A, S>(input: &ArrayBase<S, Ix3>, border: usize) -> Array3<A>
where
    A: NdFloat,
    S: Data<Elem = A>,
{
    let (h, w, c) = input.dim();
    let mut padded = Array3::zeros((h + 2 * border, w + 2 * border, c));
    padded
        .slice_mut(s![border..border + h, border..border + w, ..])
        .assign(input);
    padded
}
