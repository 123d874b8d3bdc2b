//! The stacked operator $`K = [K_0; K_1]`$ linking `v` to the split blocks

use ndarray::prelude::*;
use ndarray::{Data, NdFloat};

use super::PSI_SIZE;
use crate::config::ProblemConfig;
use crate::error::{Error, Result};
use crate::formation::{subpixel_shift, BoxBlur, Gradient, Warp};
use crate::linop::{power_iteration, Adjoint, LinearOperator};

/// Forward model of the super-resolution problem
///
/// - $`K_0 v = \nabla v`$, an `h × w × 2` gradient field
/// - $`K_1 v = A(B v / b^2)`$, the averaged image warped once per frame,
///   an `h × w × M` stack on the high-resolution grid
///
/// `adjoint` is the exact transpose of `forward`, summed over blocks.
#[derive(Clone, Debug)]
pub struct Transform<A> {
    gradient: Gradient<A>,
    blur: BoxBlur<A>,
    warp: Warp<A>,
    dim: (usize, usize),
}

impl<A: NdFloat> Transform<A> {
    /// `shift` must have shape `(2, frames)` in high-resolution pixels.
    pub fn new(cfg: &ProblemConfig, shift: Array2<A>) -> Result<Self> {
        cfg.validate()?;
        Error::check_shape("shift", &[2, cfg.frames], shift.shape())?;
        let dim = (cfg.output_height(), cfg.output_width());
        Ok(Transform {
            gradient: Gradient::new(),
            blur: BoxBlur::new(cfg.blur_size, true),
            warp: Warp::new(shift, dim, 1),
            dim,
        })
    }

    /// Transform with the square-grid shift layout of [`subpixel_shift`]
    pub fn from_config(cfg: &ProblemConfig, shift_step: A) -> Result<Self> {
        cfg.validate()?;
        let shift = subpixel_shift(cfg.n_steps(), cfg.upsample, shift_step);
        Transform::new(cfg, shift)
    }

    pub fn shift(&self) -> ArrayView2<'_, A> {
        self.warp.shift()
    }

    /// Shape of `v`
    pub fn output_shape(&self) -> [usize; 2] {
        [self.dim.0, self.dim.1]
    }

    /// Shapes of the blocks produced by `forward`
    pub fn split_shapes(&self) -> [[usize; 3]; PSI_SIZE] {
        let (h, w) = self.dim;
        [[h, w, 2], [h, w, self.warp.frames()]]
    }

    fn blur_norm(&self) -> A {
        let b = A::from(self.blur.window).unwrap();
        b * b
    }

    pub fn forward<S>(&self, v: &ArrayBase<S, Ix2>) -> [Array3<A>; PSI_SIZE]
    where
        S: Data<Elem = A>,
    {
        let gradient = self.gradient.apply(v);
        let blurred = self.blur.apply(v) / self.blur_norm();
        let shifted = self.warp.apply(&blurred);
        [gradient, shifted]
    }

    pub fn adjoint(&self, z: &[Array3<A>; PSI_SIZE]) -> Array2<A> {
        let gradient = self.gradient.adj().apply(&z[0]);
        let shifted = self.warp.adj().apply(&z[1]);
        let blurred = self.blur.adj().apply(&shifted) / self.blur_norm();
        gradient + blurred
    }

    /// Estimate of $`\|K\|_2^2`$ by power iteration on $`K^T K`$
    ///
    /// Pick the primal step as `mu <= lmb / estimate`.
    pub fn norm_squared_estimate(&self, maxiter: usize) -> A {
        let (h, w) = self.dim;
        // alternating start, the top singular vectors of the gradient are oscillatory
        let x0 = Array2::from_shape_fn((h, w), |(y, x)| {
            if (x + y) % 2 == 0 {
                A::one()
            } else {
                -A::one() / A::from(2.).unwrap()
            }
        });
        power_iteration(|x| self.adjoint(&self.forward(&x)), x0, maxiter)
    }
}
