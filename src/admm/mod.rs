//! Linearized ADMM for Multi-Frame Super-Resolution
//!
//! Solves
//! ```math
//! \min_v \sum_{i} g_i(K_i v)
//! ```
//! with $`K_0 = \nabla`$ (total-variation prior) and $`K_1`$ the image
//! formation model (blur then sub-pixel warp, data fidelity against the
//! observed frames). Each step linearizes the primal update:
//! ```math
//! \begin{aligned}
//! v^{+} &= v - \tfrac{\mu}{\lambda} \textstyle\sum_i K_i^T (K_i v - z_i + u_i) \\
//! z_i^{+} &= \mathrm{prox}_{\lambda g_i}(K_i v^{+} + u_i) \\
//! u_i^{+} &= u_i + K_i v^{+} - z_i^{+}
//! \end{aligned}
//! ```
//! which converges for $`0 < \mu \le \lambda / \|K\|_2^2`$.
//!
//! The step itself runs behind a [`Backend`]; the outer loop in
//! [`ladmm_solve`] only checks convergence between batches of steps.

use ndarray::prelude::*;

use crate::config::ProblemConfig;
use crate::error::{Error, Result};
use crate::prox::{ParameterizedProx, ProxScale, ReferenceKind, ThresholdKind};

mod transform;
pub use transform::*;

mod step;
pub use step::*;

mod convergence;
pub use convergence::*;

mod solver;
pub use solver::*;

/// Number of split blocks $`(z_i, u_i)`$
pub const PSI_SIZE: usize = 2;

/// ADMM iterate: primal estimate plus one split/dual pair per block
#[derive(Clone, Debug, PartialEq)]
pub struct SolverState {
    pub v: Array2<f32>,
    pub z: [Array3<f32>; PSI_SIZE],
    pub u: [Array3<f32>; PSI_SIZE],
}

impl SolverState {
    /// Zero state sized for `cfg`
    pub fn zeros(cfg: &ProblemConfig) -> Self {
        let [h, w] = cfg.output_shape();
        let [s0, s1] = cfg.split_shapes();
        let block = |s: [usize; 3]| Array3::zeros((s[0], s[1], s[2]));
        SolverState {
            v: Array2::zeros((h, w)),
            z: [block(s0), block(s1)],
            u: [block(s0), block(s1)],
        }
    }

    /// Fails with a shape mismatch naming the first offending buffer
    pub fn check_shapes(&self, output: [usize; 2], splits: [[usize; 3]; PSI_SIZE]) -> Result<()> {
        const Z_NAMES: [&str; PSI_SIZE] = ["z0", "z1"];
        const U_NAMES: [&str; PSI_SIZE] = ["u0", "u1"];

        Error::check_shape("v", &output, self.v.shape())?;
        for i in 0..PSI_SIZE {
            Error::check_shape(Z_NAMES[i], &splits[i], self.z[i].shape())?;
            Error::check_shape(U_NAMES[i], &splits[i], self.u[i].shape())?;
        }
        Ok(())
    }
}

/// Stopping statistics of one outer iteration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvergenceMetrics {
    /// Primal residual
    pub r: f32,
    /// Dual residual
    pub s: f32,
    pub eps_pri: f32,
    pub eps_dual: f32,
}

impl ConvergenceMetrics {
    pub fn converged(&self) -> bool {
        self.r < self.eps_pri && self.s < self.eps_dual
    }
}

/// Proximal terms of the two split blocks
///
/// Block 0 is the total-variation prior on the gradient, split into an L1
/// part weighted `alpha * beta` and a quadratic part weighted
/// `alpha * (1 - beta)`. Block 1 is data fidelity against the observed
/// stack, subsampled by the upsampling factor.
pub fn psi_functions(cfg: &ProblemConfig) -> [ParameterizedProx<f32>; PSI_SIZE] {
    let prior = ParameterizedProx::threshold(ThresholdKind::IsoL1).with_scale(ProxScale {
        alpha: cfg.alpha * cfg.beta,
        gamma: cfg.alpha * (1.0 - cfg.beta),
        ..ProxScale::default()
    });
    let fidelity = ParameterizedProx::reference(ReferenceKind::SubsampleSumsq {
        factor: cfg.upsample,
    });
    [prior, fidelity]
}
