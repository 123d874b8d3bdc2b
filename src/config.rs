//! Problem and solver constants
//!
//! Both structs are plain data fixed before a solve begins. They can be
//! built in code or deserialized, and must pass `validate` before use.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Dimensions and regularization weights of a super-resolution problem.
///
/// The observed stack is `input_height × input_width × frames`; the
/// reconstruction is `upsample` times larger in each spatial axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemConfig {
    pub input_width: usize,
    pub input_height: usize,
    /// Number of low-resolution frames, `n_steps²` for a square grid of
    /// illumination positions
    pub frames: usize,
    pub upsample: usize,
    pub blur_size: usize,
    /// Total-variation weight
    pub alpha: f32,
    /// Split between the L1 (`beta`) and quadratic (`1 - beta`) parts of the prior
    pub beta: f32,
}

impl Default for ProblemConfig {
    fn default() -> Self {
        ProblemConfig {
            input_width: 128,
            input_height: 128,
            frames: 8 * 8,
            upsample: 8,
            blur_size: 7,
            alpha: 0.7e-4,
            beta: 0.7,
        }
    }
}

impl ProblemConfig {
    pub fn output_width(&self) -> usize {
        self.input_width * self.upsample
    }

    pub fn output_height(&self) -> usize {
        self.input_height * self.upsample
    }

    /// Side of the square grid of frame positions
    pub fn n_steps(&self) -> usize {
        (self.frames as f64).sqrt().round() as usize
    }

    /// Shape of the observed low-resolution stack
    pub fn input_shape(&self) -> [usize; 3] {
        [self.input_height, self.input_width, self.frames]
    }

    /// Shape of the reconstructed image `v`
    pub fn output_shape(&self) -> [usize; 2] {
        [self.output_height(), self.output_width()]
    }

    /// Shapes of the split variables `z_i`/`u_i`, in block order
    pub fn split_shapes(&self) -> [[usize; 3]; 2] {
        let (h, w) = (self.output_height(), self.output_width());
        [[h, w, 2], [h, w, self.frames]]
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(Error::InvalidConfig(format!(
                "input size must be nonzero, got {}x{}",
                self.input_width, self.input_height
            )));
        }
        if self.upsample == 0 {
            return Err(Error::InvalidConfig("upsample factor must be at least 1".into()));
        }
        if self.blur_size == 0 {
            return Err(Error::InvalidConfig("blur size must be at least 1".into()));
        }
        let n = self.n_steps();
        if self.frames == 0 || n * n != self.frames {
            return Err(Error::InvalidConfig(format!(
                "frame count {} is not the square of a grid size",
                self.frames
            )));
        }
        if !(self.alpha >= 0.0) || !(0.0..=1.0).contains(&self.beta) {
            return Err(Error::InvalidConfig(format!(
                "weights out of range: alpha = {}, beta = {}",
                self.alpha, self.beta
            )));
        }
        Ok(())
    }
}

/// Knobs of the outer loop and of each ADMM step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Maximum number of outer iterations (backend calls)
    pub iter_max: usize,
    /// Inner ADMM steps per backend call before metrics are computed
    pub batch_size: usize,
    /// Penalty scaling; the split proxes are taken with weight `1/lmb`
    pub lmb: f32,
    /// Primal step; convergence needs `mu <= lmb / ||K||²`
    pub mu: f32,
    pub abstol: f32,
    pub reltol: f32,
    /// Lateral shift between neighbouring frames, as a fraction of a sensor pixel
    pub shift_step: f32,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            iter_max: 100,
            batch_size: 1,
            lmb: 1.0,
            mu: 1.0,
            abstol: 1e-3,
            reltol: 1e-3,
            shift_step: 0.125,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> Result<()> {
        if self.iter_max == 0 || self.batch_size == 0 {
            return Err(Error::InvalidConfig(format!(
                "iteration counts must be nonzero: iter_max = {}, batch_size = {}",
                self.iter_max, self.batch_size
            )));
        }
        if !(self.lmb > 0.0) || !(self.mu > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "step parameters must be positive: lmb = {}, mu = {}",
                self.lmb, self.mu
            )));
        }
        if !(self.abstol >= 0.0) || !(self.reltol >= 0.0) {
            return Err(Error::InvalidConfig("tolerances must be non-negative".into()));
        }
        Ok(())
    }
}
