use ndarray::prelude::*;

use super::{compute_convergence, psi_functions, Backend, ConvergenceMetrics, SolverState, Transform, PSI_SIZE};
use crate::config::{ProblemConfig, SolverOptions};
use crate::error::{Error, Result};
use crate::prox::ParameterizedProx;

/// Linearized ADMM steps evaluated with the crate's own operators
///
/// Every step allocates a fresh [`SolverState`]; the state it reads from is
/// never written.
#[derive(Clone, Debug)]
pub struct NativeBackend {
    transform: Transform<f32>,
    psi: [ParameterizedProx<f32>; PSI_SIZE],
    input_shape: [usize; 3],
    lmb: f32,
    mu: f32,
    batch_size: usize,
    abstol: f32,
    reltol: f32,
}

impl NativeBackend {
    /// Backend for the square grid of frame shifts given by `opts.shift_step`
    pub fn new(cfg: &ProblemConfig, opts: &SolverOptions) -> Result<Self> {
        let transform = Transform::from_config(cfg, opts.shift_step)?;
        NativeBackend::with_transform(cfg, opts, transform)
    }

    /// Backend for an explicit `(2, frames)` shift table
    pub fn with_shift(cfg: &ProblemConfig, opts: &SolverOptions, shift: Array2<f32>) -> Result<Self> {
        let transform = Transform::new(cfg, shift)?;
        NativeBackend::with_transform(cfg, opts, transform)
    }

    fn with_transform(cfg: &ProblemConfig, opts: &SolverOptions, transform: Transform<f32>) -> Result<Self> {
        opts.validate()?;
        Ok(NativeBackend {
            transform,
            psi: psi_functions(cfg),
            input_shape: cfg.input_shape(),
            lmb: opts.lmb,
            mu: opts.mu,
            batch_size: opts.batch_size,
            abstol: opts.abstol,
            reltol: opts.reltol,
        })
    }

    pub fn transform(&self) -> &Transform<f32> {
        &self.transform
    }

    fn check(&self, state: &SolverState, observed: ArrayView3<f32>) -> Result<()> {
        state.check_shapes(self.transform.output_shape(), self.transform.split_shapes())?;
        Error::check_shape("observed", &self.input_shape, observed.shape())
    }

    /// One linearized ADMM step
    ///
    /// ```math
    /// \begin{aligned}
    /// v^{+} &= v - \tfrac{\mu}{\lambda} K^T (K v - z + u) \\
    /// z^{+} &= \mathrm{prox}_{\lambda \psi}(K v^{+} + u) \\
    /// u^{+} &= u + K v^{+} - z^{+}
    /// \end{aligned}
    /// ```
    /// Rejects mismatched buffers before touching any data.
    pub fn iterate(&self, state: &SolverState, observed: ArrayView3<f32>) -> Result<SolverState> {
        self.check(state, observed)?;
        self.step(state, observed).map(|(next, _)| next)
    }

    /// Returns the new state and $`K v^{+}`$, which the residuals reuse
    fn step(&self, state: &SolverState, observed: ArrayView3<f32>) -> Result<(SolverState, [Array3<f32>; PSI_SIZE])> {
        let k = &self.transform;

        let kv = k.forward(&state.v);
        let residual: [Array3<f32>; PSI_SIZE] = std::array::from_fn(|i| &kv[i] - &state.z[i] + &state.u[i]);
        let mut v = state.v.to_owned();
        v.scaled_add(-self.mu / self.lmb, &k.adjoint(&residual));

        let kv = k.forward(&v);
        let shifted: [Array3<f32>; PSI_SIZE] = std::array::from_fn(|i| &kv[i] + &state.u[i]);
        let rho = 1.0 / self.lmb;
        let prox = |i: usize| {
            let reference = if self.psi[i].needs_reference() {
                Some(observed)
            } else {
                None
            };
            self.psi[i].apply(shifted[i].view(), rho, reference)
        };
        let z = [prox(0)?, prox(1)?];
        let u = std::array::from_fn(|i| &shifted[i] - &z[i]);

        Ok((SolverState { v, z, u }, kv))
    }
}

impl Backend for NativeBackend {
    /// Runs `batch_size` steps, then measures the last one
    fn run(&self, state: &SolverState, observed: ArrayView3<f32>) -> Result<(SolverState, ConvergenceMetrics)> {
        self.check(state, observed)?;

        let (mut current, mut kv) = self.step(state, observed)?;
        let mut previous = None;
        for _ in 1..self.batch_size {
            let (next, kv_next) = self.step(&current, observed)?;
            previous = Some(std::mem::replace(&mut current, next));
            kv = kv_next;
        }

        let z_prev = match &previous {
            Some(p) => &p.z,
            None => &state.z,
        };
        let metrics = compute_convergence(
            &kv,
            &current.z,
            &current.u,
            z_prev,
            &self.transform,
            self.lmb,
            self.abstol,
            self.reltol,
        );
        Ok((current, metrics))
    }
}
