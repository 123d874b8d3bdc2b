//! Primal/dual residuals and their stopping tolerances

use ndarray::prelude::*;
use ndarray::{Data, Dimension, Zip};

use super::{ConvergenceMetrics, Transform, PSI_SIZE};

// accumulate in f64, the blocks hold millions of f32 values
fn sum_sq<S, D>(a: &ArrayBase<S, D>) -> f64
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    a.fold(0f64, |acc, &x| acc + f64::from(x) * f64::from(x))
}

fn diff_sum_sq<S, T, D>(a: &ArrayBase<S, D>, b: &ArrayBase<T, D>) -> f64
where
    S: Data<Elem = f32>,
    T: Data<Elem = f32>,
    D: Dimension,
{
    Zip::from(a).and(b).fold(0f64, |acc, &x, &y| {
        let d = f64::from(x) - f64::from(y);
        acc + d * d
    })
}

fn blocks_norm(blocks: &[Array3<f32>; PSI_SIZE]) -> f64 {
    blocks.iter().map(sum_sq).sum::<f64>().sqrt()
}

/// Standard ADMM stopping statistics over both split blocks
///
/// ```math
/// \begin{aligned}
/// r &= \|K v - z\|_2 &
/// \epsilon_{pri} &= \sqrt{N_{pri}}\,\epsilon_{abs} + \epsilon_{rel} \max(\|K v\|_2, \|z\|_2) \\
/// s &= \|\lambda K^T (z - z_{prev})\|_2 &
/// \epsilon_{dual} &= \sqrt{N_{dual}}\,\epsilon_{abs} + \epsilon_{rel} \|\lambda K^T u\|_2
/// \end{aligned}
/// ```
/// Each block is summed over its own shape. $`N_{pri}`$ counts every
/// element of the split blocks, $`N_{dual}`$ every element of `v`: these are
/// the dimensions of the spaces $`r`$ and $`s`$ live in, since block 1 sits on
/// the high-resolution grid rather than the observed one.
///
/// Parameters
/// ----------
/// - __kv:__      $`K v`$ for the newest primal estimate
/// - __z, u:__    newest split and dual variables
/// - __z_prev:__  split variables one step earlier
#[allow(clippy::too_many_arguments)]
pub fn compute_convergence(
    kv: &[Array3<f32>; PSI_SIZE],
    z: &[Array3<f32>; PSI_SIZE],
    u: &[Array3<f32>; PSI_SIZE],
    z_prev: &[Array3<f32>; PSI_SIZE],
    k: &Transform<f32>,
    lmb: f32,
    abstol: f32,
    reltol: f32,
) -> ConvergenceMetrics {
    let lmb = f64::from(lmb);
    let (abstol, reltol) = (f64::from(abstol), f64::from(reltol));

    let r = kv
        .iter()
        .zip(z.iter())
        .map(|(a, b)| diff_sum_sq(a, b))
        .sum::<f64>()
        .sqrt();

    let dz: [Array3<f32>; PSI_SIZE] = [&z[0] - &z_prev[0], &z[1] - &z_prev[1]];
    let s = lmb * sum_sq(&k.adjoint(&dz)).sqrt();

    let n_pri: usize = z.iter().map(|b| b.len()).sum();
    let [h, w] = k.output_shape();
    let n_dual = h * w;

    let eps_pri = (n_pri as f64).sqrt() * abstol + reltol * blocks_norm(kv).max(blocks_norm(z));
    let eps_dual = (n_dual as f64).sqrt() * abstol + reltol * lmb * sum_sq(&k.adjoint(u)).sqrt();

    ConvergenceMetrics {
        r: r as f32,
        s: s as f32,
        eps_pri: eps_pri as f32,
        eps_dual: eps_dual as f32,
    }
}
