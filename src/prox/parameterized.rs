//! Scaled proximal terms for split blocks
//!
//! A split block penalizes its variable with
//! ```math
//! h(x) = \alpha f(\beta x) + c\,x + \gamma \|x\|_2^2 + d
//! ```
//! for one of a closed set of base functions $`f`$. Its proximal map with
//! quadratic weight $`\rho`$ reduces to the base prox by a change of
//! variables:
//! ```math
//! \hat\rho = \frac{\rho + 2\gamma}{\alpha\beta^2}, \qquad
//! \hat v = \frac{(\rho v - c)\beta}{\rho + 2\gamma}, \qquad
//! x = \frac{1}{\beta}\,\mathrm{prox}_{f/\hat\rho}(\hat v)
//! ```

use ndarray::prelude::*;
use ndarray::NdFloat;

use super::{prox_iso_l1, prox_l1, prox_subsample_sumsq};
use crate::error::{Error, Result};

/// Scale parameters of a proximal term
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProxScale<A> {
    pub alpha: A,
    pub beta: A,
    pub gamma: A,
    pub c: A,
    /// constant offset, does not move the minimizer
    pub d: A,
}

impl<A: NdFloat> Default for ProxScale<A> {
    fn default() -> Self {
        ProxScale {
            alpha: A::one(),
            beta: A::one(),
            gamma: A::zero(),
            c: A::zero(),
            d: A::zero(),
        }
    }
}

impl<A: NdFloat> ProxScale<A> {
    fn is_identity(&self) -> bool {
        self.alpha == A::one() && self.beta == A::one() && self.gamma == A::zero() && self.c == A::zero()
    }
}

/// Base functions that only need a threshold
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThresholdKind {
    /// [`prox_iso_l1`]: isotropic total variation on a gradient field
    IsoL1,
    /// [`prox_l1`]: anisotropic L1
    L1,
}

/// Base functions that compare against an observed signal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    /// [`prox_subsample_sumsq`] with the given subsample factor
    SubsampleSumsq { factor: usize },
}

/// Proximal term attached to one split block, fixed at configuration time
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParameterizedProx<A> {
    Threshold { kind: ThresholdKind, scale: ProxScale<A> },
    Reference { kind: ReferenceKind, scale: ProxScale<A> },
}

impl<A: NdFloat> ParameterizedProx<A> {
    pub fn threshold(kind: ThresholdKind) -> Self {
        ParameterizedProx::Threshold {
            kind,
            scale: ProxScale::default(),
        }
    }

    pub fn reference(kind: ReferenceKind) -> Self {
        ParameterizedProx::Reference {
            kind,
            scale: ProxScale::default(),
        }
    }

    pub fn with_scale(self, scale: ProxScale<A>) -> Self {
        match self {
            ParameterizedProx::Threshold { kind, .. } => ParameterizedProx::Threshold { kind, scale },
            ParameterizedProx::Reference { kind, .. } => ParameterizedProx::Reference { kind, scale },
        }
    }

    pub fn scale(&self) -> &ProxScale<A> {
        match self {
            ParameterizedProx::Threshold { scale, .. } | ParameterizedProx::Reference { scale, .. } => scale,
        }
    }

    /// Whether `apply` needs the observed signal
    pub fn needs_reference(&self) -> bool {
        matches!(self, ParameterizedProx::Reference { .. })
    }

    /// Dimensionality of the operand
    pub fn ndim(&self) -> usize {
        3
    }

    /// Evaluate $`\mathrm{arg}\!\min_x h(x) + \frac{\rho}{2}\|x - v\|_2^2`$
    ///
    /// Threshold kinds receive $`\theta = 1/\hat\rho`$. Reference kinds are
    /// parameterized by the quadratic weight and receive $`\hat\rho`$ itself.
    /// `reference` is required by [`ParameterizedProx::Reference`] and ignored otherwise.
    pub fn apply(&self, v: ArrayView3<A>, rho: A, reference: Option<ArrayView3<A>>) -> Result<Array3<A>> {
        let scale = self.scale();
        let two = A::from(2.).unwrap();
        let (rho_hat, v_hat) = if scale.is_identity() {
            (rho, v.to_owned())
        } else {
            let denom = rho + two * scale.gamma;
            let rho_hat = denom / (scale.alpha * scale.beta * scale.beta);
            let v_hat = v.mapv(|x| (rho * x - scale.c) * scale.beta / denom);
            (rho_hat, v_hat)
        };

        let x_hat = match self {
            ParameterizedProx::Threshold { kind, .. } => {
                let theta = A::one() / rho_hat;
                match kind {
                    ThresholdKind::IsoL1 => prox_iso_l1(&v_hat, theta),
                    ThresholdKind::L1 => prox_l1(&v_hat, theta),
                }
            }
            ParameterizedProx::Reference { kind, .. } => {
                let reference = reference.ok_or_else(|| {
                    Error::InvalidConfig("proximal term requires a reference signal".into())
                })?;
                match *kind {
                    ReferenceKind::SubsampleSumsq { factor } => {
                        prox_subsample_sumsq(&v_hat, rho_hat, &reference, factor)?
                    }
                }
            }
        };

        if scale.beta == A::one() {
            Ok(x_hat)
        } else {
            Ok(x_hat / scale.beta)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn unscaled_threshold_uses_inverse_rho() {
        let v = array![[[3.0f64, 4.0]]];
        let prox = ParameterizedProx::threshold(ThresholdKind::IsoL1);
        // rho = 1/2 -> threshold 2, |v| = 5 shrinks to 3
        let z = prox.apply(v.view(), 0.5, None).unwrap();
        assert_abs_diff_eq!(z, array![[[1.8, 2.4]]], epsilon = 1e-12);
        assert!(!prox.needs_reference());
        assert_eq!(prox.ndim(), 3);
    }

    #[test]
    fn scaled_l1_matches_direct_minimizer() {
        // h(x) = 2 |x| + x^2 with rho = 1:
        // argmin 2|x| + x^2 + (x - v)^2 / 2  =>  x = soft(v, 2) / 3
        let scale = ProxScale {
            alpha: 2.0,
            gamma: 1.0,
            ..ProxScale::default()
        };
        let prox = ParameterizedProx::threshold(ThresholdKind::L1).with_scale(scale);
        let v = array![[[5.0f64, -1.0, -8.0]]];
        let z = prox.apply(v.view(), 1.0, None).unwrap();
        assert_abs_diff_eq!(z, array![[[1.0, 0.0, -2.0]]], epsilon = 1e-12);
    }

    #[test]
    fn beta_rescales_argument() {
        // h(x) = |2x| with rho = 1: x = soft(v, 2)
        let scale = ProxScale {
            beta: 2.0,
            ..ProxScale::default()
        };
        let prox = ParameterizedProx::threshold(ThresholdKind::L1).with_scale(scale);
        let z = prox.apply(array![[[3.0f64, 1.5]]].view(), 1.0, None).unwrap();
        assert_abs_diff_eq!(z, array![[[1.0, 0.0]]], epsilon = 1e-12);
    }

    #[test]
    fn reference_term_requires_reference() {
        let prox = ParameterizedProx::<f32>::reference(ReferenceKind::SubsampleSumsq { factor: 1 });
        assert!(prox.needs_reference());
        let v = Array3::<f32>::ones((2, 2, 1));
        let err = prox.apply(v.view(), 1.0, None).unwrap_err();
        assert!(err.is_configuration());

        let b = Array3::<f32>::zeros((2, 2, 1));
        let z = prox.apply(v.view(), 1.0, Some(b.view())).unwrap();
        // theta = 1: alpha = sqrt(2), beta = 1.5
        let expected = (1.0 / 2f32.sqrt()) / 1.5;
        assert_abs_diff_eq!(z, Array3::from_elem((2, 2, 1), expected), epsilon = 1e-6);
    }

    #[test]
    fn reference_term_takes_rho_as_threshold() {
        let prox = ParameterizedProx::<f64>::reference(ReferenceKind::SubsampleSumsq { factor: 2 });
        let v = Array3::<f64>::ones((2, 2, 1));
        let b = Array3::<f64>::zeros((1, 1, 1));
        let z = prox.apply(v.view(), 0.5, Some(b.view())).unwrap();
        let direct = prox_subsample_sumsq(&v, 0.5, &b, 2).unwrap();
        assert_abs_diff_eq!(z, direct, epsilon = 1e-12);
        // theta = 0.5: on the grid 0.5 / 1.25, elsewhere 0.25
        assert_abs_diff_eq!(z, array![[[0.4], [0.25]], [[0.25], [0.25]]], epsilon = 1e-12);
    }
}
