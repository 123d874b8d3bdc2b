//! Shrinkage operators for L1-type penalties

use ndarray::prelude::*;
use ndarray::{Data, Dimension, NdFloat};

/// Isotropic total-variation proximal map (joint soft-thresholding)
///
/// Solves
/// ```math
/// \mathrm{arg}\!\min_z \tfrac{1}{2\theta}\|z - u\|_2^2 + \sum_{p} \|z_p\|_2
/// ```
/// where $`z_p`$ collects the channels (last axis) of pixel $`p`$. Each
/// pixel vector is scaled by $`\max(0, 1 - \theta / \|u_p\|_2)`$, and set to
/// zero where $`\|u_p\|_2 = 0`$.
pub fn prox_iso_l1<A, S>(u: &ArrayBase<S, Ix3>, theta: A) -> Array3<A>
where
    A: NdFloat,
    S: Data<Elem = A>,
{
    let mut z = u.to_owned();
    for mut pixel in z.lanes_mut(Axis(2)) {
        let rho = pixel.fold(A::zero(), |acc, &g| acc + g * g).sqrt();
        let scale = if rho > A::zero() {
            (A::one() - theta / rho).max(A::zero())
        } else {
            A::zero()
        };
        pixel.mapv_inplace(|g| g * scale);
    }
    z
}

/// Elementwise soft-thresholding, the proximal map of $`\theta\|\cdot\|_1`$
///
/// ```math
/// z = \mathrm{sign}(u) \max(|u| - \theta, 0)
/// ```
pub fn prox_l1<A, S, D>(u: &ArrayBase<S, D>, theta: A) -> Array<A, D>
where
    A: NdFloat,
    S: Data<Elem = A>,
    D: Dimension,
{
    u.mapv(|x| {
        if x > theta {
            x - theta
        } else if x < -theta {
            x + theta
        } else {
            A::zero()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray_rand::rand::rngs::SmallRng;
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;

    #[test]
    fn zero_threshold_is_identity() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut u = Array::random_using((5, 4, 2), Uniform::new(-2f32, 2.), &mut rng);
        u.slice_mut(s![0, 0, ..]).fill(0.);
        assert_eq!(prox_iso_l1(&u, 0.), u);
        assert_eq!(prox_l1(&u, 0.), u);
    }

    #[test]
    fn shrinks_gradient_magnitude() {
        let u = array![[[3.0f64, 4.0], [0.3, 0.4], [0.0, 0.0]]];
        let z = prox_iso_l1(&u, 1.0);
        // |(3, 4)| = 5 shrinks to 4
        assert_abs_diff_eq!(z, array![[[2.4, 3.2], [0.0, 0.0], [0.0, 0.0]]], epsilon = 1e-12);
    }

    #[test]
    fn is_isotropic() {
        // same magnitude, different direction: same shrink factor
        let u = array![[[5.0f64, 0.0], [0.0, -5.0]]];
        let z = prox_iso_l1(&u, 2.0);
        assert_abs_diff_eq!(z, array![[[3.0, 0.0], [0.0, -3.0]]], epsilon = 1e-12);
    }

    #[test]
    fn soft_threshold() {
        let u = array![-3.0f64, -0.5, 0.0, 0.25, 2.0];
        assert_eq!(prox_l1(&u, 1.0), array![-2.0, 0.0, 0.0, 0.0, 1.0]);
    }
}
