//! Separable box blur

use ndarray::prelude::*;
use ndarray::{Data, NdFloat, Zip};

use crate::linop::{Adjoint, LinearOperator};

#[inline]
fn source_index(i: usize, j: usize, len: usize, clamp: bool) -> Option<usize> {
    let src = i + j;
    if src < len {
        Some(src)
    } else if clamp {
        Some(len - 1)
    } else {
        None
    }
}

/// One pass along `axis`: `out[i] = Σ_{j < window} input[i + j]`
fn sum_axis_window<A: NdFloat>(input: ArrayView2<A>, axis: Axis, window: usize, clamp: bool) -> Array2<A> {
    let mut out = Array2::zeros(input.raw_dim());
    Zip::from(out.lanes_mut(axis))
        .and(input.lanes(axis))
        .for_each(|mut dst, src| {
            let len = src.len();
            for (i, d) in dst.iter_mut().enumerate() {
                for j in 0..window {
                    if let Some(s) = source_index(i, j, len, clamp) {
                        *d += src[s];
                    }
                }
            }
        });
    out
}

/// Transpose of [`sum_axis_window`]
fn scatter_axis_window<A: NdFloat>(input: ArrayView2<A>, axis: Axis, window: usize, clamp: bool) -> Array2<A> {
    let mut out = Array2::zeros(input.raw_dim());
    Zip::from(out.lanes_mut(axis))
        .and(input.lanes(axis))
        .for_each(|mut dst, src| {
            let len = src.len();
            for (i, &value) in src.iter().enumerate() {
                for j in 0..window {
                    if let Some(t) = source_index(i, j, len, clamp) {
                        dst[t] += value;
                    }
                }
            }
        });
    out
}

/// 2D box filter over `[x, x + window) × [y, y + window)`
///
/// The sum runs horizontally then vertically and is *not* normalized;
/// divide by `window²` for an average. With `clamp` the edge pixels repeat
/// past the border, otherwise samples beyond the border are dropped.
pub fn box_blur<A, S>(input: &ArrayBase<S, Ix2>, window: usize, clamp: bool) -> Array2<A>
where
    A: NdFloat,
    S: Data<Elem = A>,
{
    let horizontal = sum_axis_window(input.view(), Axis(1), window, clamp);
    sum_axis_window(horizontal.view(), Axis(0), window, clamp)
}

/// Exact adjoint of [`box_blur`] with the same `window` and `clamp`
///
/// Each pixel is scattered back onto the samples that read it; with
/// `clamp` the mass read through the repeated edge lands on the edge pixel.
pub fn box_blur_adjoint<A, S>(input: &ArrayBase<S, Ix2>, window: usize, clamp: bool) -> Array2<A>
where
    A: NdFloat,
    S: Data<Elem = A>,
{
    let vertical = scatter_axis_window(input.view(), Axis(0), window, clamp);
    scatter_axis_window(vertical.view(), Axis(1), window, clamp)
}

/// Unnormalized box blur as a linear operator
#[derive(Clone, Copy, Debug)]
pub struct BoxBlur<A> {
    pub window: usize,
    pub clamp: bool,
    phantom: std::marker::PhantomData<A>,
}

impl<A> BoxBlur<A> {
    pub fn new(window: usize, clamp: bool) -> Self {
        BoxBlur {
            window,
            clamp,
            phantom: std::marker::PhantomData,
        }
    }
}

impl<A: NdFloat> LinearOperator for BoxBlur<A> {
    type Elem = A;
    type In = Ix2;
    type Out = Ix2;

    fn apply<S>(&self, x: &ArrayBase<S, Ix2>) -> Array2<A>
    where
        S: Data<Elem = A>,
    {
        box_blur(x, self.window, self.clamp)
    }
}

pub struct BoxBlurAdjoint<'a, A> {
    blur: &'a BoxBlur<A>,
}

impl<'a, A: NdFloat> LinearOperator for BoxBlurAdjoint<'a, A> {
    type Elem = A;
    type In = Ix2;
    type Out = Ix2;

    fn apply<S>(&self, x: &ArrayBase<S, Ix2>) -> Array2<A>
    where
        S: Data<Elem = A>,
    {
        box_blur_adjoint(x, self.blur.window, self.blur.clamp)
    }
}

impl<'a, A: 'a> Adjoint<'a> for BoxBlur<A> {
    type Output = BoxBlurAdjoint<'a, A>;

    fn adj(&'a self) -> Self::Output {
        BoxBlurAdjoint { blur: self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linop::vdot;
    use approx::assert_relative_eq;
    use ndarray_rand::rand::rngs::SmallRng;
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;

    #[test]
    fn clamped_window_repeats_edge() {
        let x = array![[1.0f32, 2.0, 3.0]];
        let blurred = box_blur(&x, 2, true);
        // vertical pass sees a single row repeated twice
        assert_eq!(blurred, array![[6.0f32, 10.0, 12.0]]);
    }

    #[test]
    fn unclamped_window_drops_exterior() {
        let x = array![[1.0f32, 2.0, 3.0]];
        let blurred = box_blur(&x, 2, false);
        assert_eq!(blurred, array![[3.0f32, 5.0, 3.0]]);
    }

    #[test]
    fn window_of_one_is_identity() {
        let x = array![[1.0f64, -2.0], [0.5, 4.0]];
        assert_eq!(box_blur(&x, 1, true), x);
        assert_eq!(box_blur_adjoint(&x, 1, true), x);
    }

    #[test]
    fn adjoint_identity() {
        let mut rng = SmallRng::seed_from_u64(3);
        for &clamp in &[true, false] {
            let blur = BoxBlur::new(3, clamp);
            let u = Array::random_using((7, 9), Uniform::new(0f64, 1.), &mut rng);
            let z = Array::random_using((7, 9), Uniform::new(0f64, 1.), &mut rng);
            let lhs = vdot(&blur.apply(&u), &z);
            let rhs = vdot(&u, &blur.adj().apply(&z));
            assert_relative_eq!(lhs, rhs, max_relative = 1e-12);
        }
    }
}
