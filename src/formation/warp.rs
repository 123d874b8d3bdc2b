//! Sub-pixel translation with bilinear resampling

use ndarray::prelude::*;
use ndarray::{Data, NdFloat};

use super::{constant_exterior, constant_exterior3, kernel_linear};
use crate::linop::{Adjoint, LinearOperator};

/// Two interpolation taps along one axis: `(index, weight)` for `floor(p)`
/// and `floor(p) + 1`.
#[derive(Clone, Copy, Debug)]
struct Taps<A> {
    first: usize,
    weights: [A; 2],
    len: usize,
}

impl<A: NdFloat> Taps<A> {
    /// `None` when neither tap lands inside `0..len`
    fn at(p: A, len: usize) -> Option<Self> {
        // also rejects NaN
        if !(p > -A::one() && p < A::from(len).unwrap()) {
            return None;
        }
        let x0 = p.floor();
        let w0 = kernel_linear(x0 - p);
        let w1 = kernel_linear(x0 + A::one() - p);
        if x0 < A::zero() {
            // only the upper tap is inside
            return Some(Taps {
                first: 0,
                weights: [w1, A::zero()],
                len,
            });
        }
        Some(Taps {
            first: x0.to_usize()?,
            weights: [w0, w1],
            len,
        })
    }

    fn for_each(&self, mut f: impl FnMut(usize, A)) {
        for (offset, &w) in self.weights.iter().enumerate() {
            let i = self.first + offset;
            if i < self.len && w != A::zero() {
                f(i, w);
            }
        }
    }
}

/// Taps of every output coordinate along one axis
fn axis_taps<A: NdFloat>(out_len: usize, in_len: usize, upsample: usize, shift: A) -> Vec<Option<Taps<A>>> {
    let up = A::from(upsample).unwrap();
    (0..out_len)
        .map(|x| Taps::at(A::from(x).unwrap() / up + shift, in_len))
        .collect()
}

/// Visit the (at most four) input pixels read by one output sample
#[inline]
fn for_each_tap<A: NdFloat>(ty: &Option<Taps<A>>, tx: &Option<Taps<A>>, mut f: impl FnMut(usize, usize, A)) {
    if let (Some(ty), Some(tx)) = (ty, tx) {
        ty.for_each(|j, wy| tx.for_each(|i, wx| f(j, i, wy * wx)));
    }
}

/// Resample one frame: `out[y, x] = input(y / up + sy, x / up + sx)`
fn resample_frame<A: NdFloat>(input: ArrayView2<A>, sx: A, sy: A, upsample: usize, mut out: ArrayViewMut2<A>) {
    let (h, w) = input.dim();
    let (oh, ow) = out.dim();
    let xs = axis_taps(ow, w, upsample, sx);
    let ys = axis_taps(oh, h, upsample, sy);
    for ((y, x), o) in out.indexed_iter_mut() {
        let mut acc = A::zero();
        for_each_tap(&ys[y], &xs[x], |j, i, weight| acc += weight * input[[j, i]]);
        *o = acc;
    }
}

/// Transpose of [`resample_frame`]: scatter each sample back onto its taps
fn scatter_frame<A: NdFloat>(frame: ArrayView2<A>, sx: A, sy: A, upsample: usize, mut out: ArrayViewMut2<A>) {
    let (h, w) = out.dim();
    let (fh, fw) = frame.dim();
    let xs = axis_taps(fw, w, upsample, sx);
    let ys = axis_taps(fh, h, upsample, sy);
    for ((y, x), &value) in frame.indexed_iter() {
        if value == A::zero() {
            continue;
        }
        for_each_tap(&ys[y], &xs[x], |j, i, weight| out[[j, i]] += weight * value);
    }
}

/// Forward warp $`A`$: an `h × w` image to a stack of `M` shifted frames of
/// size `h·up × w·up`
///
/// Frame `k` is the input evaluated at
/// `(x / upsample + shift[0, k], y / upsample + shift[1, k])` with bilinear
/// weights. Samples outside the image read zero.
///
/// Returns the resampled stack and the zero-extended input (one pixel of
/// border, enough for every tap).
///
/// Panics if `shift` does not have two rows.
pub fn a_warp<A, S>(input: &ArrayBase<S, Ix2>, shift: ArrayView2<A>, upsample: usize) -> (Array3<A>, Array2<A>)
where
    A: NdFloat,
    S: Data<Elem = A>,
{
    let warp = Warp::new(shift.to_owned(), input.dim(), upsample);
    (warp.apply(input), constant_exterior(input, 1))
}

/// Adjoint warp $`A^T`$: a stack of frames back onto the `dim` image grid
///
/// Returns the sum over frames, the per-frame back-projections (shape
/// `dim × M`) and the zero-extended input stack.
///
/// Panics if `shift` does not have two rows or `input` is not
/// `dim·upsample × M`.
pub fn at_warp<A, S>(
    input: &ArrayBase<S, Ix3>,
    shift: ArrayView2<A>,
    upsample: usize,
    dim: (usize, usize),
) -> (Array2<A>, Array3<A>, Array3<A>)
where
    A: NdFloat,
    S: Data<Elem = A>,
{
    let warp = Warp::new(shift.to_owned(), dim, upsample);
    let per_frame = warp.adj().apply_per_frame(input);
    let sum = per_frame.sum_axis(Axis(2));
    (sum, per_frame, constant_exterior3(input, 1))
}

/// Bilinear warp by a table of per-frame shifts
///
/// ```math
/// (A u)_k(x, y) = \sum_{i,j} k(i - x/s - \delta^x_k)\, k(j - y/s - \delta^y_k)\, u(i, j)
/// ```
#[derive(Clone, Debug)]
pub struct Warp<A> {
    shift: Array2<A>,
    dim: (usize, usize),
    upsample: usize,
}

impl<A: NdFloat> Warp<A> {
    /// `shift` has shape `(2, M)`; `dim` is the `(height, width)` of the input image.
    ///
    /// Panics if `shift` does not have two rows.
    pub fn new(shift: Array2<A>, dim: (usize, usize), upsample: usize) -> Self {
        assert_eq!(shift.nrows(), 2, "shift table must have one row per axis");
        Warp {
            shift,
            dim,
            upsample,
        }
    }

    pub fn frames(&self) -> usize {
        self.shift.ncols()
    }

    pub fn shift(&self) -> ArrayView2<'_, A> {
        self.shift.view()
    }

    /// Shape of the produced stack
    pub fn output_dim(&self) -> (usize, usize, usize) {
        let (h, w) = self.dim;
        (h * self.upsample, w * self.upsample, self.frames())
    }
}

impl<A: NdFloat> LinearOperator for Warp<A> {
    type Elem = A;
    type In = Ix2;
    type Out = Ix3;

    /// Panics if `x` is not `dim`.
    fn apply<S>(&self, x: &ArrayBase<S, Ix2>) -> Array3<A>
    where
        S: Data<Elem = A>,
    {
        assert_eq!(x.dim(), self.dim, "warp input shape");
        let mut out = Array3::zeros(self.output_dim());
        for (k, frame) in out.axis_iter_mut(Axis(2)).enumerate() {
            let (sx, sy) = (self.shift[[0, k]], self.shift[[1, k]]);
            resample_frame(x.view(), sx, sy, self.upsample, frame);
        }
        out
    }
}

/// Exact transpose of [`Warp`], summed over frames
pub struct WarpAdjoint<'a, A> {
    warp: &'a Warp<A>,
}

impl<'a, A: NdFloat> WarpAdjoint<'a, A> {
    /// Back-projection of every frame, without the final sum
    ///
    /// Panics if `z` is not [`Warp::output_dim`].
    pub fn apply_per_frame<S>(&self, z: &ArrayBase<S, Ix3>) -> Array3<A>
    where
        S: Data<Elem = A>,
    {
        assert_eq!(z.dim(), self.warp.output_dim(), "warp adjoint input shape");
        let (h, w) = self.warp.dim;
        let mut out = Array3::zeros((h, w, self.warp.frames()));
        for (k, (frame, dst)) in z
            .axis_iter(Axis(2))
            .zip(out.axis_iter_mut(Axis(2)))
            .enumerate()
        {
            let (sx, sy) = (self.warp.shift[[0, k]], self.warp.shift[[1, k]]);
            scatter_frame(frame, sx, sy, self.warp.upsample, dst);
        }
        out
    }
}

impl<'a, A: NdFloat> LinearOperator for WarpAdjoint<'a, A> {
    type Elem = A;
    type In = Ix3;
    type Out = Ix2;

    /// Panics if `z` is not [`Warp::output_dim`].
    fn apply<S>(&self, z: &ArrayBase<S, Ix3>) -> Array2<A>
    where
        S: Data<Elem = A>,
    {
        assert_eq!(z.dim(), self.warp.output_dim(), "warp adjoint input shape");
        let mut out = Array2::zeros(self.warp.dim);
        for (k, frame) in z.axis_iter(Axis(2)).enumerate() {
            let (sx, sy) = (self.warp.shift[[0, k]], self.warp.shift[[1, k]]);
            scatter_frame(frame, sx, sy, self.warp.upsample, out.view_mut());
        }
        out
    }
}

impl<'a, A: 'a + NdFloat> Adjoint<'a> for Warp<A> {
    type Output = WarpAdjoint<'a, A>;

    fn adj(&'a self) -> Self::Output {
        WarpAdjoint { warp: self }
    }
}
