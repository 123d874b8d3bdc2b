//! Discrete image gradient and its adjoint (negative divergence)

use std::marker::PhantomData;

use ndarray::prelude::*;
use ndarray::{Data, NdFloat};

use crate::linop::{Adjoint, LinearOperator};

/// Forward differences of an `h × w` image into an `h × w × 2` field.
///
/// Channel 0 holds $`\partial_x`$, channel 1 $`\partial_y`$; both are zero
/// on the last column/row.
#[derive(Clone, Copy, Debug, Default)]
pub struct Gradient<A> {
    phantom: PhantomData<A>,
}

impl<A> Gradient<A> {
    pub fn new() -> Self {
        Gradient {
            phantom: PhantomData,
        }
    }
}

impl<A: NdFloat> LinearOperator for Gradient<A> {
    type Elem = A;
    type In = Ix2;
    type Out = Ix3;

    fn apply<S>(&self, u: &ArrayBase<S, Ix2>) -> Array3<A>
    where
        S: Data<Elem = A>,
    {
        let (h, w) = u.dim();
        let mut g = Array3::zeros((h, w, 2));
        if w > 1 {
            let dx = &u.slice(s![.., 1..]) - &u.slice(s![.., ..w - 1]);
            g.slice_mut(s![.., ..w - 1, 0]).assign(&dx);
        }
        if h > 1 {
            let dy = &u.slice(s![1.., ..]) - &u.slice(s![..h - 1, ..]);
            g.slice_mut(s![..h - 1, .., 1]).assign(&dy);
        }
        g
    }
}

pub struct GradientAdjoint<A> {
    phantom: PhantomData<A>,
}

impl<A: NdFloat> LinearOperator for GradientAdjoint<A> {
    type Elem = A;
    type In = Ix3;
    type Out = Ix2;

    fn apply<S>(&self, g: &ArrayBase<S, Ix3>) -> Array2<A>
    where
        S: Data<Elem = A>,
    {
        let (h, w, _) = g.dim();
        let mut out = Array2::zeros((h, w));
        if w > 1 {
            let gx = g.slice(s![.., ..w - 1, 0]);
            out.slice_mut(s![.., 1..]).zip_mut_with(&gx, |o, &d| *o += d);
            out.slice_mut(s![.., ..w - 1]).zip_mut_with(&gx, |o, &d| *o -= d);
        }
        if h > 1 {
            let gy = g.slice(s![..h - 1, .., 1]);
            out.slice_mut(s![1.., ..]).zip_mut_with(&gy, |o, &d| *o += d);
            out.slice_mut(s![..h - 1, ..]).zip_mut_with(&gy, |o, &d| *o -= d);
        }
        out
    }
}

impl<'a, A> Adjoint<'a> for Gradient<A> {
    type Output = GradientAdjoint<A>;

    fn adj(&'a self) -> Self::Output {
        GradientAdjoint {
            phantom: PhantomData,
        }
    }
}
