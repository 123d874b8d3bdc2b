//! Abstract Linear Operators and Adjoints
//!
//! Image-formation operators map between arrays of different
//! dimensionality (an image to a stack of frames, a gradient field back to
//! an image), so the input and output dimensions are part of the operator.

use std::marker::PhantomData;

use ndarray::prelude::*;
use ndarray::{Data, Dimension, NdFloat, Zip};

pub trait LinearOperator {
    type Elem: NdFloat;
    type In: Dimension;
    type Out: Dimension;

    /// Apply operator out-place
    fn apply<S>(&self, x: &ArrayBase<S, Self::In>) -> Array<Self::Elem, Self::Out>
    where
        S: Data<Elem = Self::Elem>;
}

pub trait Adjoint<'a> {
    type Output;
    fn adj(&'a self) -> Self::Output;
}

#[derive(Default)]
pub struct Identity<A, D> {
    phantom: PhantomData<(*const A, D)>,
}

impl<A, D> Identity<A, D> {
    #[must_use]
    pub fn new() -> Identity<A, D> {
        Identity {
            phantom: PhantomData,
        }
    }
}

impl<A, D> LinearOperator for Identity<A, D>
where
    A: NdFloat,
    D: Dimension,
{
    type Elem = A;
    type In = D;
    type Out = D;

    #[inline]
    fn apply<S>(&self, x: &ArrayBase<S, D>) -> Array<A, D>
    where
        S: Data<Elem = A>,
    {
        x.to_owned()
    }
}

impl<'a, A: 'a, D: 'a> Adjoint<'a> for Identity<A, D> {
    type Output = &'a Identity<A, D>;

    fn adj(&'a self) -> Self::Output {
        self
    }
}

/// Elementwise multiplication by a fixed mask (self-adjoint)
pub struct Mask<A, D> {
    mask: Array<A, D>,
}

impl<A, D> Mask<A, D>
where
    A: NdFloat,
    D: Dimension,
{
    pub fn new(mask: Array<A, D>) -> Self {
        Mask { mask }
    }

    pub fn mask(&self) -> ArrayView<'_, A, D> {
        self.mask.view()
    }
}

impl<A, D> LinearOperator for Mask<A, D>
where
    A: NdFloat,
    D: Dimension,
{
    type Elem = A;
    type In = D;
    type Out = D;

    /// Panics if `x` and the mask differ in shape.
    fn apply<S>(&self, x: &ArrayBase<S, D>) -> Array<A, D>
    where
        S: Data<Elem = A>,
    {
        Zip::from(x).and(&self.mask).map_collect(|&a, &m| a * m)
    }
}

impl<'a, A: 'a, D: 'a> Adjoint<'a> for Mask<A, D> {
    type Output = &'a Mask<A, D>;

    fn adj(&'a self) -> Self::Output {
        self
    }
}

/// Inner product $`\langle a, b \rangle`$ of two arrays of equal shape
pub fn vdot<A, S, T, D>(a: &ArrayBase<S, D>, b: &ArrayBase<T, D>) -> A
where
    A: NdFloat,
    S: Data<Elem = A>,
    T: Data<Elem = A>,
    D: Dimension,
{
    Zip::from(a)
        .and(b)
        .fold(A::zero(), |acc, &x, &y| acc + x * y)
}

/// Squared Euclidean norm over every element
pub fn norm_sq<A, S, D>(a: &ArrayBase<S, D>) -> A
where
    A: NdFloat,
    S: Data<Elem = A>,
    D: Dimension,
{
    a.fold(A::zero(), |acc, &x| acc + x * x)
}

/// Power iteration for the largest eigenvalue of a symmetric PSD map
///
/// With `normal` applying $`K^H K`$ this estimates $`\|K\|_2^2`$, the
/// quantity that bounds the primal step of linearized ADMM.
///
/// Parameters
/// ----------
/// - __normal:__   function applying the normal operator
/// - __x0:__       starting vector, must not be orthogonal to the top eigenvector
/// - __maxiter:__  number of iterations
pub fn power_iteration<A, D>(
    normal: impl Fn(ArrayView<A, D>) -> Array<A, D>,
    x0: Array<A, D>,
    maxiter: usize,
) -> A
where
    A: NdFloat,
    D: Dimension,
{
    let norm = norm_sq(&x0).sqrt();
    if norm == A::zero() {
        return A::zero();
    }
    let mut x = x0 / norm;
    let mut lambda = A::zero();
    for _iter in 0..maxiter {
        let y = normal(x.view());
        lambda = norm_sq(&y).sqrt();
        if lambda == A::zero() {
            break;
        }
        x = y / lambda;
    }
    lambda
}
