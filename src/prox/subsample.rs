//! Data fidelity through a subsampling operator

use ndarray::prelude::*;
use ndarray::{Data, NdFloat};

use crate::error::{Error, Result};

/// Closed-form fidelity prox against a stack subsampled by `factor`
///
/// At positions where both coordinates are multiples of $`S`$ = `factor` the
/// output blends the input with the observed sample,
/// ```math
/// z(y, x, c) = \frac{b(y/S, x/S, c) + u(y, x, c)/\alpha}{\beta},
/// \qquad \alpha = \sqrt{2/\theta},\ \beta = \theta/2 + 1
/// ```
/// and elsewhere it is the plain quadratic shrink $`u\,\theta/2`$.
///
/// `reference` must have shape `(⌈h/S⌉, ⌈w/S⌉, c)` for an `h × w × c`
/// input; a zero factor or mismatched reference is a configuration error.
pub fn prox_subsample_sumsq<A, S, T>(
    input: &ArrayBase<S, Ix3>,
    theta: A,
    reference: &ArrayBase<T, Ix3>,
    factor: usize,
) -> Result<Array3<A>>
where
    A: NdFloat,
    S: Data<Elem = A>,
    T: Data<Elem = A>,
{
    if factor == 0 {
        return Err(Error::InvalidConfig("subsample factor must be at least 1".into()));
    }
    let (h, w, c) = input.dim();
    let expected = [(h + factor - 1) / factor, (w + factor - 1) / factor, c];
    Error::check_shape("reference", &expected, reference.shape())?;

    let two = A::from(2.).unwrap();
    let alpha = (two / theta).sqrt();
    let beta = theta / two + A::one();
    let shrink = theta / two;

    let mut z = Array3::zeros((h, w, c));
    for ((y, x, k), out) in z.indexed_iter_mut() {
        let u = input[[y, x, k]];
        *out = if y % factor == 0 && x % factor == 0 {
            (reference[[y / factor, x / factor, k]] + u / alpha) / beta
        } else {
            u * shrink
        };
    }
    Ok(z)
}
