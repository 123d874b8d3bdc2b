//! Hole filling for 16-bit images by pyramid interpolation
//!
//! Pixels equal to [`INVALID`] are holes. The image is averaged down a
//! 2× pyramid, ignoring holes, and holes are then filled coarse-to-fine
//! from the parent cell one level up.

use ndarray::prelude::*;
use ndarray::{Data, Zip};

/// Sentinel marking a missing pixel
pub const INVALID: u16 = u16::MAX;

/// Mean of the valid pixels in each 2×2 block, reading past the border by
/// repeating the edge. Blocks without a valid pixel become [`INVALID`].
fn downscale(level: &Array2<u16>) -> Array2<u16> {
    let (h, w) = level.dim();
    Array2::from_shape_fn(((h + 1) / 2, (w + 1) / 2), |(y, x)| {
        let mut sum = 0u32;
        let mut count = 0u32;
        for &(dy, dx) in &[(0, 0), (0, 1), (1, 0), (1, 1)] {
            let p = level[[(2 * y + dy).min(h - 1), (2 * x + dx).min(w - 1)]];
            if p != INVALID {
                sum += u32::from(p);
                count += 1;
            }
        }
        if count > 0 {
            // a mean of valid pixels never reaches the sentinel
            (sum / count) as u16
        } else {
            INVALID
        }
    })
}

/// Fill the holes of `image` from `levels + 1` downscaled copies.
///
/// Valid pixels, including genuine zeros, are returned unchanged. A hole
/// takes the value of its parent cell, which was itself filled from above;
/// holes survive only where the coarsest level is still invalid.
pub fn masked_interp<S>(image: &ArrayBase<S, Ix2>, levels: usize) -> Array2<u16>
where
    S: Data<Elem = u16>,
{
    let mut coarse = image.to_owned();
    if coarse.is_empty() {
        return coarse;
    }

    let mut pyramid = Vec::with_capacity(levels + 1);
    for _ in 0..=levels {
        let next = downscale(&coarse);
        pyramid.push(std::mem::replace(&mut coarse, next));
    }

    while let Some(mut level) = pyramid.pop() {
        Zip::indexed(&mut level).for_each(|(y, x), p| {
            if *p == INVALID {
                *p = coarse[[y / 2, x / 2]];
            }
        });
        coarse = level;
    }
    coarse
}
