//! Proximal Operators for the Split Blocks
//!
//! Each split variable $`z_i`$ of the ADMM solver is updated with a
//! closed-form proximal map
//! ```math
//! \mathrm{prox}_{\theta g}(u) = \mathrm{arg}\!\min_z \tfrac{1}{2\theta}\|z - u\|_2^2 + g(z)
//! ```
//! The regularizer uses isotropic total variation on the image gradient;
//! the data term compares simulated frames with the observed stack through
//! a subsampling operator.

mod threshold;
pub use threshold::*;

mod subsample;
pub use subsample::*;

mod parameterized;
pub use parameterized::*;
