//! The `ladmm-superres` crate reconstructs a high-resolution image from a
//! stack of sub-pixel shifted, low-resolution frames.
//!
//! The reconstruction is a regularized inverse problem solved with
//! linearized ADMM. It is built from:
//! - image formation operators (box blur, bilinear warp, gradient) with
//!   exact adjoints
//! - closed-form proximal maps for the total-variation prior and the
//!   subsampled data term
//! - the ADMM step, convergence metrics and an outer loop that stops early
//!   once both residuals fall below tolerance
//!
//! ```no_run
//! use ladmm_superres::admm::solve;
//! use ladmm_superres::config::{ProblemConfig, SolverOptions};
//! use ndarray::Array3;
//!
//! let cfg = ProblemConfig::default();
//! let observed = Array3::<f32>::zeros((128, 128, 64));
//! let solution = solve(&cfg, &SolverOptions::default(), &observed)?;
//! println!("{} iterations, converged: {}", solution.iterations(), solution.converged);
//! # Ok::<(), ladmm_superres::Error>(())
//! ```
//!
//! The library only emits `tracing` events; install a subscriber to see them.

#![cfg_attr(all(rustc_nightly, test), feature(test))]
#[cfg(all(rustc_nightly, test))]
extern crate test;

pub mod admm;
pub mod config;
pub mod error;
pub mod formation;
pub mod linop;
pub mod masked_interp;
pub mod prox;

pub use error::{Error, Result};
