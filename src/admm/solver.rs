use ndarray::prelude::*;
use ndarray::Data;
use tracing::{debug, error, info, warn};

use super::{ConvergenceMetrics, NativeBackend, SolverState};
use crate::config::{ProblemConfig, SolverOptions};
use crate::error::{Error, Result};

/// Executes batches of ADMM steps
///
/// A call reads `state` and returns a new state together with the metrics
/// of its last step. Implementations must not write through `state`.
pub trait Backend {
    fn run(&self, state: &SolverState, observed: ArrayView3<f32>) -> Result<(SolverState, ConvergenceMetrics)>;
}

/// Final estimate and per-iteration history of a solve
#[derive(Clone, Debug)]
pub struct Solution {
    pub v: Array2<f32>,
    pub r: Vec<f32>,
    pub s: Vec<f32>,
    pub eps_pri: Vec<f32>,
    pub eps_dual: Vec<f32>,
    /// `false` when `iter_max` ran out first; `v` is then a best-effort estimate
    pub converged: bool,
}

impl Solution {
    /// Number of outer iterations executed
    pub fn iterations(&self) -> usize {
        self.r.len()
    }
}

/// Outer loop of linearized ADMM
///
/// Calls `backend` up to `iter_max` times, each call taking ownership of
/// the previous result so at most two generations of state are alive.
/// Stops after the first iteration whose metrics meet both tolerances and
/// truncates the histories to the iterations actually run.
///
/// Parameters
/// ----------
/// - __backend:__   executes one batch of steps per call
/// - __initial:__   starting state, usually [`SolverState::zeros`]
/// - __observed:__  low-resolution stack, `h × w × frames`
/// - __iter_max:__  number of outer iterations
pub fn ladmm_solve<B>(backend: &B, initial: SolverState, observed: ArrayView3<f32>, iter_max: usize) -> Result<Solution>
where
    B: Backend + ?Sized,
{
    let mut r = vec![0.; iter_max];
    let mut s = vec![0.; iter_max];
    let mut eps_pri = vec![0.; iter_max];
    let mut eps_dual = vec![0.; iter_max];
    let mut converged = false;

    let mut current = initial;
    for iter in 0..iter_max {
        let (next, metrics) = backend.run(&current, observed).map_err(|err| {
            error!(iter, %err, "ADMM step failed");
            err
        })?;
        r[iter] = metrics.r;
        s[iter] = metrics.s;
        eps_pri[iter] = metrics.eps_pri;
        eps_dual[iter] = metrics.eps_dual;
        debug!(
            iter,
            r = metrics.r,
            s = metrics.s,
            eps_pri = metrics.eps_pri,
            eps_dual = metrics.eps_dual,
            "outer iteration"
        );

        current = next;
        if metrics.converged() {
            info!(iterations = iter + 1, "converged");
            for history in [&mut r, &mut s, &mut eps_pri, &mut eps_dual] {
                history.truncate(iter + 1);
            }
            converged = true;
            break;
        }
    }
    if !converged {
        warn!(iter_max, "iteration budget exhausted before convergence");
    }

    Ok(Solution {
        v: current.v,
        r,
        s,
        eps_pri,
        eps_dual,
        converged,
    })
}

/// Reconstructs the high-resolution image from `observed` with the native backend,
/// starting from a zero state
pub fn solve<S>(cfg: &ProblemConfig, opts: &SolverOptions, observed: &ArrayBase<S, Ix3>) -> Result<Solution>
where
    S: Data<Elem = f32>,
{
    let backend = NativeBackend::new(cfg, opts)?;
    Error::check_shape("observed", &cfg.input_shape(), observed.shape())?;
    ladmm_solve(&backend, SolverState::zeros(cfg), observed.view(), opts.iter_max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    use ndarray_rand::rand::rngs::SmallRng;
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;

    fn tiny() -> ProblemConfig {
        ProblemConfig {
            input_width: 3,
            input_height: 2,
            frames: 1,
            upsample: 1,
            blur_size: 1,
            alpha: 0.01,
            beta: 0.7,
        }
    }

    /// Adds one to `v` per call and reports convergence or failure on cue
    #[derive(Default)]
    struct Scripted {
        converge_at: Option<usize>,
        fail_at: Option<(usize, i32)>,
        calls: Cell<usize>,
        inputs: RefCell<Vec<*const f32>>,
    }

    impl Backend for Scripted {
        fn run(&self, state: &SolverState, _observed: ArrayView3<f32>) -> Result<(SolverState, ConvergenceMetrics)> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            self.inputs.borrow_mut().push(state.v.as_ptr());
            if let Some((at, code)) = self.fail_at {
                if call == at {
                    return Err(Error::Backend { code });
                }
            }

            let mut next = state.clone();
            next.v += 1.0;
            let tol = if self.converge_at == Some(call) { 1.0 } else { 0.0 };
            let metrics = ConvergenceMetrics {
                r: 0.5 / (call + 1) as f32,
                s: 0.25 / (call + 1) as f32,
                eps_pri: tol,
                eps_dual: tol,
            };
            Ok((next, metrics))
        }
    }

    fn observed() -> Array3<f32> {
        Array3::zeros((2, 3, 1))
    }

    #[test]
    fn truncates_history_on_convergence() {
        let backend = Scripted {
            converge_at: Some(3),
            ..Scripted::default()
        };
        let sol = ladmm_solve(&backend, SolverState::zeros(&tiny()), observed().view(), 10).unwrap();
        assert!(sol.converged);
        assert_eq!(sol.iterations(), 4);
        assert_eq!(sol.s.len(), 4);
        assert_eq!(sol.eps_pri.len(), 4);
        assert_eq!(sol.eps_dual.len(), 4);
        assert_eq!(backend.calls.get(), 4);
        assert_eq!(sol.v, Array2::from_elem((2, 3), 4.0f32));
    }

    #[test]
    fn converging_on_first_iteration_keeps_one_entry() {
        let backend = Scripted {
            converge_at: Some(0),
            ..Scripted::default()
        };
        let sol = ladmm_solve(&backend, SolverState::zeros(&tiny()), observed().view(), 10).unwrap();
        assert_eq!(sol.iterations(), 1);
        assert_eq!(sol.r, vec![0.5f32]);
    }

    #[test]
    fn exhausted_budget_is_not_an_error() {
        let backend = Scripted::default();
        let sol = ladmm_solve(&backend, SolverState::zeros(&tiny()), observed().view(), 5).unwrap();
        assert!(!sol.converged);
        assert_eq!(sol.iterations(), 5);
        assert_eq!(sol.eps_dual.len(), 5);
        let last = ConvergenceMetrics {
            r: sol.r[4],
            s: sol.s[4],
            eps_pri: sol.eps_pri[4],
            eps_dual: sol.eps_dual[4],
        };
        assert!(!last.converged());
        assert_eq!(sol.v, Array2::from_elem((2, 3), 5.0f32));
    }

    #[test]
    fn propagates_backend_error_code() {
        let backend = Scripted {
            fail_at: Some((2, -7)),
            ..Scripted::default()
        };
        let err = ladmm_solve(&backend, SolverState::zeros(&tiny()), observed().view(), 10).unwrap_err();
        assert_eq!(err, Error::Backend { code: -7 });
        assert!(!err.is_configuration());
        assert_eq!(backend.calls.get(), 3);
    }

    #[test]
    fn result_does_not_alias_previous_state() {
        let backend = Scripted::default();
        let sol = ladmm_solve(&backend, SolverState::zeros(&tiny()), observed().view(), 6).unwrap();
        let inputs = backend.inputs.borrow();
        assert_eq!(inputs.len(), 6);
        // every step received the previous step's output, never the same buffer twice in a row
        for pair in inputs.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
        assert_ne!(sol.v.as_ptr(), inputs[5]);
    }

    #[test]
    fn solve_rejects_wrong_observed_shape() {
        let cfg = tiny();
        let err = solve(&cfg, &SolverOptions::default(), &Array3::<f32>::zeros((2, 3, 4))).unwrap_err();
        match err {
            Error::ShapeMismatch { name, expected, got } => {
                assert_eq!(name, "observed");
                assert_eq!(expected, vec![2, 3, 1]);
                assert_eq!(got, vec![2, 3, 4]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn native_solve_converges_on_noiseless_problem() {
        let cfg = ProblemConfig {
            input_width: 8,
            input_height: 8,
            frames: 4,
            upsample: 1,
            blur_size: 1,
            alpha: 0.01,
            beta: 0.7,
        };
        // ||K||^2 <= 8 + 4, so mu = lmb / 16 is a safe step
        let opts = SolverOptions {
            iter_max: 100,
            batch_size: 20,
            lmb: 1.0,
            mu: 1.0 / 16.0,
            shift_step: 0.5,
            ..SolverOptions::default()
        };

        let mut rng = SmallRng::seed_from_u64(42);
        let truth = Array::random_using((8, 8), Uniform::new(0f32, 1.), &mut rng);
        let backend = NativeBackend::new(&cfg, &opts).unwrap();
        let [_, observed] = backend.transform().forward(&truth);
        assert_eq!(observed.dim(), (8, 8, 4));

        let sol = solve(&cfg, &opts, &observed).unwrap();
        assert!(sol.converged, "r = {:?}, s = {:?}", sol.r.last(), sol.s.last());
        assert!(sol.iterations() <= 100);
        assert!(sol.r[sol.iterations() - 1] <= sol.r[0]);
        assert!(sol.s[sol.iterations() - 1] <= sol.s[0]);
        assert!(sol.v.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn native_solve_converges_with_blur_and_upsampling() {
        let cfg = ProblemConfig {
            input_width: 8,
            input_height: 8,
            frames: 4,
            upsample: 2,
            blur_size: 3,
            alpha: 0.01,
            beta: 0.7,
        };
        let mut opts = SolverOptions {
            iter_max: 300,
            batch_size: 1,
            lmb: 1.0,
            shift_step: 0.5,
            ..SolverOptions::default()
        };
        let backend = NativeBackend::new(&cfg, &opts).unwrap();
        let l = backend.transform().norm_squared_estimate(50);
        assert!(l > 1.0 && l <= 12.0, "estimate {}", l);
        opts.mu = 0.9 * opts.lmb / l;

        let mut rng = SmallRng::seed_from_u64(17);
        let truth = Array::random_using((16, 16), Uniform::new(0f32, 1.), &mut rng);
        let [_, frames] = backend.transform().forward(&truth);
        let observed = frames.slice(s![..;2, ..;2, ..]).to_owned();
        assert_eq!(observed.dim(), (8, 8, 4));

        let sol = solve(&cfg, &opts, &observed).unwrap();
        assert!(sol.converged, "r = {:?}, s = {:?}", sol.r.last(), sol.s.last());
        let n = sol.iterations();
        assert!(sol.r[n - 1] < 0.1 * sol.r[0]);
        // residuals shrink over the run, not only between its endpoints
        let (early, late) = (n / 4, 3 * n / 4);
        assert!(sol.r[late] <= sol.r[early], "r: {:?}", sol.r);
        assert!(sol.v.iter().all(|x| x.is_finite()));
    }
}
