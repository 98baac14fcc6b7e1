use log::trace;
use nalgebra::{DMatrix, DVector};
use num_dual::{jacobian, DualDVec64};
use thiserror::Error;

use super::{weighted_norm, ConvergenceMetric};
use crate::physics::Real;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("linear solve failed: Jacobian is singular")]
    LinearSolveFailed,
    #[error("Newton's method failed to converge after {0} iterations")]
    NonConvergence(u32),
    #[error("residual contains NaN or Inf")]
    NonFiniteResidual,
    #[error("step size {h:.3e} s fell below the minimum {h_min:.3e} s at t = {t:.6e} s")]
    StepSizeUnderflow { t: f64, h: f64, h_min: f64 },
    #[error("gave up after {0} steps")]
    TooManySteps(usize),
}

/// A square nonlinear system `G(u) = 0`, written once for any scalar type.
pub trait NonlinearSystem {
    fn eval<T: Real>(&self, u: &DVector<T>) -> DVector<T>;
}

/// Dense Newton with an AD Jacobian, row equilibration and a backtracking
/// (Armijo) line search on the equilibrated residual.
#[derive(Debug, Clone)]
pub struct NewtonSolver {
    /// Weighted RMS of the update at which the iteration stops.
    pub tolerance: f64,
    pub max_iterations: u32,
    /// Smallest line-search fraction before giving up.
    pub min_step_size: f64,
    /// Sufficient-decrease parameter.
    pub armijo_param: f64,
}

impl Default for NewtonSolver {
    fn default() -> Self {
        Self {
            tolerance: 0.1,
            max_iterations: 8,
            min_step_size: 1.0 / 64.0,
            armijo_param: 1e-4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolverResult {
    pub solution: DVector<f64>,
    pub iterations: u32,
    /// Weighted RMS of the last update.
    pub final_update: f64,
}

impl NewtonSolver {
    pub fn solve<S: NonlinearSystem>(
        &self,
        system: &S,
        initial_guess: DVector<f64>,
        weights: &DVector<f64>,
    ) -> Result<SolverResult, SolverError> {
        let mut u = initial_guess;

        for i in 0..self.max_iterations {
            let (residual, mut jac) = self.compute_residual_and_jacobian(system, &u);
            if !residual.iter().all(|x| x.is_finite()) {
                return Err(SolverError::NonFiniteResidual);
            }

            let scale = row_scaling(&jac);
            for (r, s) in scale.iter().enumerate() {
                jac.row_mut(r).scale_mut(*s);
            }
            let scaled = residual.component_mul(&scale);
            let current_norm = scaled.norm();

            let delta = jac
                .lu()
                .solve(&-&scaled)
                .filter(|d| d.iter().all(|x| x.is_finite()))
                .ok_or(SolverError::LinearSolveFailed)?;

            let update = weighted_norm(&delta, weights, None, ConvergenceMetric::Rms);
            if update <= self.tolerance {
                u += delta;
                return Ok(SolverResult {
                    solution: u,
                    iterations: i + 1,
                    final_update: update,
                });
            }

            // Backtracking line search
            let mut alpha = 1.0;
            loop {
                let candidate = &u + &delta * alpha;
                let next = system.eval(&candidate).component_mul(&scale);
                let next_norm = next.norm();
                let target = (1.0 - alpha * self.armijo_param) * current_norm;
                if next_norm.is_finite() && next_norm <= target {
                    u = candidate;
                    trace!(
                        "  newton {i:>2} | res {current_norm:.3e} -> {next_norm:.3e} | update {update:.3e} | alpha {alpha:.3}"
                    );
                    break;
                }
                alpha *= 0.5;
                if alpha < self.min_step_size {
                    return Err(SolverError::NonConvergence(i + 1));
                }
            }

            if alpha * update <= self.tolerance {
                return Ok(SolverResult {
                    solution: u,
                    iterations: i + 1,
                    final_update: alpha * update,
                });
            }
        }
        Err(SolverError::NonConvergence(self.max_iterations))
    }

    // A helper that wraps the call to the AD library.
    pub fn compute_residual_and_jacobian<S: NonlinearSystem>(
        &self,
        system: &S,
        u: &DVector<f64>,
    ) -> (DVector<f64>, DMatrix<f64>) {
        jacobian(|arg: DVector<DualDVec64>| system.eval(&arg), u.clone())
    }
}

/// Inverse of the largest magnitude in each row; rows of zeros keep scale one.
fn row_scaling(jac: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(
        jac.nrows(),
        jac.row_iter().map(|row| {
            let m = row.amax();
            if m > 0.0 && m.is_finite() { 1.0 / m } else { 1.0 }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::constant;

    /// x^2 + y^2 = 4, x = y.
    struct Circle;

    impl NonlinearSystem for Circle {
        fn eval<T: Real>(&self, u: &DVector<T>) -> DVector<T> {
            let (x, y) = (u[0].clone(), u[1].clone());
            DVector::from_vec(vec![
                x.clone() * x.clone() + y.clone() * y.clone() - constant::<T>(4.0),
                x - y,
            ])
        }
    }

    #[test]
    fn converges_on_small_system() {
        let solver = NewtonSolver {
            tolerance: 1e-10,
            max_iterations: 30,
            ..NewtonSolver::default()
        };
        let w = DVector::from_element(2, 1.0);
        let res = solver
            .solve(&Circle, DVector::from_vec(vec![3.0, 0.5]), &w)
            .unwrap();
        let r = 2f64.sqrt();
        assert!((res.solution[0] - r).abs() < 1e-8);
        assert!((res.solution[1] - r).abs() < 1e-8);
    }

    #[test]
    fn ad_jacobian_matches_analytic() {
        let solver = NewtonSolver::default();
        let (_, jac) = solver.compute_residual_and_jacobian(&Circle, &DVector::from_vec(vec![1.5, -2.0]));
        assert!((jac[(0, 0)] - 3.0).abs() < 1e-14);
        assert!((jac[(0, 1)] + 4.0).abs() < 1e-14);
        assert_eq!(jac[(1, 0)], 1.0);
        assert_eq!(jac[(1, 1)], -1.0);
    }

    #[test]
    fn singular_jacobian_is_reported() {
        struct Degenerate;
        impl NonlinearSystem for Degenerate {
            fn eval<T: Real>(&self, u: &DVector<T>) -> DVector<T> {
                DVector::from_vec(vec![u[0].clone() - constant::<T>(1.0), T::zero()])
            }
        }
        let w = DVector::from_element(2, 1.0);
        let err = NewtonSolver::default()
            .solve(&Degenerate, DVector::zeros(2), &w)
            .unwrap_err();
        assert!(matches!(err, SolverError::LinearSolveFailed));
    }
}
