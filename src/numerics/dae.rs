//! Variable-step implicit Euler (BDF1) for `F(t, y, y') = 0`, with root
//! tracking between accepted steps.

use log::{debug, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::newton::{NewtonSolver, NonlinearSystem, SolverError};
use super::{weighted_norm, ConvergenceMetric, Tolerance};
use crate::physics::{EventAction, ImplicitProblem, Real};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaeSettings {
    pub tolerance: Tolerance,
    /// First trial step [s].
    pub initial_step: f64,
    pub min_step: f64,
    pub max_step: f64,
    pub max_steps: usize,
    pub max_newton_iterations: u32,
    /// Store every n-th accepted state in the trajectory.
    pub output_every: usize,
}

impl Default for DaeSettings {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            initial_step: 1e-6,
            min_step: 1e-14,
            max_step: 100.0,
            max_steps: 200_000,
            max_newton_iterations: 8,
            output_every: 1,
        }
    }
}

/// Where a located crossing happened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventReport {
    /// Index into the indicator vector.
    pub index: usize,
    pub time: f64,
    /// `true` if the indicator went from negative to non-negative.
    pub rising: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopReason {
    EndTime,
    Event(EventReport),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegratorStats {
    pub accepted_steps: usize,
    pub error_test_failures: usize,
    pub newton_failures: usize,
    pub newton_iterations: usize,
}

impl IntegratorStats {
    pub fn merge(&mut self, other: &IntegratorStats) {
        self.accepted_steps += other.accepted_steps;
        self.error_test_failures += other.error_test_failures;
        self.newton_failures += other.newton_failures;
        self.newton_iterations += other.newton_iterations;
    }
}

#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub states: Vec<DVector<f64>>,
}

impl Trajectory {
    pub fn push(&mut self, t: f64, y: &DVector<f64>) {
        self.times.push(t);
        self.states.push(y.clone());
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    pub t: f64,
    pub y: DVector<f64>,
    pub ydot: DVector<f64>,
    pub stop: StopReason,
    pub trajectory: Trajectory,
    pub stats: IntegratorStats,
}

/// The nonlinear system of one implicit Euler step.
struct EulerStep<'a, P> {
    problem: &'a P,
    t: f64,
    h: f64,
    y_prev: &'a DVector<f64>,
}

impl<P: ImplicitProblem> NonlinearSystem for EulerStep<'_, P> {
    fn eval<T: Real>(&self, u: &DVector<T>) -> DVector<T> {
        let inv_h = 1.0 / self.h;
        let ydot: Vec<T> = u
            .iter()
            .zip(self.y_prev.iter())
            .map(|(ui, yi)| (ui.clone() - *yi) * inv_h)
            .collect();
        self.problem.residual(self.t, u.as_slice(), &ydot)
    }
}

#[derive(Debug, Clone)]
pub struct DaeIntegrator {
    pub settings: DaeSettings,
    pub newton: NewtonSolver,
}

impl DaeIntegrator {
    pub fn new(settings: DaeSettings) -> Self {
        Self {
            settings,
            newton: NewtonSolver {
                max_iterations: settings.max_newton_iterations,
                ..NewtonSolver::default()
            },
        }
    }

    /// Integrates from `t0` to `t_end` or until an indicator changes sign.
    /// `callback` sees every accepted `(t, y)`.
    pub fn integrate<P, F>(
        &self,
        problem: &P,
        t0: f64,
        y0: DVector<f64>,
        ydot0: DVector<f64>,
        t_end: f64,
        mut callback: F,
    ) -> Result<PhaseOutcome, SolverError>
    where
        P: ImplicitProblem,
        F: FnMut(f64, &DVector<f64>),
    {
        let s = &self.settings;
        let mask = problem.differential_mask();
        let mut stats = IntegratorStats::default();
        let mut trajectory = Trajectory::default();

        let (mut t, mut y, mut ydot) = (t0, y0, ydot0);
        let mut h = s.initial_step.min(s.max_step);
        let mut g_prev = problem.events(t, y.as_slice(), ydot.as_slice());
        let end_slack = 1e-12 * t_end.abs().max(1.0);
        trajectory.push(t, &y);

        while t_end - t > end_slack {
            if stats.accepted_steps >= s.max_steps {
                return Err(SolverError::TooManySteps(stats.accepted_steps));
            }
            h = h.min(t_end - t);
            let t_new = t + h;
            let predicted = &y + &ydot * h;
            let step = EulerStep {
                problem,
                t: t_new,
                h,
                y_prev: &y,
            };
            let weights = s.tolerance.weights(&y, &predicted);

            let solved = match self.newton.solve(&step, predicted.clone(), &weights) {
                Ok(res) => res,
                Err(e) => {
                    stats.newton_failures += 1;
                    warn!("t = {t:.6e} s: step {h:.3e} s rejected ({e}), retrying with {:.3e} s", h * 0.25);
                    h *= 0.25;
                    check_step(t, h, s.min_step)?;
                    continue;
                }
            };
            stats.newton_iterations += solved.iterations as usize;
            let y_new = solved.solution;

            // Local error of BDF1 against the explicit predictor.
            let defect = (&y_new - &predicted) * 0.5;
            let weights = s.tolerance.weights(&y, &y_new);
            let err = weighted_norm(&defect, &weights, Some(mask.as_slice()), ConvergenceMetric::Rms);
            if !err.is_finite() || err > 1.0 {
                stats.error_test_failures += 1;
                let factor = if err.is_finite() { (0.9 / err.sqrt()).max(0.2) } else { 0.2 };
                debug!("t = {t:.6e} s: error test failed (err {err:.3e}), h {h:.3e} -> {:.3e}", h * factor);
                h *= factor;
                check_step(t, h, s.min_step)?;
                continue;
            }

            let ydot_new = (&y_new - &y) / h;
            let g_new = problem.events(t_new, y_new.as_slice(), ydot_new.as_slice());
            stats.accepted_steps += 1;

            if let Some((index, theta)) = first_crossing(&g_prev, &g_new) {
                let t_event = t + theta * h;
                let y_event = &y + (&y_new - &y) * theta;
                let report = EventReport {
                    index,
                    time: t_event,
                    rising: g_new[index] > g_prev[index],
                };
                match problem.handle_event(index, t_event) {
                    EventAction::Terminate => {
                        callback(t_event, &y_event);
                        trajectory.push(t_event, &y_event);
                        return Ok(PhaseOutcome {
                            t: t_event,
                            y: y_event,
                            ydot: ydot_new,
                            stop: StopReason::Event(report),
                            trajectory,
                            stats,
                        });
                    }
                }
            }

            debug!(
                "t = {t_new:.6e} s | h = {h:.3e} s | newton {} | err {err:.3e}",
                solved.iterations
            );
            t = t_new;
            y = y_new;
            ydot = ydot_new;
            g_prev = g_new;
            callback(t, &y);
            if stats.accepted_steps % s.output_every.max(1) == 0 {
                trajectory.push(t, &y);
            }

            let growth = (0.9 / err.max(1e-10).sqrt()).clamp(0.2, 2.0);
            h = (h * growth).min(s.max_step);
        }

        if trajectory.times.last() != Some(&t) {
            trajectory.push(t, &y);
        }
        Ok(PhaseOutcome {
            t,
            y,
            ydot,
            stop: StopReason::EndTime,
            trajectory,
            stats,
        })
    }
}

fn check_step(t: f64, h: f64, h_min: f64) -> Result<(), SolverError> {
    if h < h_min {
        Err(SolverError::StepSizeUnderflow { t, h, h_min })
    } else {
        Ok(())
    }
}

/// Earliest sign change between two indicator vectors, located by linear
/// interpolation. Returns the index and the step fraction in `(0, 1]`.
fn first_crossing(before: &DVector<f64>, after: &DVector<f64>) -> Option<(usize, f64)> {
    before
        .iter()
        .zip(after.iter())
        .enumerate()
        .filter(|(_, (a, b))| (**a > 0.0 && **b <= 0.0) || (**a < 0.0 && **b >= 0.0))
        .map(|(i, (a, b))| (i, a / (a - b)))
        .min_by(|x, y| x.1.total_cmp(&y.1))
}
