//! Constant-current program: rest, discharge and charge phases run back to
//! back, each from where the previous one stopped.

use log::{debug, info, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::cell::{build_cell, LiSCell};
use crate::chemistry::kinetics::LiSKinetics;
use crate::config::ScenarioConfig;
use crate::error::SimulationError;
use crate::numerics::dae::{DaeIntegrator, IntegratorStats, PhaseOutcome, StopReason};
use crate::physics::diagnostics::{carbon_area_report, reducible_charge, ChargeLedger};
use crate::physics::events::{event_slots, EventKind, EventMonitor};
use crate::physics::residual::CellModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Rest,
    Discharge,
    Charge,
}

impl PhaseKind {
    /// Sign of the applied current.
    pub fn direction(&self) -> f64 {
        match self {
            PhaseKind::Rest => 0.0,
            PhaseKind::Discharge => 1.0,
            PhaseKind::Charge => -1.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PhaseKind::Rest => "rest",
            PhaseKind::Discharge => "discharge",
            PhaseKind::Charge => "charge",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub kind: PhaseKind,
    /// [s]; rest phases default to the configured rest time, current phases
    /// to `3600 / C-rate`.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Conditions that may end the phase. Everything but sulfur depletion
    /// when left out.
    #[serde(default)]
    pub monitor: Option<Vec<EventKind>>,
}

impl PhaseSpec {
    pub fn new(kind: PhaseKind) -> Self {
        Self {
            kind,
            duration: None,
            monitor: None,
        }
    }

    pub fn default_program() -> Vec<Self> {
        vec![
            PhaseSpec::new(PhaseKind::Rest),
            PhaseSpec::new(PhaseKind::Discharge),
            PhaseSpec::new(PhaseKind::Charge),
        ]
    }

    pub fn event_monitor(&self) -> EventMonitor {
        match &self.monitor {
            Some(kinds) => EventMonitor::only(kinds),
            None => EventMonitor::all().without(EventKind::SulfurDepletion),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhaseResult {
    pub kind: PhaseKind,
    /// [A/m^2], positive on discharge.
    pub current: f64,
    pub start: f64,
    pub start_voltage: f64,
    pub end_voltage: f64,
    pub outcome: PhaseOutcome,
    pub ledger: ChargeLedger,
    /// A node ran out of free carbon area during the phase.
    pub carbon_clamped: bool,
    /// Human-readable stop reason.
    pub stop_label: String,
}

impl PhaseResult {
    pub fn duration(&self) -> f64 {
        self.outcome.t - self.start
    }

    /// Charge passed [A h/m^2].
    pub fn capacity(&self) -> f64 {
        self.current.abs() * self.duration() / 3600.0
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioRun {
    /// Charge needed to reduce all sulfur to S^2- [C/m^2].
    pub theoretical_capacity: f64,
    /// Current magnitude of the current phases [A/m^2].
    pub current: f64,
    pub phases: Vec<PhaseResult>,
}

impl ScenarioRun {
    pub fn stats(&self) -> IntegratorStats {
        let mut total = IntegratorStats::default();
        for p in &self.phases {
            total.merge(&p.outcome.stats);
        }
        total
    }
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub cell: LiSCell,
    pub phases: Vec<PhaseSpec>,
    pub c_rate: f64,
    pub rest_duration: f64,
    pub integrator: DaeIntegrator,
}

impl Scenario {
    pub fn from_config(config: &ScenarioConfig) -> Result<Self, SimulationError> {
        Ok(Self {
            cell: build_cell(config)?,
            phases: config.operation.phases.clone(),
            c_rate: config.operation.c_rate,
            rest_duration: config.operation.rest_duration,
            integrator: DaeIntegrator::new(config.solver),
        })
    }

    pub fn theoretical_capacity(&self) -> f64 {
        reducible_charge(&self.cell.model, self.cell.initial_state.as_slice())
    }

    /// `C-rate * Q / 1 h` [A/m^2].
    pub fn current_amplitude(&self) -> f64 {
        self.c_rate * self.theoretical_capacity() / 3600.0
    }

    fn phase_duration(&self, spec: &PhaseSpec) -> f64 {
        spec.duration.unwrap_or(match spec.kind {
            PhaseKind::Rest => self.rest_duration,
            _ => 3600.0 / self.c_rate,
        })
    }

    /// The cell as seen by one phase: its current and its stop conditions.
    pub fn phase_model(&self, spec: &PhaseSpec) -> CellModel<LiSKinetics> {
        let mut model = self
            .cell
            .model
            .clone()
            .with_current(spec.kind.direction() * self.current_amplitude());
        model.monitor = spec.event_monitor();
        model
    }

    pub fn run_phase(
        &self,
        spec: &PhaseSpec,
        t0: f64,
        y0: &DVector<f64>,
        ydot0: &DVector<f64>,
    ) -> Result<PhaseResult, SimulationError> {
        let model = self.phase_model(spec);
        let current = model.external_current;
        let duration = self.phase_duration(spec);
        let start_voltage = model.cell_voltage(y0.as_slice());
        info!(
            "{} phase: i = {current:.4e} A/m^2 for up to {duration:.1} s, starting at {start_voltage:.4} V",
            spec.kind.name()
        );

        let mut carbon_clamped = false;
        let outcome = self
            .integrator
            .integrate(&model, t0, y0.clone(), ydot0.clone(), t0 + duration, |t, y| {
                let ledger = ChargeLedger::new(&model, y0.as_slice(), y.as_slice(), current * (t - t0));
                debug!(
                    "  t = {t:.2} s | V = {:.5} V | Q_ext {:.4e} | Q_far {:.4e} | Q_dl {:.4e} C/m^2",
                    model.cell_voltage(y.as_slice()),
                    ledger.external,
                    ledger.faradaic,
                    ledger.double_layer
                );
                if !carbon_clamped {
                    if let Some(r) = carbon_area_report(&model, y.as_slice()).iter().find(|r| r.clamped) {
                        warn!("carbon area of cathode node {} clamped at {:.3e} 1/m (t = {t:.1} s)", r.node, r.area);
                        carbon_clamped = true;
                    }
                }
            })
            .map_err(|source| SimulationError::Solver {
                phase: spec.kind.name().to_string(),
                time: t0,
                source,
            })?;

        let end_voltage = model.cell_voltage(outcome.y.as_slice());
        let ledger = ChargeLedger::new(
            &model,
            y0.as_slice(),
            outcome.y.as_slice(),
            current * (outcome.t - t0),
        );
        let stop_label = match outcome.stop {
            StopReason::EndTime => "end time".to_string(),
            StopReason::Event(report) => event_slots(&model)
                .get(report.index)
                .map_or_else(|| format!("event #{}", report.index), |slot| slot.to_string()),
        };
        info!(
            "{} phase ended after {:.1} s ({stop_label}) at {end_voltage:.4} V, {} steps",
            spec.kind.name(),
            outcome.t - t0,
            outcome.stats.accepted_steps
        );

        Ok(PhaseResult {
            kind: spec.kind,
            current,
            start: t0,
            start_voltage,
            end_voltage,
            outcome,
            ledger,
            carbon_clamped,
            stop_label,
        })
    }

    pub fn run(&self) -> Result<ScenarioRun, SimulationError> {
        let q = self.theoretical_capacity();
        info!(
            "theoretical capacity {:.4e} C/m^2, C/{:.0} current {:.4e} A/m^2",
            q,
            1.0 / self.c_rate,
            self.current_amplitude()
        );

        let mut t = 0.0;
        let mut y = self.cell.initial_state.clone();
        let mut ydot = DVector::zeros(y.len());
        let mut phases = Vec::with_capacity(self.phases.len());
        for spec in &self.phases {
            let result = self.run_phase(spec, t, &y, &ydot)?;
            t = result.outcome.t;
            y = result.outcome.y.clone();
            ydot = result.outcome.ydot.clone();
            phases.push(result);
        }
        Ok(ScenarioRun {
            theoretical_capacity: q,
            current: self.current_amplitude(),
            phases,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_monitor_leaves_sulfur_depletion_out() {
        let m = PhaseSpec::new(PhaseKind::Discharge).event_monitor();
        assert!(!m.contains(EventKind::SulfurDepletion));
        assert!(m.contains(EventKind::LowerCutoff));
        let only = PhaseSpec {
            monitor: Some(vec![EventKind::UpperCutoff]),
            ..PhaseSpec::new(PhaseKind::Charge)
        };
        assert!(!only.event_monitor().contains(EventKind::LowerCutoff));
    }

    #[test]
    fn current_follows_c_rate() {
        let scenario = Scenario::from_config(&ScenarioConfig::default()).unwrap();
        let q = scenario.theoretical_capacity();
        // 1 mg of S8 over 80 mm^2 holds about 7.5e4 C/m^2, plus the dissolved sulfur.
        assert!(q > 7.4e4 && q < 7.9e4, "Q = {q}");
        assert!((scenario.current_amplitude() - 0.02 * q / 3600.0).abs() < 1e-12);

        let discharge = scenario.phase_model(&PhaseSpec::new(PhaseKind::Discharge));
        let charge = scenario.phase_model(&PhaseSpec::new(PhaseKind::Charge));
        assert!(discharge.external_current > 0.0);
        assert_eq!(charge.external_current, -discharge.external_current);
        assert_eq!(scenario.phase_duration(&PhaseSpec::new(PhaseKind::Charge)), 180_000.0);
    }
}
