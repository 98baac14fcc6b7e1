use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::models::lis::scenario::ScenarioRun;
use crate::numerics::dae::IntegratorStats;

/// One row of the phase table.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSummary {
    pub name: &'static str,
    /// [A/m^2]
    pub current: f64,
    /// [s]
    pub duration: f64,
    pub stop: String,
    pub steps: usize,
    pub start_voltage: f64,
    pub end_voltage: f64,
    /// [A h/m^2]
    pub capacity: f64,
    /// External charge minus faradaic and double-layer charge [C/m^2].
    pub charge_imbalance: f64,
    pub carbon_clamped: bool,
}

pub struct SimulationSummary {
    // Cell
    pub unknowns: usize,
    pub nodes: (usize, usize, usize),
    pub sulfur_mass: f64,
    pub cell_area: f64,

    // Operation
    pub theoretical_capacity: f64,
    pub current: f64,
    pub phases: Vec<PhaseSummary>,
    pub stats: IntegratorStats,
}

impl SimulationSummary {
    pub fn from_run(run: &ScenarioRun, unknowns: usize, nodes: (usize, usize, usize), sulfur_mass: f64, cell_area: f64) -> Self {
        let phases = run
            .phases
            .iter()
            .map(|p| PhaseSummary {
                name: p.kind.name(),
                current: p.current,
                duration: p.duration(),
                stop: p.stop_label.clone(),
                steps: p.outcome.stats.accepted_steps,
                start_voltage: p.start_voltage,
                end_voltage: p.end_voltage,
                capacity: p.capacity(),
                charge_imbalance: p.ledger.imbalance(),
                carbon_clamped: p.carbon_clamped,
            })
            .collect();
        Self {
            unknowns,
            nodes,
            sulfur_mass,
            cell_area,
            theoretical_capacity: run.theoretical_capacity,
            current: run.current,
            phases,
            stats: run.stats(),
        }
    }

    /// Capacity per mass of sulfur [mA h/g].
    pub fn specific_capacity(&self, capacity: f64) -> f64 {
        capacity * self.cell_area / self.sulfur_mass
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;

        writeln!(file, "{}", "=".repeat(60))?;
        writeln!(file, "LI-S CELL SIMULATION SUMMARY")?;
        writeln!(file, "{}", "=".repeat(60))?;
        writeln!(file)?;

        writeln!(file, "CELL")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(file, "Unknowns:            {}", self.unknowns)?;
        writeln!(
            file,
            "Nodes (an/sep/cat):  {}/{}/{}",
            self.nodes.0, self.nodes.1, self.nodes.2
        )?;
        writeln!(file, "Sulfur mass:         {:.4e} kg", self.sulfur_mass)?;
        writeln!(file, "Cell area:           {:.4e} m^2", self.cell_area)?;
        writeln!(
            file,
            "Theoretical charge:  {:.6e} C/m^2 ({:.2} mAh/g)",
            self.theoretical_capacity,
            self.specific_capacity(self.theoretical_capacity / 3600.0)
        )?;
        writeln!(file, "Current amplitude:   {:.6e} A/m^2", self.current)?;
        writeln!(file)?;

        for p in &self.phases {
            writeln!(file, "PHASE: {}", p.name.to_uppercase())?;
            writeln!(file, "{}", "-".repeat(60))?;
            writeln!(file, "Current:             {:.6e} A/m^2", p.current)?;
            writeln!(file, "Duration:            {:.3} s", p.duration)?;
            writeln!(file, "Stopped by:          {}", p.stop)?;
            writeln!(file, "Accepted steps:      {}", p.steps)?;
            writeln!(
                file,
                "Voltage:             {:.5} V -> {:.5} V",
                p.start_voltage, p.end_voltage
            )?;
            writeln!(
                file,
                "Capacity:            {:.6e} Ah/m^2 ({:.2} mAh/g)",
                p.capacity,
                self.specific_capacity(p.capacity)
            )?;
            writeln!(file, "Charge imbalance:    {:.3e} C/m^2", p.charge_imbalance)?;
            if p.carbon_clamped {
                writeln!(file, "Free carbon area was clamped during this phase")?;
            }
            writeln!(file)?;
        }

        writeln!(file, "SOLVER PERFORMANCE")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(file, "Accepted steps:      {}", self.stats.accepted_steps)?;
        writeln!(file, "Error test failures: {}", self.stats.error_test_failures)?;
        writeln!(file, "Newton failures:     {}", self.stats.newton_failures)?;
        writeln!(file, "Newton iterations:   {}", self.stats.newton_iterations)?;
        writeln!(file)?;

        writeln!(file, "{}", "=".repeat(60))?;

        Ok(())
    }

    pub fn print_to_console(&self) {
        println!("\n{}", "=".repeat(60));
        println!("SIMULATION SUMMARY");
        println!("{}", "=".repeat(60));
        println!(
            "{:<10} {:>10} {:>9} {:>9} {:>10}  {}",
            "phase", "time [s]", "V_0", "V_end", "mAh/g", "stop"
        );
        for p in &self.phases {
            println!(
                "{:<10} {:>10.1} {:>9.4} {:>9.4} {:>10.2}  {}",
                p.name,
                p.duration,
                p.start_voltage,
                p.end_voltage,
                self.specific_capacity(p.capacity),
                p.stop
            );
        }
        println!(
            "Steps:         {} accepted, {} rejected",
            self.stats.accepted_steps,
            self.stats.error_test_failures + self.stats.newton_failures
        );
        println!("{}\n", "=".repeat(60));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specific_capacity_in_mah_per_gram() {
        let summary = SimulationSummary {
            unknowns: 39,
            nodes: (1, 1, 1),
            sulfur_mass: 1e-6,
            cell_area: 80e-6,
            theoretical_capacity: 0.0,
            current: 0.0,
            phases: Vec::new(),
            stats: IntegratorStats::default(),
        };
        // 1 Ah/m^2 over 80 mm^2 is 80 uAh, from 1 mg of sulfur: 80 mAh/g.
        assert!((summary.specific_capacity(1.0) - 80.0).abs() < 1e-9);
    }
}
