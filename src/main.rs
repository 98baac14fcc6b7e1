use std::env;
use std::error::Error;
use std::fs;
use std::path::Path;

use lisdae_rs::chemistry::ChemistryProvider;
use lisdae_rs::config::ScenarioConfig;
use lisdae_rs::discretization::domain::DomainKind;
use lisdae_rs::models::lis::scenario::{Scenario, ScenarioRun};
use lisdae_rs::physics::diagnostics::{electroneutrality, sulfur_inventory};
use lisdae_rs::processing::csv_writer;
use lisdae_rs::processing::labels::label_columns;
use lisdae_rs::processing::summary::SimulationSummary;
use lisdae_rs::processing::thermo_scan::{thermo_scan, write_thermo_scan, ScanConditions};
use log::info;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match env::args().nth(1) {
        Some(path) => {
            info!("reading scenario from {path}");
            ScenarioConfig::from_toml_file(&path)?
        }
        None => ScenarioConfig::default(),
    };
    let out_dir = Path::new(&config.output.directory);
    fs::create_dir_all(out_dir)?;

    let scenario = Scenario::from_config(&config)?;
    report_initial_state(&scenario);

    if let Some(scan_config) = &config.output.thermo_scan {
        let init = &config.initial;
        let conditions = ScanConditions {
            cathode_potential: init.anode_potential + init.cell_voltage,
            anode_potential: init.anode_potential,
            electrolyte_potential: init.electrolyte_potential,
            temperature: config.cell.temperature,
        };
        let scan = thermo_scan(
            &scenario.cell.model.chemistry,
            &scenario.cell.composition,
            &scan_config.species,
            &scan_config.values(),
            &conditions,
        )?;
        let path = out_dir.join("thermo_scan.csv");
        write_thermo_scan(&path, &scan)?;
        println!("Thermodynamic scan saved to {}", path.display());
    }

    let run = scenario.run()?;

    if config.output.write_trajectory {
        save_trajectory(&scenario, &run, out_dir)?;
    }
    save_voltage(&scenario, &run, out_dir)?;

    let model = &scenario.cell.model;
    let nodes = |kind| model.layout.domain(kind).nodes();
    let summary = SimulationSummary::from_run(
        &run,
        model.layout.total_size(),
        (nodes(DomainKind::Anode), nodes(DomainKind::Separator), nodes(DomainKind::Cathode)),
        config.cell.sulfur_mass,
        config.cell.cell_area,
    );
    let summary_path = out_dir.join("simulation_summary.txt");
    summary.write_to_file(&summary_path)?;
    summary.print_to_console();
    println!("Summary saved to {}", summary_path.display());
    Ok(())
}

fn report_initial_state(scenario: &Scenario) {
    let model = &scenario.cell.model;
    let y0 = scenario.cell.initial_state.as_slice();
    let charge = electroneutrality(model, y0);
    let sulfur = sulfur_inventory(model, y0);
    println!("Initial state:");
    println!("  Cell voltage:        {:.4} V", model.cell_voltage(y0));
    println!(
        "  Max |sum z_k C_k|:   {:.3e} kmol/m^3",
        charge.iter().fold(0.0f64, |m, c| m.max(c.abs()))
    );
    println!("  Sulfur inventory:    {:.6e} kmol/m^2", sulfur.iter().sum::<f64>());
    println!("  Theoretical charge:  {:.6e} C/m^2", scenario.theoretical_capacity());
    println!();
}

fn save_trajectory(scenario: &Scenario, run: &ScenarioRun, out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let model = &scenario.cell.model;
    let labels = label_columns(&model.layout, model.chemistry.species());
    for (i, phase) in run.phases.iter().enumerate() {
        let traj = &phase.outcome.trajectory;
        let voltage: Vec<f64> = traj.states.iter().map(|y| model.cell_voltage(y.as_slice())).collect();
        let path = out_dir.join(format!("phase{}_{}.csv", i, phase.kind.name()));
        csv_writer::write_trajectory(&path, &labels, &[("V_cell", voltage)], &traj.times, &traj.states)?;
        println!("Trajectory saved to {}", path.display());
    }
    Ok(())
}

fn save_voltage(scenario: &Scenario, run: &ScenarioRun, out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let model = &scenario.cell.model;
    let (mut t, mut v) = (Vec::new(), Vec::new());
    for phase in &run.phases {
        let traj = &phase.outcome.trajectory;
        t.extend_from_slice(&traj.times);
        v.extend(traj.states.iter().map(|y| model.cell_voltage(y.as_slice())));
    }
    let path = out_dir.join("voltage.csv");
    csv_writer::write_xy(&path, "t", "V_cell", &t, &v)?;
    println!("Voltage curve saved to {}", path.display());
    Ok(())
}
