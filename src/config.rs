//! Scenario description, read from TOML. Every field has a default; the
//! defaults describe the reference Li-S coin cell.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chemistry::kinetics::KineticParams;
use crate::chemistry::species::SpeciesTable;
use crate::error::ConfigurationError;
use crate::models::lis::scenario::PhaseSpec;
use crate::numerics::dae::DaeSettings;
use crate::physics::events::VoltageWindow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScenarioConfig {
    pub mesh: MeshConfig,
    pub cell: CellConfig,
    pub initial: InitialConfig,
    pub kinetics: KineticParams,
    pub operation: OperationConfig,
    pub solver: DaeSettings,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub anode_nodes: usize,
    pub separator_nodes: usize,
    pub cathode_nodes: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            anode_nodes: 1,
            separator_nodes: 1,
            cathode_nodes: 1,
        }
    }
}

/// Geometry, transport and material data of the cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellConfig {
    /// [m]
    pub cathode_thickness: f64,
    pub separator_thickness: f64,
    pub anode_thickness: f64,
    /// Carbon volume fraction of the cathode.
    pub carbon_fraction: f64,
    pub cathode_tortuosity: f64,
    pub separator_tortuosity: f64,
    pub anode_tortuosity: f64,
    pub separator_porosity: f64,
    /// Volume fraction of lithium in the anode.
    pub anode_solid_fraction: f64,
    /// [m]
    pub anode_particle_diameter: f64,
    /// Fraction of particle surface lost to neighbouring particles.
    pub anode_overlap: f64,
    /// Carbon/electrolyte area per cathode volume before any precipitation [1/m].
    pub carbon_area: f64,
    /// [F/m^2]
    pub cathode_capacitance: f64,
    pub anode_capacitance: f64,
    /// Bulk conductivities of the solid phases [S/m].
    pub cathode_conductivity: f64,
    pub anode_conductivity: f64,
    /// Planar cell area [m^2].
    pub cell_area: f64,
    /// Sulfur loaded into the cathode [kg].
    pub sulfur_mass: f64,
    /// [K]
    pub temperature: f64,
    /// Free carbon area never drops below this fraction of `carbon_area`.
    pub min_carbon_fraction: f64,
}

impl Default for CellConfig {
    fn default() -> Self {
        Self {
            cathode_thickness: 40e-6,
            separator_thickness: 9e-6,
            anode_thickness: 25e-6,
            carbon_fraction: 0.062,
            cathode_tortuosity: 1.6,
            separator_tortuosity: 1.6,
            anode_tortuosity: 1.6,
            separator_porosity: 0.5,
            anode_solid_fraction: 0.6,
            anode_particle_diameter: 5e-6,
            anode_overlap: 0.4,
            carbon_area: 1.32e5,
            cathode_capacitance: 1.5e-2,
            anode_capacitance: 1.5e-2,
            cathode_conductivity: 75.0,
            anode_conductivity: 75.0,
            cell_area: 80e-6,
            sulfur_mass: 1e-6,
            temperature: 298.15,
            min_carbon_fraction: 1e-3,
        }
    }
}

impl CellConfig {
    /// Lithium/electrolyte area per anode volume [1/m].
    pub fn anode_specific_area(&self) -> f64 {
        6.0 * self.anode_solid_fraction * (1.0 - self.anode_overlap) / self.anode_particle_diameter
    }

    pub fn cathode_porosity(&self) -> f64 {
        1.0 - self.carbon_fraction
    }

    pub fn anode_porosity(&self) -> f64 {
        1.0 - self.anode_solid_fraction
    }

    /// Effective electronic conductivities, `sigma eps_solid / tau`.
    pub fn effective_conductivities(&self) -> (f64, f64) {
        (
            self.cathode_conductivity * self.carbon_fraction / self.cathode_tortuosity,
            self.anode_conductivity * self.anode_solid_fraction / self.anode_tortuosity,
        )
    }
}

/// Starting state of the cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialConfig {
    /// [V]
    pub anode_potential: f64,
    pub electrolyte_potential: f64,
    pub cell_voltage: f64,
    pub sulfur_sites: f64,
    pub sulfide_sites: f64,
    /// Li2S volume fraction seeded in the cathode.
    pub sulfide_fraction: f64,
    /// Electrolyte composition [kmol/m^3]. Species left out start empty,
    /// except the counter-ion, which is set for neutrality when absent.
    pub concentrations: BTreeMap<String, f64>,
}

impl Default for InitialConfig {
    fn default() -> Self {
        let concentrations = [
            ("EC(e)", 10.23),
            ("PC(e)", 10.23),
            ("Li+(e)", 1.024),
            ("S8(e)", 1.943e-2),
            ("S8-2(e)", 1.821e-4),
            ("S6-2(e)", 3.314e-4),
            ("S4-2(e)", 2.046e-5),
            ("S2-2(e)", 5.348e-10),
            ("S-2(e)", 8.456e-13),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self {
            anode_potential: 0.0,
            electrolyte_potential: 1.0,
            cell_voltage: 2.3,
            sulfur_sites: 1.0,
            sulfide_sites: 1.0,
            sulfide_fraction: 1e-5,
            concentrations,
        }
    }
}

impl InitialConfig {
    /// Composition in species-table order. A missing `counter_ion` entry is
    /// filled so that `sum z_k C_k = 0`.
    pub fn composition(
        &self,
        species: &SpeciesTable,
        counter_ion: &str,
    ) -> Result<Vec<f64>, ConfigurationError> {
        let mut c = vec![0.0; species.len()];
        for (name, value) in &self.concentrations {
            let k = species.index_of(name)?;
            if !(*value >= 0.0) {
                return Err(ConfigurationError::invalid(
                    "initial.concentrations",
                    format!("`{name}` must be non-negative"),
                ));
            }
            c[k] = *value;
        }
        if !self.concentrations.contains_key(counter_ion) {
            let k = species.index_of(counter_ion)?;
            let z = species.get(k).charge;
            let net: f64 = c.iter().zip(species.charges()).map(|(c, z)| c * z).sum();
            let fill = -net / z;
            if !(fill >= 0.0) {
                return Err(ConfigurationError::invalid(
                    "initial.concentrations",
                    format!("`{counter_ion}` cannot balance a net charge of {net:.3e}"),
                ));
            }
            c[k] = fill;
        }
        Ok(c)
    }
}

/// Current program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationConfig {
    pub c_rate: f64,
    pub cutoffs: VoltageWindow,
    /// Ion that balances double-layer charge in the bulk.
    pub counter_ion: String,
    /// Duration of a rest phase without an explicit one [s].
    pub rest_duration: f64,
    pub phases: Vec<PhaseSpec>,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            c_rate: 0.02,
            cutoffs: VoltageWindow::default(),
            counter_ion: "PF6-(e)".to_string(),
            rest_duration: 1000.0,
            phases: PhaseSpec::default_program(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: String,
    pub write_trajectory: bool,
    pub thermo_scan: Option<ThermoScanConfig>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "output/main".to_string(),
            write_trajectory: true,
            thermo_scan: Some(ThermoScanConfig::default()),
        }
    }
}

/// Concentration sweep of one electrolyte species at the initial state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermoScanConfig {
    pub species: String,
    /// [kmol/m^3]
    pub min: f64,
    pub max: f64,
    pub points: usize,
    pub log_spaced: bool,
}

impl Default for ThermoScanConfig {
    fn default() -> Self {
        Self {
            species: "S-2(e)".to_string(),
            min: 1e-14,
            max: 1e-2,
            points: 25,
            log_spaced: true,
        }
    }
}

impl ThermoScanConfig {
    pub fn values(&self) -> Vec<f64> {
        let n = self.points.max(2);
        (0..n)
            .map(|i| {
                let s = i as f64 / (n - 1) as f64;
                if self.log_spaced {
                    (self.min.ln() + s * (self.max.ln() - self.min.ln())).exp()
                } else {
                    self.min + s * (self.max - self.min)
                }
            })
            .collect()
    }
}

impl ScenarioConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigurationError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let c = &self.cell;
        let positive = [
            ("cell.cathode_thickness", c.cathode_thickness),
            ("cell.separator_thickness", c.separator_thickness),
            ("cell.anode_thickness", c.anode_thickness),
            ("cell.cathode_tortuosity", c.cathode_tortuosity),
            ("cell.separator_tortuosity", c.separator_tortuosity),
            ("cell.anode_tortuosity", c.anode_tortuosity),
            ("cell.anode_particle_diameter", c.anode_particle_diameter),
            ("cell.carbon_area", c.carbon_area),
            ("cell.cell_area", c.cell_area),
            ("cell.sulfur_mass", c.sulfur_mass),
            ("cell.temperature", c.temperature),
            ("operation.c_rate", self.operation.c_rate),
            ("initial.sulfur_sites", self.initial.sulfur_sites),
            ("initial.sulfide_sites", self.initial.sulfide_sites),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(ConfigurationError::invalid(name, format!("must be positive, got {value}")));
            }
        }
        let fractions = [
            ("cell.carbon_fraction", c.carbon_fraction),
            ("cell.separator_porosity", c.separator_porosity),
            ("cell.anode_solid_fraction", c.anode_solid_fraction),
            ("cell.anode_overlap", c.anode_overlap),
            ("cell.min_carbon_fraction", c.min_carbon_fraction),
        ];
        for (name, value) in fractions {
            if !(0.0..1.0).contains(&value) {
                return Err(ConfigurationError::invalid(name, format!("must lie in [0, 1), got {value}")));
            }
        }
        if self.operation.cutoffs.lower >= self.operation.cutoffs.upper {
            return Err(ConfigurationError::invalid(
                "operation.cutoffs",
                "lower cutoff must lie below the upper one",
            ));
        }
        let s = &self.solver;
        if !(s.min_step > 0.0 && s.min_step <= s.initial_step && s.initial_step <= s.max_step) {
            return Err(ConfigurationError::invalid(
                "solver",
                "steps must satisfy 0 < min_step <= initial_step <= max_step",
            ));
        }
        if !(s.tolerance.rtol > 0.0 && s.tolerance.atol > 0.0) {
            return Err(ConfigurationError::invalid("solver.tolerance", "rtol and atol must be positive"));
        }
        for phase in &self.operation.phases {
            if let Some(d) = phase.duration {
                if !(d > 0.0) {
                    return Err(ConfigurationError::invalid("operation.phases", "durations must be positive"));
                }
            }
        }
        if let Some(scan) = &self.output.thermo_scan {
            if (scan.log_spaced && !(scan.min > 0.0)) || !(scan.max > scan.min) {
                return Err(ConfigurationError::invalid(
                    "output.thermo_scan",
                    "range must be increasing (and positive when log spaced)",
                ));
            }
        }
        Ok(())
    }
}
