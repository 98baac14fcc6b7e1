//! Sweep of one electrolyte concentration at fixed potentials, tabulating
//! reaction Gibbs energies and net interface rates.

use std::io;
use std::path::Path;

use super::csv_writer::write_csv;
use crate::chemistry::{ChemistryProvider, Interface, PhaseState};
use crate::error::ConfigurationError;

/// Potentials and temperature the sweep is evaluated at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanConditions {
    pub cathode_potential: f64,
    pub anode_potential: f64,
    pub electrolyte_potential: f64,
    pub temperature: f64,
}

/// Everything evaluated on one interface at one concentration.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceScan {
    /// Per reaction [J/kmol].
    pub delta_gibbs: Vec<f64>,
    /// [kmol/m^2/s]
    pub electron_rate: f64,
    pub solid_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanPoint {
    pub concentration: f64,
    /// In `Interface::ALL` order.
    pub interfaces: Vec<InterfaceScan>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThermoScan {
    pub species: String,
    pub points: Vec<ScanPoint>,
}

pub fn thermo_scan<C: ChemistryProvider>(
    chemistry: &C,
    base: &[f64],
    species: &str,
    values: &[f64],
    conditions: &ScanConditions,
) -> Result<ThermoScan, ConfigurationError> {
    let k = chemistry.species().index_of(species)?;
    if base.len() != chemistry.species().len() {
        return Err(ConfigurationError::SpeciesCountMismatch {
            expected: chemistry.species().len(),
            found: base.len(),
        });
    }

    let mut c = base.to_vec();
    let points = values
        .iter()
        .map(|&value| {
            c[k] = value;
            let interfaces = Interface::ALL
                .iter()
                .map(|&interface| {
                    let electrode = match interface {
                        Interface::Lithium => conditions.anode_potential,
                        _ => conditions.cathode_potential,
                    };
                    let state = PhaseState {
                        concentrations: &c,
                        electrode_potential: electrode,
                        electrolyte_potential: conditions.electrolyte_potential,
                        temperature: conditions.temperature,
                    };
                    let rates = chemistry.production_rates(interface, &state);
                    InterfaceScan {
                        delta_gibbs: chemistry.delta_gibbs(interface, &state),
                        electron_rate: rates.electron,
                        solid_rate: rates.solid,
                    }
                })
                .collect();
            ScanPoint {
                concentration: value,
                interfaces,
            }
        })
        .collect();

    Ok(ThermoScan {
        species: species.to_string(),
        points,
    })
}

pub fn write_thermo_scan<P: AsRef<Path>>(path: P, scan: &ThermoScan) -> io::Result<()> {
    let Some(first) = scan.points.first() else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty scan"));
    };

    let mut headers = vec![format!("C[{}]", scan.species)];
    for (interface, entry) in Interface::ALL.iter().zip(&first.interfaces) {
        let name = interface.name();
        headers.extend((0..entry.delta_gibbs.len()).map(|j| format!("{name}.dG[{j}]")));
        headers.push(format!("{name}.r_electron"));
        headers.push(format!("{name}.r_solid"));
    }

    let mut columns = vec![Vec::with_capacity(scan.points.len()); headers.len()];
    for point in &scan.points {
        let row = std::iter::once(point.concentration).chain(point.interfaces.iter().flat_map(|e| {
            e.delta_gibbs
                .iter()
                .copied()
                .chain([e.electron_rate, e.solid_rate])
        }));
        for (col, v) in columns.iter_mut().zip(row) {
            col.push(v);
        }
    }
    write_csv(path, headers.as_slice(), &columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chemistry::kinetics::{KineticParams, LiSKinetics};
    use crate::chemistry::species::SpeciesTable;

    fn reference() -> Vec<f64> {
        vec![
            10.23, 10.23, 1.024, 1.0228, 1.943e-2, 1.821e-4, 3.314e-4, 2.046e-5, 5.348e-10, 8.456e-13,
        ]
    }

    #[test]
    fn sulfide_sweep_crosses_saturation_at_reference() {
        let c = reference();
        let mut chem = LiSKinetics::new(SpeciesTable::lithium_sulfur(), &KineticParams::default()).unwrap();
        chem.tune_to(&c, 1.3, -1.0, 298.15).unwrap();
        let conditions = ScanConditions {
            cathode_potential: 2.3,
            anode_potential: 0.0,
            electrolyte_potential: 1.0,
            temperature: 298.15,
        };
        let values = [c[9] * 0.1, c[9], c[9] * 10.0];
        let scan = thermo_scan(&chem, &c, "S-2(e)", &values, &conditions).unwrap();

        let li2s = Interface::ALL
            .iter()
            .position(|i| *i == Interface::LithiumSulfide)
            .unwrap();
        let dg: Vec<f64> = scan.points.iter().map(|p| p.interfaces[li2s].delta_gibbs[0]).collect();
        assert!(dg[0] < 0.0 && dg[1].abs() < 1e-3 && dg[2] > 0.0, "dG = {dg:?}");
        // Dilute sulfide dissolves the solid, concentrated sulfide precipitates it.
        assert!(scan.points[0].interfaces[li2s].solid_rate < 0.0);
        assert!(scan.points[2].interfaces[li2s].solid_rate > 0.0);
    }

    #[test]
    fn unknown_species_fails() {
        let chem = LiSKinetics::new(SpeciesTable::lithium_sulfur(), &KineticParams::default()).unwrap();
        let conditions = ScanConditions {
            cathode_potential: 2.3,
            anode_potential: 0.0,
            electrolyte_potential: 1.0,
            temperature: 298.15,
        };
        assert!(matches!(
            thermo_scan(&chem, &reference(), "S3-(e)", &[1.0], &conditions),
            Err(ConfigurationError::UnknownSpecies(_))
        ));
    }
}
