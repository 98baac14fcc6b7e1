use log::info;
use nalgebra::DVector;

use super::initial::{initial_state, sulfur_fraction, InitialFill};
use crate::chemistry::kinetics::LiSKinetics;
use crate::chemistry::species::SpeciesTable;
use crate::chemistry::{ChemistryProvider, SolidPhase};
use crate::config::ScenarioConfig;
use crate::discretization::domain::{DomainDescriptor, DomainGeometry, DomainKind, DomainSet};
use crate::discretization::layout::{build_layout, LayoutConfig};
use crate::error::ConfigurationError;
use crate::physics::residual::{CellModel, CellParams};

/// A discretized cell with its chemically balanced starting state.
#[derive(Debug, Clone)]
pub struct LiSCell {
    pub model: CellModel<LiSKinetics>,
    pub initial_state: DVector<f64>,
    /// Electrolyte composition the kinetics were tuned to [kmol/m^3].
    pub composition: Vec<f64>,
}

pub fn build_cell(config: &ScenarioConfig) -> Result<LiSCell, ConfigurationError> {
    config.validate()?;
    let species = SpeciesTable::lithium_sulfur();
    let layout = build_layout(
        &LayoutConfig {
            anode_nodes: config.mesh.anode_nodes,
            separator_nodes: config.mesh.separator_nodes,
            cathode_nodes: config.mesh.cathode_nodes,
            species: species.len(),
        },
        species.len(),
    )?;

    let cell = &config.cell;
    let (sigma_cat, sigma_an) = cell.effective_conductivities();
    let geometry = |kind: DomainKind| match kind {
        DomainKind::Cathode => DomainGeometry {
            thickness: cell.cathode_thickness,
            base_porosity: cell.cathode_porosity(),
            tortuosity: cell.cathode_tortuosity,
            double_layer_capacitance: cell.cathode_capacitance,
            conductivity: sigma_cat,
            specific_area: cell.carbon_area,
        },
        // The separator carries ions only.
        DomainKind::Separator => DomainGeometry {
            thickness: cell.separator_thickness,
            base_porosity: cell.separator_porosity,
            tortuosity: cell.separator_tortuosity,
            double_layer_capacitance: 0.0,
            conductivity: 0.0,
            specific_area: 0.0,
        },
        DomainKind::Anode => DomainGeometry {
            thickness: cell.anode_thickness,
            base_porosity: cell.anode_porosity(),
            tortuosity: cell.anode_tortuosity,
            double_layer_capacitance: cell.anode_capacitance,
            conductivity: sigma_an,
            specific_area: cell.anode_specific_area(),
        },
    };
    let domain = |kind| DomainDescriptor::new(kind, geometry(kind), &species, &layout);
    let domains = DomainSet {
        anode: domain(DomainKind::Anode),
        separator: domain(DomainKind::Separator),
        cathode: domain(DomainKind::Cathode),
    };

    let init = &config.initial;
    let composition = init.composition(&species, &config.operation.counter_ion)?;
    let cathode_potential = init.anode_potential + init.cell_voltage;
    let electrolyte = init.electrolyte_potential;

    let mut chemistry = LiSKinetics::new(species, &config.kinetics)?;
    chemistry.tune_to(
        &composition,
        cathode_potential - electrolyte,
        init.anode_potential - electrolyte,
        cell.temperature,
    )?;

    let eps_s = sulfur_fraction(
        cell.sulfur_mass,
        chemistry.molar_volume(SolidPhase::Sulfur),
        cell.cathode_thickness,
        cell.cell_area,
    );
    if eps_s + init.sulfide_fraction >= cell.cathode_porosity() {
        return Err(ConfigurationError::invalid(
            "cell.sulfur_mass",
            format!(
                "solids take {:.3} of a cathode with porosity {:.3}",
                eps_s + init.sulfide_fraction,
                cell.cathode_porosity()
            ),
        ));
    }

    let params = CellParams {
        temperature: cell.temperature,
        cell_area: cell.cell_area,
        min_carbon_fraction: cell.min_carbon_fraction,
        counter_ion: config.operation.counter_ion.clone(),
        cutoffs: config.operation.cutoffs,
        ground_potential: init.anode_potential,
    };
    let model = CellModel::new(layout, domains, chemistry, params)?;

    let initial_state = initial_state(
        &model,
        &InitialFill {
            composition: &composition,
            cathode_potential,
            anode_potential: init.anode_potential,
            electrolyte_potential: electrolyte,
            sulfur_fraction: eps_s,
            sulfide_fraction: init.sulfide_fraction,
            sulfur_sites: init.sulfur_sites,
            sulfide_sites: init.sulfide_sites,
        },
    );

    info!(
        "cell: {} unknowns, {} nodes, eps_S8 = {:.4}, A_Li = {:.3e} 1/m",
        model.layout.total_size(),
        model.mesh.cells.len(),
        eps_s,
        model.domains.anode.specific_area
    );

    Ok(LiSCell {
        model,
        initial_state,
        composition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::layout::Quantity;

    #[test]
    fn reference_cell_starts_at_open_circuit() {
        let cell = build_cell(&ScenarioConfig::default()).unwrap();
        let y = cell.initial_state.as_slice();
        assert_eq!(y.len(), 39);
        assert!((cell.model.cell_voltage(y) - 2.3).abs() < 1e-12);

        let layout = &cell.model.layout;
        let dl = layout.index(DomainKind::Cathode, 0, Quantity::DoubleLayerPotential).unwrap();
        let an_dl = layout.index(DomainKind::Anode, 0, Quantity::DoubleLayerPotential).unwrap();
        assert!((y[dl] - 1.3).abs() < 1e-12);
        assert!((y[an_dl] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn overloaded_cathode_is_rejected() {
        let mut config = ScenarioConfig::default();
        config.cell.sulfur_mass = 1e-5;
        assert!(matches!(
            build_cell(&config),
            Err(ConfigurationError::InvalidParameter { name: "cell.sulfur_mass", .. })
        ));
    }
}
