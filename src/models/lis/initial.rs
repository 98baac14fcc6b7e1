use nalgebra::DVector;

use crate::chemistry::ChemistryProvider;
use crate::discretization::domain::DomainKind;
use crate::discretization::layout::Quantity;
use crate::physics::residual::CellModel;

/// Molar mass of S8 [kg/kmol].
pub const S8_MOLAR_MASS: f64 = 256.52;

/// Uniform starting values per domain.
#[derive(Debug, Clone)]
pub struct InitialFill<'a> {
    /// Electrolyte composition, same in every node [kmol/m^3].
    pub composition: &'a [f64],
    pub cathode_potential: f64,
    pub anode_potential: f64,
    pub electrolyte_potential: f64,
    pub sulfur_fraction: f64,
    pub sulfide_fraction: f64,
    pub sulfur_sites: f64,
    pub sulfide_sites: f64,
}

/// Volume fraction taken by `mass` kg of S8 spread over the cathode.
pub fn sulfur_fraction(mass: f64, molar_volume: f64, thickness: f64, cell_area: f64) -> f64 {
    mass / S8_MOLAR_MASS * molar_volume / (thickness * cell_area)
}

pub fn initial_state<C: ChemistryProvider>(model: &CellModel<C>, fill: &InitialFill) -> DVector<f64> {
    let n_species = model.layout.n_species();
    let mut y = DVector::zeros(model.layout.total_size());
    for cell in &model.mesh.cells {
        let phi_ed = match cell.domain {
            DomainKind::Cathode => fill.cathode_potential,
            DomainKind::Anode => fill.anode_potential,
            DomainKind::Separator => fill.electrolyte_potential,
        };
        let values = [
            (Quantity::ElectrodePotential, phi_ed),
            (Quantity::DoubleLayerPotential, phi_ed - fill.electrolyte_potential),
            (Quantity::ElectrolytePotential, fill.electrolyte_potential),
            (Quantity::SulfurFraction, fill.sulfur_fraction),
            (Quantity::SulfideFraction, fill.sulfide_fraction),
            (Quantity::SulfurSites, fill.sulfur_sites),
            (Quantity::SulfideSites, fill.sulfide_sites),
        ];
        for (q, v) in values {
            if let Some(i) = model.index(cell, q) {
                y[i] = v;
            }
        }
        let start = model.layout.species_index(cell.domain, cell.node, 0);
        y.as_mut_slice()[start..start + n_species].copy_from_slice(fill.composition);
    }
    y
}
