//! Consistency checks on a state: charge neutrality, sulfur inventory,
//! carbon coverage and a charge ledger for a running phase.

use nalgebra::DVector;

use super::morphology::{carbon_area, particle_area, particle_radius};
use super::residual::CellModel;
use super::{ImplicitProblem, FARADAY};
use crate::chemistry::{ChemistryProvider, SolidPhase};
use crate::discretization::domain::DomainKind;
use crate::discretization::layout::Quantity;
use crate::discretization::mesh::Cell;

/// Electrons needed to reduce one S8 molecule to eight S^2-.
const ELECTRONS_PER_S8: f64 = 16.0;

fn scalar<C: ChemistryProvider>(model: &CellModel<C>, cell: &Cell, q: Quantity, y: &[f64]) -> f64 {
    model.index(cell, q).map_or(0.0, |i| y[i])
}

fn concentrations<'a, C: ChemistryProvider>(model: &CellModel<C>, cell: &Cell, y: &'a [f64]) -> &'a [f64] {
    let start = model.layout.species_index(cell.domain, cell.node, 0);
    &y[start..start + model.layout.n_species()]
}

/// `sum z_k C_k` for every cell, in physical order [kmol/m^3].
pub fn electroneutrality<C: ChemistryProvider>(model: &CellModel<C>, y: &[f64]) -> Vec<f64> {
    let z = model.chemistry.species().charges();
    model
        .mesh
        .cells
        .iter()
        .map(|cell| concentrations(model, cell, y).iter().zip(&z).map(|(c, z)| c * z).sum())
        .collect()
}

/// Sulfur held by each cell, solid and dissolved, per unit cell area [kmol/m^2].
pub fn sulfur_inventory<C: ChemistryProvider>(model: &CellModel<C>, y: &[f64]) -> Vec<f64> {
    let species = model.chemistry.species();
    let v_s = model.chemistry.molar_volume(SolidPhase::Sulfur);
    let v_l = model.chemistry.molar_volume(SolidPhase::LithiumSulfide);
    model
        .mesh
        .cells
        .iter()
        .map(|cell| {
            let solid = 8.0 * scalar(model, cell, Quantity::SulfurFraction, y) / v_s
                + scalar(model, cell, Quantity::SulfideFraction, y) / v_l;
            let dissolved: f64 = concentrations(model, cell, y)
                .iter()
                .zip(species.records())
                .map(|(c, s)| c * s.sulfur_atoms as f64)
                .sum();
            (solid + model.porosity(cell, y) * dissolved) * cell.dy
        })
        .collect()
}

/// Charge needed to bring every sulfur atom in the cell down to S^2- [C/m^2].
pub fn reducible_charge<C: ChemistryProvider>(model: &CellModel<C>, y: &[f64]) -> f64 {
    let species = model.chemistry.species();
    let v_s = model.chemistry.molar_volume(SolidPhase::Sulfur);
    model
        .mesh
        .cells
        .iter()
        .map(|cell| {
            let solid = ELECTRONS_PER_S8 * scalar(model, cell, Quantity::SulfurFraction, y) / v_s;
            let dissolved: f64 = concentrations(model, cell, y)
                .iter()
                .zip(species.records())
                .map(|(c, s)| c * s.electrons_to_sulfide())
                .sum();
            FARADAY * (solid + model.porosity(cell, y) * dissolved) * cell.dy
        })
        .sum()
}

/// Free carbon area of one cathode node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarbonAreaReport {
    pub node: usize,
    pub area: f64,
    pub clamped: bool,
}

pub fn carbon_area_report<C: ChemistryProvider>(model: &CellModel<C>, y: &[f64]) -> Vec<CarbonAreaReport> {
    model
        .mesh
        .cells_in(DomainKind::Cathode)
        .map(|cell| {
            let area = cathode_carbon_area(model, cell, y);
            CarbonAreaReport {
                node: cell.node,
                area: area.0,
                clamped: area.1,
            }
        })
        .collect()
}

fn cathode_carbon_area<C: ChemistryProvider>(model: &CellModel<C>, cell: &Cell, y: &[f64]) -> (f64, bool) {
    let v_ref = model.reference_volume(cell);
    let eps_s = scalar(model, cell, Quantity::SulfurFraction, y);
    let eps_l = scalar(model, cell, Quantity::SulfideFraction, y);
    let np_s = scalar(model, cell, Quantity::SulfurSites, y);
    let np_l = scalar(model, cell, Quantity::SulfideSites, y);
    let r_s = particle_radius(&eps_s, &particle_area(&eps_s, &np_s, v_ref));
    let r_l = particle_radius(&eps_l, &particle_area(&eps_l, &np_l, v_ref));
    let res = carbon_area(
        model.domains.cathode.specific_area,
        [(&np_s, &r_s), (&np_l, &r_l)],
        v_ref,
        model.params.min_carbon_fraction,
    );
    (res.area, res.clamped)
}

/// Charge held by the cathode double layers, solid side [C/m^2].
pub fn cathode_double_layer_charge<C: ChemistryProvider>(model: &CellModel<C>, y: &[f64]) -> f64 {
    let c_dl = model.domains.cathode.double_layer_capacitance;
    model
        .mesh
        .cells_in(DomainKind::Cathode)
        .map(|cell| {
            let area = cathode_carbon_area(model, cell, y).0;
            c_dl * area * cell.dy * scalar(model, cell, Quantity::DoubleLayerPotential, y)
        })
        .sum()
}

/// Where the charge passed since the start of a phase went [C/m^2].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeLedger {
    /// `i t`, positive on discharge.
    pub external: f64,
    /// Drop of the reducible charge.
    pub faradaic: f64,
    /// Electrons parked in the cathode double layers.
    pub double_layer: f64,
}

impl ChargeLedger {
    pub fn new<C: ChemistryProvider>(model: &CellModel<C>, y0: &[f64], y: &[f64], external: f64) -> Self {
        Self {
            external,
            faradaic: reducible_charge(model, y0) - reducible_charge(model, y),
            double_layer: cathode_double_layer_charge(model, y0) - cathode_double_layer_charge(model, y),
        }
    }

    pub fn imbalance(&self) -> f64 {
        self.external - self.faradaic - self.double_layer
    }
}

/// How far a state is from rest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquilibriumDefect {
    /// Largest `|y'_i|` implied by the differential equations at `y' = 0`.
    pub max_rate: f64,
    /// Largest `|F_i|` over the algebraic equations.
    pub max_constraint: f64,
}

/// Evaluates the residual at `y' = 0` and turns each differential row into
/// the time derivative it implies through that row's own coefficient.
pub fn equilibrium_defect<P: ImplicitProblem>(problem: &P, t: f64, y: &DVector<f64>) -> EquilibriumDefect {
    let n = problem.size();
    let zero = DVector::zeros(n);
    let r0 = problem.residual(t, y.as_slice(), zero.as_slice());
    let mask = problem.differential_mask();

    let mut defect = EquilibriumDefect {
        max_rate: 0.0,
        max_constraint: 0.0,
    };
    let mut unit = zero.clone();
    for i in 0..n {
        if mask[i] {
            unit[i] = 1.0;
            let coeff = problem.residual(t, y.as_slice(), unit.as_slice())[i] - r0[i];
            unit[i] = 0.0;
            if coeff != 0.0 {
                defect.max_rate = defect.max_rate.max((r0[i] / coeff).abs());
            }
        } else {
            defect.max_constraint = defect.max_constraint.max(r0[i].abs());
        }
    }
    defect
}
