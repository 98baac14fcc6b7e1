use nalgebra::DVector;

use super::boundary::{collector_flux, grounded_cell};
use super::events::{state_events, EventMonitor, VoltageWindow};
use super::flux::{face_flux, FaceFlux, NodeView};
use super::morphology::{carbon_area, particle_area, particle_radius, reactive_area};
use super::{EventAction, ImplicitProblem, Real, FARADAY};
use crate::chemistry::{ChemistryProvider, Interface, PhaseState, SolidPhase};
use crate::discretization::domain::{DomainKind, DomainSet};
use crate::discretization::generator::build_mesh;
use crate::discretization::layout::{Quantity, StateLayout};
use crate::discretization::mesh::{Cell, Mesh};
use crate::error::ConfigurationError;

/// Cell-level constants that are not tied to one domain.
#[derive(Debug, Clone)]
pub struct CellParams {
    pub temperature: f64,
    /// Planar electrode area [m^2]; together with the node thickness it sets
    /// the reference volume the nucleation sites are spread over.
    pub cell_area: f64,
    /// Lower bound on the free carbon area, as a fraction of the nominal one.
    pub min_carbon_fraction: f64,
    /// Ion drawn from the bulk to balance double-layer charge.
    pub counter_ion: String,
    pub cutoffs: VoltageWindow,
    /// Potential the grounded anode node is held at [V].
    pub ground_potential: f64,
}

/// A discretized Li-S cell: layout, geometry, chemistry and the operating
/// current. Implements the residual and root functions of the DAE.
#[derive(Debug, Clone)]
pub struct CellModel<C: ChemistryProvider> {
    pub layout: StateLayout,
    pub domains: DomainSet,
    pub mesh: Mesh,
    pub chemistry: C,
    pub params: CellParams,
    /// Imposed cell current [A/m^2], positive on discharge.
    pub external_current: f64,
    pub monitor: EventMonitor,
    counter_ion: usize,
    grounded: Option<usize>,
}

/// Volumetric source terms of one node.
struct NodeSources<T> {
    /// Species production [kmol/m^3/s].
    reaction: Vec<T>,
    /// Faradaic current [A/m^3], positive for oxidation.
    faradaic: T,
    /// Area the double layer sits on [1/m].
    interface_area: T,
    porosity_dot: T,
}

impl<C: ChemistryProvider> CellModel<C> {
    pub fn new(
        layout: StateLayout,
        domains: DomainSet,
        chemistry: C,
        params: CellParams,
    ) -> Result<Self, ConfigurationError> {
        let species = chemistry.species();
        if species.len() != layout.n_species() {
            return Err(ConfigurationError::SpeciesCountMismatch {
                expected: layout.n_species(),
                found: species.len(),
            });
        }
        let counter_ion = species.index_of(&params.counter_ion)?;
        if species.get(counter_ion).charge == 0.0 {
            return Err(ConfigurationError::invalid(
                "counter_ion",
                format!("`{}` carries no charge", params.counter_ion),
            ));
        }
        if params.cutoffs.lower >= params.cutoffs.upper {
            return Err(ConfigurationError::invalid(
                "cutoffs",
                "lower cutoff must lie below the upper one",
            ));
        }
        let mesh = build_mesh(&domains);
        let grounded = grounded_cell(&mesh).map(|c| c.id);
        Ok(Self {
            layout,
            domains,
            mesh,
            chemistry,
            params,
            external_current: 0.0,
            monitor: EventMonitor::all(),
            counter_ion,
            grounded,
        })
    }

    pub fn with_current(mut self, current: f64) -> Self {
        self.external_current = current;
        self
    }

    /// Global index of a scalar quantity of `cell`.
    pub fn index(&self, cell: &Cell, q: Quantity) -> Option<usize> {
        self.layout.index(cell.domain, cell.node, q)
    }

    /// Reference volume of a cathode node [m^3].
    pub fn reference_volume(&self, cell: &Cell) -> f64 {
        cell.dy * self.params.cell_area
    }

    /// Potential of the cathode collector against the grounded anode.
    pub fn cell_voltage(&self, y: &[f64]) -> f64 {
        let cathode = self
            .layout
            .index(DomainKind::Cathode, 0, Quantity::ElectrodePotential)
            .map_or(0.0, |i| y[i]);
        let anode = self
            .grounded
            .and_then(|id| self.index(&self.mesh.cells[id], Quantity::ElectrodePotential))
            .map_or(0.0, |i| y[i]);
        cathode - anode
    }

    /// Electrolyte porosity of a node at state `y`.
    pub fn porosity<T: Real>(&self, cell: &Cell, y: &[T]) -> T {
        let base = self.domains.get(cell.domain).base_porosity;
        let mut eps = super::constant::<T>(base);
        for q in [Quantity::SulfurFraction, Quantity::SulfideFraction] {
            if let Some(i) = self.index(cell, q) {
                eps -= y[i].clone();
            }
        }
        eps
    }

    pub fn node_view<T: Real>(&self, cell: &Cell, y: &[T]) -> NodeView<T> {
        let domain = self.domains.get(cell.domain);
        let phi_ed = self
            .index(cell, Quantity::ElectrodePotential)
            .map(|i| y[i].clone());
        let phi_el = match (&phi_ed, self.index(cell, Quantity::DoubleLayerPotential)) {
            (Some(ed), Some(dl)) => ed.clone() - y[dl].clone(),
            _ => self
                .index(cell, Quantity::ElectrolytePotential)
                .map_or(T::zero(), |i| y[i].clone()),
        };
        let start = self.layout.species_index(cell.domain, cell.node, 0);
        NodeView {
            domain: cell.domain,
            dy: cell.dy,
            phi_ed,
            phi_el,
            porosity: self.porosity(cell, y),
            concentrations: y[start..start + self.layout.n_species()].to_vec(),
            diffusivity: domain.diffusivity.clone(),
            conductivity: domain.conductivity,
        }
    }

    /// Fluxes through every face, in face order.
    pub fn face_fluxes<T: Real>(&self, views: &[NodeView<T>]) -> Vec<FaceFlux<T>> {
        let species = self.chemistry.species();
        self.mesh
            .faces
            .iter()
            .map(|face| match (face.left, face.right) {
                (Some(l), Some(r)) => {
                    face_flux(&views[l], &views[r], face.distance, species, self.params.temperature)
                }
                _ => collector_flux(face.kind, self.external_current, species.len()),
            })
            .collect()
    }

    fn cathode_sources<T: Real>(
        &self,
        cell: &Cell,
        view: &NodeView<T>,
        y: &[T],
        ydot: &[T],
        res: &mut DVector<T>,
    ) -> NodeSources<T> {
        let at = |q| self.index(cell, q).unwrap_or_default();
        let (i_s, i_l) = (at(Quantity::SulfurFraction), at(Quantity::SulfideFraction));
        let (i_ns, i_nl) = (at(Quantity::SulfurSites), at(Quantity::SulfideSites));
        let v_ref = self.reference_volume(cell);

        let (eps_s, eps_l) = (&y[i_s], &y[i_l]);
        let (np_s, np_l) = (&y[i_ns], &y[i_nl]);
        let r_s = particle_radius(eps_s, &particle_area(eps_s, np_s, v_ref));
        let r_l = particle_radius(eps_l, &particle_area(eps_l, np_l, v_ref));
        let carbon = carbon_area(
            self.domains.cathode.specific_area,
            [(np_s, &r_s), (np_l, &r_l)],
            v_ref,
            self.params.min_carbon_fraction,
        );
        let a_s = reactive_area(eps_s, np_s, v_ref);
        let a_l = reactive_area(eps_l, np_l, v_ref);

        let state = self.phase_state(view);
        let chem = &self.chemistry;
        let on_carbon = chem.production_rates(Interface::Carbon, &state);
        let on_sulfur = chem.production_rates(Interface::Sulfur, &state);
        let on_sulfide = chem.production_rates(Interface::LithiumSulfide, &state);

        let reaction = (0..self.layout.n_species())
            .map(|k| {
                carbon.area.clone() * on_carbon.electrolyte[k].clone()
                    + a_s.clone() * on_sulfur.electrolyte[k].clone()
                    + a_l.clone() * on_sulfide.electrolyte[k].clone()
            })
            .collect();
        let faradaic = (carbon.area.clone() * on_carbon.electron.clone()
            + a_s.clone() * on_sulfur.electron.clone()
            + a_l.clone() * on_sulfide.electron.clone())
            * FARADAY;

        let v_s = chem.molar_volume(SolidPhase::Sulfur);
        let v_l = chem.molar_volume(SolidPhase::LithiumSulfide);
        res[i_s] = ydot[i_s].clone() - a_s * on_sulfur.solid * v_s;
        res[i_l] = ydot[i_l].clone() - a_l * on_sulfide.solid * v_l;
        // Fixed site counts.
        res[i_ns] = ydot[i_ns].clone();
        res[i_nl] = ydot[i_nl].clone();

        NodeSources {
            reaction,
            faradaic,
            interface_area: carbon.area,
            porosity_dot: (ydot[i_s].clone() + ydot[i_l].clone()) * -1.0,
        }
    }

    fn anode_sources<T: Real>(&self, view: &NodeView<T>) -> NodeSources<T> {
        let area = self.domains.anode.specific_area;
        let state = self.phase_state(view);
        let rates = self.chemistry.production_rates(Interface::Lithium, &state);
        NodeSources {
            reaction: rates.electrolyte.into_iter().map(|r| r * area).collect(),
            faradaic: rates.electron * (area * FARADAY),
            interface_area: super::constant(area),
            porosity_dot: T::zero(),
        }
    }

    fn phase_state<'a, T: Real>(&self, view: &'a NodeView<T>) -> PhaseState<'a, T> {
        PhaseState {
            concentrations: &view.concentrations,
            electrode_potential: view.phi_ed.clone().unwrap_or_else(T::zero),
            electrolyte_potential: view.phi_el.clone(),
            temperature: self.params.temperature,
        }
    }
}

/// Net current entering a control volume: electronic plus ionic, inlet minus
/// outlet [A/m^2]. Zero when no charge accumulates in the matrix.
pub fn charge_balance<T: Real>(inlet: &FaceFlux<T>, outlet: &FaceFlux<T>) -> T {
    inlet.electronic.clone() - outlet.electronic.clone() + inlet.ionic.clone() - outlet.ionic.clone()
}

/// `F(t, y, y')` for the whole cell. Traverses the cells from the cathode
/// collector to the anode collector; each face flux is computed once from
/// its two neighbours and shared as outlet and inlet.
pub fn assemble_residual<T: Real, C: ChemistryProvider>(
    model: &CellModel<C>,
    _t: f64,
    y: &[T],
    ydot: &[T],
) -> DVector<T> {
    let n_species = model.layout.n_species();
    let views: Vec<NodeView<T>> = model
        .mesh
        .cells
        .iter()
        .map(|cell| model.node_view(cell, y))
        .collect();
    let fluxes = model.face_fluxes(&views);
    let counter_charge = model.chemistry.species().get(model.counter_ion).charge;

    let mut res = DVector::zeros(model.layout.total_size());
    for cell in &model.mesh.cells {
        let view = &views[cell.id];
        let (inlet, outlet) = (&fluxes[cell.inlet], &fluxes[cell.inlet + 1]);
        let domain = model.domains.get(cell.domain);
        let dy = cell.dy;

        let mut sources = match cell.domain {
            DomainKind::Cathode => model.cathode_sources(cell, view, y, ydot, &mut res),
            DomainKind::Anode => model.anode_sources(view),
            DomainKind::Separator => NodeSources {
                reaction: vec![T::zero(); n_species],
                faradaic: T::zero(),
                interface_area: T::zero(),
                porosity_dot: T::zero(),
            },
        };

        if let Some(i) = model.index(cell, Quantity::ElectrodePotential) {
            res[i] = if model.grounded == Some(cell.id) {
                y[i].clone() - model.params.ground_potential
            } else {
                charge_balance(inlet, outlet)
            };
        }
        if let Some(i) = model.index(cell, Quantity::ElectrolytePotential) {
            res[i] = charge_balance(inlet, outlet);
        }
        if let Some(i) = model.index(cell, Quantity::DoubleLayerPotential) {
            let i_dl = (inlet.electronic.clone() - outlet.electronic.clone()) / dy
                - sources.faradaic.clone();
            res[i] = ydot[i].clone() * sources.interface_area.clone() * domain.double_layer_capacitance
                - i_dl.clone();
            // The charge stored on the electrolyte side of the layer leaves the bulk.
            sources.reaction[model.counter_ion] += i_dl / (FARADAY * counter_charge);
        }

        let start = model.layout.species_index(cell.domain, cell.node, 0);
        for k in 0..n_species {
            let i = start + k;
            let divergence = (inlet.species[k].clone() - outlet.species[k].clone()) / dy;
            res[i] = view.porosity.clone() * ydot[i].clone()
                + y[i].clone() * sources.porosity_dot.clone()
                - (sources.reaction[k].clone() + divergence);
        }
    }
    res
}

impl<C: ChemistryProvider> ImplicitProblem for CellModel<C> {
    fn size(&self) -> usize {
        self.layout.total_size()
    }

    fn differential_mask(&self) -> Vec<bool> {
        self.layout.differential_mask()
    }

    fn residual<T: Real>(&self, t: f64, y: &[T], ydot: &[T]) -> DVector<T> {
        assemble_residual(self, t, y, ydot)
    }

    fn events(&self, t: f64, y: &[f64], ydot: &[f64]) -> DVector<f64> {
        state_events(self, t, y, ydot)
    }

    fn handle_event(&self, index: usize, t: f64) -> EventAction {
        super::events::handle_event(self, index, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chemistry::kinetics::LiSKinetics;
    use crate::chemistry::species::SpeciesTable;
    use crate::chemistry::InterfaceRates;
    use crate::config::ScenarioConfig;
    use crate::models::lis::cell::build_cell;

    /// The built-in species and precipitates with every reaction switched off.
    #[derive(Debug, Clone)]
    struct Inert(LiSKinetics);

    impl ChemistryProvider for Inert {
        fn species(&self) -> &SpeciesTable {
            self.0.species()
        }

        fn production_rates<T: Real>(&self, _: Interface, _: &PhaseState<T>) -> InterfaceRates<T> {
            InterfaceRates::zeros(self.0.species().len())
        }

        fn molar_volume(&self, phase: SolidPhase) -> f64 {
            self.0.molar_volume(phase)
        }

        fn delta_gibbs(&self, interface: Interface, state: &PhaseState<f64>) -> Vec<f64> {
            self.0.delta_gibbs(interface, state)
        }
    }

    fn inert_cell() -> (CellModel<Inert>, DVector<f64>) {
        let mut config = ScenarioConfig::default();
        config.mesh.cathode_nodes = 3;
        config.mesh.separator_nodes = 2;
        let cell = build_cell(&config).unwrap();
        let m = cell.model;
        let model = CellModel::new(m.layout, m.domains, Inert(m.chemistry), m.params).unwrap();
        (model, cell.initial_state)
    }

    fn species_rows<C: ChemistryProvider>(model: &CellModel<C>) -> Vec<usize> {
        let n = model.layout.n_species();
        model
            .mesh
            .cells
            .iter()
            .flat_map(|c| {
                let start = model.layout.species_index(c.domain, c.node, 0);
                start..start + n
            })
            .collect()
    }

    #[test]
    fn equal_currents_balance_exactly() {
        let inlet = FaceFlux {
            species: vec![0.0; 10],
            ionic: 0.375,
            electronic: -1.25,
        };
        let outlet = FaceFlux {
            species: vec![0.0; 10],
            ionic: -0.875,
            electronic: 0.0,
        };
        assert_eq!(charge_balance(&inlet, &inlet.clone()), 0.0);
        // Electronic current turned ionic is still balanced.
        assert_eq!(charge_balance(&inlet, &outlet), 0.0);
    }

    #[test]
    fn residual_spans_the_state_vector() {
        let mut config = ScenarioConfig::default();
        config.mesh.cathode_nodes = 3;
        let cell = build_cell(&config).unwrap();
        let y = cell.initial_state.as_slice();
        let ydot = vec![0.0; y.len()];
        let r = cell.model.residual(0.0, y, &ydot);
        assert_eq!(r.len(), cell.model.size());
        assert!(r.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn grounded_node_pins_the_anode_potential() {
        let cell = build_cell(&ScenarioConfig::default()).unwrap();
        let model = &cell.model;
        let i = model
            .layout
            .index(DomainKind::Anode, 0, Quantity::ElectrodePotential)
            .unwrap();
        let mut y = cell.initial_state.clone();
        y[i] = 0.125;
        let ydot = vec![0.0; y.len()];
        let r = model.residual(0.0, y.as_slice(), &ydot);
        assert_eq!(r[i], 0.125 - model.params.ground_potential);
    }

    #[test]
    fn species_rows_scale_with_the_concentrations() {
        let (model, mut y) = inert_cell();
        let rows = species_rows(&model);
        let mut ydot = vec![0.0; y.len()];

        // Equal electrode potentials per domain: no electronic current, so the
        // double layer draws nothing from the bulk.
        for kind in [DomainKind::Anode, DomainKind::Cathode] {
            let first = model.layout.index(kind, 0, Quantity::ElectrodePotential).unwrap();
            for c in model.mesh.cells_in(kind) {
                let i = model.index(c, Quantity::ElectrodePotential).unwrap();
                y[i] = y[first];
            }
        }
        for (n, &i) in rows.iter().enumerate() {
            y[i] *= 1.0 + 0.03 * (n % 7) as f64;
            ydot[i] = 1e-4 * ((n % 5) as f64 - 2.0);
        }
        for c in model.mesh.cells_in(DomainKind::Cathode) {
            ydot[model.index(c, Quantity::SulfurFraction).unwrap()] = -1e-3;
            ydot[model.index(c, Quantity::SulfideFraction).unwrap()] = 4e-4;
        }

        let mut y2 = y.clone();
        let mut ydot2 = ydot.clone();
        for &i in &rows {
            y2[i] *= 2.0;
            ydot2[i] *= 2.0;
        }
        let once = model.residual(0.0, y.as_slice(), &ydot);
        let twice = model.residual(0.0, y2.as_slice(), &ydot2);

        let scale = rows.iter().map(|&i| twice[i].abs()).fold(0.0, f64::max);
        assert!(scale > 0.0);
        for &i in &rows {
            assert!(
                (2.0 * once[i] - twice[i]).abs() <= 1e-10 * scale,
                "row {i}: {:.6e} vs {:.6e}",
                2.0 * once[i],
                twice[i]
            );
        }
    }

    #[test]
    fn shrinking_porosity_concentrates_the_electrolyte() {
        let (model, y) = inert_cell();
        let ydot = vec![0.0; y.len()];
        let cell = model.mesh.cells_in(DomainKind::Cathode).nth(1).unwrap().clone();
        let s = model.index(&cell, Quantity::SulfurFraction).unwrap();
        let mut bumped = ydot.clone();
        bumped[s] = 1e-3;

        let base = model.residual(0.0, y.as_slice(), &ydot);
        let grown = model.residual(0.0, y.as_slice(), &bumped);
        let start = model.layout.species_index(cell.domain, cell.node, 0);
        for k in 0..model.layout.n_species() {
            let i = start + k;
            let expected = -y[i] * 1e-3;
            assert!(
                (grown[i] - base[i] - expected).abs() <= 1e-12 * y[i].max(1.0),
                "species {k}"
            );
        }
    }
}
