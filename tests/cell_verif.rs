use nalgebra::DVector;

use lisdae_rs::chemistry::kinetics::LiSKinetics;
use lisdae_rs::config::ScenarioConfig;
use lisdae_rs::discretization::domain::DomainKind;
use lisdae_rs::discretization::layout::Quantity;
use lisdae_rs::models::lis::cell::{build_cell, LiSCell};
use lisdae_rs::numerics::newton::{NewtonSolver, NonlinearSystem};
use lisdae_rs::physics::diagnostics::{electroneutrality, equilibrium_defect, sulfur_inventory};
use lisdae_rs::physics::events::{event_slots, EventKind, EventMonitor};
use lisdae_rs::physics::morphology::PRECIPITATE_FLOOR;
use lisdae_rs::physics::residual::{charge_balance, CellModel};
use lisdae_rs::physics::{constant, ImplicitProblem, Real};

fn reference_cell(cathode_nodes: usize) -> LiSCell {
    let mut config = ScenarioConfig::default();
    config.mesh.cathode_nodes = cathode_nodes;
    config.mesh.separator_nodes = 2;
    build_cell(&config).unwrap()
}

/// Residual at a frozen `y'`, as a function of `y` alone.
struct FrozenRate<'a> {
    model: &'a CellModel<LiSKinetics>,
    ydot: &'a DVector<f64>,
}

impl NonlinearSystem for FrozenRate<'_> {
    fn eval<T: Real>(&self, u: &DVector<T>) -> DVector<T> {
        let ydot: Vec<T> = self.ydot.iter().map(|v| constant::<T>(*v)).collect();
        self.model.residual(0.0, u.as_slice(), &ydot)
    }
}

#[test]
fn balanced_initial_state_is_at_rest() {
    let cell = reference_cell(2);
    let y0 = &cell.initial_state;

    let defect = equilibrium_defect(&cell.model, 0.0, y0);
    assert!(defect.max_rate <= 1e-6, "implied rate {:.3e}", defect.max_rate);
    assert!(defect.max_constraint <= 1e-9, "constraint {:.3e}", defect.max_constraint);

    for net in electroneutrality(&cell.model, y0.as_slice()) {
        assert!(net.abs() < 1e-12, "net charge {net:.3e}");
    }
    assert!(sulfur_inventory(&cell.model, y0.as_slice()).iter().all(|s| *s > 0.0));
}

#[test]
fn cell_charge_balances_telescope() {
    let cell = reference_cell(3);
    let model = cell.model.clone().with_current(0.7);
    let mut y = cell.initial_state.clone();
    // Disturb potentials and one concentration so every face carries current.
    for (i, c) in model.mesh.cells.iter().enumerate() {
        for q in [Quantity::ElectrodePotential, Quantity::ElectrolytePotential] {
            if let Some(j) = model.index(c, q) {
                y[j] += 0.01 * (i as f64 + 1.0);
            }
        }
        let li = model.layout.species_index(c.domain, c.node, 2);
        y[li] *= 1.0 + 0.05 * i as f64;
    }

    let views: Vec<_> = model.mesh.cells.iter().map(|c| model.node_view(c, y.as_slice())).collect();
    let fluxes = model.face_fluxes(&views);
    let total: f64 = model
        .mesh
        .cells
        .iter()
        .map(|c| charge_balance(&fluxes[c.inlet], &fluxes[c.inlet + 1]))
        .sum();
    let scale = fluxes.iter().map(|f| f.ionic.abs() + f.electronic.abs()).fold(0.0, f64::max);
    assert!(scale > 0.0);
    assert!(total.abs() <= 1e-10 * scale, "net {total:.3e} of {scale:.3e}");

    // Only electrons cross the collectors.
    let first = &fluxes[0];
    let last = fluxes.last().unwrap();
    assert_eq!(first.electronic, -0.7);
    assert_eq!(last.electronic, -0.7);
    assert_eq!(first.ionic, 0.0);
    assert_eq!(last.ionic, 0.0);
}

#[test]
fn ad_jacobian_matches_finite_differences() {
    let cell = reference_cell(1);
    let model = cell.model.clone().with_current(0.4);
    let mut y = cell.initial_state.clone();
    let sep = model.layout.index(DomainKind::Separator, 0, Quantity::ElectrolytePotential).unwrap();
    y[sep] += 0.02;
    let ydot = DVector::from_element(y.len(), 1e-3);
    let system = FrozenRate { model: &model, ydot: &ydot };

    let (_, jac) = NewtonSolver::default().compute_residual_and_jacobian(&system, &y);

    let columns = [
        model.layout.index(DomainKind::Cathode, 0, Quantity::ElectrodePotential).unwrap(),
        model.layout.index(DomainKind::Cathode, 0, Quantity::DoubleLayerPotential).unwrap(),
        model.layout.index(DomainKind::Cathode, 0, Quantity::SulfurFraction).unwrap(),
        sep,
        model.layout.species_index(DomainKind::Separator, 0, 2),
    ];
    for j in columns {
        let h = 1e-6 * y[j].abs().max(1e-3);
        let mut up = y.clone();
        let mut down = y.clone();
        up[j] += h;
        down[j] -= h;
        let fd = (system.eval(&up) - system.eval(&down)) / (2.0 * h);
        let col = jac.column(j);
        let scale = col.amax().max(1e-300);
        for i in 0..y.len() {
            assert!(
                (col[i] - fd[i]).abs() <= 1e-5 * scale,
                "d F[{i}] / d y[{j}]: AD {:.6e}, FD {:.6e}",
                col[i],
                fd[i]
            );
        }
    }
}

#[test]
fn sulfur_depletion_indicator_changes_sign_at_the_floor() {
    let cell = reference_cell(2);
    let mut model = cell.model.clone();
    model.monitor = EventMonitor::all();
    let slots = event_slots(&model);
    let slot = slots
        .iter()
        .position(|s| s.kind == EventKind::SulfurDepletion && s.node == 1)
        .unwrap();
    let eps = model.layout.index(DomainKind::Cathode, 1, Quantity::SulfurFraction).unwrap();

    let mut y = cell.initial_state.clone();
    let zeros = vec![0.0; y.len()];
    y[eps] = 2.0 * PRECIPITATE_FLOOR;
    let before = model.events(0.0, y.as_slice(), &zeros)[slot];
    y[eps] = 0.5 * PRECIPITATE_FLOOR;
    let after = model.events(0.0, y.as_slice(), &zeros)[slot];
    assert!(before > 0.0 && after < 0.0);

    // Unmonitored conditions stay silent.
    model.monitor = EventMonitor::all().without(EventKind::SulfurDepletion);
    assert_eq!(model.events(0.0, y.as_slice(), &zeros)[slot], 0.0);
}

#[test]
fn cutoff_indicators_follow_the_cathode_potential() {
    let cell = reference_cell(1);
    let model = cell.model.clone();
    let slots = event_slots(&model);
    assert_eq!(slots.len(), 6);
    let zeros = vec![0.0; cell.initial_state.len()];
    let g = model.events(0.0, cell.initial_state.as_slice(), &zeros);
    let at = |kind| slots.iter().position(|s| s.kind == kind).unwrap();
    assert!((g[at(EventKind::LowerCutoff)] - (2.3 - 1.6)).abs() < 1e-12);
    assert!((g[at(EventKind::UpperCutoff)] - (3.0 - 2.3)).abs() < 1e-12);
    assert!(g.iter().all(|v| *v >= 0.0));
}
