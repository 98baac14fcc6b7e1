use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use nalgebra::DVector;
use lisdae_rs::chemistry::kinetics::LiSKinetics;
use lisdae_rs::config::ScenarioConfig;
use lisdae_rs::models::lis::cell::{LiSCell, build_cell};
use lisdae_rs::models::lis::scenario::{PhaseKind, PhaseSpec, Scenario};
use lisdae_rs::numerics::newton::{NewtonSolver, NonlinearSystem};
use lisdae_rs::physics::residual::CellModel;
use lisdae_rs::physics::{ImplicitProblem, Real, constant};

fn cathode_nodes() -> Vec<usize> {
    vec![1, 4, 16]
}

fn config(nodes: usize) -> ScenarioConfig {
    let mut config = ScenarioConfig::default();
    config.mesh.cathode_nodes = nodes;
    config.mesh.separator_nodes = nodes.div_ceil(4);
    config
}

fn cell(nodes: usize) -> LiSCell {
    build_cell(&config(nodes)).unwrap()
}

struct FrozenRate<'a> {
    model: &'a CellModel<LiSKinetics>,
    ydot: Vec<f64>,
}

impl NonlinearSystem for FrozenRate<'_> {
    fn eval<T: Real>(&self, u: &DVector<T>) -> DVector<T> {
        let ydot: Vec<T> = self.ydot.iter().map(|v| constant::<T>(*v)).collect();
        self.model.residual(0.0, u.as_slice(), &ydot)
    }
}

fn bench_residual(c: &mut Criterion) {
    let mut group = c.benchmark_group("residual");
    for &nodes in &cathode_nodes() {
        let cell = cell(nodes);
        let model = cell.model.clone().with_current(0.4);
        let ydot = vec![0.0; cell.initial_state.len()];
        group.bench_with_input(BenchmarkId::from_parameter(nodes), &nodes, |b, &_| {
            b.iter(|| {
                let r: DVector<f64> = model.residual(0.0, cell.initial_state.as_slice(), &ydot);
                std::hint::black_box(r);
            });
        });
    }
    group.finish();
}

fn bench_dense_jacobian(c: &mut Criterion) {
    let mut group = c.benchmark_group("dense_jacobian");
    for &nodes in &cathode_nodes() {
        let cell = cell(nodes);
        let model = cell.model.clone().with_current(0.4);
        let system = FrozenRate {
            model: &model,
            ydot: vec![0.0; cell.initial_state.len()],
        };
        let solver = NewtonSolver::default();
        group.bench_with_input(BenchmarkId::from_parameter(nodes), &nodes, |b, &_| {
            b.iter(|| {
                let (_res, jac) = solver.compute_residual_and_jacobian(&system, &cell.initial_state);
                std::hint::black_box(jac);
            });
        });
    }
    group.finish();
}

fn bench_discharge_start(c: &mut Criterion) {
    let mut group = c.benchmark_group("discharge_10s");
    group.sample_size(10);
    for &nodes in &cathode_nodes()[..2] {
        let scenario = Scenario::from_config(&config(nodes)).unwrap();
        let spec = PhaseSpec {
            duration: Some(10.0),
            ..PhaseSpec::new(PhaseKind::Discharge)
        };
        let ydot0 = DVector::zeros(scenario.cell.initial_state.len());
        group.bench_with_input(BenchmarkId::from_parameter(nodes), &nodes, |b, &_| {
            b.iter_batched(
                || scenario.cell.initial_state.clone(),
                |y0| {
                    let _ = scenario.run_phase(&spec, 0.0, &y0, &ydot0);
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_residual, bench_dense_jacobian, bench_discharge_start);
criterion_main!(benches);
