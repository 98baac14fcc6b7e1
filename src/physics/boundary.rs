use super::flux::FaceFlux;
use super::{constant, Real};
use crate::discretization::domain::DomainKind;
use crate::discretization::mesh::{Cell, FaceKind, Mesh};

/// Flux through a current-collector face. The collectors are blocking for
/// the electrolyte, so the whole cell current is electronic there. With the
/// external current positive on discharge, it flows against the positive
/// axis.
pub fn collector_flux<T: Real>(kind: FaceKind, external_current: f64, n_species: usize) -> FaceFlux<T> {
    let mut flux = FaceFlux::zeros(n_species);
    if matches!(kind, FaceKind::CathodeCollector | FaceKind::AnodeCollector) {
        flux.electronic = constant(-external_current);
    }
    flux
}

/// The anode node whose charge balance is replaced by `phi_ed = 0`. The cell
/// current balances are linearly dependent, so one of them carries the
/// potential reference instead.
pub fn grounded_cell(mesh: &Mesh) -> Option<&Cell> {
    mesh.cells_in(DomainKind::Anode).last()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collectors_carry_the_external_current_electronically() {
        let f: FaceFlux<f64> = collector_flux(FaceKind::AnodeCollector, 2.5, 10);
        assert_eq!(f.electronic, -2.5);
        assert_eq!(f.ionic, 0.0);
        assert!(f.species.iter().all(|n| *n == 0.0));

        let g: FaceFlux<f64> = collector_flux(FaceKind::Interior, 2.5, 10);
        assert_eq!(g.electronic, 0.0);
    }
}
