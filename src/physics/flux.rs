use super::{constant, Real, FARADAY, GAS_CONSTANT};
use crate::chemistry::species::SpeciesTable;
use crate::discretization::domain::DomainKind;

/// What a face flux needs to know about one neighbouring node.
#[derive(Debug, Clone)]
pub struct NodeView<T> {
    pub domain: DomainKind,
    pub dy: f64,
    /// `None` in the separator.
    pub phi_ed: Option<T>,
    pub phi_el: T,
    pub porosity: T,
    pub concentrations: Vec<T>,
    /// Diffusivity over tortuosity, per species.
    pub diffusivity: Vec<f64>,
    pub conductivity: f64,
}

impl<T: Real> NodeView<T> {
    fn effective_diffusivity(&self, k: usize) -> T {
        self.porosity.clone() * self.diffusivity[k]
    }
}

/// Fluxes through one face, positive towards the anode collector.
#[derive(Debug, Clone)]
pub struct FaceFlux<T> {
    /// Species molar flux [kmol/m^2/s].
    pub species: Vec<T>,
    /// Ionic current [A/m^2].
    pub ionic: T,
    /// Electronic current [A/m^2].
    pub electronic: T,
}

impl<T: Real> FaceFlux<T> {
    pub fn zeros(n_species: usize) -> Self {
        Self {
            species: vec![T::zero(); n_species],
            ionic: T::zero(),
            electronic: T::zero(),
        }
    }
}

/// Nernst-Planck flux between two adjacent nodes `left` and `right`
/// (left is closer to the cathode collector) whose centroids lie `distance`
/// apart, plus electronic conduction when both lie in the same electrode.
pub fn face_flux<T: Real>(
    left: &NodeView<T>,
    right: &NodeView<T>,
    distance: f64,
    species: &SpeciesTable,
    temperature: f64,
) -> FaceFlux<T> {
    let n = species.len();
    let f = FARADAY / (GAS_CONSTANT * temperature);
    let dphi = (right.phi_el.clone() - left.phi_el.clone()) / distance;

    let mut flux = FaceFlux::zeros(n);
    for (k, record) in species.records().iter().enumerate() {
        if !record.transports || left.diffusivity[k] == 0.0 || right.diffusivity[k] == 0.0 {
            continue;
        }
        // Series resistance of the two half cells.
        let d_face = (left.effective_diffusivity(k).recip() * left.dy
            + right.effective_diffusivity(k).recip() * right.dy)
            .recip()
            * (left.dy + right.dy);
        let c_l = &left.concentrations[k];
        let c_r = &right.concentrations[k];
        let c_face = (c_l.clone() + c_r.clone()) * 0.5;
        let gradient = (c_r.clone() - c_l.clone()) / distance;
        let migration = c_face * dphi.clone() * (record.charge * f);
        flux.species[k] = (gradient + migration) * d_face * -1.0;
    }
    flux.ionic = ionic_current(&flux.species, species);

    if let (Some(phi_l), Some(phi_r)) = (&left.phi_ed, &right.phi_ed) {
        if left.domain == right.domain {
            let sigma = (left.dy + right.dy)
                / (left.dy / left.conductivity + right.dy / right.conductivity);
            flux.electronic = (phi_r.clone() - phi_l.clone()) * (-sigma / distance);
        }
    }
    flux
}

/// Ionic current carried by a flux vector: `F sum z_k N_k`.
pub fn ionic_current<T: Real>(species_flux: &[T], species: &SpeciesTable) -> T {
    species_flux
        .iter()
        .zip(species.records())
        .fold(constant::<T>(0.0), |acc, (n, s)| acc + n.clone() * (s.charge * FARADAY))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPACING: f64 = 10e-6;

    fn view(domain: DomainKind, phi_el: f64, c: Vec<f64>) -> NodeView<f64> {
        let species = SpeciesTable::lithium_sulfur();
        NodeView {
            domain,
            dy: SPACING,
            phi_ed: domain.is_electrode().then_some(phi_el + 1.0),
            phi_el,
            porosity: 0.5,
            concentrations: c,
            diffusivity: species
                .records()
                .iter()
                .map(|s| if s.transports { s.diffusivity / 1.6 } else { 0.0 })
                .collect(),
            conductivity: 10.0,
        }
    }

    fn uniform() -> Vec<f64> {
        vec![10.23, 10.23, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
    }

    #[test]
    fn uniform_state_carries_no_flux() {
        let species = SpeciesTable::lithium_sulfur();
        let a = view(DomainKind::Cathode, 1.0, uniform());
        let b = view(DomainKind::Separator, 1.0, uniform());
        let flux = face_flux(&a, &b, SPACING, &species, 298.15);
        assert!(flux.species.iter().all(|n| *n == 0.0));
        assert_eq!(flux.ionic, 0.0);
        assert_eq!(flux.electronic, 0.0);
    }

    #[test]
    fn solvents_are_masked() {
        let species = SpeciesTable::lithium_sulfur();
        let mut c = uniform();
        c[0] = 12.0;
        let a = view(DomainKind::Separator, 1.0, c);
        let b = view(DomainKind::Separator, 1.1, uniform());
        let flux = face_flux(&a, &b, SPACING, &species, 298.15);
        assert_eq!(flux.species[0], 0.0);
        assert_eq!(flux.species[1], 0.0);
    }

    #[test]
    fn field_drives_cations_downhill() {
        let species = SpeciesTable::lithium_sulfur();
        let a = view(DomainKind::Separator, 1.0, uniform());
        let b = view(DomainKind::Separator, 0.9, uniform());
        let flux = face_flux(&a, &b, SPACING, &species, 298.15);
        assert!(flux.species[2] > 0.0, "Li+ moves towards lower potential");
        assert!(flux.species[3] < 0.0, "PF6- moves the other way");
        assert!(flux.ionic > 0.0);
        let check = ionic_current(&flux.species, &species);
        assert!((check - flux.ionic).abs() <= 1e-12 * check.abs());
    }

    #[test]
    fn flux_is_linear_in_concentration() {
        let species = SpeciesTable::lithium_sulfur();
        let mut c = uniform();
        c[5] = 1e-3;
        let doubled: Vec<f64> = c.iter().map(|x| 2.0 * x).collect();
        let once = face_flux(
            &view(DomainKind::Cathode, 1.0, c),
            &view(DomainKind::Separator, 0.95, uniform()),
            SPACING,
            &species,
            298.15,
        );
        let uniform2: Vec<f64> = uniform().iter().map(|x| 2.0 * x).collect();
        let twice = face_flux(
            &view(DomainKind::Cathode, 1.0, doubled),
            &view(DomainKind::Separator, 0.95, uniform2),
            SPACING,
            &species,
            298.15,
        );
        for (a, b) in once.species.iter().zip(&twice.species) {
            assert!((2.0 * a - b).abs() <= 1e-12 * b.abs().max(1e-30));
        }
    }

    #[test]
    fn electrons_only_flow_within_an_electrode() {
        let species = SpeciesTable::lithium_sulfur();
        let a = view(DomainKind::Cathode, 1.0, uniform());
        let b = view(DomainKind::Cathode, 0.9, uniform());
        let flux = face_flux(&a, &b, SPACING, &species, 298.15);
        // phi_ed drops by 0.1 V over one node spacing at 10 S/m.
        assert!((flux.electronic - 10.0 * 0.1 / SPACING).abs() < 1e-6);

        let c = view(DomainKind::Anode, 0.9, uniform());
        assert_eq!(face_flux(&a, &c, SPACING, &species, 298.15).electronic, 0.0);
    }

    #[test]
    fn gradients_are_taken_over_the_centroid_distance() {
        let species = SpeciesTable::lithium_sulfur();
        let mut c = uniform();
        c[2] = 1.5;
        let a = view(DomainKind::Cathode, 1.0, c);
        let b = view(DomainKind::Cathode, 0.98, uniform());
        let near = face_flux(&a, &b, SPACING, &species, 298.15);
        let far = face_flux(&a, &b, 4.0 * SPACING, &species, 298.15);
        for (n, f) in near.species.iter().zip(&far.species) {
            assert!((n - 4.0 * f).abs() <= 1e-12 * n.abs());
        }
        assert!((near.electronic - 4.0 * far.electronic).abs() <= 1e-12 * near.electronic.abs());
        assert!((near.ionic - 4.0 * far.ionic).abs() <= 1e-12 * near.ionic.abs());
    }
}

