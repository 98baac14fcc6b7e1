//! Geometry of precipitated particles growing on the carbon surface.
//!
//! Each phase is modelled as `np` hemispherical particles sharing the
//! precipitate volume `eps * v_ref`.

use std::f64::consts::PI;

use super::{constant, Real};

/// Volume fractions at or below this value count as "no precipitate".
pub const PRECIPITATE_FLOOR: f64 = 1e-20;

/// Surface per volume [1/m]: `3 eps / (3 eps v_ref / (2 pi np))^(1/3)`.
/// Fractions below the floor are evaluated at the floor.
pub fn particle_area<T: Real>(eps: &T, sites: &T, v_ref: f64) -> T {
    let eps = at_least_floor(eps);
    let radius = (eps.clone() * (3.0 * v_ref / (2.0 * PI)) / sites.clone()).cbrt();
    eps * 3.0 / radius
}

/// Particle radius [m] from a fraction and its area: `3 eps / area`.
pub fn particle_radius<T: Real>(eps: &T, area: &T) -> T {
    at_least_floor(eps) * 3.0 / area.clone()
}

/// Area available for growth or dissolution. Vanishes continuously as the
/// fraction reaches the floor and stays zero below it.
pub fn reactive_area<T: Real>(eps: &T, sites: &T, v_ref: f64) -> T {
    if eps.re() <= PRECIPITATE_FLOOR {
        return T::zero();
    }
    let floor = constant::<T>(PRECIPITATE_FLOOR);
    particle_area(eps, sites, v_ref) - particle_area(&floor, sites, v_ref)
}

/// Carbon area left uncovered by the two precipitates.
#[derive(Debug, Clone)]
pub struct CarbonArea<T> {
    pub area: T,
    /// Set when the footprints exceeded the nominal area and the result was
    /// held at the minimum.
    pub clamped: bool,
}

/// `a0 - pi np_s r_s^2 / v_ref - pi np_l r_l^2 / v_ref`, held at `min_fraction * a0`.
pub fn carbon_area<T: Real>(
    a0: f64,
    footprints: [(&T, &T); 2],
    v_ref: f64,
    min_fraction: f64,
) -> CarbonArea<T> {
    let covered = footprints
        .iter()
        .fold(T::zero(), |acc, (sites, radius)| {
            acc + (*sites).clone() * (*radius).clone() * (*radius).clone() * (PI / v_ref)
        });
    let area = covered * -1.0 + a0;
    let min = min_fraction * a0;
    if area.re() < min {
        CarbonArea {
            area: constant(min),
            clamped: true,
        }
    } else {
        CarbonArea {
            area,
            clamped: false,
        }
    }
}

fn at_least_floor<T: Real>(eps: &T) -> T {
    if eps.re() < PRECIPITATE_FLOOR {
        constant(PRECIPITATE_FLOOR)
    } else {
        eps.clone()
    }
}
