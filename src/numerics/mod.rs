pub mod dae;
pub mod newton;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Mixed relative/absolute tolerance; gives per-component error weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rtol: 1e-5,
            atol: 1e-9,
        }
    }
}

impl Tolerance {
    /// `1 / (rtol |y_i| + atol)`, using the larger magnitude of the two states.
    pub fn weights(&self, y: &DVector<f64>, y_other: &DVector<f64>) -> DVector<f64> {
        y.zip_map(y_other, |a, b| 1.0 / (self.rtol * a.abs().max(b.abs()) + self.atol))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceMetric {
    Rms,
    Max,
}

/// Weighted norm of `v`, restricted to the components where `mask` is set.
pub fn weighted_norm(
    v: &DVector<f64>,
    weights: &DVector<f64>,
    mask: Option<&[bool]>,
    metric: ConvergenceMetric,
) -> f64 {
    let scaled = v
        .iter()
        .zip(weights.iter())
        .enumerate()
        .filter(|(i, _)| mask.map_or(true, |m| m[*i]))
        .map(|(_, (x, w))| (x * w).abs());
    match metric {
        ConvergenceMetric::Max => scaled.fold(0.0, f64::max),
        ConvergenceMetric::Rms => {
            let (sum, count) = scaled.fold((0.0, 0usize), |(s, n), x| (s + x * x, n + 1));
            if count == 0 { 0.0 } else { (sum / count as f64).sqrt() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masked_rms_ignores_algebraic_components() {
        let v = DVector::from_vec(vec![3.0, 100.0, 4.0]);
        let w = DVector::from_element(3, 1.0);
        let mask = [true, false, true];
        let rms = weighted_norm(&v, &w, Some(mask.as_slice()), ConvergenceMetric::Rms);
        assert!((rms - (12.5f64).sqrt()).abs() < 1e-12);
        assert_eq!(weighted_norm(&v, &w, None, ConvergenceMetric::Max), 100.0);
    }

    #[test]
    fn weights_follow_the_larger_state() {
        let tol = Tolerance { rtol: 0.1, atol: 1.0 };
        let a = DVector::from_vec(vec![10.0, 0.0]);
        let b = DVector::from_vec(vec![0.0, -20.0]);
        let w = tol.weights(&a, &b);
        assert!((w[0] - 0.5).abs() < 1e-12);
        assert!((w[1] - 1.0 / 3.0).abs() < 1e-12);
    }
}
