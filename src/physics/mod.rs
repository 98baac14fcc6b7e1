pub mod boundary;
pub mod diagnostics;
pub mod events;
pub mod flux;
pub mod morphology;
pub mod residual;

use nalgebra::DVector;
use num_dual::DualNum;

/// Faraday constant [C/kmol].
pub const FARADAY: f64 = 96_485_332.1;
/// Universal gas constant [J/(kmol K)].
pub const GAS_CONSTANT: f64 = 8_314.462;

/// Scalar type the residual is written in. `f64` for plain evaluations,
/// `DualDVec64` when the Jacobian is taken by forward-mode AD.
pub trait Real: nalgebra::Scalar + DualNum<f64> + num_traits::Zero {}

impl<T> Real for T where T: nalgebra::Scalar + DualNum<f64> + num_traits::Zero {}

/// Lifts a constant into the scalar type.
#[inline]
pub fn constant<T: Real>(x: f64) -> T {
    T::from(x)
}

/// `x` when positive, zero otherwise. Rate laws see negative trial
/// concentrations as empty.
#[inline]
pub fn positive_part<T: Real>(x: &T) -> T {
    if x.re() > 0.0 { x.clone() } else { T::zero() }
}

/// Exponential with the argument capped to keep trial states finite.
#[inline]
pub fn bounded_exp<T: Real>(x: T) -> T {
    const CAP: f64 = 250.0;
    let re = x.re();
    if re > CAP {
        constant::<T>(CAP).exp()
    } else if re < -CAP {
        constant::<T>(-CAP).exp()
    } else {
        x.exp()
    }
}

/// Action requested by an event handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Terminate,
}

/// Contract between a DAE system and an implicit integrator:
/// `F(t, y, y') = 0` plus an optional root function.
pub trait ImplicitProblem {
    /// Number of unknowns.
    fn size(&self) -> usize;

    /// `true` for unknowns that appear differentiated in the residual.
    fn differential_mask(&self) -> Vec<bool>;

    /// Residual `F(t, y, y')`. This is the function that gets differentiated.
    fn residual<T: Real>(&self, t: f64, y: &[T], ydot: &[T]) -> DVector<T>;

    /// Indicator functions whose sign changes are tracked between steps.
    fn events(&self, _t: f64, _y: &[f64], _ydot: &[f64]) -> DVector<f64> {
        DVector::zeros(0)
    }

    /// Called once per detected crossing.
    fn handle_event(&self, _index: usize, _t: f64) -> EventAction {
        EventAction::Terminate
    }
}
