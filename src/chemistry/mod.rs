pub mod kinetics;
pub mod species;

use crate::physics::Real;
use species::SpeciesTable;

/// Reacting surfaces seen by the electrolyte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interface {
    /// Bare carbon in the cathode, hosts the polysulfide charge-transfer ladder.
    Carbon,
    /// Precipitated S8 particles (dissolution/precipitation).
    Sulfur,
    /// Precipitated Li2S particles (dissolution/precipitation).
    LithiumSulfide,
    /// Lithium metal in the anode.
    Lithium,
}

impl Interface {
    pub const ALL: [Interface; 4] = [
        Interface::Carbon,
        Interface::Sulfur,
        Interface::LithiumSulfide,
        Interface::Lithium,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Interface::Carbon => "carbon",
            Interface::Sulfur => "sulfur",
            Interface::LithiumSulfide => "lithium_sulfide",
            Interface::Lithium => "lithium",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolidPhase {
    Sulfur,
    LithiumSulfide,
}

/// Composition and potentials of one interface at the current trial state.
pub struct PhaseState<'a, T> {
    /// Electrolyte concentrations [kmol/m^3], in species-table order.
    pub concentrations: &'a [T],
    pub electrode_potential: T,
    pub electrolyte_potential: T,
    pub temperature: f64,
}

/// Net production rates at one interface [kmol/m^2/s].
#[derive(Debug, Clone)]
pub struct InterfaceRates<T> {
    pub electrolyte: Vec<T>,
    /// Net production of the interface's own solid phase.
    pub solid: T,
    /// Net production of electrons (positive for oxidation).
    pub electron: T,
}

impl<T: Real> InterfaceRates<T> {
    pub fn zeros(n_species: usize) -> Self {
        Self {
            electrolyte: vec![T::zero(); n_species],
            solid: T::zero(),
            electron: T::zero(),
        }
    }
}

/// Property evaluation for the electrolyte and its interfaces.
///
/// Every call is a pure function of the supplied state. Implementations that
/// wrap a stateful engine must set composition and potential and read the
/// rates back inside the call.
pub trait ChemistryProvider {
    fn species(&self) -> &SpeciesTable;

    fn production_rates<T: Real>(&self, interface: Interface, state: &PhaseState<T>) -> InterfaceRates<T>;

    /// Molar volume of a precipitate [m^3/kmol].
    fn molar_volume(&self, phase: SolidPhase) -> f64;

    /// Gibbs energy of each reaction on `interface`, forward direction [J/kmol].
    fn delta_gibbs(&self, interface: Interface, state: &PhaseState<f64>) -> Vec<f64>;
}
