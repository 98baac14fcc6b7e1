use log::debug;
use serde::{Deserialize, Serialize};

use super::species::SpeciesTable;
use super::{ChemistryProvider, Interface, InterfaceRates, PhaseState, SolidPhase};
use crate::error::ConfigurationError;
use crate::physics::{bounded_exp, constant, positive_part, Real, FARADAY, GAS_CONSTANT};

/// Rate law of one reaction, written in its forward direction.
#[derive(Debug, Clone, PartialEq)]
pub enum RateLaw {
    /// `k [prod(c_R^nu) exp(-a n f eta) - prod(c_P^nu) exp((1-a) n f eta)]`,
    /// `eta = (phi_ed - phi_el) - e0`. Forward is reduction.
    ButlerVolmer { k: f64, alpha: f64, e0: f64 },
    /// `k [k_eq prod(c_R^nu) - prod(c_P^nu)]`.
    MassAction { k: f64, k_eq: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub name: String,
    pub interface: Interface,
    /// Electrolyte species consumed by the forward reaction.
    pub reactants: Vec<(usize, i32)>,
    /// Electrolyte species produced by the forward reaction.
    pub products: Vec<(usize, i32)>,
    /// Electrons consumed by the forward reaction.
    pub electrons: i32,
    /// Change of the interface's own solid per forward event.
    pub solid_change: f64,
    pub law: RateLaw,
    /// Forward rate at the reference state [kmol/m^2/s]; charge-transfer
    /// steps get their `k` from it when tuned.
    pub exchange_rate: f64,
}

impl Reaction {
    fn reactant_product<T: Real>(&self, c: &[T]) -> T {
        mass_action_product(&self.reactants, c)
    }

    fn product_product<T: Real>(&self, c: &[T]) -> T {
        mass_action_product(&self.products, c)
    }

    /// Net forward rate [kmol/m^2/s].
    pub fn rate<T: Real>(&self, state: &PhaseState<T>) -> T {
        let c = state.concentrations;
        match &self.law {
            RateLaw::ButlerVolmer { k, alpha, e0 } => {
                let nf = self.electrons as f64 * FARADAY / (GAS_CONSTANT * state.temperature);
                let eta = state.electrode_potential.clone() - state.electrolyte_potential.clone() - *e0;
                let fwd = self.reactant_product(c) * bounded_exp(eta.clone() * (-alpha * nf));
                let rev = self.product_product(c) * bounded_exp(eta * ((1.0 - alpha) * nf));
                (fwd - rev) * *k
            }
            RateLaw::MassAction { k, k_eq } => {
                (self.reactant_product(c) * *k_eq - self.product_product(c)) * *k
            }
        }
    }

    pub fn delta_gibbs(&self, state: &PhaseState<f64>) -> f64 {
        let rt = GAS_CONSTANT * state.temperature;
        let ln_q = ln_product(&self.products, state.concentrations)
            - ln_product(&self.reactants, state.concentrations);
        match &self.law {
            RateLaw::ButlerVolmer { e0, .. } => {
                let eta = state.electrode_potential - state.electrolyte_potential - e0;
                self.electrons as f64 * FARADAY * eta + rt * ln_q
            }
            RateLaw::MassAction { k_eq, .. } => rt * (ln_q - k_eq.ln()),
        }
    }
}

fn mass_action_product<T: Real>(terms: &[(usize, i32)], c: &[T]) -> T {
    terms
        .iter()
        .fold(constant::<T>(1.0), |acc, &(k, nu)| acc * positive_part(&c[k]).powi(nu))
}

fn ln_product(terms: &[(usize, i32)], c: &[f64]) -> f64 {
    terms
        .iter()
        .map(|&(k, nu)| nu as f64 * c[k].max(f64::MIN_POSITIVE).ln())
        .sum()
}

/// Rate and thermodynamic parameters of the built-in Li-S reaction set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KineticParams {
    /// Forward rate at the reference state of each carbon step, S8 to S^2-.
    pub carbon_exchange_rates: [f64; 5],
    pub lithium_exchange_rate: f64,
    pub symmetry_factor: f64,
    /// S8(s) -> S8(e) rate constant [m/s].
    pub sulfur_dissolution: f64,
    /// Li2S(s) -> 2 Li+ + S^2- rate constant.
    pub sulfide_dissolution: f64,
    /// [m^3/kmol]
    pub sulfur_molar_volume: f64,
    /// [m^3/kmol]
    pub sulfide_molar_volume: f64,
}

impl Default for KineticParams {
    fn default() -> Self {
        Self {
            carbon_exchange_rates: [1e-6; 5],
            lithium_exchange_rate: 1e-6,
            symmetry_factor: 0.5,
            sulfur_dissolution: 1e-2,
            sulfide_dissolution: 1e10,
            sulfur_molar_volume: 256.52 / 2070.0,
            sulfide_molar_volume: 45.95 / 1640.0,
        }
    }
}

/// Built-in reaction network: the polysulfide reduction ladder on carbon,
/// S8 and Li2S dissolution, and lithium stripping/plating.
#[derive(Debug, Clone)]
pub struct LiSKinetics {
    species: SpeciesTable,
    reactions: Vec<Reaction>,
    sulfur_molar_volume: f64,
    sulfide_molar_volume: f64,
}

impl LiSKinetics {
    pub fn new(species: SpeciesTable, params: &KineticParams) -> Result<Self, ConfigurationError> {
        let idx = |name: &str| species.index_of(name);
        let li = idx("Li+(e)")?;
        let s8 = idx("S8(e)")?;
        let s8_2 = idx("S8-2(e)")?;
        let s6_2 = idx("S6-2(e)")?;
        let s4_2 = idx("S4-2(e)")?;
        let s2_2 = idx("S2-2(e)")?;
        let s_2 = idx("S-2(e)")?;

        if !(0.0..=1.0).contains(&params.symmetry_factor) {
            return Err(ConfigurationError::invalid(
                "symmetry_factor",
                "must lie in [0, 1]",
            ));
        }
        let bv = || RateLaw::ButlerVolmer {
            k: 0.0,
            alpha: params.symmetry_factor,
            e0: 0.0,
        };
        let ladder = [
            ("S8 + 2e- -> S8^2-", vec![(s8, 1)], vec![(s8_2, 1)]),
            ("3 S8^2- + 2e- -> 4 S6^2-", vec![(s8_2, 3)], vec![(s6_2, 4)]),
            ("2 S6^2- + 2e- -> 3 S4^2-", vec![(s6_2, 2)], vec![(s4_2, 3)]),
            ("S4^2- + 2e- -> 2 S2^2-", vec![(s4_2, 1)], vec![(s2_2, 2)]),
            ("S2^2- + 2e- -> 2 S^2-", vec![(s2_2, 1)], vec![(s_2, 2)]),
        ];

        let mut reactions: Vec<Reaction> = ladder
            .into_iter()
            .zip(params.carbon_exchange_rates)
            .map(|((name, reactants, products), exchange_rate)| Reaction {
                name: name.to_string(),
                interface: Interface::Carbon,
                reactants,
                products,
                electrons: 2,
                solid_change: 0.0,
                law: bv(),
                exchange_rate,
            })
            .collect();

        reactions.push(Reaction {
            name: "S8(s) -> S8(e)".to_string(),
            interface: Interface::Sulfur,
            reactants: vec![],
            products: vec![(s8, 1)],
            electrons: 0,
            solid_change: -1.0,
            law: RateLaw::MassAction {
                k: params.sulfur_dissolution,
                k_eq: 1.0,
            },
            exchange_rate: 0.0,
        });
        reactions.push(Reaction {
            name: "Li2S(s) -> 2 Li+ + S^2-".to_string(),
            interface: Interface::LithiumSulfide,
            reactants: vec![],
            products: vec![(li, 2), (s_2, 1)],
            electrons: 0,
            solid_change: -1.0,
            law: RateLaw::MassAction {
                k: params.sulfide_dissolution,
                k_eq: 1.0,
            },
            exchange_rate: 0.0,
        });
        reactions.push(Reaction {
            name: "Li+ + e- -> Li(s)".to_string(),
            interface: Interface::Lithium,
            reactants: vec![(li, 1)],
            products: vec![],
            electrons: 1,
            solid_change: 1.0,
            law: bv(),
            exchange_rate: params.lithium_exchange_rate,
        });

        Ok(Self {
            species,
            reactions,
            sulfur_molar_volume: params.sulfur_molar_volume,
            sulfide_molar_volume: params.sulfide_molar_volume,
        })
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    pub fn reactions_on(&self, interface: Interface) -> impl Iterator<Item = &Reaction> {
        self.reactions.iter().filter(move |r| r.interface == interface)
    }

    /// Sets every standard potential and equilibrium constant so that
    /// `composition` is in equilibrium with the given double-layer potentials.
    /// Charge-transfer rate constants are rescaled so that each forward rate at
    /// this reference equals its exchange rate.
    pub fn tune_to(
        &mut self,
        composition: &[f64],
        cathode_dl: f64,
        anode_dl: f64,
        temperature: f64,
    ) -> Result<(), ConfigurationError> {
        if composition.len() != self.species.len() {
            return Err(ConfigurationError::SpeciesCountMismatch {
                expected: self.species.len(),
                found: composition.len(),
            });
        }
        let f = FARADAY / (GAS_CONSTANT * temperature);
        for r in self.reactions.iter_mut() {
            let ln_r = ln_product(&r.reactants, composition);
            let ln_p = ln_product(&r.products, composition);
            match &mut r.law {
                RateLaw::ButlerVolmer { k, alpha, e0 } => {
                    let dl = if r.interface == Interface::Lithium {
                        anode_dl
                    } else {
                        cathode_dl
                    };
                    let nf = r.electrons as f64 * f;
                    let eta = (ln_r - ln_p) / nf;
                    *e0 = dl - eta;
                    let fwd = (ln_r - *alpha * nf * eta).exp();
                    *k = if fwd > 0.0 { r.exchange_rate / fwd } else { 0.0 };
                    debug!("tuned `{}`: e0 = {:.6} V, k = {:.3e}", r.name, e0, k);
                }
                RateLaw::MassAction { k_eq, .. } => {
                    *k_eq = mass_action_product(&r.products, composition)
                        / mass_action_product(&r.reactants, composition);
                    debug!("tuned `{}`: K = {:.6e}", r.name, k_eq);
                }
            }
        }
        Ok(())
    }
}

impl ChemistryProvider for LiSKinetics {
    fn species(&self) -> &SpeciesTable {
        &self.species
    }

    fn production_rates<T: Real>(&self, interface: Interface, state: &PhaseState<T>) -> InterfaceRates<T> {
        let mut rates = InterfaceRates::zeros(self.species.len());
        for r in self.reactions_on(interface) {
            let q = r.rate(state);
            for &(k, nu) in &r.reactants {
                rates.electrolyte[k] -= q.clone() * nu as f64;
            }
            for &(k, nu) in &r.products {
                rates.electrolyte[k] += q.clone() * nu as f64;
            }
            rates.electron -= q.clone() * r.electrons as f64;
            rates.solid += q * r.solid_change;
        }
        rates
    }

    fn molar_volume(&self, phase: SolidPhase) -> f64 {
        match phase {
            SolidPhase::Sulfur => self.sulfur_molar_volume,
            SolidPhase::LithiumSulfide => self.sulfide_molar_volume,
        }
    }

    fn delta_gibbs(&self, interface: Interface, state: &PhaseState<f64>) -> Vec<f64> {
        self.reactions_on(interface).map(|r| r.delta_gibbs(state)).collect()
    }
}
