use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Transport and stoichiometric properties of one electrolyte species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesRecord {
    pub name: String,
    /// Charge number.
    pub charge: f64,
    /// Bulk diffusion coefficient [m^2/s].
    pub diffusivity: f64,
    /// Whether the species takes part in the face fluxes at all.
    pub transports: bool,
    /// Sulfur atoms per molecule.
    #[serde(default)]
    pub sulfur_atoms: u32,
}

impl SpeciesRecord {
    pub fn new(name: &str, charge: f64, diffusivity: f64, transports: bool, sulfur_atoms: u32) -> Self {
        Self {
            name: name.to_string(),
            charge,
            diffusivity,
            transports,
            sulfur_atoms,
        }
    }

    /// Electrons needed to turn every sulfur atom of one molecule into S^2-.
    pub fn electrons_to_sulfide(&self) -> f64 {
        if self.sulfur_atoms == 0 {
            0.0
        } else {
            2.0 * self.sulfur_atoms as f64 + self.charge
        }
    }
}

/// Ordered electrolyte species set. The order is the order of the
/// concentration sub-block in every node of the state vector.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesTable {
    records: Vec<SpeciesRecord>,
}

impl SpeciesTable {
    pub fn new(records: Vec<SpeciesRecord>) -> Result<Self, ConfigurationError> {
        if records.is_empty() {
            return Err(ConfigurationError::invalid("species", "at least one species is required"));
        }
        for (i, r) in records.iter().enumerate() {
            if records[..i].iter().any(|other| other.name == r.name) {
                return Err(ConfigurationError::invalid(
                    "species",
                    format!("duplicate species `{}`", r.name),
                ));
            }
            if !(r.diffusivity >= 0.0) {
                return Err(ConfigurationError::invalid(
                    "species",
                    format!("negative diffusivity for `{}`", r.name),
                ));
            }
        }
        Ok(Self { records })
    }

    /// Two solvents, Li+, PF6-, dissolved S8 and the polysulfide ladder down to S^2-.
    pub fn lithium_sulfur() -> Self {
        Self {
            records: vec![
                SpeciesRecord::new("EC(e)", 0.0, 1e-12, false, 0),
                SpeciesRecord::new("PC(e)", 0.0, 1e-12, false, 0),
                SpeciesRecord::new("Li+(e)", 1.0, 1e-10, true, 0),
                SpeciesRecord::new("PF6-(e)", -1.0, 4e-10, true, 0),
                SpeciesRecord::new("S8(e)", 0.0, 1e-9, true, 8),
                SpeciesRecord::new("S8-2(e)", -2.0, 6e-10, true, 8),
                SpeciesRecord::new("S6-2(e)", -2.0, 6e-10, true, 6),
                SpeciesRecord::new("S4-2(e)", -2.0, 1e-10, true, 4),
                SpeciesRecord::new("S2-2(e)", -2.0, 1e-10, true, 2),
                SpeciesRecord::new("S-2(e)", -2.0, 1e-10, true, 1),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SpeciesRecord] {
        &self.records
    }

    pub fn get(&self, k: usize) -> &SpeciesRecord {
        &self.records[k]
    }

    pub fn index_of(&self, name: &str) -> Result<usize, ConfigurationError> {
        self.records
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| ConfigurationError::UnknownSpecies(name.to_string()))
    }

    pub fn charges(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.charge).collect()
    }
}

impl Default for SpeciesTable {
    fn default() -> Self {
        Self::lithium_sulfur()
    }
}
