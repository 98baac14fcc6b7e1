use thiserror::Error;

use crate::numerics::newton::SolverError;

/// Invalid geometry, species set or scenario parameters. Detected before any
/// integration starts.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("{domain} must have at least one node")]
    EmptyDomain { domain: &'static str },
    #[error("species count mismatch: layout expects {expected}, chemistry provides {found}")]
    SpeciesCountMismatch { expected: usize, found: usize },
    #[error("unknown species `{0}`")]
    UnknownSpecies(String),
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse scenario file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigurationError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("phase `{phase}` failed at t = {time:.6e} s: {source}")]
    Solver {
        phase: String,
        time: f64,
        #[source]
        source: SolverError,
    },
}
