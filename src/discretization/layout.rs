use std::ops::Range;

use super::domain::DomainKind;
use crate::error::ConfigurationError;

/// Named unknowns inside one node block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Quantity {
    ElectrodePotential,
    DoubleLayerPotential,
    ElectrolytePotential,
    SulfurFraction,
    SulfideFraction,
    SulfurSites,
    SulfideSites,
    Concentrations,
}

impl Quantity {
    pub fn label(&self) -> &'static str {
        match self {
            Quantity::ElectrodePotential => "phi_ed",
            Quantity::DoubleLayerPotential => "phi_dl",
            Quantity::ElectrolytePotential => "phi_el",
            Quantity::SulfurFraction => "eps_S8",
            Quantity::SulfideFraction => "eps_Li2S",
            Quantity::SulfurSites => "np_S8",
            Quantity::SulfideSites => "np_Li2S",
            Quantity::Concentrations => "C",
        }
    }

    /// Potentials fixed by charge conservation carry no time derivative.
    pub fn is_differential(&self) -> bool {
        !matches!(
            self,
            Quantity::ElectrodePotential | Quantity::ElectrolytePotential
        )
    }
}

/// Offsets of every quantity within a node block; identical for all nodes
/// of a domain.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerTable {
    entries: Vec<(Quantity, Range<usize>)>,
    block_size: usize,
}

impl PointerTable {
    pub fn for_domain(kind: DomainKind, n_species: usize) -> Self {
        use Quantity::*;
        let scalars: &[Quantity] = match kind {
            DomainKind::Cathode => &[
                ElectrodePotential,
                DoubleLayerPotential,
                SulfurFraction,
                SulfideFraction,
                SulfurSites,
                SulfideSites,
            ],
            DomainKind::Separator => &[ElectrolytePotential],
            DomainKind::Anode => &[ElectrodePotential, DoubleLayerPotential],
        };

        let mut entries = Vec::with_capacity(scalars.len() + 1);
        let mut next = 0;
        for &q in scalars {
            entries.push((q, next..next + 1));
            next += 1;
        }
        entries.push((Concentrations, next..next + n_species));
        Self {
            entries,
            block_size: next + n_species,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn entries(&self) -> &[(Quantity, Range<usize>)] {
        &self.entries
    }

    pub fn range(&self, q: Quantity) -> Option<Range<usize>> {
        self.entries
            .iter()
            .find(|(name, _)| *name == q)
            .map(|(_, r)| r.clone())
    }

    /// Offset of a scalar quantity.
    pub fn get(&self, q: Quantity) -> Option<usize> {
        self.range(q).map(|r| r.start)
    }

    /// Offset of the first species concentration.
    pub fn species_start(&self) -> usize {
        self.get(Quantity::Concentrations).unwrap_or(self.block_size)
    }
}

/// Node counts handed to [`build_layout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    pub anode_nodes: usize,
    pub separator_nodes: usize,
    pub cathode_nodes: usize,
    pub species: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DomainLayout {
    pub kind: DomainKind,
    /// State offset of each node block, in node order.
    pub offsets: Vec<usize>,
    pub pointers: PointerTable,
}

impl DomainLayout {
    pub fn nodes(&self) -> usize {
        self.offsets.len()
    }
}

/// Flat state vector layout: anode blocks, then separator, then cathode.
#[derive(Debug, Clone, PartialEq)]
pub struct StateLayout {
    domains: [DomainLayout; 3],
    n_species: usize,
    total_size: usize,
}

/// Builds the block layout for the three domains. Fails if a domain is empty
/// or the species count disagrees with what the chemistry provides.
pub fn build_layout(
    config: &LayoutConfig,
    provider_species: usize,
) -> Result<StateLayout, ConfigurationError> {
    if config.species != provider_species {
        return Err(ConfigurationError::SpeciesCountMismatch {
            expected: config.species,
            found: provider_species,
        });
    }
    if config.species == 0 {
        return Err(ConfigurationError::invalid("species", "no electrolyte species"));
    }

    let mut next = 0;
    let mut block = |kind: DomainKind, nodes: usize| -> Result<DomainLayout, ConfigurationError> {
        if nodes == 0 {
            return Err(ConfigurationError::EmptyDomain { domain: kind.name() });
        }
        let pointers = PointerTable::for_domain(kind, config.species);
        let offsets = (0..nodes)
            .map(|i| next + i * pointers.block_size())
            .collect();
        next += nodes * pointers.block_size();
        Ok(DomainLayout {
            kind,
            offsets,
            pointers,
        })
    };

    let anode = block(DomainKind::Anode, config.anode_nodes)?;
    let separator = block(DomainKind::Separator, config.separator_nodes)?;
    let cathode = block(DomainKind::Cathode, config.cathode_nodes)?;

    Ok(StateLayout {
        domains: [anode, separator, cathode],
        n_species: config.species,
        total_size: next,
    })
}

impl StateLayout {
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn n_species(&self) -> usize {
        self.n_species
    }

    pub fn domain(&self, kind: DomainKind) -> &DomainLayout {
        match kind {
            DomainKind::Anode => &self.domains[0],
            DomainKind::Separator => &self.domains[1],
            DomainKind::Cathode => &self.domains[2],
        }
    }

    /// Domains in storage order.
    pub fn domains(&self) -> &[DomainLayout] {
        &self.domains
    }

    pub fn offset(&self, kind: DomainKind, node: usize) -> usize {
        self.domain(kind).offsets[node]
    }

    /// Global index of a scalar quantity, if the domain carries it.
    pub fn index(&self, kind: DomainKind, node: usize, q: Quantity) -> Option<usize> {
        let d = self.domain(kind);
        d.pointers.get(q).map(|p| d.offsets[node] + p)
    }

    pub fn species_index(&self, kind: DomainKind, node: usize, k: usize) -> usize {
        let d = self.domain(kind);
        d.offsets[node] + d.pointers.species_start() + k
    }

    pub fn differential_mask(&self) -> Vec<bool> {
        let mut mask = vec![true; self.total_size];
        for d in &self.domains {
            for &offset in &d.offsets {
                for (q, range) in d.pointers.entries() {
                    for i in range.clone() {
                        mask[offset + i] = q.is_differential();
                    }
                }
            }
        }
        mask
    }
}
