use super::layout::StateLayout;
use crate::chemistry::species::SpeciesTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DomainKind {
    Anode,
    Separator,
    Cathode,
}

impl DomainKind {
    /// Physical order from the cathode current collector to the anode one.
    pub const PHYSICAL_ORDER: [DomainKind; 3] =
        [DomainKind::Cathode, DomainKind::Separator, DomainKind::Anode];

    pub fn name(&self) -> &'static str {
        match self {
            DomainKind::Anode => "anode",
            DomainKind::Separator => "separator",
            DomainKind::Cathode => "cathode",
        }
    }

    pub fn is_electrode(&self) -> bool {
        !matches!(self, DomainKind::Separator)
    }
}

/// Geometry and transport parameters of one domain, fixed for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainDescriptor {
    pub kind: DomainKind,
    pub nodes: usize,
    pub thickness: f64,
    /// Node thickness [m].
    pub dy: f64,
    /// Electrolyte volume fraction without precipitates.
    pub base_porosity: f64,
    pub tortuosity: f64,
    /// Per-species diffusivity over tortuosity [m^2/s]; multiplied by the
    /// local porosity at every evaluation. Zero for non-transporting species.
    pub diffusivity: Vec<f64>,
    /// [F/m^2]
    pub double_layer_capacitance: f64,
    /// Effective electronic conductivity of the solid matrix [S/m].
    pub conductivity: f64,
    /// Reactive surface per volume: free carbon in the cathode, lithium in
    /// the anode [1/m].
    pub specific_area: f64,
    /// State offset of each node.
    pub offsets: Vec<usize>,
}

/// Parameters a domain is built from, before the layout is known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainGeometry {
    pub thickness: f64,
    pub base_porosity: f64,
    pub tortuosity: f64,
    pub double_layer_capacitance: f64,
    pub conductivity: f64,
    pub specific_area: f64,
}

impl DomainDescriptor {
    pub fn new(
        kind: DomainKind,
        geometry: DomainGeometry,
        species: &SpeciesTable,
        layout: &StateLayout,
    ) -> Self {
        let offsets = layout.domain(kind).offsets.clone();
        let nodes = offsets.len();
        let diffusivity = species
            .records()
            .iter()
            .map(|s| {
                if s.transports {
                    s.diffusivity / geometry.tortuosity
                } else {
                    0.0
                }
            })
            .collect();
        Self {
            kind,
            nodes,
            thickness: geometry.thickness,
            dy: geometry.thickness / nodes as f64,
            base_porosity: geometry.base_porosity,
            tortuosity: geometry.tortuosity,
            diffusivity,
            double_layer_capacitance: geometry.double_layer_capacitance,
            conductivity: geometry.conductivity,
            specific_area: geometry.specific_area,
            offsets,
        }
    }
}

/// The three domain descriptors of a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainSet {
    pub anode: DomainDescriptor,
    pub separator: DomainDescriptor,
    pub cathode: DomainDescriptor,
}

impl DomainSet {
    pub fn get(&self, kind: DomainKind) -> &DomainDescriptor {
        match kind {
            DomainKind::Anode => &self.anode,
            DomainKind::Separator => &self.separator,
            DomainKind::Cathode => &self.cathode,
        }
    }
}
