use super::domain::DomainKind;

/// The 1D grid through the cell, cathode collector at `x = 0`.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub cells: Vec<Cell>,
    pub faces: Vec<Face>,
}

/// A single control volume (one node of one domain).
#[derive(Debug, Clone)]
pub struct Cell {
    pub id: usize,
    pub domain: DomainKind,
    /// Node index within its domain.
    pub node: usize,
    /// State offset of the node block.
    pub offset: usize,
    pub dy: f64,
    pub centroid: f64,
    /// Index of the face towards the cathode collector; the outlet face is `inlet + 1`.
    pub inlet: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceKind {
    CathodeCollector,
    /// Both neighbours in the same domain.
    Interior,
    /// Neighbours in different domains.
    DomainBoundary,
    AnodeCollector,
}

/// An interface between two cells, or between a cell and a collector.
#[derive(Debug, Clone)]
pub struct Face {
    pub id: usize,
    pub kind: FaceKind,
    /// Neighbour on the cathode side. `None` at the cathode collector.
    pub left: Option<usize>,
    /// Neighbour on the anode side. `None` at the anode collector.
    pub right: Option<usize>,
    pub position: f64,
    /// Centroid-to-centroid distance; zero on collector faces.
    pub distance: f64,
}

impl Mesh {
    pub fn inlet(&self, cell: &Cell) -> &Face {
        &self.faces[cell.inlet]
    }

    pub fn outlet(&self, cell: &Cell) -> &Face {
        &self.faces[cell.inlet + 1]
    }

    pub fn cells_in(&self, kind: DomainKind) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(move |c| c.domain == kind)
    }

    pub fn length(&self) -> f64 {
        self.faces.last().map_or(0.0, |f| f.position)
    }
}
