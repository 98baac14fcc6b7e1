use super::domain::{DomainKind, DomainSet};
use super::mesh::{Cell, Face, FaceKind, Mesh};

/// Lays the domains out from the cathode collector to the anode collector
/// and builds one explicit face per cell boundary.
pub fn build_mesh(domains: &DomainSet) -> Mesh {
    let mut cells = Vec::new();
    let mut x = 0.0;
    for kind in DomainKind::PHYSICAL_ORDER {
        let d = domains.get(kind);
        for (node, &offset) in d.offsets.iter().enumerate() {
            let id = cells.len();
            cells.push(Cell {
                id,
                domain: kind,
                node,
                offset,
                dy: d.dy,
                centroid: x + 0.5 * d.dy,
                inlet: id,
            });
            x += d.dy;
        }
    }

    let n = cells.len();
    let mut faces = Vec::with_capacity(n + 1);
    faces.push(Face {
        id: 0,
        kind: FaceKind::CathodeCollector,
        left: None,
        right: Some(0),
        position: 0.0,
        distance: 0.0,
    });
    for i in 1..n {
        let (a, b) = (&cells[i - 1], &cells[i]);
        faces.push(Face {
            id: i,
            kind: if a.domain == b.domain {
                FaceKind::Interior
            } else {
                FaceKind::DomainBoundary
            },
            left: Some(i - 1),
            right: Some(i),
            position: a.centroid + 0.5 * a.dy,
            distance: 0.5 * (a.dy + b.dy),
        });
    }
    faces.push(Face {
        id: n,
        kind: FaceKind::AnodeCollector,
        left: Some(n - 1),
        right: None,
        position: x,
        distance: 0.0,
    });

    Mesh { cells, faces }
}
