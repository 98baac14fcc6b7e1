use crate::chemistry::species::SpeciesTable;
use crate::discretization::layout::{Quantity, StateLayout};

/// One label per state index, e.g. `cathode[0].phi_ed` or
/// `separator[0].C[Li+(e)]`.
pub fn label_columns(layout: &StateLayout, species: &SpeciesTable) -> Vec<String> {
    let mut labels = vec![String::new(); layout.total_size()];
    for d in layout.domains() {
        let domain = d.kind.name();
        for (node, &offset) in d.offsets.iter().enumerate() {
            for (q, range) in d.pointers.entries() {
                for (k, i) in range.clone().enumerate() {
                    labels[offset + i] = match q {
                        Quantity::Concentrations => {
                            format!("{domain}[{node}].C[{}]", species.get(k).name)
                        }
                        _ => format!("{domain}[{node}].{}", q.label()),
                    };
                }
            }
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::domain::DomainKind;
    use crate::discretization::layout::{build_layout, LayoutConfig};

    #[test]
    fn every_index_is_labelled_once() {
        let species = SpeciesTable::lithium_sulfur();
        let layout = build_layout(
            &LayoutConfig {
                anode_nodes: 1,
                separator_nodes: 2,
                cathode_nodes: 1,
                species: species.len(),
            },
            species.len(),
        )
        .unwrap();
        let labels = label_columns(&layout, &species);

        let mut unique = labels.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), labels.len());
        assert!(labels.iter().all(|l| !l.is_empty()));

        let phi = layout.index(DomainKind::Cathode, 0, Quantity::ElectrodePotential).unwrap();
        assert_eq!(labels[phi], "cathode[0].phi_ed");
        let li = layout.species_index(DomainKind::Separator, 1, 2);
        assert_eq!(labels[li], "separator[1].C[Li+(e)]");
    }
}
