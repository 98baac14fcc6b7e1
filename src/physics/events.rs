use std::fmt;

use log::info;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::morphology::PRECIPITATE_FLOOR;
use super::residual::CellModel;
use super::EventAction;
use crate::chemistry::ChemistryProvider;
use crate::discretization::domain::DomainKind;
use crate::discretization::layout::Quantity;

/// Conditions tracked at every cathode node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Precipitated sulfur fills the node.
    SulfurSaturation,
    /// Precipitated sulfur reaches the floor.
    SulfurDepletion,
    SulfideSaturation,
    SulfideDepletion,
    UpperCutoff,
    LowerCutoff,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::SulfurSaturation,
        EventKind::SulfurDepletion,
        EventKind::SulfideSaturation,
        EventKind::SulfideDepletion,
        EventKind::UpperCutoff,
        EventKind::LowerCutoff,
    ];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::SulfurSaturation => "sulfur saturation",
            EventKind::SulfurDepletion => "sulfur depletion",
            EventKind::SulfideSaturation => "Li2S saturation",
            EventKind::SulfideDepletion => "Li2S depletion",
            EventKind::UpperCutoff => "upper voltage cutoff",
            EventKind::LowerCutoff => "lower voltage cutoff",
        };
        f.write_str(s)
    }
}

/// Voltage limits [V].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageWindow {
    pub lower: f64,
    pub upper: f64,
}

impl Default for VoltageWindow {
    fn default() -> Self {
        Self {
            lower: 1.6,
            upper: 3.0,
        }
    }
}

/// Which conditions may stop a phase. Unmonitored indicators are reported
/// as zero and never change sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMonitor {
    kinds: Vec<EventKind>,
}

impl EventMonitor {
    pub fn all() -> Self {
        Self::only(&EventKind::ALL)
    }

    pub fn only(kinds: &[EventKind]) -> Self {
        Self {
            kinds: kinds.to_vec(),
        }
    }

    pub fn without(mut self, kind: EventKind) -> Self {
        self.kinds.retain(|k| *k != kind);
        self
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// Meaning of one entry of the indicator vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSlot {
    pub kind: EventKind,
    /// Cathode node.
    pub node: usize,
}

impl fmt::Display for EventSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at cathode node {}", self.kind, self.node)
    }
}

/// One slot per (cathode node, condition), node-major.
pub fn event_slots<C: ChemistryProvider>(model: &CellModel<C>) -> Vec<EventSlot> {
    let nodes = model.layout.domain(DomainKind::Cathode).nodes();
    (0..nodes)
        .flat_map(|node| EventKind::ALL.into_iter().map(move |kind| EventSlot { kind, node }))
        .collect()
}

/// Signed indicators; a sign change between two accepted steps is an event.
pub fn state_events<C: ChemistryProvider>(
    model: &CellModel<C>,
    _t: f64,
    y: &[f64],
    _ydot: &[f64],
) -> DVector<f64> {
    let layout = &model.layout;
    let window = model.params.cutoffs;
    let value = |node: usize, q: Quantity| {
        layout
            .index(DomainKind::Cathode, node, q)
            .map_or(0.0, |i| y[i])
    };
    let slots = event_slots(model);
    DVector::from_iterator(
        slots.len(),
        slots.iter().map(|slot| {
            if !model.monitor.contains(slot.kind) {
                return 0.0;
            }
            let n = slot.node;
            match slot.kind {
                EventKind::SulfurSaturation => 1.0 - value(n, Quantity::SulfurFraction),
                EventKind::SulfurDepletion => value(n, Quantity::SulfurFraction) - PRECIPITATE_FLOOR,
                EventKind::SulfideSaturation => 1.0 - value(n, Quantity::SulfideFraction),
                EventKind::SulfideDepletion => value(n, Quantity::SulfideFraction) - PRECIPITATE_FLOOR,
                EventKind::UpperCutoff => window.upper - value(n, Quantity::ElectrodePotential),
                EventKind::LowerCutoff => value(n, Quantity::ElectrodePotential) - window.lower,
            }
        }),
    )
}

/// Every detected event ends the current phase.
pub fn handle_event<C: ChemistryProvider>(model: &CellModel<C>, index: usize, t: f64) -> EventAction {
    match event_slots(model).get(index) {
        Some(slot) => info!("stopped due to event: {slot} (t = {t:.3} s)"),
        None => info!("stopped due to event #{index} (t = {t:.3} s)"),
    }
    EventAction::Terminate
}
