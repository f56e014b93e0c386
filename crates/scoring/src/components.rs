//! Component normalization and fixed weighting.

use std::collections::BTreeMap;
use std::fmt;

use common::Component;

/// Fixed component weights. They sum to 1.0.
pub const COMPONENT_WEIGHTS: [(Component, f64); 4] = [
    (Component::Conflict, 0.30),
    (Component::Security, 0.20),
    (Component::Information, 0.25),
    (Component::Unrest, 0.25),
];

pub fn component_weight(component: Component) -> f64 {
    COMPONENT_WEIGHTS
        .iter()
        .find(|(c, _)| *c == component)
        .map(|(_, w)| *w)
        .unwrap_or(0.0)
}

/// Maps a raw component signal onto the 0–100 scale.
#[derive(Clone, Copy)]
pub enum Normalizer {
    /// Value is already 0–100.
    Clamp,
    /// 0–100 metric pointing the other way (e.g. a stability index).
    Invert,
    /// Event counts: `points_per_unit` each, saturating at `cap`.
    ScaleCount { points_per_unit: f64, cap: f64 },
    Custom(fn(f64) -> f64),
}

impl Normalizer {
    /// Always lands in [0, 100]; non-finite input reads as 0.
    pub fn apply(&self, raw: f64) -> f64 {
        let raw = if raw.is_finite() { raw } else { 0.0 };
        let value = match self {
            Normalizer::Clamp => raw,
            Normalizer::Invert => 100.0 - raw.clamp(0.0, 100.0),
            Normalizer::ScaleCount { points_per_unit, cap } => {
                (raw.max(0.0) * points_per_unit).min(*cap)
            }
            Normalizer::Custom(f) => f(raw),
        };
        if value.is_finite() {
            value.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Normalizer::Clamp => f.write_str("Clamp"),
            Normalizer::Invert => f.write_str("Invert"),
            Normalizer::ScaleCount { points_per_unit, cap } => f
                .debug_struct("ScaleCount")
                .field("points_per_unit", points_per_unit)
                .field("cap", cap)
                .finish(),
            Normalizer::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Per-component normalizer table. Components without an entry use `Clamp`.
#[derive(Debug, Clone, Default)]
pub struct Normalizers {
    table: BTreeMap<Component, Normalizer>,
}

impl Normalizers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, component: Component, normalizer: Normalizer) -> Self {
        self.table.insert(component, normalizer);
        self
    }

    pub fn get(&self, component: Component) -> Normalizer {
        self.table.get(&component).copied().unwrap_or(Normalizer::Clamp)
    }

    pub fn apply(&self, component: Component, raw: f64) -> f64 {
        self.get(component).apply(raw)
    }
}
