//! Raw per-entity signal inputs.

use std::collections::BTreeMap;

use common::{Component, SafetyRecord, Snapshot};
use serde::{Deserialize, Serialize};

/// Raw component values for one entity. Units are component-specific;
/// the matching `Normalizer` maps them onto 0–100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySignals {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub signals: BTreeMap<Component, f64>,
}

impl EntitySignals {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signals: BTreeMap::new(),
        }
    }

    pub fn with(mut self, component: Component, value: f64) -> Self {
        self.signals.insert(component, value);
        self
    }

    /// Raw value for `component`; absent components read as 0.
    ///
    /// Scoring does not normalize absent components at all, so an
    /// inverting normalizer never turns a missing signal into 100.
    pub fn raw(&self, component: Component) -> f64 {
        self.signals.get(&component).copied().unwrap_or(0.0)
    }
}

/// Signal inputs keyed by entity code.
pub type SignalInputs = BTreeMap<String, EntitySignals>;

/// Advisory scale (0–5) → 0–100 points.
const ADVISORY_POINTS_PER_UNIT: f64 = 20.0;

/// Map a cached advisory snapshot onto the `security` component.
pub fn signals_from_advisories(snapshot: &Snapshot<SafetyRecord>) -> SignalInputs {
    snapshot
        .data
        .iter()
        .map(|(code, record)| {
            let signals = EntitySignals::new(record.display_name.clone()).with(
                Component::Security,
                record.raw_score * ADVISORY_POINTS_PER_UNIT,
            );
            (code.to_uppercase(), signals)
        })
        .collect()
}

/// Overlay `supplemental` under `primary`.
///
/// Primary values win per component; supplemental values only fill
/// components (and entities) the primary set lacks.
pub fn merge_signals(primary: &SignalInputs, supplemental: &SignalInputs) -> SignalInputs {
    let mut merged = primary.clone();
    for (code, extra) in supplemental {
        let entry = merged
            .entry(code.clone())
            .or_insert_with(|| EntitySignals::new(extra.name.clone()));
        if entry.name.is_empty() {
            entry.name = extra.name.clone();
        }
        for (component, value) in &extra.signals {
            entry.signals.entry(*component).or_insert(*value);
        }
    }
    merged
}
