//! Composite score computation and the refresh protocol.
//!
//! `compute_scores` is pure. `ScoringEngine` wraps it with the
//! focal-point readiness gate and the previous-snapshot bookkeeping
//! needed for trend.

use std::collections::BTreeMap;

use common::{Component, ComponentScores, CountryScore, ScoreLevel, Trend};
use tracing::{debug, info};

use crate::components::{component_weight, Normalizers};
use crate::signals::{merge_signals, SignalInputs};

/// Last computed score per entity code.
pub type PreviousScores = BTreeMap<String, u32>;

/// Score every entity in `inputs`.
///
/// Output covers exactly the input key set (zero scores included),
/// sorted by score descending, then code ascending.
pub fn compute_scores(
    inputs: &SignalInputs,
    previous: &PreviousScores,
    normalizers: &Normalizers,
) -> Vec<CountryScore> {
    let mut scores: Vec<CountryScore> = inputs
        .iter()
        .map(|(code, entity)| {
            let mut components = ComponentScores::default();
            let mut composite = 0.0;
            for component in Component::ALL {
                // Absent components score 0 regardless of normalizer.
                let value = entity
                    .signals
                    .get(&component)
                    .map(|raw| normalizers.apply(component, *raw).round())
                    .unwrap_or(0.0);
                components.set(component, value as u32);
                composite += component_weight(component) * value;
            }

            let score = composite.clamp(0.0, 100.0).round() as u32;
            let change_24h = previous
                .get(code)
                .map(|prev| score as i32 - *prev as i32)
                .unwrap_or(0);

            CountryScore {
                code: code.clone(),
                name: if entity.name.is_empty() {
                    code.clone()
                } else {
                    entity.name.clone()
                },
                score,
                level: ScoreLevel::from_score(score),
                trend: Trend::from_change(change_24h),
                change_24h,
                components,
            }
        })
        .collect();

    scores.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.code.cmp(&b.code)));
    scores
}

/// Pull-based scoring engine.
///
/// Recomputes only when asked. Until focal-point inputs have been
/// delivered, a refresh is a no-op unless the caller forces a local
/// computation over whatever is available.
#[derive(Debug, Default)]
pub struct ScoringEngine {
    normalizers: Normalizers,
    focal: SignalInputs,
    focal_points_ready: bool,
    previous: PreviousScores,
    latest: Vec<CountryScore>,
}

impl ScoringEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_normalizers(normalizers: Normalizers) -> Self {
        Self {
            normalizers,
            ..Self::default()
        }
    }

    /// Replace the focal-point inputs and mark them ready.
    pub fn deliver_focal_points(&mut self, inputs: SignalInputs) {
        debug!("Focal points delivered for {} entities", inputs.len());
        self.focal = inputs;
        self.focal_points_ready = true;
    }

    pub fn is_ready(&self) -> bool {
        self.focal_points_ready
    }

    pub fn refresh(&mut self, force_local: bool) -> Vec<CountryScore> {
        self.refresh_with(&SignalInputs::new(), force_local)
    }

    /// Recompute from focal inputs overlaid on `supplemental`.
    pub fn refresh_with(&mut self, supplemental: &SignalInputs, force_local: bool) -> Vec<CountryScore> {
        if !self.focal_points_ready && !force_local {
            debug!("Scoring refresh skipped: focal points not ready");
            return Vec::new();
        }
        if force_local && !self.focal_points_ready {
            self.focal_points_ready = true;
            info!("Focal points forced ready, calculating local scores");
        }

        let inputs = merge_signals(&self.focal, supplemental);
        let scores = compute_scores(&inputs, &self.previous, &self.normalizers);

        self.previous = scores.iter().map(|s| (s.code.clone(), s.score)).collect();
        self.latest = scores.clone();

        let with_data = scores.iter().filter(|s| s.score > 0).count();
        info!("Calculated {} of {} entities with signal data", with_data, scores.len());
        scores
    }

    /// Read-only copy of the latest computed list.
    pub fn scores(&self) -> Vec<CountryScore> {
        self.latest.clone()
    }

    /// Latest scores with a non-zero composite.
    pub fn scores_with_data(&self) -> Vec<CountryScore> {
        self.latest.iter().filter(|s| s.score > 0).cloned().collect()
    }

    pub fn previous_scores(&self) -> &PreviousScores {
        &self.previous
    }

    pub fn reset(&mut self) {
        self.focal.clear();
        self.focal_points_ready = false;
        self.previous.clear();
        self.latest.clear();
    }
}
