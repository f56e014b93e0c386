//! Composite scoring engine.
//!
//! Folds per-entity component signals into a 0–100 score with a level
//! band and a trend against the previous refresh.

pub mod components;
pub mod engine;
pub mod signals;

pub use components::{component_weight, Normalizer, Normalizers, COMPONENT_WEIGHTS};
pub use engine::{compute_scores, PreviousScores, ScoringEngine};
pub use signals::{merge_signals, signals_from_advisories, EntitySignals, SignalInputs};
