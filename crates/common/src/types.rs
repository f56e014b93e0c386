//! Core data types shared across signal-desk crates.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Advisory records ──────────────────────────────────────────────────

/// Advisory band over the upstream 0–5 safety scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AdvisoryLevel {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Medium Risk")]
    Medium,
    #[serde(rename = "High Risk")]
    High,
    #[serde(rename = "Extreme Risk")]
    Extreme,
}

impl AdvisoryLevel {
    pub const MEDIUM_AT: f64 = 2.5;
    pub const HIGH_AT: f64 = 3.5;
    pub const EXTREME_AT: f64 = 4.5;

    /// Classify a 0–5 advisory score. Cut points are inclusive lower bounds.
    pub fn from_score(score: f64) -> Self {
        if score >= Self::EXTREME_AT {
            AdvisoryLevel::Extreme
        } else if score >= Self::HIGH_AT {
            AdvisoryLevel::High
        } else if score >= Self::MEDIUM_AT {
            AdvisoryLevel::Medium
        } else {
            AdvisoryLevel::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AdvisoryLevel::Low => "Low Risk",
            AdvisoryLevel::Medium => "Medium Risk",
            AdvisoryLevel::High => "High Risk",
            AdvisoryLevel::Extreme => "Extreme Risk",
        }
    }
}

impl fmt::Display for AdvisoryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One normalized travel-advisory entry.
///
/// Field names on the wire match the payload the dashboard already consumes.
/// `level` is serialized for readers but recomputed from `score` on input,
/// so a cached entry can never carry a band that disagrees with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SafetyRecordWire")]
pub struct SafetyRecord {
    #[serde(rename = "iso")]
    pub code: String,
    #[serde(rename = "name", default)]
    pub display_name: String,
    #[serde(rename = "score")]
    pub raw_score: f64,
    pub level: AdvisoryLevel,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "updated", default)]
    pub updated_at: Option<String>,
}

/// Inbound shape of a `SafetyRecord`; any `level` present is ignored.
#[derive(Deserialize)]
struct SafetyRecordWire {
    iso: String,
    #[serde(default)]
    name: String,
    score: f64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    updated: Option<String>,
}

impl From<SafetyRecordWire> for SafetyRecord {
    fn from(wire: SafetyRecordWire) -> Self {
        SafetyRecord::new(wire.iso, wire.name, wire.score, wire.message, wire.updated)
    }
}

impl SafetyRecord {
    /// Build a record; the level is always derived from `raw_score`.
    pub fn new(
        code: impl Into<String>,
        display_name: impl Into<String>,
        raw_score: f64,
        message: impl Into<String>,
        updated_at: Option<String>,
    ) -> Self {
        Self {
            code: code.into(),
            display_name: display_name.into(),
            raw_score,
            level: AdvisoryLevel::from_score(raw_score),
            message: message.into(),
            updated_at,
        }
    }
}

// ── Cached envelope ───────────────────────────────────────────────────

/// Normalized snapshot of one upstream topic.
///
/// This is both what the cache tiers store and the success envelope
/// returned to HTTP callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<R> {
    pub success: bool,
    pub count: usize,
    pub data: BTreeMap<String, R>,
    pub cached_at: DateTime<Utc>,
}

impl<R> Snapshot<R> {
    pub fn new(data: BTreeMap<String, R>, cached_at: DateTime<Utc>) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
            cached_at,
        }
    }
}

// ── Composite scores ──────────────────────────────────────────────────

/// Named sub-signal feeding the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Conflict,
    Security,
    Information,
    Unrest,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::Conflict,
        Component::Security,
        Component::Information,
        Component::Unrest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Conflict => "conflict",
            Component::Security => "security",
            Component::Information => "information",
            Component::Unrest => "unrest",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-component contributions, each on a 0–100 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub conflict: u32,
    pub security: u32,
    pub information: u32,
    pub unrest: u32,
}

impl ComponentScores {
    pub fn get(&self, component: Component) -> u32 {
        match component {
            Component::Conflict => self.conflict,
            Component::Security => self.security,
            Component::Information => self.information,
            Component::Unrest => self.unrest,
        }
    }

    pub fn set(&mut self, component: Component, value: u32) {
        match component {
            Component::Conflict => self.conflict = value,
            Component::Security => self.security = value,
            Component::Information => self.information = value,
            Component::Unrest => self.unrest = value,
        }
    }
}

/// Five ordered bands over the 0–100 composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreLevel {
    Low,
    Normal,
    Elevated,
    High,
    Critical,
}

impl ScoreLevel {
    pub const NORMAL_AT: u32 = 31;
    pub const ELEVATED_AT: u32 = 51;
    pub const HIGH_AT: u32 = 66;
    pub const CRITICAL_AT: u32 = 81;

    pub fn from_score(score: u32) -> Self {
        if score >= Self::CRITICAL_AT {
            ScoreLevel::Critical
        } else if score >= Self::HIGH_AT {
            ScoreLevel::High
        } else if score >= Self::ELEVATED_AT {
            ScoreLevel::Elevated
        } else if score >= Self::NORMAL_AT {
            ScoreLevel::Normal
        } else {
            ScoreLevel::Low
        }
    }
}

/// Direction of the score relative to the previous observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

impl Trend {
    pub fn from_change(change: i32) -> Self {
        match change {
            c if c > 0 => Trend::Rising,
            c if c < 0 => Trend::Falling,
            _ => Trend::Stable,
        }
    }

    pub fn inverted(self) -> Self {
        match self {
            Trend::Rising => Trend::Falling,
            Trend::Falling => Trend::Rising,
            Trend::Stable => Trend::Stable,
        }
    }
}

/// Composite score for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryScore {
    pub code: String,
    pub name: String,
    pub score: u32,
    pub level: ScoreLevel,
    pub trend: Trend,
    #[serde(rename = "change24h")]
    pub change_24h: i32,
    pub components: ComponentScores,
}
