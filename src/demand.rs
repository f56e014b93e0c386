//! Demand view over risk scores.
//!
//! Panels that show destination demand read the same scores upside
//! down: demand is `100 - risk`, and the trend arrow flips. The level
//! band is passed through so a critical-risk entry still renders red.

use common::{CountryScore, ScoreLevel, Trend};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemandComponents {
    pub interest: u32,
    pub safety: u32,
    pub access: u32,
    pub events: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemandScore {
    pub code: String,
    pub name: String,
    pub demand: u32,
    pub level: ScoreLevel,
    pub trend: Trend,
    #[serde(rename = "change24h")]
    pub change_24h: i32,
    pub components: DemandComponents,
}

pub fn demand_view(score: &CountryScore) -> DemandScore {
    DemandScore {
        code: score.code.clone(),
        name: score.name.clone(),
        demand: 100u32.saturating_sub(score.score),
        level: score.level,
        trend: score.trend.inverted(),
        change_24h: score.change_24h,
        components: DemandComponents {
            interest: score.components.information,
            safety: 100u32.saturating_sub(score.components.conflict),
            access: 100u32.saturating_sub(score.components.security),
            events: score.components.unrest,
        },
    }
}

pub fn demand_table(scores: &[CountryScore]) -> Vec<DemandScore> {
    scores.iter().map(demand_view).collect()
}
