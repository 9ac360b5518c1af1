use serde::{Deserialize, Serialize};

use crate::timeline::NoteId;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JudgementTier {
    Perfect,
    Great,
    Good,
    Miss,
}

impl JudgementTier {
    /// Every tier except MISS keeps the combo going.
    pub fn is_hit(&self) -> bool {
        !matches!(self, Self::Miss)
    }
}

/// Outcome of judging one note, before combo scaling.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct Judgement {
    pub tier: JudgementTier,
    pub base_points: u32,
    /// Smallest absolute deviation among the note's samples, if any counted.
    pub best_cents: Option<f64>,
}

/// Immutable record of a judged note; at most one per note per session.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct NoteScoringRecord {
    pub tier: JudgementTier,
    pub points: u32,
    pub best_cents: Option<f64>,
    pub scored_at: f64,
}

/// Emitted once per judged note for transient UI feedback.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct JudgementEvent {
    pub note: NoteId,
    pub tier: JudgementTier,
    /// Points after the combo multiplier.
    pub points: u32,
    /// Combo after this judgement was applied.
    pub combo: u32,
    pub time: f64,
    pub best_cents: Option<f64>,
}

#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TierCounts {
    pub perfect: u32,
    pub great: u32,
    pub good: u32,
    pub miss: u32,
}

impl TierCounts {
    pub fn record(&mut self, tier: JudgementTier) {
        match tier {
            JudgementTier::Perfect => self.perfect += 1,
            JudgementTier::Great => self.great += 1,
            JudgementTier::Good => self.good += 1,
            JudgementTier::Miss => self.miss += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.perfect + self.great + self.good + self.miss
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub counts: TierCounts,
    /// Base points earned over base points available, 0-100.
    pub accuracy: f64,
    pub full_combo: bool,
}
