use std::collections::VecDeque;

use log::debug;

use crate::config::ScoringConfig;
use crate::scoring::types::{
    Judgement, JudgementEvent, JudgementTier, SessionSummary, TierCounts,
};
use crate::timeline::NoteId;

/// Score multiplier at a given combo, before the judgement is counted.
pub fn combo_multiplier(combo: u32, config: &ScoringConfig) -> f64 {
    (1.0 + combo as f64 * config.combo_step).min(config.max_multiplier)
}

/// Running score and combo for one performance.
///
/// Only judgements move it; `reset` is the only way back to zero.
#[derive(Debug, Clone)]
pub struct ScoreBoard {
    config: ScoringConfig,
    score: u64,
    combo: u32,
    max_combo: u32,
    counts: TierCounts,
    base_earned: u64,
    recent: VecDeque<JudgementEvent>,
}

impl ScoreBoard {
    pub fn new(config: ScoringConfig) -> Self {
        let capacity = config.recent_capacity;
        ScoreBoard {
            config,
            score: 0,
            combo: 0,
            max_combo: 0,
            counts: TierCounts::default(),
            base_earned: 0,
            recent: VecDeque::with_capacity(capacity),
        }
    }

    /// Apply one judgement and return the event describing it.
    pub fn apply(&mut self, note: NoteId, judgement: Judgement, time: f64) -> JudgementEvent {
        let points = if judgement.tier.is_hit() {
            let multiplier = combo_multiplier(self.combo, &self.config);
            let points = (judgement.base_points as f64 * multiplier).round() as u32;
            self.score += points as u64;
            self.combo += 1;
            self.base_earned += judgement.base_points as u64;
            points
        } else {
            self.combo = 0;
            0
        };
        self.max_combo = self.max_combo.max(self.combo);
        self.counts.record(judgement.tier);

        let event = JudgementEvent {
            note,
            tier: judgement.tier,
            points,
            combo: self.combo,
            time,
            best_cents: judgement.best_cents,
        };
        if self.config.recent_capacity > 0 {
            if self.recent.len() == self.config.recent_capacity {
                self.recent.pop_front();
            }
            self.recent.push_back(event);
        }
        debug!(
            "{:?} -> {:?} +{} (combo {}, score {})",
            note, judgement.tier, points, self.combo, self.score
        );
        event
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn max_combo(&self) -> u32 {
        self.max_combo
    }

    pub fn counts(&self) -> TierCounts {
        self.counts
    }

    /// Most recent judgements, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &JudgementEvent> {
        self.recent.iter()
    }

    pub fn summary(&self) -> SessionSummary {
        let judged = self.counts.total() as u64;
        let available = judged * self.config.perfect_points as u64;
        let accuracy = if available > 0 {
            self.base_earned as f64 / available as f64 * 100.0
        } else {
            0.0
        };
        SessionSummary {
            score: self.score,
            combo: self.combo,
            max_combo: self.max_combo,
            counts: self.counts,
            accuracy,
            full_combo: judged > 0 && self.counts.miss == 0,
        }
    }

    pub fn reset(&mut self) {
        self.score = 0;
        self.combo = 0;
        self.max_combo = 0;
        self.counts = TierCounts::default();
        self.base_earned = 0;
        self.recent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn id(position: usize) -> NoteId {
        NoteId { line: 0, position }
    }

    fn judged(tier: JudgementTier) -> Judgement {
        let config = ScoringConfig::default();
        Judgement {
            tier,
            base_points: crate::scoring::judgement::base_points(tier, &config),
            best_cents: None,
        }
    }

    fn tier_strategy() -> impl Strategy<Value = JudgementTier> {
        prop_oneof![
            Just(JudgementTier::Perfect),
            Just(JudgementTier::Great),
            Just(JudgementTier::Good),
            Just(JudgementTier::Miss),
        ]
    }

    #[test]
    fn test_first_perfect_is_100() {
        let mut board = ScoreBoard::new(ScoringConfig::default());
        let event = board.apply(id(0), judged(JudgementTier::Perfect), 10.5);
        assert_eq!(event.points, 100);
        assert_eq!(event.combo, 1);
        assert_eq!(board.score(), 100);
        assert_eq!(board.combo(), 1);
    }

    #[test]
    fn test_multiplier_grows_then_clamps() {
        let config = ScoringConfig::default();
        assert_relative_eq!(combo_multiplier(0, &config), 1.0);
        assert_relative_eq!(combo_multiplier(5, &config), 1.5);
        assert_relative_eq!(combo_multiplier(10, &config), 2.0);
        assert_relative_eq!(combo_multiplier(250, &config), 2.0);
        for combo in 0..40 {
            assert!(combo_multiplier(combo + 1, &config) >= combo_multiplier(combo, &config));
        }
    }

    #[test]
    fn test_points_rounding() {
        let mut board = ScoreBoard::new(ScoringConfig::default());
        board.apply(id(0), judged(JudgementTier::Perfect), 0.0);
        board.apply(id(1), judged(JudgementTier::Perfect), 0.0);
        board.apply(id(2), judged(JudgementTier::Perfect), 0.0);
        // combo 3 -> 1.3x of 75 = 97.5 -> 98
        let event = board.apply(id(3), judged(JudgementTier::Great), 0.0);
        assert_eq!(event.points, 98);
        assert_eq!(board.score(), 100 + 110 + 120 + 98);
    }

    #[test]
    fn test_miss_breaks_combo() {
        let mut board = ScoreBoard::new(ScoringConfig::default());
        board.apply(id(0), judged(JudgementTier::Good), 0.0);
        board.apply(id(1), judged(JudgementTier::Good), 0.0);
        let before = board.score();
        let event = board.apply(id(2), judged(JudgementTier::Miss), 0.0);
        assert_eq!(event.points, 0);
        assert_eq!(board.combo(), 0);
        assert_eq!(board.max_combo(), 2);
        assert_eq!(board.score(), before);
    }

    #[test]
    fn test_recent_is_bounded() {
        let config = ScoringConfig {
            recent_capacity: 3,
            ..ScoringConfig::default()
        };
        let mut board = ScoreBoard::new(config);
        for i in 0..5 {
            board.apply(id(i), judged(JudgementTier::Perfect), i as f64);
        }
        let kept: Vec<usize> = board.recent().map(|e| e.note.position).collect();
        assert_eq!(kept, vec![2, 3, 4]);
    }

    #[test]
    fn test_summary_and_reset() {
        let mut board = ScoreBoard::new(ScoringConfig::default());
        board.apply(id(0), judged(JudgementTier::Perfect), 0.0);
        board.apply(id(1), judged(JudgementTier::Good), 0.0);
        let summary = board.summary();
        assert_eq!(summary.counts.total(), 2);
        assert_relative_eq!(summary.accuracy, 75.0);
        assert!(summary.full_combo);

        board.apply(id(2), judged(JudgementTier::Miss), 0.0);
        assert!(!board.summary().full_combo);

        board.reset();
        assert_eq!(board.score(), 0);
        assert_eq!(board.combo(), 0);
        assert_eq!(board.max_combo(), 0);
        assert_eq!(board.counts().total(), 0);
        assert_eq!(board.recent().count(), 0);
        assert_eq!(board.summary().accuracy, 0.0);
    }

    proptest! {
        #[test]
        fn prop_combo_transitions(tiers in prop::collection::vec(tier_strategy(), 0..64)) {
            let mut board = ScoreBoard::new(ScoringConfig::default());
            for (i, tier) in tiers.into_iter().enumerate() {
                let combo_before = board.combo();
                let score_before = board.score();
                board.apply(id(i), judged(tier), i as f64);
                if tier.is_hit() {
                    prop_assert_eq!(board.combo(), combo_before + 1);
                    prop_assert!(board.score() > score_before);
                } else {
                    prop_assert_eq!(board.combo(), 0);
                    prop_assert_eq!(board.score(), score_before);
                }
                prop_assert!(board.max_combo() >= board.combo());
            }
        }
    }
}
