pub mod board;
pub mod collector;
pub mod judgement;
pub mod types;

pub use board::{combo_multiplier, ScoreBoard};
pub use collector::NoteSampleCollector;
pub use judgement::judge_note;
pub use types::{
    Judgement, JudgementEvent, JudgementTier, NoteScoringRecord, SessionSummary, TierCounts,
};
