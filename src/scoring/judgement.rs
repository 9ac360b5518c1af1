use crate::config::ScoringConfig;
use crate::pitch::{cents_between, midi_to_hz};
use crate::scoring::types::{Judgement, JudgementTier};

pub fn tier_for_cents(abs_cents: f64, config: &ScoringConfig) -> JudgementTier {
    if abs_cents < config.perfect_cents {
        JudgementTier::Perfect
    } else if abs_cents < config.great_cents {
        JudgementTier::Great
    } else if abs_cents < config.good_cents {
        JudgementTier::Good
    } else {
        JudgementTier::Miss
    }
}

pub fn base_points(tier: JudgementTier, config: &ScoringConfig) -> u32 {
    match tier {
        JudgementTier::Perfect => config.perfect_points,
        JudgementTier::Great => config.great_points,
        JudgementTier::Good => config.good_points,
        JudgementTier::Miss => 0,
    }
}

/// Reduce a note's collected frequencies to a single judgement.
///
/// The best sample wins: a singer who touches the target at any point in
/// the window gets credit for it. No samples, or input switched off, is a MISS.
pub fn judge_note(
    target_midi: i32,
    samples: &[f32],
    input_enabled: bool,
    config: &ScoringConfig,
) -> Judgement {
    let miss = Judgement {
        tier: JudgementTier::Miss,
        base_points: 0,
        best_cents: None,
    };
    if !input_enabled || samples.is_empty() {
        return miss;
    }

    let target_hz = midi_to_hz(target_midi as f64);
    let best_cents = samples
        .iter()
        .filter(|&&hz| hz.is_finite() && hz > 0.0)
        .map(|&hz| cents_between(hz as f64, target_hz).abs())
        .fold(None, |best: Option<f64>, c| Some(best.map_or(c, |b| b.min(c))));

    match best_cents {
        Some(cents) => {
            let tier = tier_for_cents(cents, config);
            Judgement {
                tier,
                base_points: base_points(tier, config),
                best_cents: Some(cents),
            }
        }
        None => miss,
    }
}
