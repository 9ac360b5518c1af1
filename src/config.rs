use serde::{Deserialize, Serialize};

use crate::error::{KaraokeError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Windows with RMS below this are treated as silence.
    pub silence_rms: f32,
    /// Absolute amplitude used to trim quiet edges off the window.
    pub trim_threshold: f32,
    pub min_hz: f32,
    pub max_hz: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            silence_rms: 0.01,
            trim_threshold: 0.2,
            min_hz: 60.0,
            max_hz: 1500.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// How long a line stays active after it ends when another line follows.
    pub line_grace_seconds: f64,
    /// Largest gap to the next line that still pre-announces it.
    pub pre_announce_gap_seconds: f64,
    /// How long the final line stays active after it ends.
    pub final_line_hold_seconds: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            line_grace_seconds: 0.5,
            pre_announce_gap_seconds: 3.0,
            final_line_hold_seconds: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub perfect_cents: f64,
    pub great_cents: f64,
    pub good_cents: f64,
    pub perfect_points: u32,
    pub great_points: u32,
    pub good_points: u32,
    /// Multiplier added per combo step.
    pub combo_step: f64,
    pub max_multiplier: f64,
    /// Number of judgement events kept in the rolling history.
    pub recent_capacity: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            perfect_cents: 10.0,
            great_cents: 25.0,
            good_cents: 50.0,
            perfect_points: 100,
            great_points: 75,
            good_points: 50,
            combo_step: 0.1,
            max_multiplier: 2.0,
            recent_capacity: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailConfig {
    pub window_seconds: f64,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self { window_seconds: 4.0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub estimator: EstimatorConfig,
    pub timeline: TimelineConfig,
    pub scoring: ScoringConfig,
    pub trail: TrailConfig,
}

fn non_negative(value: f64, name: &str) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(KaraokeError::InvalidConfig(format!(
            "{} must be a finite non-negative number, got {}",
            name, value
        )))
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<()> {
        non_negative(self.silence_rms as f64, "estimator.silence_rms")?;
        non_negative(self.trim_threshold as f64, "estimator.trim_threshold")?;
        if !(self.min_hz.is_finite() && self.min_hz > 0.0) {
            return Err(KaraokeError::InvalidConfig(format!(
                "estimator.min_hz must be positive, got {}",
                self.min_hz
            )));
        }
        if !(self.max_hz.is_finite() && self.max_hz > self.min_hz) {
            return Err(KaraokeError::InvalidConfig(format!(
                "estimator.max_hz ({}) must be above min_hz ({})",
                self.max_hz, self.min_hz
            )));
        }
        Ok(())
    }
}

impl TimelineConfig {
    pub fn validate(&self) -> Result<()> {
        non_negative(self.line_grace_seconds, "timeline.line_grace_seconds")?;
        non_negative(self.pre_announce_gap_seconds, "timeline.pre_announce_gap_seconds")?;
        non_negative(self.final_line_hold_seconds, "timeline.final_line_hold_seconds")
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        non_negative(self.perfect_cents, "scoring.perfect_cents")?;
        non_negative(self.great_cents, "scoring.great_cents")?;
        non_negative(self.good_cents, "scoring.good_cents")?;
        if !(self.perfect_cents <= self.great_cents && self.great_cents <= self.good_cents) {
            return Err(KaraokeError::InvalidConfig(
                "scoring tiers must widen from perfect to good".to_string(),
            ));
        }
        non_negative(self.combo_step, "scoring.combo_step")?;
        if !(self.max_multiplier.is_finite() && self.max_multiplier >= 1.0) {
            return Err(KaraokeError::InvalidConfig(format!(
                "scoring.max_multiplier must be at least 1, got {}",
                self.max_multiplier
            )));
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON config; missing fields take defaults.
    /// The result is validated.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json).map_err(KaraokeError::Config)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the per-frame path cannot work with.
    pub fn validate(&self) -> Result<()> {
        self.estimator.validate()?;
        self.timeline.validate()?;
        self.scoring.validate()?;
        non_negative(self.trail.window_seconds, "trail.window_seconds")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_tier_table() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.scoring.perfect_cents, 10.0);
        assert_eq!(cfg.scoring.great_cents, 25.0);
        assert_eq!(cfg.scoring.good_cents, 50.0);
        assert_eq!(cfg.scoring.perfect_points, 100);
        assert_eq!(cfg.trail.window_seconds, 4.0);
        assert_eq!(cfg.timeline.line_grace_seconds, 0.5);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let cfg = EngineConfig::from_json(r#"{"scoring": {"perfect_cents": 5.0}}"#).unwrap();
        assert_eq!(cfg.scoring.perfect_cents, 5.0);
        assert_eq!(cfg.scoring.great_cents, 25.0);
        assert_eq!(cfg.estimator, EstimatorConfig::default());
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = EngineConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, KaraokeError::Config(_)));
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_unusable_values_are_rejected() {
        for json in [
            r#"{"estimator": {"min_hz": 0.0}}"#,
            r#"{"estimator": {"min_hz": -60.0}}"#,
            r#"{"estimator": {"min_hz": 500.0, "max_hz": 400.0}}"#,
            r#"{"estimator": {"silence_rms": -0.1}}"#,
            r#"{"timeline": {"line_grace_seconds": -1.0}}"#,
            r#"{"trail": {"window_seconds": -4.0}}"#,
            r#"{"scoring": {"perfect_cents": 30.0}}"#,
            r#"{"scoring": {"max_multiplier": 0.5}}"#,
        ] {
            let err = EngineConfig::from_json(json).unwrap_err();
            assert!(
                matches!(err, KaraokeError::InvalidConfig(_)),
                "{} gave {:?}",
                json,
                err
            );
        }
    }

    #[test]
    fn test_non_finite_window_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.trail.window_seconds = f64::INFINITY;
        assert!(cfg.validate().is_err());
        cfg.trail.window_seconds = 4.0;
        cfg.timeline.final_line_hold_seconds = f64::NAN;
        assert!(cfg.validate().is_err());
    }
}
